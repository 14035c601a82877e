//! Path template parsing.
//!
//! Templates are split on `/`; empty segments are ignored so `/a//b/` and
//! `/a/b` are the same path. A segment is one of:
//! - a literal (`users`)
//! - a variable capturing one element (`:id` or `{id}`)
//! - a trailing wildcard capturing the rest (`*rest` or `{*rest}`)

use std::fmt;

/// One parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

impl Segment {
    /// Name of the captured value, if this segment captures.
    pub fn capture_name(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Param(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => f.write_str(text),
            Segment::Param(name) => write!(f, ":{}", name),
            Segment::Wildcard(name) => write!(f, "*{}", name),
        }
    }
}

/// Non-empty segments of a path.
pub fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Concatenate a parent and child template into a normalized absolute path.
pub fn join(parent: &str, child: &str) -> String {
    let segments: Vec<&str> = split(parent).chain(split(child)).collect();
    format!("/{}", segments.join("/"))
}

/// Parse a full template.
pub fn parse_template(template: &str) -> Result<Vec<Segment>, String> {
    let raw: Vec<&str> = split(template).collect();
    let mut segments = Vec::with_capacity(raw.len());
    let mut names: Vec<String> = Vec::new();

    for (i, text) in raw.iter().enumerate() {
        let segment = parse_segment(text)?;
        if let Segment::Wildcard(_) = segment {
            if i + 1 != raw.len() {
                return Err(format!("wildcard '{}' must be the last segment", text));
            }
        }
        if let Some(name) = segment.capture_name() {
            if names.iter().any(|seen| seen == name) {
                return Err(format!("variable '{}' is captured twice", name));
            }
            names.push(name.to_string());
        }
        segments.push(segment);
    }
    Ok(segments)
}

fn parse_segment(text: &str) -> Result<Segment, String> {
    if let Some(inner) = text.strip_prefix('{') {
        let inner = inner
            .strip_suffix('}')
            .ok_or_else(|| format!("unbalanced braces in segment '{}'", text))?;
        return match inner.strip_prefix('*') {
            Some(name) => Ok(Segment::Wildcard(variable_name(name, text)?)),
            None => Ok(Segment::Param(variable_name(inner, text)?)),
        };
    }
    if let Some(name) = text.strip_prefix(':') {
        return Ok(Segment::Param(variable_name(name, text)?));
    }
    if let Some(name) = text.strip_prefix('*') {
        // A bare `*` captures under the name "*".
        let name = if name.is_empty() { "*" } else { name };
        return Ok(Segment::Wildcard(variable_name(name, text)?));
    }
    if text.contains(['{', '}']) {
        return Err(format!("unbalanced braces in segment '{}'", text));
    }
    Ok(Segment::Literal(text.to_string()))
}

fn variable_name(name: &str, segment: &str) -> Result<String, String> {
    let valid = name == "*"
        || (!name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'));
    if valid {
        Ok(name.to_string())
    } else {
        Err(format!("invalid variable name in segment '{}'", segment))
    }
}

/// Names captured by a parsed template, in order.
pub fn capture_names(segments: &[Segment]) -> Vec<String> {
    segments
        .iter()
        .filter_map(|s| s.capture_name().map(str::to_string))
        .collect()
}

/// Why a template could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError<'a> {
    /// `lookup` had no value for this variable.
    Missing(&'a str),
    /// The value is a `.` or `..` segment.
    DotSegment { name: &'a str, value: String },
}

/// Substitute captured segments with values from `lookup`.
///
/// Values are percent-encoded, so a variable fills exactly one segment and
/// a wildcard fills one segment per `/`-separated element. Neither can
/// introduce dot segments, a query or a fragment.
pub fn render<'a, F>(segments: &'a [Segment], mut lookup: F) -> Result<String, RenderError<'a>>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut rendered = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => {
                rendered.push('/');
                rendered.push_str(text);
            }
            Segment::Param(name) => {
                let value = lookup(name).ok_or(RenderError::Missing(name.as_str()))?;
                rendered.push('/');
                push_encoded(&mut rendered, name, &value)?;
            }
            Segment::Wildcard(name) => {
                let value = lookup(name).ok_or(RenderError::Missing(name.as_str()))?;
                for element in split(&value) {
                    rendered.push('/');
                    push_encoded(&mut rendered, name, element)?;
                }
            }
        }
    }
    if rendered.is_empty() {
        rendered.push('/');
    }
    Ok(rendered)
}

fn push_encoded<'a>(out: &mut String, name: &'a str, value: &str) -> Result<(), RenderError<'a>> {
    if value == "." || value == ".." {
        return Err(RenderError::DotSegment {
            name,
            value: value.to_string(),
        });
    }
    out.push_str(&urlencoding::encode(value));
    Ok(())
}

/// Percent-decode a captured path element; invalid UTF-8 is kept as sent.
pub fn decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}
