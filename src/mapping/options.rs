//! Named option behaviours.
//!
//! An open, usable [`Opt`](crate::config::schema::Opt) names a behaviour
//! that transforms the mapped value before it is assigned. Behaviours are
//! registered by name; configurations naming an unknown one are rejected
//! when the generation is built.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::GatewayError;
use crate::mapping::call::value_to_string;

/// A value transformation applied by a mapping rule.
pub trait OptionBehavior: Send + Sync {
    fn apply(&self, value: Value) -> Result<Value, String>;
}

impl<F> OptionBehavior for F
where
    F: Fn(Value) -> Result<Value, String> + Send + Sync,
{
    fn apply(&self, value: Value) -> Result<Value, String> {
        self(value)
    }
}

/// Name → behaviour table.
#[derive(Clone, Default)]
pub struct OptionRegistry {
    behaviors: HashMap<String, Arc<dyn OptionBehavior>>,
}

impl OptionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in behaviours.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("identity", |v: Value| -> Result<Value, String> { Ok(v) });
        registry.register("string", |v: Value| -> Result<Value, String> {
            Ok(Value::String(value_to_string(&v)))
        });
        registry.register("int", to_int);
        registry.register("bool", to_bool);
        registry.register("json", |v: Value| -> Result<Value, String> {
            match v {
                Value::String(text) => serde_json::from_str(&text).map_err(|e| e.to_string()),
                other => Ok(other),
            }
        });
        registry.register("trim", |v: Value| map_str(v, |s| s.trim().to_string()));
        registry.register("lowercase", |v: Value| map_str(v, |s| s.to_lowercase()));
        registry.register("uppercase", |v: Value| map_str(v, |s| s.to_uppercase()));
        registry
    }

    /// Add or replace a behaviour.
    pub fn register<B>(&mut self, name: impl Into<String>, behavior: B)
    where
        B: OptionBehavior + 'static,
    {
        self.behaviors.insert(name.into(), Arc::new(behavior));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn OptionBehavior>> {
        self.behaviors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.behaviors.contains_key(name)
    }

    /// Run `name` on `value`.
    pub fn transform(&self, name: &str, value: Value) -> Result<Value, GatewayError> {
        let behavior = self
            .get(name)
            .ok_or_else(|| GatewayError::UnknownOption(name.to_string()))?;
        behavior.apply(value).map_err(|reason| GatewayError::OptionFailed {
            option: name.to_string(),
            reason,
        })
    }
}

impl fmt::Debug for OptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.behaviors.keys().collect();
        names.sort();
        f.debug_struct("OptionRegistry").field("behaviors", &names).finish()
    }
}

fn map_str(value: Value, f: impl Fn(&str) -> String) -> Result<Value, String> {
    match value {
        Value::String(s) => Ok(Value::String(f(&s))),
        other => Ok(other),
    }
}

fn to_int(value: Value) -> Result<Value, String> {
    match &value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| Value::from(f as i64))
            .ok_or_else(|| format!("{} is not an integer", n)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{}' is not an integer", s)),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        other => Err(format!("{} is not an integer", other)),
    }
}

fn to_bool(value: Value) -> Result<Value, String> {
    match &value {
        Value::Bool(_) => Ok(value),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a boolean", s)),
        },
        Value::Number(n) => Ok(Value::Bool(n.as_f64() != Some(0.0))),
        other => Err(format!("{} is not a boolean", other)),
    }
}
