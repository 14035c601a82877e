//! Segment trie over compiled route ids.
//!
//! Each level tries, in order: the literal child, the variable child, the
//! wildcard. A literal branch that dead-ends deeper down falls back to the
//! variable branch, so `/a/b/c` and `/a/:x/d` both stay reachable.

use std::collections::HashMap;

use crate::routing::path::Segment;

#[derive(Debug, Default)]
pub(crate) struct Node {
    literals: HashMap<String, Node>,
    param: Option<Box<Node>>,
    wildcard: Option<usize>,
    endpoint: Option<usize>,
}

impl Node {
    /// Register `route` at the end of `segments`.
    ///
    /// Returns the id already occupying that endpoint on conflict.
    pub(crate) fn insert(&mut self, segments: &[Segment], route: usize) -> Result<(), usize> {
        let Some((head, rest)) = segments.split_first() else {
            return occupy(&mut self.endpoint, route);
        };
        match head {
            Segment::Literal(text) => self
                .literals
                .entry(text.clone())
                .or_default()
                .insert(rest, route),
            Segment::Param(_) => self
                .param
                .get_or_insert_with(Default::default)
                .insert(rest, route),
            Segment::Wildcard(_) => occupy(&mut self.wildcard, route),
        }
    }

    /// Find the route for `segments`, pushing captured values in order.
    ///
    /// `visible` hides routes that exist but must not match (all methods
    /// disabled); the search continues past them.
    pub(crate) fn find<F>(&self, segments: &[&str], captures: &mut Vec<String>, visible: &F) -> Option<usize>
    where
        F: Fn(usize) -> bool,
    {
        let Some((head, rest)) = segments.split_first() else {
            return self.endpoint.filter(|id| visible(*id));
        };

        if let Some(child) = self.literals.get(*head) {
            if let Some(id) = child.find(rest, captures, visible) {
                return Some(id);
            }
        }

        if let Some(child) = &self.param {
            captures.push((*head).to_string());
            if let Some(id) = child.find(rest, captures, visible) {
                return Some(id);
            }
            captures.pop();
        }

        let id = self.wildcard.filter(|id| visible(*id))?;
        captures.push(segments.join("/"));
        Some(id)
    }
}

fn occupy(slot: &mut Option<usize>, route: usize) -> Result<(), usize> {
    match slot {
        Some(existing) => Err(*existing),
        None => {
            *slot = Some(route);
            Ok(())
        }
    }
}
