//! Groups and conditions — the static/boolean vocabulary higher layers use
//! for story/trigger gating over an actor's active set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named, static subset of a schema's states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// The group's name.
    pub name: String,
    /// The states in the group, in declaration order (the order `Switch`
    /// scans them in).
    pub states: Vec<String>,
}

impl Group {
    /// Create a new group.
    pub fn new(name: impl Into<String>, states: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            states: states.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the first active state in the group, in its declared order,
    /// or `None` if no member is active. O(|group|), consistent with the
    /// snapshot passed in — callers must take `active` atomically.
    pub fn switch(&self, active: &BTreeSet<String>) -> Option<&str> {
        self.states.iter().find(|s| active.contains(*s)).map(String::as_str)
    }
}

/// A boolean expression over an actor's active set, evaluated atomically
/// against a single snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Condition {
    /// True if at least one of these is active (empty = vacuously true).
    #[serde(default)]
    pub any: Vec<String>,
    /// True only if all of these are active.
    #[serde(default)]
    pub is: Vec<String>,
    /// True only if none of these are active.
    #[serde(default)]
    pub not: Vec<String>,
}

impl Condition {
    /// Evaluate against a snapshot of the active set.
    pub fn evaluate(&self, active: &BTreeSet<String>) -> bool {
        let any_ok = self.any.is_empty() || self.any.iter().any(|s| active.contains(s));
        let is_ok = self.is.iter().all(|s| active.contains(s));
        let not_ok = self.not.iter().all(|s| !active.contains(s));
        any_ok && is_ok && not_ok
    }
}
