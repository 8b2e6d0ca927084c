//! The clock — per-state monotonic tick counters with the odd/even invariant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-state tick counters. Odd means active, even means inactive. The
/// tick increments on every activation, deactivation, and (for `multi`
/// states) every re-activation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clock {
    ticks: BTreeMap<String, u64>,
}

impl Clock {
    /// An empty clock — every state starts inactive at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current tick for `name` (0 if never touched).
    pub fn tick(&self, name: &str) -> u64 {
        self.ticks.get(name).copied().unwrap_or(0)
    }

    /// Whether `name` is active — tick is odd.
    pub fn is_active(&self, name: &str) -> bool {
        self.tick(name) & 1 == 1
    }

    /// Advance `name`'s tick by one (flips active/inactive, or re-enters a
    /// `multi` state). Returns the new tick.
    pub fn advance(&mut self, name: &str) -> u64 {
        let next = self.tick(name) + 1;
        self.ticks.insert(name.to_string(), next);
        next
    }

    /// A snapshot of ticks for the given names (or every known name if
    /// `names` is `None`), suitable for pointwise comparison.
    pub fn snapshot(&self, names: Option<&[String]>) -> Snapshot {
        let entries = match names {
            Some(names) => names.iter().map(|n| (n.clone(), self.tick(n))).collect(),
            None => self
                .ticks
                .iter()
                .map(|(n, t)| (n.clone(), *t))
                .collect(),
        };
        Snapshot(entries)
    }

    /// Every state name this clock has ever advanced (i.e. touched at
    /// least once). States never mutated are implicitly tick 0 and are
    /// not listed here.
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.ticks.keys().map(String::as_str)
    }
}

/// A point-in-time vector of ticks. Compares by pointwise equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot(Vec<(String, u64)>);

impl Snapshot {
    /// The tick recorded for `name` in this snapshot (0 if absent).
    pub fn get(&self, name: &str) -> u64 {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
            .unwrap_or(0)
    }

    /// Names whose tick differs between `newer` and `older`, paired with
    /// `(older_tick, newer_tick)`.
    pub fn diff(newer: &Snapshot, older: &Snapshot) -> Vec<(String, u64, u64)> {
        let mut names: Vec<&str> = newer
            .0
            .iter()
            .map(|(n, _)| n.as_str())
            .chain(older.0.iter().map(|(n, _)| n.as_str()))
            .collect();
        names.sort();
        names.dedup();
        names
            .into_iter()
            .filter_map(|n| {
                let a = older.get(n);
                let b = newer.get(n);
                if a != b { Some((n.to_string(), a, b)) } else { None }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_inactive() {
        let clock = Clock::new();
        assert!(!clock.is_active("A"));
        assert_eq!(clock.tick("A"), 0);
    }

    #[test]
    fn advance_flips_parity() {
        let mut clock = Clock::new();
        assert_eq!(clock.advance("A"), 1);
        assert!(clock.is_active("A"));
        assert_eq!(clock.advance("A"), 2);
        assert!(!clock.is_active("A"));
    }

    #[test]
    fn snapshot_diff_reports_changed_only() {
        let mut clock = Clock::new();
        let before = clock.snapshot(None);
        clock.advance("A");
        let after = clock.snapshot(None);
        let diff = Snapshot::diff(&after, &before);
        assert_eq!(diff, vec![("A".to_string(), 0, 1)]);
    }
}
