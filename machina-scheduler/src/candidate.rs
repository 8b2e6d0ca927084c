//! Fixed-point resolution of a mutation against a schema: turns a
//! `Mutation` plus the current active set into the candidate set a
//! transition would commit, honoring `require`/`remove` and auto-activating
//! `auto` states until nothing changes.

use machina_core::{CancelReason, Mutation, MutationKind, Schema};
use std::collections::BTreeSet;

/// Resolve `mutation` against `active` under `schema`, returning the
/// candidate active set or the reason the mutation is unsatisfiable.
///
/// `Set` is resolved as `Remove(active \ targets)` followed by
/// `Add(targets \ active)`, matching [`MutationKind::Set`]'s contract,
/// which collapses to simply seeding the fixed point with `targets`.
pub fn resolve_candidate(
    schema: &Schema,
    active: &BTreeSet<String>,
    mutation: &Mutation,
) -> Result<BTreeSet<String>, CancelReason> {
    let mut candidate = active.clone();
    let mut added_now: BTreeSet<String> = BTreeSet::new();

    match mutation.kind {
        MutationKind::Add => {
            // Re-entry of an already-active `multi` state is handled by the
            // scheduler as a tick bump, not as a fresh activation here — but
            // it still counts as "explicitly requested" for the conflict
            // check below.
            for t in &mutation.targets {
                candidate.insert(t.clone());
                added_now.insert(t.clone());
            }
        }
        MutationKind::Remove => {
            for t in &mutation.targets {
                candidate.remove(t);
            }
        }
        MutationKind::Set => {
            candidate = mutation.targets.iter().cloned().collect();
            added_now = candidate.clone();
        }
    }

    loop {
        let mut changed = false;

        // Only a state that just entered the candidate set because of this
        // mutation gets to evict others via its `remove` list — a bystander
        // still sitting in `candidate` from before this mutation keeps its
        // own `remove` edges dormant. Otherwise evicting it would look like
        // it "re-fired" its `remove` list on every resolution that happens
        // to still contain it.
        for name in added_now.clone() {
            let Some(state) = schema.get(&name) else {
                continue;
            };
            for r in &state.remove {
                if candidate.remove(r) {
                    if added_now.contains(r) {
                        return Err(CancelReason::ConfigError { state: r.clone() });
                    }
                    changed = true;
                }
            }
        }

        for name in candidate.clone() {
            let Some(state) = schema.get(&name) else {
                continue;
            };
            for req in &state.require {
                if !candidate.contains(req) {
                    if !schema.contains(req) {
                        return Err(CancelReason::Unsatisfiable {
                            detail: format!("{name:?} requires unknown state {req:?}"),
                        });
                    }
                    candidate.insert(req.clone());
                    added_now.insert(req.clone());
                    changed = true;
                }
            }
        }

        for name in schema.names() {
            if candidate.contains(name) {
                continue;
            }
            let Some(state) = schema.get(name) else {
                continue;
            };
            if !state.auto {
                continue;
            }
            if state.require.iter().all(|r| candidate.contains(r)) {
                candidate.insert(name.to_string());
                added_now.insert(name.to_string());
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use machina_core::State;

    fn schema() -> Schema {
        Schema::build([
            ("A", State::new()),
            ("B", State::new().require(["A"])),
            ("C", State::new().remove(["D"])),
            ("D", State::new()),
            ("Auto1", State::new().auto().require(["A"])),
        ])
        .unwrap()
    }

    #[test]
    fn require_chain_pulls_in_dependency() {
        let schema = schema();
        let active = BTreeSet::new();
        let candidate =
            resolve_candidate(&schema, &active, &Mutation::add(["B"])).unwrap();
        assert!(candidate.contains("A"));
        assert!(candidate.contains("B"));
    }

    #[test]
    fn remove_relation_evicts_conflicting_state() {
        let schema = schema();
        let active: BTreeSet<String> = ["D"].into_iter().map(String::from).collect();
        let candidate =
            resolve_candidate(&schema, &active, &Mutation::add(["C"])).unwrap();
        assert!(candidate.contains("C"));
        assert!(!candidate.contains("D"));
    }

    #[test]
    fn mutual_activation_and_removal_is_config_error() {
        let schema = schema();
        let active = BTreeSet::new();
        let err =
            resolve_candidate(&schema, &active, &Mutation::add(["C", "D"])).unwrap_err();
        assert_eq!(err, CancelReason::ConfigError { state: "D".to_string() });
    }

    #[test]
    fn auto_state_activates_once_its_requirement_is_met() {
        let schema = schema();
        let active = BTreeSet::new();
        let candidate =
            resolve_candidate(&schema, &active, &Mutation::add(["A"])).unwrap();
        assert!(candidate.contains("Auto1"));
    }

    #[test]
    fn mutually_removing_states_let_the_newcomer_evict_the_bystander() {
        let schema = Schema::build([
            ("X", State::new().remove(["Y"])),
            ("Y", State::new().remove(["X"])),
        ])
        .unwrap();
        let active: BTreeSet<String> = ["X"].into_iter().map(String::from).collect();
        let candidate =
            resolve_candidate(&schema, &active, &Mutation::add(["Y"])).unwrap();
        assert!(candidate.contains("Y"));
        assert!(!candidate.contains("X"));
    }
}
