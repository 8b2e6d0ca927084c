//! Property tests for the §8 invariants that need a real schema and a
//! fixed-point resolution (relational soundness, the `Set` law). Clock-only
//! invariants (tick parity) live in `machina-core`'s test suite instead.

use machina_core::{Mutation, Schema, State};
use machina_scheduler::resolve_candidate;
use proptest::prelude::*;
use std::collections::BTreeSet;

const NAMES: [&str; 5] = ["A", "B", "C", "D", "E"];

fn build_schema(requires: &[Vec<usize>], autos: &[bool]) -> Schema {
    let states = NAMES.iter().enumerate().map(|(i, name)| {
        let require: Vec<&str> = requires[i]
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| NAMES[j])
            .collect();
        let mut state = State::new().require(require);
        if autos[i] {
            state = state.auto();
        }
        (*name, state)
    });
    Schema::build(states).unwrap()
}

fn name_subset() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::vec(any::<bool>(), NAMES.len()).prop_map(|flags| {
        flags
            .iter()
            .enumerate()
            .filter(|(_, flag)| **flag)
            .map(|(i, _)| NAMES[i].to_string())
            .collect()
    })
}

fn require_lists() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0usize..NAMES.len(), 0..3), NAMES.len())
}

proptest! {
    // A require-only schema (no `remove` edges to complicate the fixed
    // point) never settles on a candidate set missing a required state —
    // the require-pass re-scans the whole candidate every iteration, not
    // just what this mutation newly added, so it has no "bystander" carve
    // out the way the remove-pass does.
    #[test]
    fn require_soundness_holds_at_every_fixed_point(
        requires in require_lists(),
        autos in prop::collection::vec(any::<bool>(), NAMES.len()),
        active in name_subset(),
        targets in name_subset(),
    ) {
        let schema = build_schema(&requires, &autos);
        if let Ok(candidate) = resolve_candidate(&schema, &active, &Mutation::add(targets)) {
            for name in &candidate {
                let state = schema.get(name).unwrap();
                for req in &state.require {
                    prop_assert!(candidate.contains(req));
                }
            }
        }
    }

    // An `auto` state left out of the candidate set must have at least one
    // unmet requirement — otherwise the auto-pass would have pulled it in
    // before the fixed point was declared reached.
    #[test]
    fn auto_states_are_never_left_addable_at_a_fixed_point(
        requires in require_lists(),
        autos in prop::collection::vec(any::<bool>(), NAMES.len()),
        active in name_subset(),
        targets in name_subset(),
    ) {
        let schema = build_schema(&requires, &autos);
        if let Ok(candidate) = resolve_candidate(&schema, &active, &Mutation::add(targets)) {
            for name in schema.names() {
                if candidate.contains(name) {
                    continue;
                }
                let state = schema.get(name).unwrap();
                if !state.auto {
                    continue;
                }
                prop_assert!(!state.require.iter().all(|r| candidate.contains(r)));
            }
        }
    }

    // `Set(S)` collapses to seeding the fixed point with `S` directly
    // (see `resolve_candidate`'s doc comment). On a schema with no
    // `remove` edges, starting from an empty active set, that must agree
    // with `Add(S)` exactly — there is nothing for a `remove`-pass
    // bystander carve-out to diverge over.
    #[test]
    fn set_from_empty_matches_add_on_a_require_only_schema(
        requires in require_lists(),
        targets in name_subset(),
    ) {
        let schema = build_schema(&requires, &[false; 5]);
        let active = BTreeSet::new();
        let via_set = resolve_candidate(&schema, &active, &Mutation::set(targets.clone()));
        let via_add = resolve_candidate(&schema, &active, &Mutation::add(targets));
        prop_assert_eq!(via_set, via_add);
    }
}
