//! Property tests for the §8 invariants that are checkable at the
//! `machina-core` level alone (tick parity). Cross-cutting invariants that
//! require a running scheduler (relational soundness, atomicity, FIFO,
//! history fidelity) live in `machina-scheduler`'s test suite instead.

use machina_core::Clock;
use proptest::prelude::*;

proptest! {
    #[test]
    fn tick_parity_holds_after_any_advance_sequence(advances in prop::collection::vec(0usize..4, 0..200)) {
        let names = ["A", "B", "C", "D"];
        let mut clock = Clock::new();
        for idx in advances {
            clock.advance(names[idx]);
        }
        for name in names {
            let tick = clock.tick(name);
            prop_assert_eq!(tick & 1 == 1, clock.is_active(name));
        }
    }

    #[test]
    fn snapshot_diff_is_symmetric_in_magnitude(advances in prop::collection::vec(0usize..3, 0..50)) {
        let names = ["A", "B", "C"];
        let mut clock = Clock::new();
        let before = clock.snapshot(None);
        for idx in &advances {
            clock.advance(names[*idx]);
        }
        let after = clock.snapshot(None);
        let diff = machina_core::Snapshot::diff(&after, &before);
        // Every name touched appears at most once in the diff.
        let mut seen = std::collections::HashSet::new();
        for (name, _, _) in &diff {
            prop_assert!(seen.insert(name.clone()));
        }
    }
}
