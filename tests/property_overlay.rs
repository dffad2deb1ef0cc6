//! Property-based tests for the mutation overlay.
//!
//! # Determinism
//! - The merged view is the proposal-order fold of the pending queue
//!
//! # Reconciliation completeness
//! - Confirming every mutation, in any order, empties the queue
//! - The view afterwards is the last authoritative base
//!
//! # Reversion
//! - Reverting every mutation restores the base
//! - Resolving a handle twice is a no-op

mod common;

use common::*;
use proptest::prelude::*;
use speculative_view::overlay::{MutationHandle, MutationOverlay, Resolution};

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// A non-commutative edit so that ordering mistakes are visible.
#[derive(Debug, Clone, Copy)]
enum Edit {
    Add(i64),
    Mul(i64),
}

impl Edit {
    fn apply(self, base: i64) -> i64 {
        match self {
            Edit::Add(n) => base.wrapping_add(n),
            Edit::Mul(n) => base.wrapping_mul(n),
        }
    }
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![(-50i64..50).prop_map(Edit::Add), (-3i64..4).prop_map(Edit::Mul)]
}

/// Edits plus a permutation of their indices.
fn arb_edits_with_order() -> impl Strategy<Value = (Vec<Edit>, Vec<usize>)> {
    prop::collection::vec(arb_edit(), 1..12).prop_flat_map(|edits| {
        let order = Just((0..edits.len()).collect::<Vec<_>>()).prop_shuffle();
        (Just(edits), order)
    })
}

fn propose_all(
    overlay: &mut MutationOverlay<u8, i64>,
    edits: &[Edit],
) -> Vec<MutationHandle<u8>> {
    edits
        .iter()
        .map(|&edit| overlay.propose(0, move |base| edit.apply(base)))
        .collect()
}

fn fold(base: i64, edits: impl IntoIterator<Item = Edit>) -> i64 {
    edits.into_iter().fold(base, |acc, edit| edit.apply(acc))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(test_proptest_config())]

    #[test]
    fn view_is_proposal_order_fold(base in -1000i64..1000, edits in prop::collection::vec(arb_edit(), 0..16)) {
        init_test_logging();
        let mut overlay = MutationOverlay::new();
        propose_all(&mut overlay, &edits);

        prop_assert_eq!(overlay.view(&0, base), fold(base, edits.iter().copied()));
        // Pure: asking twice gives the same answer.
        prop_assert_eq!(overlay.view(&0, base), overlay.view(&0, base));
    }

    #[test]
    fn reconciling_everything_empties_queue(
        (edits, order) in arb_edits_with_order(),
        bases in prop::collection::vec(-1000i64..1000, 12),
    ) {
        init_test_logging();
        let mut overlay = MutationOverlay::new();
        overlay.set_base(0, 0);
        let handles = propose_all(&mut overlay, &edits);

        let mut remaining: Vec<usize> = (0..edits.len()).collect();
        let mut last_base = 0;
        for (step, &index) in order.iter().enumerate() {
            last_base = bases[step];
            prop_assert_eq!(overlay.reconcile(&handles[index], last_base), Resolution::Resolved);
            remaining.retain(|&i| i != index);

            // Unconfirmed edits are replayed over the newest base, in proposal order.
            let expected = fold(last_base, remaining.iter().map(|&i| edits[i]));
            prop_assert_eq!(overlay.merged(&0), Some(expected));
        }

        prop_assert!(!overlay.is_pending(&0));
        prop_assert_eq!(overlay.merged(&0), Some(last_base));
    }

    #[test]
    fn reverting_everything_restores_base(base in -1000i64..1000, (edits, order) in arb_edits_with_order()) {
        init_test_logging();
        let mut overlay = MutationOverlay::new();
        overlay.set_base(0, base);
        let handles = propose_all(&mut overlay, &edits);

        for &index in &order {
            prop_assert_eq!(overlay.revert(&handles[index]), Resolution::Resolved);
        }
        prop_assert_eq!(overlay.merged(&0), Some(base));

        for handle in &handles {
            prop_assert_eq!(overlay.revert(handle), Resolution::AlreadyResolved);
            prop_assert_eq!(overlay.reconcile(handle, base + 1), Resolution::AlreadyResolved);
        }
        prop_assert_eq!(overlay.merged(&0), Some(base));
        prop_assert_eq!(overlay.stats().duplicate_resolutions, 2 * handles.len() as u64);
    }

    #[test]
    fn partial_revert_keeps_survivors_in_order(
        base in -1000i64..1000,
        edits in prop::collection::vec(arb_edit(), 1..12),
        mask in prop::collection::vec(any::<bool>(), 12),
    ) {
        init_test_logging();
        let mut overlay = MutationOverlay::new();
        overlay.set_base(0, base);
        let handles = propose_all(&mut overlay, &edits);

        for (index, handle) in handles.iter().enumerate() {
            if mask[index] {
                overlay.revert(handle);
            }
        }

        let survivors = edits
            .iter()
            .enumerate()
            .filter(|(index, _)| !mask[*index])
            .map(|(_, &edit)| edit);
        prop_assert_eq!(overlay.merged(&0), Some(fold(base, survivors)));
    }
}
