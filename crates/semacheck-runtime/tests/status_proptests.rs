//! Property-based tests for execution status ordering.
//!
//! Verified invariants:
//! - the status order is total and consistent with equality.
//! - `has_reached` agrees with the order on the success path.
//! - a terminated status never reaches any threshold.

use proptest::prelude::*;
use semacheck_runtime::ExecutionStatus;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn success_status() -> impl Strategy<Value = ExecutionStatus> {
    prop_oneof![
        Just(ExecutionStatus::Queued),
        Just(ExecutionStatus::Submitted),
        Just(ExecutionStatus::Ready),
        Just(ExecutionStatus::Running),
        Just(ExecutionStatus::Complete),
    ]
}

fn any_status() -> impl Strategy<Value = ExecutionStatus> {
    prop_oneof![4 => success_status(), 1 => (-100..0_i32).prop_map(ExecutionStatus::Terminated)]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn order_is_consistent_with_eq(a in any_status(), b in any_status()) {
        prop_assert_eq!(a.cmp(&b) == std::cmp::Ordering::Equal, a == b);
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    #[test]
    fn has_reached_matches_order(a in success_status(), b in success_status()) {
        prop_assert_eq!(a.has_reached(b), a >= b);
    }

    #[test]
    fn terminated_reaches_nothing(code in -100..0_i32, threshold in any_status()) {
        prop_assert!(!ExecutionStatus::Terminated(code).has_reached(threshold));
    }

    #[test]
    fn terminal_means_complete_or_terminated(s in any_status()) {
        prop_assert_eq!(s.is_terminal(), s.is_complete() || s.is_terminated());
        prop_assert_eq!(s.is_in_progress(), !s.is_terminal());
    }
}
