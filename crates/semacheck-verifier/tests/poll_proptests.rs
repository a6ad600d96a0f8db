//! Property-based tests for the pending-signal poller.
//!
//! Verified invariants:
//! - with no incomplete dependency the poller stops at the first status at
//!   or past `Submitted`; with one it stops at the first status at or past
//!   `Running`.
//! - a termination observed before the threshold is always reported, never
//!   skipped over.
//! - the poller never reads past the status it returns.

use std::cell::Cell;

use proptest::prelude::*;
use semacheck_runtime::{ClError, ExecutionStatus};
use semacheck_verifier::{PendingSignalPoller, PollError, StatusSource, select_threshold};

/// Replays `statuses` in order and then repeats the last one.
struct Replay {
    statuses: Vec<ExecutionStatus>,
    reads: Cell<usize>,
}

impl Replay {
    fn new(statuses: Vec<ExecutionStatus>) -> Self {
        Self { statuses, reads: Cell::new(0) }
    }
}

impl StatusSource for Replay {
    fn status(&self) -> Result<ExecutionStatus, ClError> {
        let i = self.reads.get();
        self.reads.set(i + 1);
        Ok(self.statuses[i.min(self.statuses.len() - 1)])
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn progress_status() -> impl Strategy<Value = ExecutionStatus> {
    prop_oneof![
        Just(ExecutionStatus::Queued),
        Just(ExecutionStatus::Submitted),
        Just(ExecutionStatus::Ready),
        Just(ExecutionStatus::Running),
        Just(ExecutionStatus::Complete),
    ]
}

/// A non-decreasing status trace that ends complete.
fn trace() -> impl Strategy<Value = Vec<ExecutionStatus>> {
    proptest::collection::vec(progress_status(), 1..16).prop_map(|mut v| {
        v.sort();
        v.push(ExecutionStatus::Complete);
        v
    })
}

fn dependency_status() -> impl Strategy<Value = ExecutionStatus> {
    prop_oneof![progress_status(), (-20..0_i32).prop_map(ExecutionStatus::Terminated)]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn stops_at_first_status_meeting_threshold(
        statuses in trace(),
        deps in proptest::collection::vec(dependency_status(), 0..4),
    ) {
        let pending = deps.iter().any(|d| !d.is_complete());
        let threshold = select_threshold(pending);
        let expected = statuses.iter().position(|s| s.has_reached(threshold)).unwrap();

        let dep_sources: Vec<Replay> = deps.iter().map(|d| Replay::new(vec![*d])).collect();
        let dep_refs: Vec<&dyn StatusSource> =
            dep_sources.iter().map(|p| p as &dyn StatusSource).collect();
        let target = Replay::new(statuses.clone());

        let got = PendingSignalPoller::unbounded().poll_source(&target, &dep_refs).unwrap();
        prop_assert_eq!(got, statuses[expected]);
        prop_assert_eq!(target.reads.get(), expected + 1);
    }

    #[test]
    fn termination_before_threshold_is_reported(
        prefix in proptest::collection::vec(Just(ExecutionStatus::Queued), 0..8),
        code in -100..0_i32,
        has_pending_dep in any::<bool>(),
    ) {
        let mut statuses = prefix;
        statuses.push(ExecutionStatus::Terminated(code));
        let target = Replay::new(statuses);
        let dep = Replay::new(vec![if has_pending_dep {
            ExecutionStatus::Submitted
        } else {
            ExecutionStatus::Complete
        }]);

        let err = PendingSignalPoller::unbounded().poll_source(&target, &[&dep]).unwrap_err();
        let terminated = ExecutionStatus::Terminated(code);
        prop_assert_eq!(err.clone(), PollError::Terminated { status: terminated });
        prop_assert_eq!(err.as_cl_error(), ClError::InvalidEvent);
    }
}
