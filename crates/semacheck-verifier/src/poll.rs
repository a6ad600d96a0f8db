//! Deferred dependency poller.
//!
//! Before a scenario asserts that an operation is pending on a semaphore it
//! must know the operation got past its own wait list. An operation whose
//! dependencies were all complete when polling started makes progress as
//! soon as the queue accepts it, so `Submitted` is enough. An operation with
//! an incomplete dependency still sits at `Submitted` while blocked, so the
//! poller waits for `Running` instead.

use std::thread;
use std::time::{Duration, Instant};

use semacheck_runtime::{ClError, CommandQueue, Event, ExecutionStatus};
use tracing::debug;

use crate::error::PollError;

/// Anything whose execution status can be queried.
pub trait StatusSource {
    fn status(&self) -> Result<ExecutionStatus, ClError>;
}

impl StatusSource for Event {
    fn status(&self) -> Result<ExecutionStatus, ClError> {
        Event::status(self)
    }
}

/// Status the target must reach before it counts as a pending signal.
pub const fn select_threshold(has_pending_dependencies: bool) -> ExecutionStatus {
    if has_pending_dependencies { ExecutionStatus::Running } else { ExecutionStatus::Submitted }
}

/// Whether any dependency is not yet complete. Stops at the first one.
pub fn has_pending_dependencies(deps: &[&dyn StatusSource]) -> Result<bool, PollError> {
    for dep in deps {
        if !dep.status().map_err(PollError::Query)?.is_complete() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Spin-polls an event until it reaches its pending-signal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSignalPoller {
    timeout: Option<Duration>,
}

impl PendingSignalPoller {
    /// `None` polls until the threshold or a terminal failure is observed.
    pub const fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub const fn unbounded() -> Self {
        Self { timeout: None }
    }

    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Wait until `target`, enqueued on `queue` with wait list `deps`, is
    /// pending on its semaphores. Returns the status that met the threshold.
    pub fn poll(
        &self,
        queue: &CommandQueue,
        target: &Event,
        deps: &[&dyn StatusSource],
    ) -> Result<ExecutionStatus, PollError> {
        let result = self.poll_source(target, deps);
        debug!(queue = %queue.id(), event = %target.id(), ?result, "pending signal poll");
        result
    }

    /// [`Self::poll`] against arbitrary status sources.
    pub fn poll_source(
        &self,
        target: &dyn StatusSource,
        deps: &[&dyn StatusSource],
    ) -> Result<ExecutionStatus, PollError> {
        let threshold = select_threshold(has_pending_dependencies(deps)?);
        let started = Instant::now();
        loop {
            let status = target.status().map_err(PollError::Query)?;
            if status.is_terminated() {
                return Err(PollError::Terminated { status });
            }
            if status.has_reached(threshold) {
                return Ok(status);
            }
            if let Some(timeout) = self.timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(PollError::Timeout { waited, last: status });
                }
            }
            thread::yield_now();
        }
    }
}
