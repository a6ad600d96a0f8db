//! Scenario and poller errors.

use std::time::Duration;

use semacheck_runtime::{ClError, ExecutionStatus};
use thiserror::Error;

/// Why the pending-signal poller gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("status query failed: {0}")]
    Query(ClError),

    #[error("event terminated with status {status}")]
    Terminated { status: ExecutionStatus },

    #[error("no pending signal after {waited:?}, last status {last}")]
    Timeout { waited: Duration, last: ExecutionStatus },
}

impl PollError {
    /// The primitive error this failure is reported as.
    ///
    /// A terminated event is reported as [`ClError::InvalidEvent`].
    pub fn as_cl_error(&self) -> ClError {
        match self {
            Self::Query(err) => err.clone(),
            Self::Terminated { .. } => ClError::InvalidEvent,
            Self::Timeout { waited, last } => ClError::Timeout {
                what: format!("pending signal (last status {last})"),
                waited: *waited,
            },
        }
    }
}

/// Outcome of a scenario that did not pass.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A precondition is not met; not a failure.
    #[error("{0}")]
    Skipped(String),

    /// A primitive operation returned an error.
    #[error("{what} failed: {source}{}", code_suffix(.source))]
    Cl { what: String, source: ClError },

    /// Observed state contradicts the expected ordering.
    #[error("{0}")]
    Assertion(String),

    #[error("{what}: {source}")]
    Poll { what: String, source: PollError },
}

fn code_suffix(err: &ClError) -> String {
    err.code().map(|c| format!(" (status {c})")).unwrap_or_default()
}

impl ScenarioError {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Underlying primitive error, if any.
    pub fn cl_error(&self) -> Option<ClError> {
        match self {
            Self::Cl { source, .. } => Some(source.clone()),
            Self::Poll { source, .. } => Some(source.as_cl_error()),
            Self::Skipped(_) | Self::Assertion(_) => None,
        }
    }
}

pub type ScenarioResult<T = ()> = std::result::Result<T, ScenarioError>;

/// Attach the failed operation's description to a primitive error.
pub trait ClResultExt<T> {
    fn or_fail(self, what: &str) -> ScenarioResult<T>;

    fn or_fail_with(self, what: impl FnOnce() -> String) -> ScenarioResult<T>;
}

impl<T> ClResultExt<T> for Result<T, ClError> {
    fn or_fail(self, what: &str) -> ScenarioResult<T> {
        self.map_err(|source| ScenarioError::Cl { what: what.to_string(), source })
    }

    fn or_fail_with(self, what: impl FnOnce() -> String) -> ScenarioResult<T> {
        self.map_err(|source| ScenarioError::Cl { what: what(), source })
    }
}

impl<T> ClResultExt<T> for Result<T, PollError> {
    fn or_fail(self, what: &str) -> ScenarioResult<T> {
        self.map_err(|source| ScenarioError::Poll { what: what.to_string(), source })
    }

    fn or_fail_with(self, what: impl FnOnce() -> String) -> ScenarioResult<T> {
        self.map_err(|source| ScenarioError::Poll { what: what(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cl_failure_names_operation_and_code() {
        let err = Err::<(), _>(ClError::InvalidSemaphore).or_fail("signal semaphore").unwrap_err();
        assert_eq!(err.to_string(), "signal semaphore failed: invalid semaphore (status -1142)");
        assert_eq!(err.cl_error(), Some(ClError::InvalidSemaphore));
    }

    #[test]
    fn timeout_has_no_status_code() {
        let source = ClError::Timeout { what: "queue".into(), waited: Duration::from_millis(5) };
        let err = Err::<(), _>(source).or_fail("finish").unwrap_err();
        assert!(!err.to_string().contains("status"));
    }

    #[test]
    fn terminated_poll_reports_invalid_event() {
        let err = PollError::Terminated { status: ExecutionStatus::Terminated(-5) };
        assert_eq!(err.as_cl_error(), ClError::InvalidEvent);
        let wrapped = Err::<(), _>(err).or_fail("poll signal").unwrap_err();
        assert_eq!(wrapped.cl_error(), Some(ClError::InvalidEvent));
    }

    #[test]
    fn skip_is_not_a_failure_kind() {
        assert!(ScenarioError::skipped("no extension").is_skip());
        assert!(!ScenarioError::assertion("x").is_skip());
    }
}
