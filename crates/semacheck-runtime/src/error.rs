//! Error taxonomy for primitive runtime operations.

use std::time::Duration;

use thiserror::Error;

/// Result alias used by every primitive operation.
pub type Result<T> = std::result::Result<T, ClError>;

/// OpenCL status codes (subset) returned by the primitive operations.
pub mod codes {
    pub const CL_SUCCESS: i32 = 0;
    pub const CL_OUT_OF_RESOURCES: i32 = -5;
    pub const CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST: i32 = -14;
    pub const CL_INVALID_VALUE: i32 = -30;
    pub const CL_INVALID_DEVICE: i32 = -33;
    pub const CL_INVALID_CONTEXT: i32 = -34;
    pub const CL_INVALID_COMMAND_QUEUE: i32 = -36;
    pub const CL_INVALID_MEM_OBJECT: i32 = -38;
    pub const CL_INVALID_EVENT_WAIT_LIST: i32 = -57;
    pub const CL_INVALID_EVENT: i32 = -58;
    pub const CL_INVALID_OPERATION: i32 = -59;
    pub const CL_INVALID_PROPERTY: i32 = -64;
    pub const CL_INVALID_SEMAPHORE_KHR: i32 = -1142;
}

/// Failure of a primitive operation.
///
/// Every variant except [`ClError::Timeout`] corresponds to an OpenCL status
/// code, available through [`ClError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClError {
    #[error("invalid value")]
    InvalidValue,

    /// An enqueue call was given an empty semaphore list.
    #[error("invalid operands: semaphore list is empty")]
    InvalidOperands,

    #[error("invalid property")]
    InvalidProperty,

    #[error("invalid context")]
    InvalidContext,

    #[error("invalid device")]
    InvalidDevice,

    #[error("invalid command queue")]
    InvalidCommandQueue,

    #[error("invalid memory object")]
    InvalidMemObject,

    #[error("invalid event")]
    InvalidEvent,

    #[error("invalid event wait list")]
    InvalidEventWaitList,

    #[error("invalid operation")]
    InvalidOperation,

    #[error("invalid semaphore")]
    InvalidSemaphore,

    #[error("execution status error for events in wait list")]
    ExecStatusErrorForEventsInWaitList,

    #[error("out of resources")]
    OutOfResources,

    /// A blocking call did not observe the expected progress in time.
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    /// Vendor specific or otherwise unmapped status code.
    #[error("runtime error code {0}")]
    Other(i32),
}

impl ClError {
    /// OpenCL status code of this error, `None` for [`ClError::Timeout`].
    pub fn code(&self) -> Option<i32> {
        use codes::*;
        let code = match self {
            Self::InvalidValue | Self::InvalidOperands => CL_INVALID_VALUE,
            Self::InvalidProperty => CL_INVALID_PROPERTY,
            Self::InvalidContext => CL_INVALID_CONTEXT,
            Self::InvalidDevice => CL_INVALID_DEVICE,
            Self::InvalidCommandQueue => CL_INVALID_COMMAND_QUEUE,
            Self::InvalidMemObject => CL_INVALID_MEM_OBJECT,
            Self::InvalidEvent => CL_INVALID_EVENT,
            Self::InvalidEventWaitList => CL_INVALID_EVENT_WAIT_LIST,
            Self::InvalidOperation => CL_INVALID_OPERATION,
            Self::InvalidSemaphore => CL_INVALID_SEMAPHORE_KHR,
            Self::ExecStatusErrorForEventsInWaitList => {
                CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST
            }
            Self::OutOfResources => CL_OUT_OF_RESOURCES,
            Self::Timeout { .. } => return None,
            Self::Other(code) => *code,
        };
        Some(code)
    }

    /// Map an OpenCL status code back to an error. `CL_SUCCESS` maps to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        use codes::*;
        let err = match code {
            CL_SUCCESS => return None,
            CL_INVALID_VALUE => Self::InvalidValue,
            CL_INVALID_PROPERTY => Self::InvalidProperty,
            CL_INVALID_CONTEXT => Self::InvalidContext,
            CL_INVALID_DEVICE => Self::InvalidDevice,
            CL_INVALID_COMMAND_QUEUE => Self::InvalidCommandQueue,
            CL_INVALID_MEM_OBJECT => Self::InvalidMemObject,
            CL_INVALID_EVENT => Self::InvalidEvent,
            CL_INVALID_EVENT_WAIT_LIST => Self::InvalidEventWaitList,
            CL_INVALID_OPERATION => Self::InvalidOperation,
            CL_INVALID_SEMAPHORE_KHR => Self::InvalidSemaphore,
            CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST => {
                Self::ExecStatusErrorForEventsInWaitList
            }
            CL_OUT_OF_RESOURCES => Self::OutOfResources,
            other => Self::Other(other),
        };
        Some(err)
    }

    /// Whether two errors are the same kind, ignoring timeout details.
    pub fn same_kind(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Timeout { .. }, Self::Timeout { .. }) => true,
            _ => self == other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_through_from_code() {
        for err in [
            ClError::InvalidValue,
            ClError::InvalidProperty,
            ClError::InvalidContext,
            ClError::InvalidDevice,
            ClError::InvalidCommandQueue,
            ClError::InvalidEvent,
            ClError::InvalidEventWaitList,
            ClError::InvalidOperation,
            ClError::InvalidSemaphore,
            ClError::ExecStatusErrorForEventsInWaitList,
            ClError::Other(-9001),
        ] {
            let code = err.code().unwrap();
            assert_eq!(ClError::from_code(code), Some(err));
        }
    }

    #[test]
    fn empty_operand_list_reports_invalid_value_code() {
        assert_eq!(ClError::InvalidOperands.code(), Some(codes::CL_INVALID_VALUE));
    }

    #[test]
    fn timeout_has_no_code() {
        let err = ClError::Timeout { what: "finish".into(), waited: Duration::from_millis(5) };
        assert_eq!(err.code(), None);
        assert!(err.is_timeout());
        assert!(err.to_string().contains("finish"));
    }

    #[test]
    fn success_is_not_an_error() {
        assert_eq!(ClError::from_code(codes::CL_SUCCESS), None);
    }

    #[test]
    fn same_kind_ignores_timeout_payload() {
        let a = ClError::Timeout { what: "a".into(), waited: Duration::from_millis(1) };
        let b = ClError::Timeout { what: "b".into(), waited: Duration::from_secs(1) };
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&ClError::InvalidValue));
    }
}
