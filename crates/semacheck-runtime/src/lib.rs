//! Primitive-operation contract for semaphore conformance checking.
//!
//! This crate provides:
//! - [`api`]: the [`ClRuntime`] and [`SemaphoreExt`] traits an execution
//!   engine implements
//! - [`types`]: ids, event status, semaphore properties and handle types
//! - [`error`]: the [`ClError`] taxonomy with OpenCL status codes
//! - [`handles`]: scoped-ownership wrappers releasing handles on drop

pub mod api;
pub mod error;
pub mod handles;
pub mod types;

pub use api::{ClRuntime, SemaphoreExt};
pub use error::{ClError, Result, codes};
pub use handles::{
    Buffer, CommandQueue, Context, Event, Semaphore, SharedRuntime, event_ids,
};
pub use types::{
    BufferId, CommandType, ContextId, DeviceId, DeviceInfo, EventId, EventProfile,
    ExecutionStatus, ExternalHandle, ExternalHandleType, QueueId, QueueProperties, RawHandle,
    SemaphoreId, SemaphoreInfo, SemaphoreProperties, SemaphoreProperty, SemaphoreType,
    UserEventStatus, property,
};
