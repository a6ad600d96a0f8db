//! The primitive-operation contract an execution engine exposes.
//!
//! [`ClRuntime`] is the core surface every engine provides. Semaphore entry
//! points live behind [`SemaphoreExt`], which an engine hands out only when it
//! implements the semaphore extension; callers treat its absence as an
//! unsupported feature rather than an error.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::types::{
    BufferId, ContextId, DeviceId, DeviceInfo, EventId, EventProfile, ExecutionStatus,
    ExternalHandle, ExternalHandleType, QueueId, QueueProperties, SemaphoreId, SemaphoreInfo,
    SemaphoreProperties, UserEventStatus,
};

/// Core runtime operations: devices, contexts, queues, commands and events.
///
/// All enqueue calls are asynchronous and return the event of the new
/// command. `deps` is the explicit wait list of that command.
pub trait ClRuntime: Send + Sync {
    // ── Platform ─────────────────────────────────────────────────────────

    fn devices(&self) -> Result<Vec<DeviceId>>;

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo>;

    /// Whether `device` advertises the extension string `name`.
    fn extension_supported(&self, device: DeviceId, name: &str) -> Result<bool> {
        Ok(self.device_info(device)?.extensions.iter().any(|e| e == name))
    }

    // ── Contexts and queues ──────────────────────────────────────────────

    fn create_context(&self, devices: &[DeviceId]) -> Result<ContextId>;

    fn context_devices(&self, context: ContextId) -> Result<Vec<DeviceId>>;

    fn retain_context(&self, context: ContextId) -> Result<()>;

    fn release_context(&self, context: ContextId) -> Result<()>;

    fn create_queue(
        &self,
        context: ContextId,
        device: DeviceId,
        properties: QueueProperties,
    ) -> Result<QueueId>;

    fn release_queue(&self, queue: QueueId) -> Result<()>;

    /// Start progressing every queued command without blocking.
    fn flush(&self, queue: QueueId) -> Result<()>;

    /// Block until every command on `queue` is complete.
    ///
    /// `None` waits without a deadline.
    fn finish(&self, queue: QueueId, timeout: Option<Duration>) -> Result<()>;

    // ── Commands ─────────────────────────────────────────────────────────

    fn enqueue_task(&self, queue: QueueId, deps: &[EventId]) -> Result<EventId>;

    fn enqueue_marker(&self, queue: QueueId, deps: &[EventId]) -> Result<EventId>;

    fn enqueue_barrier(&self, queue: QueueId, deps: &[EventId]) -> Result<EventId>;

    fn create_buffer(&self, context: ContextId, elements: usize) -> Result<BufferId>;

    fn release_buffer(&self, buffer: BufferId) -> Result<()>;

    fn enqueue_fill_buffer(
        &self,
        queue: QueueId,
        buffer: BufferId,
        pattern: i32,
        deps: &[EventId],
    ) -> Result<EventId>;

    fn enqueue_copy_buffer(
        &self,
        queue: QueueId,
        src: BufferId,
        dst: BufferId,
        deps: &[EventId],
    ) -> Result<EventId>;

    /// Blocking read of the whole buffer once `deps` (and, on in-order
    /// queues, every earlier command) completed.
    fn read_buffer(
        &self,
        queue: QueueId,
        buffer: BufferId,
        deps: &[EventId],
        timeout: Option<Duration>,
    ) -> Result<Vec<i32>>;

    // ── Events ───────────────────────────────────────────────────────────

    /// A user-controlled event, initially pending.
    fn create_user_event(&self, context: ContextId) -> Result<EventId>;

    fn set_user_event_status(&self, event: EventId, status: UserEventStatus) -> Result<()>;

    fn event_status(&self, event: EventId) -> Result<ExecutionStatus>;

    fn event_profile(&self, event: EventId) -> Result<EventProfile>;

    /// Block until every event in `events` is complete.
    fn wait_for_events(&self, events: &[EventId], timeout: Option<Duration>) -> Result<()>;

    fn retain_event(&self, event: EventId) -> Result<()>;

    fn release_event(&self, event: EventId) -> Result<()>;

    // ── Extensions ───────────────────────────────────────────────────────

    /// Semaphore entry points, `None` when the engine does not provide them.
    fn semaphore_ext(&self) -> Option<Arc<dyn SemaphoreExt>>;
}

/// Semaphore extension entry points.
pub trait SemaphoreExt: Send + Sync {
    fn create_semaphore(
        &self,
        context: ContextId,
        properties: &SemaphoreProperties,
    ) -> Result<SemaphoreId>;

    fn retain_semaphore(&self, semaphore: SemaphoreId) -> Result<()>;

    fn release_semaphore(&self, semaphore: SemaphoreId) -> Result<()>;

    fn semaphore_info(&self, semaphore: SemaphoreId) -> Result<SemaphoreInfo>;

    fn enqueue_signal_semaphores(
        &self,
        queue: QueueId,
        semaphores: &[SemaphoreId],
        deps: &[EventId],
    ) -> Result<EventId>;

    fn enqueue_wait_semaphores(
        &self,
        queue: QueueId,
        semaphores: &[SemaphoreId],
        deps: &[EventId],
    ) -> Result<EventId>;

    /// Export `semaphore` as an OS handle of type `handle_type`.
    fn semaphore_handle_for_type(
        &self,
        semaphore: SemaphoreId,
        device: Option<DeviceId>,
        handle_type: ExternalHandleType,
    ) -> Result<ExternalHandle>;

    /// Create a binary semaphore in `context` sharing the payload behind
    /// `handle`.
    fn import_semaphore(&self, context: ContextId, handle: ExternalHandle) -> Result<SemaphoreId> {
        self.create_semaphore(context, &SemaphoreProperties::binary().import(handle))
    }
}
