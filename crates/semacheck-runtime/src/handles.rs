//! Scoped-ownership wrappers around runtime handles.
//!
//! Each wrapper owns exactly one reference to the underlying object and
//! releases it when dropped, on every exit path of a scenario. A failed
//! release is logged and otherwise ignored.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::api::{ClRuntime, SemaphoreExt};
use crate::error::Result;
use crate::types::{
    BufferId, ContextId, DeviceId, EventId, EventProfile, ExecutionStatus, ExternalHandle,
    ExternalHandleType, QueueId, QueueProperties, SemaphoreId, SemaphoreInfo,
    SemaphoreProperties, UserEventStatus,
};

/// Shared, dynamically dispatched runtime.
pub type SharedRuntime = Arc<dyn ClRuntime>;

fn release_or_warn(kind: &str, id: impl fmt::Display, result: Result<()>) {
    if let Err(err) = result {
        warn!(%id, %err, "failed to release {kind}");
    }
}

/// Event ids of a dependency list.
pub fn event_ids(events: &[&Event]) -> Vec<EventId> {
    events.iter().map(|e| e.id()).collect()
}

// ── Context ──────────────────────────────────────────────────────────────────

pub struct Context {
    runtime: SharedRuntime,
    id: ContextId,
    devices: Vec<DeviceId>,
}

impl Context {
    pub fn create(runtime: &SharedRuntime, devices: &[DeviceId]) -> Result<Self> {
        let id = runtime.create_context(devices)?;
        Ok(Self { runtime: Arc::clone(runtime), id, devices: devices.to_vec() })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn runtime(&self) -> &SharedRuntime {
        &self.runtime
    }

    pub fn create_queue(
        &self,
        device: DeviceId,
        properties: QueueProperties,
    ) -> Result<CommandQueue> {
        let id = self.runtime.create_queue(self.id, device, properties)?;
        Ok(CommandQueue {
            runtime: Arc::clone(&self.runtime),
            id,
            context: self.id,
            device,
            properties,
        })
    }

    pub fn create_user_event(&self) -> Result<Event> {
        let id = self.runtime.create_user_event(self.id)?;
        Ok(Event::from_raw(&self.runtime, id))
    }

    pub fn create_buffer(&self, elements: usize) -> Result<Buffer> {
        let id = self.runtime.create_buffer(self.id, elements)?;
        Ok(Buffer { runtime: Arc::clone(&self.runtime), id, elements })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id).field("devices", &self.devices).finish()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        release_or_warn("context", self.id, self.runtime.release_context(self.id));
    }
}

// ── CommandQueue ─────────────────────────────────────────────────────────────

pub struct CommandQueue {
    runtime: SharedRuntime,
    id: QueueId,
    context: ContextId,
    device: DeviceId,
    properties: QueueProperties,
}

impl CommandQueue {
    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn is_out_of_order(&self) -> bool {
        self.properties.out_of_order
    }

    pub fn runtime(&self) -> &SharedRuntime {
        &self.runtime
    }

    pub fn flush(&self) -> Result<()> {
        self.runtime.flush(self.id)
    }

    pub fn finish(&self, timeout: Option<Duration>) -> Result<()> {
        self.runtime.finish(self.id, timeout)
    }

    pub fn enqueue_task(&self, deps: &[&Event]) -> Result<Event> {
        let id = self.runtime.enqueue_task(self.id, &event_ids(deps))?;
        Ok(Event::from_raw(&self.runtime, id))
    }

    pub fn enqueue_marker(&self, deps: &[&Event]) -> Result<Event> {
        let id = self.runtime.enqueue_marker(self.id, &event_ids(deps))?;
        Ok(Event::from_raw(&self.runtime, id))
    }

    pub fn enqueue_barrier(&self, deps: &[&Event]) -> Result<Event> {
        let id = self.runtime.enqueue_barrier(self.id, &event_ids(deps))?;
        Ok(Event::from_raw(&self.runtime, id))
    }

    pub fn fill_buffer(&self, buffer: &Buffer, pattern: i32, deps: &[&Event]) -> Result<Event> {
        let id = self.runtime.enqueue_fill_buffer(self.id, buffer.id, pattern, &event_ids(deps))?;
        Ok(Event::from_raw(&self.runtime, id))
    }

    pub fn copy_buffer(&self, src: &Buffer, dst: &Buffer, deps: &[&Event]) -> Result<Event> {
        let id = self.runtime.enqueue_copy_buffer(self.id, src.id, dst.id, &event_ids(deps))?;
        Ok(Event::from_raw(&self.runtime, id))
    }

    /// Blocking read of `buffer`.
    pub fn read_buffer(
        &self,
        buffer: &Buffer,
        deps: &[&Event],
        timeout: Option<Duration>,
    ) -> Result<Vec<i32>> {
        self.runtime.read_buffer(self.id, buffer.id, &event_ids(deps), timeout)
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("out_of_order", &self.properties.out_of_order)
            .finish()
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        release_or_warn("command queue", self.id, self.runtime.release_queue(self.id));
    }
}

// ── Event ────────────────────────────────────────────────────────────────────

/// One reference to an event.
///
/// Not `Clone`: a second reference is taken with [`Event::try_clone`], since
/// retaining can fail.
pub struct Event {
    runtime: SharedRuntime,
    id: EventId,
}

impl Event {
    /// Adopt a reference the caller already owns.
    pub fn from_raw(runtime: &SharedRuntime, id: EventId) -> Self {
        Self { runtime: Arc::clone(runtime), id }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn status(&self) -> Result<ExecutionStatus> {
        self.runtime.event_status(self.id)
    }

    pub fn profile(&self) -> Result<EventProfile> {
        self.runtime.event_profile(self.id)
    }

    /// Resolve a user event.
    pub fn set_user_status(&self, status: UserEventStatus) -> Result<()> {
        self.runtime.set_user_event_status(self.id, status)
    }

    pub fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        self.runtime.wait_for_events(&[self.id], timeout)
    }

    pub fn try_clone(&self) -> Result<Self> {
        self.runtime.retain_event(self.id)?;
        Ok(Self { runtime: Arc::clone(&self.runtime), id: self.id })
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Event").field(&self.id).finish()
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        release_or_warn("event", self.id, self.runtime.release_event(self.id));
    }
}

// ── Semaphore ────────────────────────────────────────────────────────────────

pub struct Semaphore {
    ext: Arc<dyn SemaphoreExt>,
    id: SemaphoreId,
}

impl Semaphore {
    pub fn create(
        ext: &Arc<dyn SemaphoreExt>,
        context: &Context,
        properties: &SemaphoreProperties,
    ) -> Result<Self> {
        let id = ext.create_semaphore(context.id(), properties)?;
        Ok(Self::from_raw(ext, id))
    }

    /// Import an exported handle into `context`.
    pub fn import(
        ext: &Arc<dyn SemaphoreExt>,
        context: &Context,
        handle: ExternalHandle,
    ) -> Result<Self> {
        let id = ext.import_semaphore(context.id(), handle)?;
        Ok(Self::from_raw(ext, id))
    }

    /// Adopt a reference the caller already owns.
    pub fn from_raw(ext: &Arc<dyn SemaphoreExt>, id: SemaphoreId) -> Self {
        Self { ext: Arc::clone(ext), id }
    }

    pub fn id(&self) -> SemaphoreId {
        self.id
    }

    pub fn info(&self) -> Result<SemaphoreInfo> {
        self.ext.semaphore_info(self.id)
    }

    pub fn payload(&self) -> Result<u64> {
        Ok(self.info()?.payload)
    }

    pub fn reference_count(&self) -> Result<u32> {
        Ok(self.info()?.reference_count)
    }

    pub fn export_handle(
        &self,
        device: Option<DeviceId>,
        handle_type: ExternalHandleType,
    ) -> Result<ExternalHandle> {
        self.ext.semaphore_handle_for_type(self.id, device, handle_type)
    }

    pub fn try_clone(&self) -> Result<Self> {
        self.ext.retain_semaphore(self.id)?;
        Ok(Self { ext: Arc::clone(&self.ext), id: self.id })
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Semaphore").field(&self.id).finish()
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        release_or_warn("semaphore", self.id, self.ext.release_semaphore(self.id));
    }
}

// ── Buffer ───────────────────────────────────────────────────────────────────

pub struct Buffer {
    runtime: SharedRuntime,
    id: BufferId,
    elements: usize,
}

impl Buffer {
    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements == 0
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer").field("id", &self.id).field("elements", &self.elements).finish()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        release_or_warn("buffer", self.id, self.runtime.release_buffer(self.id));
    }
}
