//! Threaded engine: [`DeviceState`] behind a mutex, advanced by a device
//! worker thread, exposed through the runtime traits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use semacheck_runtime::{
    BufferId, ClError, ClRuntime, ContextId, DeviceId, DeviceInfo, EventId, EventProfile,
    ExecutionStatus, ExternalHandle, ExternalHandleType, QueueId, QueueProperties, Result,
    SemaphoreExt, SemaphoreId, SemaphoreInfo, SemaphoreProperties, UserEventStatus,
};
use tracing::{debug, info, trace};

use crate::config::{SimConfigError, SimDeviceConfig};
use crate::state::{DeviceState, SemaphoreOp};

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] SimConfigError),

    #[error("failed to spawn device worker: {0}")]
    Spawn(#[from] std::io::Error),
}

// ── Shared state ────────────────────────────────────────────────────

struct Shared {
    state: Mutex<DeviceState>,
    /// Signalled by the worker after every pass that changed something.
    progress: Condvar,
    /// Signalled by API calls that may unblock the worker.
    work: Condvar,
    shutdown: AtomicBool,
    idle_tick: Duration,
    step_delay: Duration,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, DeviceState>> {
        self.state.lock().map_err(|_| ClError::OutOfResources)
    }

    /// Run a state mutation and wake the worker.
    fn mutate<T>(&self, f: impl FnOnce(&mut DeviceState) -> Result<T>) -> Result<T> {
        let out = f(&mut *self.lock()?);
        self.work.notify_all();
        out
    }

    /// Block until `done` reports completion or the deadline passes.
    fn wait_until(
        &self,
        what: &str,
        timeout: Option<Duration>,
        mut done: impl FnMut(&mut DeviceState) -> Result<bool>,
    ) -> Result<()> {
        let start = Instant::now();
        let mut state = self.lock()?;
        self.work.notify_all();
        loop {
            if done(&mut *state)? {
                return Ok(());
            }
            let slice = match timeout {
                Some(limit) => {
                    let waited = start.elapsed();
                    if waited >= limit {
                        return Err(ClError::Timeout { what: what.to_string(), waited });
                    }
                    (limit - waited).min(self.idle_tick)
                }
                None => self.idle_tick,
            };
            let (guard, _) =
                self.progress.wait_timeout(state, slice).map_err(|_| ClError::OutOfResources)?;
            state = guard;
        }
    }
}

// ── Worker ──────────────────────────────────────────────────────────

fn worker_loop(shared: &Shared) {
    while !shared.shutdown.load(Ordering::Acquire) {
        let Ok(mut state) = shared.state.lock() else {
            break;
        };
        if state.advance() {
            drop(state);
            shared.progress.notify_all();
            if !shared.step_delay.is_zero() {
                thread::sleep(shared.step_delay);
            }
        } else if shared.work.wait_timeout(state, shared.idle_tick).is_err() {
            break;
        }
    }
}

struct Inner {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.work.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!("simulated device stopped");
    }
}

// ── SimRuntime ──────────────────────────────────────────────────────

/// In-process reference engine.
///
/// Cheap to clone; the device worker stops when the last clone (including
/// semaphore entry points handed out by [`ClRuntime::semaphore_ext`]) is
/// dropped.
#[derive(Clone)]
pub struct SimRuntime {
    inner: Arc<Inner>,
}

impl SimRuntime {
    pub fn new(config: SimDeviceConfig) -> std::result::Result<Self, SimError> {
        config.validate()?;
        let shared = Arc::new(Shared {
            idle_tick: config.idle_tick(),
            step_delay: config.step_delay(),
            state: Mutex::new(DeviceState::new(config.clone())),
            progress: Condvar::new(),
            work: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("semacheck-device".to_string())
            .spawn(move || worker_loop(&worker_shared))?;
        info!(
            devices = config.device_count,
            quirks = ?config.quirks,
            "simulated device started"
        );
        Ok(Self { inner: Arc::new(Inner { shared, worker: Some(worker) }) })
    }

    pub fn with_defaults() -> std::result::Result<Self, SimError> {
        Self::new(SimDeviceConfig::default())
    }

    pub fn config(&self) -> Result<SimDeviceConfig> {
        Ok(self.shared().lock()?.config().clone())
    }

    fn shared(&self) -> &Shared {
        &self.inner.shared
    }
}

impl std::fmt::Debug for SimRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimRuntime").finish_non_exhaustive()
    }
}

impl ClRuntime for SimRuntime {
    fn devices(&self) -> Result<Vec<DeviceId>> {
        Ok(self.shared().lock()?.devices())
    }

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo> {
        self.shared().lock()?.device_info(device)
    }

    fn create_context(&self, devices: &[DeviceId]) -> Result<ContextId> {
        self.shared().mutate(|s| s.create_context(devices))
    }

    fn context_devices(&self, context: ContextId) -> Result<Vec<DeviceId>> {
        self.shared().lock()?.context_devices(context)
    }

    fn retain_context(&self, context: ContextId) -> Result<()> {
        self.shared().mutate(|s| s.retain_context(context))
    }

    fn release_context(&self, context: ContextId) -> Result<()> {
        self.shared().mutate(|s| s.release_context(context))
    }

    fn create_queue(
        &self,
        context: ContextId,
        device: DeviceId,
        properties: QueueProperties,
    ) -> Result<QueueId> {
        let queue = self.shared().mutate(|s| s.create_queue(context, device, properties))?;
        debug!(%queue, %device, out_of_order = properties.out_of_order, "queue created");
        Ok(queue)
    }

    fn release_queue(&self, queue: QueueId) -> Result<()> {
        self.shared().mutate(|s| s.release_queue(queue))
    }

    fn flush(&self, queue: QueueId) -> Result<()> {
        trace!(%queue, "flush");
        self.shared().mutate(|s| s.flush(queue))
    }

    fn finish(&self, queue: QueueId, timeout: Option<Duration>) -> Result<()> {
        debug!(%queue, ?timeout, "finish");
        let what = format!("{queue} to finish");
        self.shared().wait_until(&what, timeout, |s| {
            s.flush(queue)?;
            s.queue_drained(queue)
        })
    }

    fn enqueue_task(&self, queue: QueueId, deps: &[EventId]) -> Result<EventId> {
        let event = self.shared().mutate(|s| s.enqueue_task(queue, deps))?;
        debug!(%queue, %event, ?deps, "task enqueued");
        Ok(event)
    }

    fn enqueue_marker(&self, queue: QueueId, deps: &[EventId]) -> Result<EventId> {
        self.shared().mutate(|s| s.enqueue_marker(queue, deps))
    }

    fn enqueue_barrier(&self, queue: QueueId, deps: &[EventId]) -> Result<EventId> {
        self.shared().mutate(|s| s.enqueue_barrier(queue, deps))
    }

    fn create_buffer(&self, context: ContextId, elements: usize) -> Result<BufferId> {
        self.shared().mutate(|s| s.create_buffer(context, elements))
    }

    fn release_buffer(&self, buffer: BufferId) -> Result<()> {
        self.shared().mutate(|s| s.release_buffer(buffer))
    }

    fn enqueue_fill_buffer(
        &self,
        queue: QueueId,
        buffer: BufferId,
        pattern: i32,
        deps: &[EventId],
    ) -> Result<EventId> {
        self.shared().mutate(|s| s.enqueue_fill_buffer(queue, buffer, pattern, deps))
    }

    fn enqueue_copy_buffer(
        &self,
        queue: QueueId,
        src: BufferId,
        dst: BufferId,
        deps: &[EventId],
    ) -> Result<EventId> {
        self.shared().mutate(|s| s.enqueue_copy_buffer(queue, src, dst, deps))
    }

    fn read_buffer(
        &self,
        queue: QueueId,
        buffer: BufferId,
        deps: &[EventId],
        timeout: Option<Duration>,
    ) -> Result<Vec<i32>> {
        let shared = self.shared();
        let event = shared.mutate(|s| {
            let event = s.enqueue_read_buffer(queue, buffer, deps)?;
            s.flush(queue)?;
            Ok(event)
        })?;
        let mut data = None;
        let waited = shared.wait_until("buffer read", timeout, |s| {
            if !s.events_done(&[event])? {
                return Ok(false);
            }
            data = s.take_read(event);
            Ok(true)
        });
        shared.mutate(|s| s.release_event(event))?;
        waited?;
        data.ok_or(ClError::OutOfResources)
    }

    fn create_user_event(&self, context: ContextId) -> Result<EventId> {
        self.shared().mutate(|s| s.create_user_event(context))
    }

    fn set_user_event_status(&self, event: EventId, status: UserEventStatus) -> Result<()> {
        debug!(%event, ?status, "user event resolved");
        self.shared().mutate(|s| s.set_user_event_status(event, status))
    }

    fn event_status(&self, event: EventId) -> Result<ExecutionStatus> {
        self.shared().lock()?.event_status(event)
    }

    fn event_profile(&self, event: EventId) -> Result<EventProfile> {
        self.shared().lock()?.event_profile(event)
    }

    fn wait_for_events(&self, events: &[EventId], timeout: Option<Duration>) -> Result<()> {
        self.shared().mutate(|s| s.prepare_wait(events))?;
        self.shared().wait_until("events", timeout, |s| s.events_done(events))
    }

    fn retain_event(&self, event: EventId) -> Result<()> {
        self.shared().mutate(|s| s.retain_event(event))
    }

    fn release_event(&self, event: EventId) -> Result<()> {
        self.shared().mutate(|s| s.release_event(event))
    }

    fn semaphore_ext(&self) -> Option<Arc<dyn SemaphoreExt>> {
        let exposed = self.shared().lock().is_ok_and(|s| s.config().semaphore_entry_points);
        exposed.then(|| {
            Arc::new(SimSemaphores { inner: Arc::clone(&self.inner) }) as Arc<dyn SemaphoreExt>
        })
    }
}

// ── SimSemaphores ───────────────────────────────────────────────────

/// Semaphore entry points of [`SimRuntime`].
pub struct SimSemaphores {
    inner: Arc<Inner>,
}

impl SimSemaphores {
    fn shared(&self) -> &Shared {
        &self.inner.shared
    }
}

impl SemaphoreExt for SimSemaphores {
    fn create_semaphore(
        &self,
        context: ContextId,
        properties: &SemaphoreProperties,
    ) -> Result<SemaphoreId> {
        let semaphore = self.shared().mutate(|s| s.create_semaphore(context, properties))?;
        debug!(%semaphore, %context, "semaphore created");
        Ok(semaphore)
    }

    fn retain_semaphore(&self, semaphore: SemaphoreId) -> Result<()> {
        self.shared().mutate(|s| s.retain_semaphore(semaphore))
    }

    fn release_semaphore(&self, semaphore: SemaphoreId) -> Result<()> {
        self.shared().mutate(|s| s.release_semaphore(semaphore))
    }

    fn semaphore_info(&self, semaphore: SemaphoreId) -> Result<SemaphoreInfo> {
        self.shared().lock()?.semaphore_info(semaphore)
    }

    fn enqueue_signal_semaphores(
        &self,
        queue: QueueId,
        semaphores: &[SemaphoreId],
        deps: &[EventId],
    ) -> Result<EventId> {
        let event = self
            .shared()
            .mutate(|s| s.enqueue_semaphores(SemaphoreOp::Signal, queue, semaphores, deps))?;
        debug!(%queue, %event, ?semaphores, ?deps, "signal enqueued");
        Ok(event)
    }

    fn enqueue_wait_semaphores(
        &self,
        queue: QueueId,
        semaphores: &[SemaphoreId],
        deps: &[EventId],
    ) -> Result<EventId> {
        let event = self
            .shared()
            .mutate(|s| s.enqueue_semaphores(SemaphoreOp::Wait, queue, semaphores, deps))?;
        debug!(%queue, %event, ?semaphores, ?deps, "wait enqueued");
        Ok(event)
    }

    fn semaphore_handle_for_type(
        &self,
        semaphore: SemaphoreId,
        device: Option<DeviceId>,
        handle_type: ExternalHandleType,
    ) -> Result<ExternalHandle> {
        let handle = self.shared().mutate(|s| s.export_handle(semaphore, device, handle_type))?;
        debug!(%semaphore, %handle_type, raw = %handle.raw, "handle exported");
        Ok(handle)
    }
}
