//! Per-device capability negotiation and the semaphore function table.
//!
//! Capabilities are queried once per device and handed to every scenario
//! unchanged. [`SemaphoreFunctions`] is resolved from them; a device that
//! does not advertise or expose the semaphore entry points makes the
//! scenario skip instead of fail.

use std::fmt;
use std::sync::Arc;

use semacheck_runtime::{
    ClError, ClRuntime, CommandQueue, Context, ContextId, DeviceId, DeviceInfo, Event, EventId,
    ExternalHandle, ExternalHandleType, QueueId, Semaphore, SemaphoreExt, SemaphoreId,
    SemaphoreProperties, event_ids,
};
use serde::Serialize;

use crate::error::{ScenarioError, ScenarioResult};

pub const SEMAPHORE_EXTENSION: &str = "cl_khr_semaphore";
pub const EXTERNAL_SEMAPHORE_EXTENSION: &str = "cl_khr_external_semaphore";

// ── DeviceCapabilities ───────────────────────────────────────────────────────

/// What one device supports, as far as the scenarios care.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCapabilities {
    pub device: DeviceId,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub extensions: Vec<String>,
    pub import_handle_types: Vec<ExternalHandleType>,
    pub export_handle_types: Vec<ExternalHandleType>,
    pub out_of_order: bool,
}

impl DeviceCapabilities {
    pub fn query(runtime: &dyn ClRuntime, device: DeviceId) -> Result<Self, ClError> {
        Ok(Self::from_info(runtime.device_info(device)?))
    }

    pub fn from_info(info: DeviceInfo) -> Self {
        Self {
            device: info.id,
            name: info.name,
            vendor: info.vendor,
            version: info.version,
            extensions: info.extensions,
            import_handle_types: info.semaphore_import_handle_types,
            export_handle_types: info.semaphore_export_handle_types,
            out_of_order: info.out_of_order_supported,
        }
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }

    pub fn supports_semaphores(&self) -> bool {
        self.supports(SEMAPHORE_EXTENSION)
    }

    /// Whether semaphores of `handle_type` can be exported.
    pub fn can_export(&self, handle_type: ExternalHandleType) -> bool {
        self.supports(EXTERNAL_SEMAPHORE_EXTENSION)
            && self.supports(handle_type.extension())
            && self.export_handle_types.contains(&handle_type)
    }

    /// Whether semaphores of `handle_type` can be both exported and imported.
    pub fn can_round_trip(&self, handle_type: ExternalHandleType) -> bool {
        self.can_export(handle_type) && self.import_handle_types.contains(&handle_type)
    }

    /// Skip unless `handle_type` round-trips on this device.
    pub fn require_external(&self, handle_type: ExternalHandleType) -> ScenarioResult {
        if !self.supports(EXTERNAL_SEMAPHORE_EXTENSION) {
            return Err(ScenarioError::skipped(format!(
                "{EXTERNAL_SEMAPHORE_EXTENSION} is not supported"
            )));
        }
        if !self.supports(handle_type.extension()) {
            return Err(ScenarioError::skipped(format!(
                "{} is not supported",
                handle_type.extension()
            )));
        }
        if !self.can_round_trip(handle_type) {
            return Err(ScenarioError::skipped(format!(
                "{handle_type} handles cannot be exported and imported"
            )));
        }
        Ok(())
    }

    /// First handle type that round-trips, preferring sync fds.
    pub fn round_trip_handle_type(&self) -> ScenarioResult<ExternalHandleType> {
        ExternalHandleType::ALL.into_iter().find(|t| self.can_round_trip(*t)).ok_or_else(|| {
            ScenarioError::skipped("no external semaphore handle type can be exported and imported")
        })
    }
}

/// Human-readable capability summary, one field per line.
pub fn format_device_info(caps: &DeviceCapabilities) -> String {
    let mut lines = Vec::with_capacity(8);

    lines.push(format!("Device:          {} ({})", caps.name, caps.device));
    lines.push(format!("Vendor:          {}", caps.vendor));
    lines.push(format!("Version:         {}", caps.version));
    lines.push(format!("Out-of-order:    {}", caps.out_of_order));
    lines.push(format!("Semaphores:      {}", caps.supports_semaphores()));
    lines.push(format!("Export handles:  {}", join_types(&caps.export_handle_types)));
    lines.push(format!("Import handles:  {}", join_types(&caps.import_handle_types)));
    lines.push(format!("Extensions:      {}", caps.extensions.join(" ")));

    lines.join("\n")
}

fn join_types(types: &[ExternalHandleType]) -> String {
    if types.is_empty() {
        return "none".to_string();
    }
    types.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for DeviceCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_device_info(self))
    }
}

// ── SemaphoreFunctions ───────────────────────────────────────────────────────

/// Which semaphore operation to enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemaphoreOp {
    Signal,
    Wait,
}

impl SemaphoreOp {
    pub const BOTH: [Self; 2] = [Self::Signal, Self::Wait];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Wait => "wait",
        }
    }
}

impl fmt::Display for SemaphoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved semaphore entry points of one device.
#[derive(Clone)]
pub struct SemaphoreFunctions {
    ext: Arc<dyn SemaphoreExt>,
}

impl SemaphoreFunctions {
    /// Resolve the entry points, skipping when the device lacks them.
    pub fn resolve(runtime: &dyn ClRuntime, caps: &DeviceCapabilities) -> ScenarioResult<Self> {
        if !caps.supports_semaphores() {
            return Err(ScenarioError::skipped(format!(
                "{SEMAPHORE_EXTENSION} is not supported on {}",
                caps.device
            )));
        }
        let ext = runtime.semaphore_ext().ok_or_else(|| {
            ScenarioError::skipped(format!(
                "{SEMAPHORE_EXTENSION} is advertised but its entry points are unavailable"
            ))
        })?;
        Ok(Self { ext })
    }

    pub fn entry_points(&self) -> &Arc<dyn SemaphoreExt> {
        &self.ext
    }

    pub fn create(
        &self,
        context: &Context,
        properties: &SemaphoreProperties,
    ) -> Result<Semaphore, ClError> {
        Semaphore::create(&self.ext, context, properties)
    }

    pub fn create_binary(&self, context: &Context) -> Result<Semaphore, ClError> {
        self.create(context, &SemaphoreProperties::binary())
    }

    /// Create by raw context id, for calls that are expected to be rejected.
    pub fn create_raw(
        &self,
        context: ContextId,
        properties: &SemaphoreProperties,
    ) -> Result<SemaphoreId, ClError> {
        self.ext.create_semaphore(context, properties)
    }

    pub fn import(&self, context: &Context, handle: ExternalHandle) -> Result<Semaphore, ClError> {
        Semaphore::import(&self.ext, context, handle)
    }

    pub fn signal(
        &self,
        queue: &CommandQueue,
        semaphores: &[&Semaphore],
        deps: &[&Event],
    ) -> Result<Event, ClError> {
        self.enqueue(SemaphoreOp::Signal, queue, semaphores, deps)
    }

    pub fn wait(
        &self,
        queue: &CommandQueue,
        semaphores: &[&Semaphore],
        deps: &[&Event],
    ) -> Result<Event, ClError> {
        self.enqueue(SemaphoreOp::Wait, queue, semaphores, deps)
    }

    pub fn enqueue(
        &self,
        op: SemaphoreOp,
        queue: &CommandQueue,
        semaphores: &[&Semaphore],
        deps: &[&Event],
    ) -> Result<Event, ClError> {
        let ids: Vec<SemaphoreId> = semaphores.iter().map(|s| s.id()).collect();
        let id = self.enqueue_raw(op, queue.id(), &ids, &event_ids(deps))?;
        Ok(Event::from_raw(queue.runtime(), id))
    }

    /// Enqueue by raw ids, for calls that are expected to be rejected.
    pub fn enqueue_raw(
        &self,
        op: SemaphoreOp,
        queue: QueueId,
        semaphores: &[SemaphoreId],
        deps: &[EventId],
    ) -> Result<EventId, ClError> {
        match op {
            SemaphoreOp::Signal => self.ext.enqueue_signal_semaphores(queue, semaphores, deps),
            SemaphoreOp::Wait => self.ext.enqueue_wait_semaphores(queue, semaphores, deps),
        }
    }
}

impl fmt::Debug for SemaphoreFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaphoreFunctions").finish_non_exhaustive()
    }
}
