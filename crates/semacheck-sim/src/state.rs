//! Object tables of the simulated device and its progress step.
//!
//! Everything here is single-threaded; [`crate::runtime`] wraps the state in
//! a mutex and drives [`DeviceState::advance`] from a worker thread.
//!
//! A released object stays in its table while anything live still refers to
//! it: an event until it is terminal and no pending command lists it, a queue
//! until its commands are gone, a context until nothing created from it
//! remains. [`DeviceState::prune`] drops the rest. A terminated event is kept
//! until its queue is released too, so later ordering edges still see the
//! failure.

use std::collections::{BTreeMap, HashMap, HashSet};

use semacheck_runtime::codes::{
    CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST, CL_INVALID_SEMAPHORE_KHR, CL_OUT_OF_RESOURCES,
};
use semacheck_runtime::property::SEMAPHORE_TYPE;
use semacheck_runtime::{
    BufferId, ClError, CommandType, ContextId, DeviceId, DeviceInfo, EventId, EventProfile,
    ExecutionStatus, ExternalHandle, ExternalHandleType, QueueId, QueueProperties, RawHandle,
    Result, SemaphoreId, SemaphoreInfo, SemaphoreProperties, SemaphoreProperty, SemaphoreType,
    UserEventStatus, property,
};
use tracing::trace;

use crate::config::{DriverQuirk, SimDeviceConfig};

/// First file descriptor number handed out on export.
const FIRST_EXPORTED_FD: i32 = 3;
const FIRST_EXPORTED_WIN32: usize = 0x1000;

// ── Entries ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct ContextEntry {
    devices: Vec<DeviceId>,
    refcount: u32,
}

#[derive(Debug)]
struct QueueEntry {
    context: ContextId,
    device: DeviceId,
    properties: QueueProperties,
    refcount: u32,
    commands: Vec<EventId>,
    last_barrier: Option<EventId>,
}

/// What a command does once it runs. Semaphore commands hold payload cell
/// indices resolved at enqueue time.
#[derive(Debug, Clone)]
enum Command {
    User,
    Task,
    Marker,
    Barrier,
    Fill { buffer: BufferId, pattern: i32 },
    Copy { src: BufferId, dst: BufferId },
    Read { buffer: BufferId },
    Signal { cells: Vec<usize> },
    Wait { cells: Vec<usize> },
}

impl Command {
    fn command_type(&self) -> CommandType {
        match self {
            Self::User => CommandType::User,
            Self::Task => CommandType::Task,
            Self::Marker => CommandType::Marker,
            Self::Barrier => CommandType::Barrier,
            Self::Fill { .. } => CommandType::FillBuffer,
            Self::Copy { .. } => CommandType::CopyBuffer,
            Self::Read { .. } => CommandType::ReadBuffer,
            Self::Signal { .. } => CommandType::SignalSemaphores,
            Self::Wait { .. } => CommandType::WaitSemaphores,
        }
    }
}

#[derive(Debug)]
struct EventEntry {
    context: ContextId,
    queue: Option<QueueId>,
    command: Command,
    status: ExecutionStatus,
    /// Wait list given by the caller.
    explicit: Vec<EventId>,
    /// Edges added by queue ordering.
    implicit: Vec<EventId>,
    flushed: bool,
    refcount: u32,
    profile: EventProfile,
}

#[derive(Debug)]
struct SemaphoreEntry {
    context: ContextId,
    refcount: u32,
    properties: SemaphoreProperties,
    cell: usize,
    device_list: Vec<DeviceId>,
    export_types: Vec<ExternalHandleType>,
    imported: bool,
}

#[derive(Debug)]
struct BufferEntry {
    context: ContextId,
    refcount: u32,
    data: Vec<i32>,
}

/// Kind of semaphore command, for validation shared by signal and wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SemaphoreOp {
    Signal,
    Wait,
}

// ── DeviceState ─────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct DeviceState {
    config: SimDeviceConfig,
    next_id: u64,
    clock: u64,
    next_fd: i32,
    next_win32: usize,
    contexts: HashMap<ContextId, ContextEntry>,
    queues: HashMap<QueueId, QueueEntry>,
    events: BTreeMap<EventId, EventEntry>,
    semaphores: HashMap<SemaphoreId, SemaphoreEntry>,
    /// Semaphore payloads; imports share the cell of the exporter.
    cells: Vec<u64>,
    exported: HashMap<ExternalHandle, usize>,
    buffers: HashMap<BufferId, BufferEntry>,
    reads: HashMap<EventId, Vec<i32>>,
}

impl DeviceState {
    pub(crate) fn new(config: SimDeviceConfig) -> Self {
        Self {
            config,
            next_id: 1,
            clock: 0,
            next_fd: FIRST_EXPORTED_FD,
            next_win32: FIRST_EXPORTED_WIN32,
            contexts: HashMap::new(),
            queues: HashMap::new(),
            events: BTreeMap::new(),
            semaphores: HashMap::new(),
            cells: Vec::new(),
            exported: HashMap::new(),
            buffers: HashMap::new(),
            reads: HashMap::new(),
        }
    }

    pub(crate) fn config(&self) -> &SimDeviceConfig {
        &self.config
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn has_quirk(&self, quirk: DriverQuirk) -> bool {
        self.config.has_quirk(quirk)
    }

    // ── Devices ─────────────────────────────────────────────────

    pub(crate) fn devices(&self) -> Vec<DeviceId> {
        (0..self.config.device_count).map(DeviceId).collect()
    }

    fn check_device(&self, device: DeviceId) -> Result<()> {
        if device.0 < self.config.device_count { Ok(()) } else { Err(ClError::InvalidDevice) }
    }

    pub(crate) fn device_info(&self, device: DeviceId) -> Result<DeviceInfo> {
        self.check_device(device)?;
        let c = &self.config;
        Ok(DeviceInfo {
            id: device,
            name: format!("{} #{}", c.name, device.0),
            vendor: c.vendor.clone(),
            version: c.version.clone(),
            extensions: c.extensions.clone(),
            semaphore_import_handle_types: c.import_handle_types.clone(),
            semaphore_export_handle_types: c.export_handle_types.clone(),
            out_of_order_supported: c.out_of_order,
        })
    }

    // ── Contexts ────────────────────────────────────────────────

    pub(crate) fn create_context(&mut self, devices: &[DeviceId]) -> Result<ContextId> {
        if devices.is_empty() {
            return Err(ClError::InvalidValue);
        }
        for (i, device) in devices.iter().enumerate() {
            self.check_device(*device)?;
            if devices[..i].contains(device) {
                return Err(ClError::InvalidDevice);
            }
        }
        let id = ContextId(self.alloc_id());
        self.contexts.insert(id, ContextEntry { devices: devices.to_vec(), refcount: 1 });
        Ok(id)
    }

    fn context(&self, context: ContextId) -> Result<&ContextEntry> {
        self.contexts.get(&context).filter(|c| c.refcount > 0).ok_or(ClError::InvalidContext)
    }

    pub(crate) fn context_devices(&self, context: ContextId) -> Result<Vec<DeviceId>> {
        Ok(self.context(context)?.devices.clone())
    }

    pub(crate) fn retain_context(&mut self, context: ContextId) -> Result<()> {
        self.context(context)?;
        if let Some(c) = self.contexts.get_mut(&context) {
            c.refcount += 1;
        }
        Ok(())
    }

    pub(crate) fn release_context(&mut self, context: ContextId) -> Result<()> {
        self.context(context)?;
        if let Some(c) = self.contexts.get_mut(&context) {
            c.refcount -= 1;
        }
        self.prune();
        Ok(())
    }

    // ── Queues ──────────────────────────────────────────────────

    pub(crate) fn create_queue(
        &mut self,
        context: ContextId,
        device: DeviceId,
        properties: QueueProperties,
    ) -> Result<QueueId> {
        if !self.context(context)?.devices.contains(&device) {
            return Err(ClError::InvalidDevice);
        }
        if properties.out_of_order && !self.config.out_of_order {
            return Err(ClError::InvalidValue);
        }
        let id = QueueId(self.alloc_id());
        self.queues.insert(
            id,
            QueueEntry {
                context,
                device,
                properties,
                refcount: 1,
                commands: Vec::new(),
                last_barrier: None,
            },
        );
        Ok(id)
    }

    fn queue(&self, queue: QueueId) -> Result<&QueueEntry> {
        self.queues.get(&queue).filter(|q| q.refcount > 0).ok_or(ClError::InvalidCommandQueue)
    }

    /// Releasing a queue flushes it.
    pub(crate) fn release_queue(&mut self, queue: QueueId) -> Result<()> {
        self.flush(queue)?;
        if let Some(q) = self.queues.get_mut(&queue) {
            q.refcount -= 1;
        }
        self.prune();
        Ok(())
    }

    pub(crate) fn flush(&mut self, queue: QueueId) -> Result<()> {
        let commands = self.queue(queue)?.commands.clone();
        for id in commands {
            if let Some(e) = self.events.get_mut(&id) {
                e.flushed = true;
            }
        }
        Ok(())
    }

    /// `Ok(true)` once every command on `queue` completed; an error when all
    /// are terminal but at least one terminated.
    pub(crate) fn queue_drained(&self, queue: QueueId) -> Result<bool> {
        let commands = &self.queue(queue)?.commands;
        self.all_terminal(commands)
    }

    fn all_terminal(&self, events: &[EventId]) -> Result<bool> {
        let mut failed = false;
        for id in events {
            match self.events.get(id).map(|e| e.status) {
                Some(ExecutionStatus::Terminated(_)) => failed = true,
                Some(s) if s.is_in_progress() => return Ok(false),
                _ => {}
            }
        }
        if failed { Err(ClError::ExecStatusErrorForEventsInWaitList) } else { Ok(true) }
    }

    // ── Events ──────────────────────────────────────────────────

    fn event(&self, event: EventId) -> Result<&EventEntry> {
        self.events.get(&event).filter(|e| e.refcount > 0).ok_or(ClError::InvalidEvent)
    }

    pub(crate) fn create_user_event(&mut self, context: ContextId) -> Result<EventId> {
        self.context(context)?;
        let id = EventId(self.alloc_id());
        let now = self.tick();
        self.events.insert(
            id,
            EventEntry {
                context,
                queue: None,
                command: Command::User,
                status: ExecutionStatus::Submitted,
                explicit: Vec::new(),
                implicit: Vec::new(),
                flushed: true,
                refcount: 1,
                profile: EventProfile { queued: now, submitted: Some(now), ..Default::default() },
            },
        );
        Ok(id)
    }

    pub(crate) fn set_user_event_status(
        &mut self,
        event: EventId,
        status: UserEventStatus,
    ) -> Result<()> {
        let entry = self.event(event)?;
        if !matches!(entry.command, Command::User) {
            return Err(ClError::InvalidEvent);
        }
        if entry.status.is_terminal() {
            return Err(ClError::InvalidOperation);
        }
        let next = match status {
            UserEventStatus::Complete => ExecutionStatus::Complete,
            UserEventStatus::Failed(code) if code < 0 => ExecutionStatus::Terminated(code),
            UserEventStatus::Failed(_) => return Err(ClError::InvalidValue),
        };
        self.transition(event, next);
        Ok(())
    }

    pub(crate) fn event_status(&self, event: EventId) -> Result<ExecutionStatus> {
        Ok(self.event(event)?.status)
    }

    pub(crate) fn event_profile(&self, event: EventId) -> Result<EventProfile> {
        Ok(self.event(event)?.profile)
    }

    pub(crate) fn retain_event(&mut self, event: EventId) -> Result<()> {
        self.event(event)?;
        if let Some(e) = self.events.get_mut(&event) {
            e.refcount += 1;
        }
        Ok(())
    }

    pub(crate) fn release_event(&mut self, event: EventId) -> Result<()> {
        self.event(event)?;
        if let Some(e) = self.events.get_mut(&event) {
            e.refcount -= 1;
        }
        self.prune();
        Ok(())
    }

    /// Validate a wait list and flush the queues its commands live on.
    pub(crate) fn prepare_wait(&mut self, events: &[EventId]) -> Result<()> {
        if events.is_empty() {
            return Err(ClError::InvalidValue);
        }
        let mut queues = Vec::new();
        for id in events {
            if let Some(queue) = self.event(*id)?.queue {
                queues.push(queue);
            }
        }
        for queue in queues {
            for id in self.queues.get(&queue).map(|q| q.commands.clone()).unwrap_or_default() {
                if let Some(e) = self.events.get_mut(&id) {
                    e.flushed = true;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn events_done(&self, events: &[EventId]) -> Result<bool> {
        self.all_terminal(events)
    }

    // ── Enqueue ─────────────────────────────────────────────────

    fn validate_wait_list(&self, context: ContextId, deps: &[EventId]) -> Result<()> {
        for dep in deps {
            let entry = self
                .events
                .get(dep)
                .filter(|e| e.refcount > 0)
                .ok_or(ClError::InvalidEventWaitList)?;
            if entry.context != context {
                return Err(ClError::InvalidContext);
            }
        }
        if deps.iter().any(|d| self.events.get(d).is_some_and(|e| e.status.is_terminated())) {
            return Err(ClError::ExecStatusErrorForEventsInWaitList);
        }
        Ok(())
    }

    fn implicit_dependencies(
        &self,
        queue: &QueueEntry,
        command: &Command,
        has_explicit: bool,
    ) -> Vec<EventId> {
        if !queue.properties.out_of_order {
            return queue.commands.last().copied().into_iter().collect();
        }
        let waits_for_all = match command {
            Command::Barrier => true,
            Command::Marker => !has_explicit,
            Command::Signal { .. } => self.has_quirk(DriverQuirk::SignalWaitsForPriorCommands),
            _ => false,
        };
        if waits_for_all {
            queue.commands.clone()
        } else {
            queue.last_barrier.into_iter().collect()
        }
    }

    fn enqueue(&mut self, queue: QueueId, command: Command, deps: &[EventId]) -> Result<EventId> {
        let q = self.queue(queue)?;
        let context = q.context;
        self.validate_wait_list(context, deps)?;
        let implicit = self.implicit_dependencies(q, &command, !deps.is_empty());
        let is_barrier = matches!(command, Command::Barrier);

        let id = EventId(self.alloc_id());
        let queued = self.tick();
        self.events.insert(
            id,
            EventEntry {
                context,
                queue: Some(queue),
                command,
                status: ExecutionStatus::Queued,
                explicit: deps.to_vec(),
                implicit,
                flushed: false,
                refcount: 1,
                profile: EventProfile { queued, ..Default::default() },
            },
        );
        if let Some(q) = self.queues.get_mut(&queue) {
            q.commands.push(id);
            if is_barrier {
                q.last_barrier = Some(id);
            }
        }
        Ok(id)
    }

    pub(crate) fn enqueue_task(&mut self, queue: QueueId, deps: &[EventId]) -> Result<EventId> {
        self.enqueue(queue, Command::Task, deps)
    }

    pub(crate) fn enqueue_marker(&mut self, queue: QueueId, deps: &[EventId]) -> Result<EventId> {
        self.enqueue(queue, Command::Marker, deps)
    }

    pub(crate) fn enqueue_barrier(&mut self, queue: QueueId, deps: &[EventId]) -> Result<EventId> {
        self.enqueue(queue, Command::Barrier, deps)
    }

    pub(crate) fn enqueue_semaphores(
        &mut self,
        op: SemaphoreOp,
        queue: QueueId,
        semaphores: &[SemaphoreId],
        deps: &[EventId],
    ) -> Result<EventId> {
        let q = self.queue(queue)?;
        if semaphores.is_empty() {
            return Err(ClError::InvalidOperands);
        }
        let mut cells = Vec::with_capacity(semaphores.len());
        for id in semaphores {
            let sema = self.semaphore(*id)?;
            if sema.context != q.context {
                return Err(ClError::InvalidContext);
            }
            if !sema.device_list.is_empty() && !sema.device_list.contains(&q.device) {
                return Err(ClError::InvalidCommandQueue);
            }
            cells.push(sema.cell);
        }
        let command = match op {
            SemaphoreOp::Signal => Command::Signal { cells },
            SemaphoreOp::Wait => Command::Wait { cells },
        };
        self.enqueue(queue, command, deps)
    }

    // ── Buffers ─────────────────────────────────────────────────

    pub(crate) fn create_buffer(&mut self, context: ContextId, elements: usize) -> Result<BufferId> {
        self.context(context)?;
        if elements == 0 {
            return Err(ClError::InvalidValue);
        }
        let id = BufferId(self.alloc_id());
        self.buffers.insert(id, BufferEntry { context, refcount: 1, data: vec![0; elements] });
        Ok(id)
    }

    fn buffer_in(&self, buffer: BufferId, context: ContextId) -> Result<()> {
        let entry =
            self.buffers.get(&buffer).filter(|b| b.refcount > 0).ok_or(ClError::InvalidMemObject)?;
        if entry.context != context { Err(ClError::InvalidContext) } else { Ok(()) }
    }

    pub(crate) fn release_buffer(&mut self, buffer: BufferId) -> Result<()> {
        match self.buffers.get_mut(&buffer) {
            Some(b) if b.refcount > 0 => b.refcount -= 1,
            _ => return Err(ClError::InvalidMemObject),
        }
        self.prune();
        Ok(())
    }

    pub(crate) fn enqueue_fill_buffer(
        &mut self,
        queue: QueueId,
        buffer: BufferId,
        pattern: i32,
        deps: &[EventId],
    ) -> Result<EventId> {
        self.buffer_in(buffer, self.queue(queue)?.context)?;
        self.enqueue(queue, Command::Fill { buffer, pattern }, deps)
    }

    pub(crate) fn enqueue_copy_buffer(
        &mut self,
        queue: QueueId,
        src: BufferId,
        dst: BufferId,
        deps: &[EventId],
    ) -> Result<EventId> {
        let context = self.queue(queue)?.context;
        self.buffer_in(src, context)?;
        self.buffer_in(dst, context)?;
        self.enqueue(queue, Command::Copy { src, dst }, deps)
    }

    pub(crate) fn enqueue_read_buffer(
        &mut self,
        queue: QueueId,
        buffer: BufferId,
        deps: &[EventId],
    ) -> Result<EventId> {
        self.buffer_in(buffer, self.queue(queue)?.context)?;
        self.enqueue(queue, Command::Read { buffer }, deps)
    }

    /// Data captured by a completed read command.
    pub(crate) fn take_read(&mut self, event: EventId) -> Option<Vec<i32>> {
        self.reads.remove(&event)
    }

    // ── Semaphores ──────────────────────────────────────────────

    fn semaphore(&self, semaphore: SemaphoreId) -> Result<&SemaphoreEntry> {
        self.semaphores
            .get(&semaphore)
            .filter(|s| s.refcount > 0)
            .ok_or(ClError::InvalidSemaphore)
    }

    pub(crate) fn create_semaphore(
        &mut self,
        context: ContextId,
        properties: &SemaphoreProperties,
    ) -> Result<SemaphoreId> {
        let context_devices = self.context(context)?.devices.clone();
        if properties.is_empty() {
            return Err(ClError::InvalidValue);
        }

        let mut semaphore_type = None;
        let mut export_types: Option<&[ExternalHandleType]> = None;
        let mut import = None;
        let mut device_list: Option<&[DeviceId]> = None;
        for prop in properties {
            match prop {
                SemaphoreProperty::Type(t) => set_once(&mut semaphore_type, *t)?,
                SemaphoreProperty::Raw { name: SEMAPHORE_TYPE, value } => {
                    if *value != property::SEMAPHORE_TYPE_BINARY {
                        return Err(ClError::InvalidValue);
                    }
                    set_once(&mut semaphore_type, SemaphoreType::Binary)?;
                }
                SemaphoreProperty::Raw { .. } => return Err(ClError::InvalidProperty),
                SemaphoreProperty::ExportHandleTypes(types) => {
                    if types.iter().any(|t| !self.config.export_handle_types.contains(t)) {
                        return Err(ClError::InvalidProperty);
                    }
                    set_once(&mut export_types, types.as_slice())?;
                }
                SemaphoreProperty::Import(handle) => {
                    if !self.config.import_handle_types.contains(&handle.handle_type) {
                        return Err(ClError::InvalidProperty);
                    }
                    set_once(&mut import, *handle)?;
                }
                SemaphoreProperty::DeviceHandleList(devices) => {
                    set_once(&mut device_list, devices.as_slice())?;
                }
            }
        }

        if semaphore_type.is_none() {
            return Err(ClError::InvalidValue);
        }
        if import.is_some() && export_types.is_some_and(|t| !t.is_empty()) {
            return Err(ClError::InvalidOperation);
        }
        match device_list {
            Some(list) if list.len() != 1 => return Err(ClError::InvalidDevice),
            Some(list) if !context_devices.contains(&list[0]) => {
                return Err(ClError::InvalidDevice);
            }
            None if context_devices.len() > 1 => return Err(ClError::InvalidProperty),
            _ => {}
        }

        let cell = match import {
            Some(handle) => *self.exported.get(&handle).ok_or(ClError::InvalidValue)?,
            None => {
                self.cells.push(0);
                self.cells.len() - 1
            }
        };
        let entry = SemaphoreEntry {
            context,
            refcount: 1,
            properties: properties.clone(),
            cell,
            device_list: device_list.map(<[DeviceId]>::to_vec).unwrap_or_default(),
            export_types: export_types.map(<[ExternalHandleType]>::to_vec).unwrap_or_default(),
            imported: import.is_some(),
        };
        let id = SemaphoreId(self.alloc_id());
        self.semaphores.insert(id, entry);
        Ok(id)
    }

    pub(crate) fn retain_semaphore(&mut self, semaphore: SemaphoreId) -> Result<()> {
        self.semaphore(semaphore)?;
        if let Some(s) = self.semaphores.get_mut(&semaphore) {
            s.refcount += 1;
        }
        Ok(())
    }

    pub(crate) fn release_semaphore(&mut self, semaphore: SemaphoreId) -> Result<()> {
        self.semaphore(semaphore)?;
        if let Some(s) = self.semaphores.get_mut(&semaphore) {
            s.refcount -= 1;
        }
        self.prune();
        Ok(())
    }

    pub(crate) fn semaphore_info(&self, semaphore: SemaphoreId) -> Result<SemaphoreInfo> {
        let s = self.semaphore(semaphore)?;
        let device_handle_list = if s.device_list.is_empty() {
            let devices = &self.context(s.context)?.devices;
            if devices.len() == 1 { devices.clone() } else { Vec::new() }
        } else {
            s.device_list.clone()
        };
        Ok(SemaphoreInfo {
            context: s.context,
            semaphore_type: SemaphoreType::Binary,
            reference_count: s.refcount,
            properties: s.properties.clone(),
            payload: self.cells[s.cell],
            device_handle_list,
            export_handle_types: s.export_types.clone(),
        })
    }

    pub(crate) fn export_handle(
        &mut self,
        semaphore: SemaphoreId,
        device: Option<DeviceId>,
        handle_type: ExternalHandleType,
    ) -> Result<ExternalHandle> {
        let s = self.semaphore(semaphore)?;
        if s.imported {
            return Err(ClError::InvalidOperation);
        }
        if !s.export_types.contains(&handle_type) {
            return Err(ClError::InvalidValue);
        }
        if let Some(device) = device {
            if !self.context(s.context)?.devices.contains(&device) {
                return Err(ClError::InvalidDevice);
            }
        }
        let cell = s.cell;
        let raw = if handle_type.is_fd() {
            let fd = self.next_fd;
            self.next_fd += 1;
            RawHandle::Fd(fd)
        } else {
            let h = self.next_win32;
            self.next_win32 += 4;
            RawHandle::Win32(h)
        };
        let handle = ExternalHandle { handle_type, raw };
        self.exported.insert(handle, cell);
        Ok(handle)
    }

    // ── Progress ────────────────────────────────────────────────

    /// One progress pass: every live command advances at most one stage.
    /// Returns whether anything changed.
    pub(crate) fn advance(&mut self) -> bool {
        let live: Vec<EventId> = self
            .events
            .iter()
            .filter(|(_, e)| e.queue.is_some() && e.status.is_in_progress())
            .map(|(id, _)| *id)
            .collect();
        let mut progressed = false;
        for id in live {
            progressed |= self.step(id);
        }
        if progressed {
            self.prune();
        }
        progressed
    }

    fn step(&mut self, id: EventId) -> bool {
        let Some(entry) = self.events.get(&id) else {
            return false;
        };
        let status = entry.status;
        let next = match status {
            ExecutionStatus::Queued => entry.flushed.then_some(ExecutionStatus::Submitted),
            ExecutionStatus::Submitted => self.resolve_dependencies(entry),
            ExecutionStatus::Ready => (!self.is_stalled(entry)).then_some(ExecutionStatus::Running),
            ExecutionStatus::Running => self.apply_effect(id),
            ExecutionStatus::Complete | ExecutionStatus::Terminated(_) => None,
        };
        match next {
            Some(status) => {
                self.transition(id, status);
                true
            }
            None => false,
        }
    }

    /// A wait can only finish if each of its semaphores is signaled or has a
    /// signal still on its way. Anything else can never resolve.
    fn resolve_dependencies(&self, entry: &EventEntry) -> Option<ExecutionStatus> {
        if matches!(entry.command, Command::Signal { .. })
            && self.has_quirk(DriverQuirk::SignalIgnoresDependencies)
        {
            return Some(ExecutionStatus::Ready);
        }
        let mut all_complete = true;
        for dep in entry.explicit.iter().chain(&entry.implicit) {
            match self.events.get(dep).map(|e| e.status) {
                Some(ExecutionStatus::Terminated(_)) => {
                    return Some(ExecutionStatus::Terminated(
                        CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST,
                    ));
                }
                Some(ExecutionStatus::Complete) | None => {}
                Some(_) => all_complete = false,
            }
        }
        if !all_complete {
            return None;
        }
        if let Command::Wait { cells } = &entry.command {
            if cells.iter().any(|&c| self.cells[c] == 0 && !self.signal_pending(c)) {
                return Some(ExecutionStatus::Terminated(CL_INVALID_SEMAPHORE_KHR));
            }
        }
        Some(ExecutionStatus::Ready)
    }

    fn signal_pending(&self, cell: usize) -> bool {
        self.events.values().any(|e| {
            e.status.is_in_progress()
                && matches!(&e.command, Command::Signal { cells } if cells.contains(&cell))
        })
    }

    fn is_stalled(&self, entry: &EventEntry) -> bool {
        self.has_quirk(DriverQuirk::StallDependentCommands) && !entry.explicit.is_empty()
    }

    /// Outcome of a running command, `None` while it cannot finish yet.
    fn apply_effect(&mut self, id: EventId) -> Option<ExecutionStatus> {
        let command = self.events.get(&id)?.command.clone();
        match command {
            Command::User => None,
            Command::Task | Command::Marker | Command::Barrier => Some(ExecutionStatus::Complete),
            Command::Fill { buffer, pattern } => {
                if let Some(b) = self.buffers.get_mut(&buffer) {
                    b.data.fill(pattern);
                }
                Some(ExecutionStatus::Complete)
            }
            Command::Copy { src, dst } => {
                let data = self.buffers.get(&src).map(|b| b.data.clone()).unwrap_or_default();
                if let Some(b) = self.buffers.get_mut(&dst) {
                    let n = data.len().min(b.data.len());
                    b.data[..n].copy_from_slice(&data[..n]);
                }
                Some(ExecutionStatus::Complete)
            }
            Command::Read { buffer } => {
                let data = self.buffers.get(&buffer).map(|b| b.data.clone()).unwrap_or_default();
                self.reads.insert(id, data);
                Some(ExecutionStatus::Complete)
            }
            Command::Signal { cells } => {
                if self.has_quirk(DriverQuirk::TerminateSignals) {
                    return Some(ExecutionStatus::Terminated(CL_OUT_OF_RESOURCES));
                }
                if !cells.iter().all(|&c| self.cells[c] == 0) {
                    return None;
                }
                for c in cells {
                    self.cells[c] = 1;
                }
                Some(ExecutionStatus::Complete)
            }
            Command::Wait { cells } => {
                if self.has_quirk(DriverQuirk::WaitIgnoresPayload) {
                    return Some(ExecutionStatus::Complete);
                }
                if !cells.iter().all(|&c| self.cells[c] == 1) {
                    return None;
                }
                if !self.has_quirk(DriverQuirk::WaitKeepsPayload) {
                    for c in cells {
                        self.cells[c] = 0;
                    }
                }
                Some(ExecutionStatus::Complete)
            }
        }
    }

    fn transition(&mut self, id: EventId, status: ExecutionStatus) {
        let now = self.tick();
        let Some(entry) = self.events.get_mut(&id) else {
            return;
        };
        trace!(
            event = %id,
            command = ?entry.command.command_type(),
            from = %entry.status,
            to = %status,
            "transition"
        );
        match status {
            ExecutionStatus::Submitted => entry.profile.submitted = Some(now),
            ExecutionStatus::Running => entry.profile.start = Some(now),
            ExecutionStatus::Complete | ExecutionStatus::Terminated(_) => {
                entry.profile.start.get_or_insert(now);
                entry.profile.end = Some(now);
            }
            ExecutionStatus::Queued | ExecutionStatus::Ready => {}
        }
        entry.status = status;
    }

    // ── Reclamation ─────────────────────────────────────────────

    /// Drop released objects that nothing live refers to any more.
    pub(crate) fn prune(&mut self) {
        let waited_on: HashSet<EventId> = self
            .events
            .values()
            .filter(|e| e.status.is_in_progress())
            .flat_map(|e| e.explicit.iter().chain(&e.implicit).copied())
            .collect();
        let dead: Vec<EventId> = self
            .events
            .iter()
            .filter(|(id, e)| {
                e.refcount == 0
                    && e.status.is_terminal()
                    && !waited_on.contains(*id)
                    && !(e.status.is_terminated() && e.queue.is_some_and(|q| self.queue(q).is_ok()))
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            let queue = self.events.remove(id).and_then(|e| e.queue);
            if let Some(q) = queue.and_then(|q| self.queues.get_mut(&q)) {
                q.commands.retain(|c| c != id);
                if q.last_barrier == Some(*id) {
                    q.last_barrier = None;
                }
            }
            self.reads.remove(id);
        }

        self.semaphores.retain(|_, s| s.refcount > 0);
        let live_cells: HashSet<usize> = self.semaphores.values().map(|s| s.cell).collect();
        self.exported.retain(|_, cell| live_cells.contains(cell));

        let touched: HashSet<BufferId> = self
            .events
            .values()
            .filter(|e| e.status.is_in_progress())
            .flat_map(|e| match e.command {
                Command::Fill { buffer, .. } | Command::Read { buffer } => vec![buffer],
                Command::Copy { src, dst } => vec![src, dst],
                _ => Vec::new(),
            })
            .collect();
        self.buffers.retain(|id, b| b.refcount > 0 || touched.contains(id));
        self.queues.retain(|_, q| q.refcount > 0 || !q.commands.is_empty());

        let in_use: HashSet<ContextId> = self
            .queues
            .values()
            .map(|q| q.context)
            .chain(self.events.values().map(|e| e.context))
            .chain(self.semaphores.values().map(|s| s.context))
            .chain(self.buffers.values().map(|b| b.context))
            .collect();
        self.contexts.retain(|id, c| c.refcount > 0 || in_use.contains(id));
        if !dead.is_empty() {
            trace!(events = dead.len(), "pruned released events");
        }
    }

    #[cfg(test)]
    fn table_sizes(&self) -> [usize; 5] {
        [
            self.contexts.len(),
            self.queues.len(),
            self.events.len(),
            self.semaphores.len(),
            self.buffers.len(),
        ]
    }

    /// Advance until a pass changes nothing; returns the number of passes.
    #[cfg(test)]
    pub(crate) fn run_until_idle(&mut self) -> usize {
        let mut passes = 0;
        while self.advance() {
            passes += 1;
        }
        passes
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> Result<()> {
    if slot.is_some() {
        return Err(ClError::InvalidProperty);
    }
    *slot = Some(value);
    Ok(())
}
