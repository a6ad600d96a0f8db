//! Value types shared by the runtime contract, the engines implementing it,
//! and the verifier consuming it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClError;

// ── Handles ──────────────────────────────────────────────────────────────────

macro_rules! handle_id {
    ($(#[$meta:meta])* $name:ident($repr:ty), $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub $repr);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

handle_id!(
    /// Device of the platform, `0..device_count`.
    DeviceId(u32),
    "device"
);
handle_id!(
    /// Context handle.
    ContextId(u64),
    "context"
);
handle_id!(
    /// Command queue handle.
    QueueId(u64),
    "queue"
);
handle_id!(
    /// Event handle, one per enqueued command or user event.
    EventId(u64),
    "event"
);
handle_id!(
    /// Semaphore handle.
    SemaphoreId(u64),
    "semaphore"
);
handle_id!(
    /// Buffer handle.
    BufferId(u64),
    "buffer"
);

// ── ExecutionStatus ──────────────────────────────────────────────────────────

/// Execution status of the command behind an event.
///
/// Successful progress is monotonic: `Queued < Submitted < Ready < Running <
/// Complete`. `Terminated` carries the (negative) failure code and orders
/// below every other state, so it never satisfies a progress threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Queued,
    Submitted,
    Ready,
    Running,
    Complete,
    Terminated(i32),
}

impl ExecutionStatus {
    const fn rank(self) -> i8 {
        match self {
            Self::Terminated(_) => -1,
            Self::Queued => 0,
            Self::Submitted => 1,
            Self::Ready => 2,
            Self::Running => 3,
            Self::Complete => 4,
        }
    }

    /// `true` once the status is at or past `threshold` on the success path.
    pub const fn has_reached(self, threshold: Self) -> bool {
        !self.is_terminated() && self.rank() >= threshold.rank()
    }

    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }

    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    /// `Complete` or `Terminated`.
    pub const fn is_terminal(self) -> bool {
        self.is_complete() || self.is_terminated()
    }

    /// Neither complete nor terminated.
    pub const fn is_in_progress(self) -> bool {
        !self.is_terminal()
    }
}

impl PartialOrd for ExecutionStatus {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExecutionStatus {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        match (self, other) {
            (Self::Terminated(a), Self::Terminated(b)) => a.cmp(b),
            _ => by_rank,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "QUEUED"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Ready => write!(f, "READY"),
            Self::Running => write!(f, "RUNNING"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Terminated(code) => write!(f, "TERMINATED({code})"),
        }
    }
}

/// Status a user event may be moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEventStatus {
    Complete,
    /// Negative failure code; dependents terminate.
    Failed(i32),
}

// ── Commands and profiling ───────────────────────────────────────────────────

/// Kind of command an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandType {
    User,
    Task,
    Marker,
    Barrier,
    FillBuffer,
    CopyBuffer,
    ReadBuffer,
    SignalSemaphores,
    WaitSemaphores,
}

/// Device-clock timestamps of an event's transitions.
///
/// Timestamps come from a monotonic device clock; they order transitions
/// across every queue of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventProfile {
    pub queued: u64,
    pub submitted: Option<u64>,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// Command queue creation properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueProperties {
    pub out_of_order: bool,
    pub profiling: bool,
}

impl QueueProperties {
    pub const IN_ORDER: Self = Self { out_of_order: false, profiling: true };
    pub const OUT_OF_ORDER: Self = Self { out_of_order: true, profiling: true };

    /// In-order when `ordered`, out-of-order otherwise.
    pub const fn ordered(ordered: bool) -> Self {
        if ordered { Self::IN_ORDER } else { Self::OUT_OF_ORDER }
    }
}

// ── Semaphores ───────────────────────────────────────────────────────────────

/// Raw property names and values, as they appear in a property list.
pub mod property {
    pub const SEMAPHORE_TYPE: u64 = 0x203D;
    pub const SEMAPHORE_TYPE_BINARY: u64 = 1;
    pub const SEMAPHORE_EXPORT_HANDLE_TYPES: u64 = 0x203F;
    pub const SEMAPHORE_DEVICE_HANDLE_LIST: u64 = 0x2053;
    pub const HANDLE_OPAQUE_FD: u64 = 0x2055;
    pub const HANDLE_OPAQUE_WIN32: u64 = 0x2056;
    pub const HANDLE_OPAQUE_WIN32_KMT: u64 = 0x2057;
    pub const HANDLE_SYNC_FD: u64 = 0x2058;
    pub const HANDLE_D3D12_FENCE: u64 = 0x2059;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemaphoreType {
    Binary,
}

impl SemaphoreType {
    pub const fn raw(self) -> u64 {
        match self {
            Self::Binary => property::SEMAPHORE_TYPE_BINARY,
        }
    }
}

/// External handle types a semaphore can be exported to or imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExternalHandleType {
    SyncFd,
    OpaqueFd,
    OpaqueWin32,
    OpaqueWin32Kmt,
    D3d12Fence,
}

impl ExternalHandleType {
    pub const ALL: [Self; 5] =
        [Self::SyncFd, Self::OpaqueFd, Self::OpaqueWin32, Self::OpaqueWin32Kmt, Self::D3d12Fence];

    pub const fn raw(self) -> u64 {
        match self {
            Self::SyncFd => property::HANDLE_SYNC_FD,
            Self::OpaqueFd => property::HANDLE_OPAQUE_FD,
            Self::OpaqueWin32 => property::HANDLE_OPAQUE_WIN32,
            Self::OpaqueWin32Kmt => property::HANDLE_OPAQUE_WIN32_KMT,
            Self::D3d12Fence => property::HANDLE_D3D12_FENCE,
        }
    }

    pub const fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            property::HANDLE_SYNC_FD => Some(Self::SyncFd),
            property::HANDLE_OPAQUE_FD => Some(Self::OpaqueFd),
            property::HANDLE_OPAQUE_WIN32 => Some(Self::OpaqueWin32),
            property::HANDLE_OPAQUE_WIN32_KMT => Some(Self::OpaqueWin32Kmt),
            property::HANDLE_D3D12_FENCE => Some(Self::D3d12Fence),
            _ => None,
        }
    }

    /// Extension string a device must advertise to support this handle type.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::SyncFd => "cl_khr_external_semaphore_sync_fd",
            Self::OpaqueFd => "cl_khr_external_semaphore_opaque_fd",
            Self::OpaqueWin32 | Self::OpaqueWin32Kmt => "cl_khr_external_semaphore_win32",
            Self::D3d12Fence => "cl_khr_external_semaphore_dx_fence",
        }
    }

    /// Whether handles of this type are POSIX file descriptors.
    pub const fn is_fd(self) -> bool {
        matches!(self, Self::SyncFd | Self::OpaqueFd)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SyncFd => "sync-fd",
            Self::OpaqueFd => "opaque-fd",
            Self::OpaqueWin32 => "opaque-win32",
            Self::OpaqueWin32Kmt => "opaque-win32-kmt",
            Self::D3d12Fence => "d3d12-fence",
        }
    }
}

impl fmt::Display for ExternalHandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExternalHandleType {
    type Err = ClError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or(ClError::InvalidValue)
    }
}

/// The OS-level primitive behind an exported handle.
///
/// Its validity window is owned by the OS; the verifier only records it and
/// passes it back on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawHandle {
    Fd(i32),
    Win32(usize),
}

impl RawHandle {
    pub const fn is_valid(self) -> bool {
        match self {
            Self::Fd(fd) => fd >= 0,
            Self::Win32(h) => h != 0,
        }
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fd(fd) => write!(f, "fd {fd}"),
            Self::Win32(h) => write!(f, "handle {h:#x}"),
        }
    }
}

/// An exported semaphore handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalHandle {
    pub handle_type: ExternalHandleType,
    pub raw: RawHandle,
}

/// One entry of a semaphore creation property list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemaphoreProperty {
    Type(SemaphoreType),
    ExportHandleTypes(Vec<ExternalHandleType>),
    Import(ExternalHandle),
    DeviceHandleList(Vec<DeviceId>),
    /// Untyped `<name, value>` pair, passed through verbatim.
    Raw { name: u64, value: u64 },
}

/// Ordered semaphore creation property list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SemaphoreProperties(Vec<SemaphoreProperty>);

impl SemaphoreProperties {
    /// An empty property list (invalid for creation on its own).
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// `{ type: binary }`.
    pub fn binary() -> Self {
        Self(vec![SemaphoreProperty::Type(SemaphoreType::Binary)])
    }

    #[must_use]
    pub fn with(mut self, property: SemaphoreProperty) -> Self {
        self.0.push(property);
        self
    }

    #[must_use]
    pub fn export_handle_types(self, types: impl IntoIterator<Item = ExternalHandleType>) -> Self {
        self.with(SemaphoreProperty::ExportHandleTypes(types.into_iter().collect()))
    }

    #[must_use]
    pub fn import(self, handle: ExternalHandle) -> Self {
        self.with(SemaphoreProperty::Import(handle))
    }

    #[must_use]
    pub fn device_handle_list(self, devices: impl IntoIterator<Item = DeviceId>) -> Self {
        self.with(SemaphoreProperty::DeviceHandleList(devices.into_iter().collect()))
    }

    pub fn as_slice(&self) -> &[SemaphoreProperty] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SemaphoreProperty> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First export handle type list, if present.
    pub fn export_types(&self) -> &[ExternalHandleType] {
        self.0
            .iter()
            .find_map(|p| match p {
                SemaphoreProperty::ExportHandleTypes(types) => Some(types.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn import_handle(&self) -> Option<ExternalHandle> {
        self.0.iter().find_map(|p| match p {
            SemaphoreProperty::Import(handle) => Some(*handle),
            _ => None,
        })
    }

    pub fn device_list(&self) -> Option<&[DeviceId]> {
        self.0.iter().find_map(|p| match p {
            SemaphoreProperty::DeviceHandleList(devices) => Some(devices.as_slice()),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a SemaphoreProperties {
    type Item = &'a SemaphoreProperty;
    type IntoIter = std::slice::Iter<'a, SemaphoreProperty>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Snapshot returned by a semaphore info query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemaphoreInfo {
    pub context: ContextId,
    pub semaphore_type: SemaphoreType,
    pub reference_count: u32,
    /// Properties echoed back exactly as passed at creation.
    pub properties: SemaphoreProperties,
    /// `0` unsignaled, `1` signaled.
    pub payload: u64,
    pub device_handle_list: Vec<DeviceId>,
    pub export_handle_types: Vec<ExternalHandleType>,
}

// ── Devices ──────────────────────────────────────────────────────────────────

/// Device description reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub extensions: Vec<String>,
    pub semaphore_import_handle_types: Vec<ExternalHandleType>,
    pub semaphore_export_handle_types: Vec<ExternalHandleType>,
    pub out_of_order_supported: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_follows_progress() {
        use ExecutionStatus::*;
        assert!(Queued < Submitted);
        assert!(Submitted < Ready);
        assert!(Ready < Running);
        assert!(Running < Complete);
        assert!(Terminated(-5) < Queued);
        assert!(Terminated(-5) < Complete);
    }

    #[test]
    fn terminated_never_reaches_a_threshold() {
        let t = ExecutionStatus::Terminated(-14);
        assert!(!t.has_reached(ExecutionStatus::Queued));
        assert!(t.is_terminal());
        assert!(!t.is_in_progress());
    }

    #[test]
    fn has_reached_is_inclusive() {
        assert!(ExecutionStatus::Running.has_reached(ExecutionStatus::Running));
        assert!(ExecutionStatus::Complete.has_reached(ExecutionStatus::Submitted));
        assert!(!ExecutionStatus::Submitted.has_reached(ExecutionStatus::Running));
    }

    #[test]
    fn handle_type_parse_and_raw() {
        for t in ExternalHandleType::ALL {
            assert_eq!(t.name().parse::<ExternalHandleType>().unwrap(), t);
            assert_eq!(ExternalHandleType::from_raw(t.raw()), Some(t));
        }
        assert!("carrier-pigeon".parse::<ExternalHandleType>().is_err());
        assert_eq!(ExternalHandleType::from_raw(0xdead), None);
    }

    #[test]
    fn property_accessors() {
        let handle = ExternalHandle { handle_type: ExternalHandleType::SyncFd, raw: RawHandle::Fd(7) };
        let props = SemaphoreProperties::binary()
            .export_handle_types([ExternalHandleType::OpaqueFd])
            .device_handle_list([DeviceId(1)])
            .import(handle);
        assert_eq!(props.len(), 4);
        assert_eq!(props.export_types(), &[ExternalHandleType::OpaqueFd]);
        assert_eq!(props.device_list(), Some(&[DeviceId(1)][..]));
        assert_eq!(props.import_handle(), Some(handle));
        assert!(SemaphoreProperties::new().is_empty());
    }

    #[test]
    fn raw_handle_validity() {
        assert!(RawHandle::Fd(0).is_valid());
        assert!(!RawHandle::Fd(-1).is_valid());
        assert!(!RawHandle::Win32(0).is_valid());
    }

    #[test]
    fn ids_display_with_label() {
        assert_eq!(EventId(12).to_string(), "event#12");
        assert_eq!(DeviceId(0).to_string(), "device#0");
    }
}
