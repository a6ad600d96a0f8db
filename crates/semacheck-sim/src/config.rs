//! Simulated device configuration, read from the `[device]` TOML table.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use semacheck_runtime::ExternalHandleType;
use serde::{Deserialize, Serialize};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SimConfigError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown driver quirk: {0}")]
    UnknownQuirk(String),
}

// ── DriverQuirk ─────────────────────────────────────────────────────

/// A deliberate deviation from conformant behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverQuirk {
    /// Signals on out-of-order queues wait for every earlier command.
    SignalWaitsForPriorCommands,
    /// Waits complete without a signal.
    WaitIgnoresPayload,
    /// Waits leave the payload signaled.
    WaitKeepsPayload,
    /// Signals skip their dependency check.
    SignalIgnoresDependencies,
    /// Signal commands terminate instead of completing.
    TerminateSignals,
    /// Commands with an explicit wait list never leave `Ready`.
    StallDependentCommands,
}

impl DriverQuirk {
    pub const ALL: [Self; 6] = [
        Self::SignalWaitsForPriorCommands,
        Self::WaitIgnoresPayload,
        Self::WaitKeepsPayload,
        Self::SignalIgnoresDependencies,
        Self::TerminateSignals,
        Self::StallDependentCommands,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::SignalWaitsForPriorCommands => "signal-waits-for-prior-commands",
            Self::WaitIgnoresPayload => "wait-ignores-payload",
            Self::WaitKeepsPayload => "wait-keeps-payload",
            Self::SignalIgnoresDependencies => "signal-ignores-dependencies",
            Self::TerminateSignals => "terminate-signals",
            Self::StallDependentCommands => "stall-dependent-commands",
        }
    }
}

impl fmt::Display for DriverQuirk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DriverQuirk {
    type Err = SimConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|q| q.name() == wanted)
            .ok_or_else(|| SimConfigError::UnknownQuirk(s.to_string()))
    }
}

// ── SimDeviceConfig ─────────────────────────────────────────────────

pub const SEMAPHORE_EXTENSION: &str = "cl_khr_semaphore";
pub const EXTERNAL_SEMAPHORE_EXTENSION: &str = "cl_khr_external_semaphore";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimDeviceConfig {
    pub device_count: u32,
    pub name: String,
    pub vendor: String,
    pub version: String,
    /// Extension strings every device advertises.
    pub extensions: Vec<String>,
    pub import_handle_types: Vec<ExternalHandleType>,
    pub export_handle_types: Vec<ExternalHandleType>,
    pub out_of_order: bool,
    /// Whether semaphore entry points are handed out at all.
    pub semaphore_entry_points: bool,
    /// Worker sleep while nothing can progress.
    pub idle_tick_us: u64,
    /// Worker pause after each pass that made progress.
    pub step_delay_us: u64,
    pub quirks: Vec<DriverQuirk>,
}

impl Default for SimDeviceConfig {
    fn default() -> Self {
        let handle_types = vec![ExternalHandleType::SyncFd, ExternalHandleType::OpaqueFd];
        Self {
            device_count: 2,
            name: "semacheck reference device".into(),
            vendor: "semacheck".into(),
            version: "OpenCL 3.0 semacheck-sim".into(),
            extensions: vec![
                SEMAPHORE_EXTENSION.into(),
                EXTERNAL_SEMAPHORE_EXTENSION.into(),
                ExternalHandleType::SyncFd.extension().into(),
                ExternalHandleType::OpaqueFd.extension().into(),
            ],
            import_handle_types: handle_types.clone(),
            export_handle_types: handle_types,
            out_of_order: true,
            semaphore_entry_points: true,
            idle_tick_us: 500,
            step_delay_us: 50,
            quirks: Vec::new(),
        }
    }
}

impl SimDeviceConfig {
    /// A device that advertises no semaphore support at all.
    pub fn without_semaphores() -> Self {
        Self {
            extensions: Vec::new(),
            import_handle_types: Vec::new(),
            export_handle_types: Vec::new(),
            semaphore_entry_points: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_quirks(mut self, quirks: impl IntoIterator<Item = DriverQuirk>) -> Self {
        for quirk in quirks {
            if !self.quirks.contains(&quirk) {
                self.quirks.push(quirk);
            }
        }
        self
    }

    #[must_use]
    pub fn with_device_count(mut self, device_count: u32) -> Self {
        self.device_count = device_count;
        self
    }

    pub fn has_quirk(&self, quirk: DriverQuirk) -> bool {
        self.quirks.contains(&quirk)
    }

    pub fn advertises(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_micros(self.idle_tick_us)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_micros(self.step_delay_us)
    }

    // ── Validation ──────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if self.device_count == 0 {
            return Err(SimConfigError::Validation("device_count must be >= 1".into()));
        }
        if self.idle_tick_us == 0 {
            return Err(SimConfigError::Validation("idle_tick_us must be > 0".into()));
        }
        let external = self.import_handle_types.iter().chain(&self.export_handle_types);
        for handle_type in external {
            if !self.advertises(EXTERNAL_SEMAPHORE_EXTENSION) {
                return Err(SimConfigError::Validation(format!(
                    "handle type {handle_type} requires {EXTERNAL_SEMAPHORE_EXTENSION}"
                )));
            }
            if !self.advertises(handle_type.extension()) {
                return Err(SimConfigError::Validation(format!(
                    "handle type {handle_type} requires extension {}",
                    handle_type.extension()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SimDeviceConfig::default().validate().is_ok());
        assert!(SimDeviceConfig::without_semaphores().validate().is_ok());
    }

    #[test]
    fn zero_devices_rejected() {
        let err = SimDeviceConfig::default().with_device_count(0).validate().unwrap_err();
        assert!(err.to_string().contains("device_count"));
    }

    #[test]
    fn handle_type_without_extension_rejected() {
        let cfg = SimDeviceConfig {
            export_handle_types: vec![ExternalHandleType::OpaqueWin32],
            ..SimDeviceConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("cl_khr_external_semaphore_win32"));
    }

    #[test]
    fn quirk_display_roundtrip() {
        for q in DriverQuirk::ALL {
            assert_eq!(q.to_string().parse::<DriverQuirk>().unwrap(), q);
        }
        assert_eq!("WAIT_KEEPS_PAYLOAD".parse::<DriverQuirk>().unwrap(), DriverQuirk::WaitKeepsPayload);
        assert!("flaky".parse::<DriverQuirk>().is_err());
    }

    #[test]
    fn with_quirks_deduplicates() {
        let cfg = SimDeviceConfig::default()
            .with_quirks([DriverQuirk::TerminateSignals, DriverQuirk::TerminateSignals]);
        assert_eq!(cfg.quirks, vec![DriverQuirk::TerminateSignals]);
        assert!(cfg.has_quirk(DriverQuirk::TerminateSignals));
    }

    #[test]
    fn device_table_parses() {
        let cfg: SimDeviceConfig = toml::from_str(
            r#"
            device_count = 3
            export_handle_types = ["sync-fd"]
            quirks = ["wait-keeps-payload"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.device_count, 3);
        assert_eq!(cfg.export_handle_types, vec![ExternalHandleType::SyncFd]);
        assert_eq!(cfg.quirks, vec![DriverQuirk::WaitKeepsPayload]);
        assert_eq!(cfg.vendor, "semacheck");
    }

    #[test]
    fn empty_table_is_default() {
        let cfg: SimDeviceConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, SimDeviceConfig::default());
    }
}
