//! Semaphore dependency and completion-polling conformance scenarios.
//!
//! - [`capabilities`]: per-device capability negotiation and the resolved
//!   semaphore function table
//! - [`poll`]: the deferred dependency poller waiting for a signal to become
//!   pending
//! - [`scenarios`]: the scenario registry and the environment each scenario
//!   runs in
//! - [`harness`]: sequential runner producing a [`RunReport`]
//! - [`config`]: [`RunConfiguration`] loaded from TOML and the environment

pub mod assertions;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod harness;
pub mod poll;
pub mod scenarios;

pub use capabilities::{DeviceCapabilities, SemaphoreFunctions, SemaphoreOp, format_device_info};
pub use config::{ConfigError, LogFormat, LogLevel, RunConfiguration, RunOverrides};
pub use error::{ClResultExt, PollError, ScenarioError, ScenarioResult};
pub use harness::{Harness, RunReport, ScenarioOutcome, Verdict};
pub use poll::{PendingSignalPoller, StatusSource, has_pending_dependencies, select_threshold};
pub use scenarios::{Scenario, ScenarioEnv, registry};
