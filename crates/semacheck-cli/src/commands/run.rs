//! Scenario execution

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use semacheck_runtime::{DeviceId, SharedRuntime};
use semacheck_sim::{DriverQuirk, SimRuntime};
use semacheck_verifier::{Harness, RunOverrides, RunReport};
use tracing::info;

use crate::config::CliConfig;
use crate::exit::{EXIT_SCENARIO_FAIL, EXIT_SUCCESS};
use crate::render::ReportFormat;

/// Run the conformance scenarios against one device
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Only run scenarios whose name contains this substring
    #[arg(long, value_name = "SUBSTRING")]
    pub filter: Option<String>,

    /// Stop after the first failing scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Device index to test
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub device: u32,

    /// Inject a non-conformant driver behaviour (repeatable)
    #[arg(long = "quirk", value_name = "QUIRK")]
    pub quirks: Vec<DriverQuirk>,

    /// Report format
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Pending-signal poll deadline in milliseconds (0 = none)
    #[arg(long, value_name = "MS")]
    pub poll_timeout_ms: Option<u64>,

    /// Finish and wait deadline in milliseconds (0 = none)
    #[arg(long, value_name = "MS")]
    pub finish_timeout_ms: Option<u64>,
}

impl RunCommand {
    /// The `[run]` fields these flags set.
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            filter: self.filter.clone(),
            fail_fast: self.fail_fast.then_some(true),
            poll_timeout_ms: self.poll_timeout_ms,
            finish_timeout_ms: self.finish_timeout_ms,
            ..Default::default()
        }
    }

    /// Apply the flags on top of `config`.
    pub fn apply(&self, config: &mut CliConfig) {
        config.apply(&self.overrides());
        config.device = config.device.clone().with_quirks(self.quirks.iter().copied());
    }

    /// Returns the process exit code.
    pub fn execute(&self, config: &CliConfig) -> Result<i32> {
        let runtime: SharedRuntime = Arc::new(
            SimRuntime::new(config.device.clone()).context("Failed to start simulated device")?,
        );
        let harness = Harness::new(runtime, DeviceId(self.device), config.run.clone());
        info!(device = self.device, selected = harness.select().len(), "running scenarios");

        let report = harness
            .run()
            .with_context(|| format!("Failed to query device {}", self.device))?;
        self.print(&report)?;

        Ok(if report.is_success() { EXIT_SUCCESS } else { EXIT_SCENARIO_FAIL })
    }

    fn print(&self, report: &RunReport) -> Result<()> {
        println!("{}", self.format.render(report)?);
        Ok(())
    }
}
