//! Device capability report

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use semacheck_runtime::SharedRuntime;
use semacheck_verifier::{DeviceCapabilities, format_device_info};
use tracing::info;

/// Show the capabilities of every device
#[derive(Debug, Args)]
pub struct InfoCommand {}

impl InfoCommand {
    pub fn execute(&self, runtime: &SharedRuntime) -> Result<()> {
        let devices = runtime.devices().context("Failed to list devices")?;
        info!(count = devices.len(), "querying devices");

        println!("{}", style("semacheck device information").bold().cyan());
        for device in devices {
            let caps = DeviceCapabilities::query(runtime.as_ref(), device)
                .with_context(|| format!("Failed to query {device}"))?;
            println!();
            println!("{}", format_device_info(&caps));
        }
        Ok(())
    }
}
