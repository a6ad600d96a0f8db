//! CLI configuration: the `[run]` and `[device]` tables of one TOML file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use semacheck_sim::SimDeviceConfig;
use semacheck_verifier::{RunConfiguration, RunOverrides};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Everything the binary reads from its configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub run: RunConfiguration,
    pub device: SimDeviceConfig,
}

impl CliConfig {
    /// Parse both tables from `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("config file not found: {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// File (when given) with `SEMACHECK_*` variables layered on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env = RunOverrides::from_env().context("Invalid SEMACHECK_* variable")?;
        Self::layered(path, &env)
    }

    /// File (when given) with `overrides` layered on top.
    pub fn layered(path: Option<&Path>, overrides: &RunOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &RunOverrides) {
        self.run = self.run.merge_with(overrides);
    }

    pub fn validate(&self) -> Result<()> {
        self.run.validate().context("Invalid [run] configuration")?;
        self.device.validate().context("Invalid [device] configuration")?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semacheck_sim::DriverQuirk;
    use tempfile::TempDir;

    #[test]
    fn reads_both_tables() {
        let text = r#"
[run]
poll_timeout_ms = 1200
filter = "order_"

[device]
device_count = 1
quirks = ["wait-keeps-payload"]
"#;
        let cfg = CliConfig::from_toml_str(text).unwrap();
        assert_eq!(cfg.run.poll_timeout_ms, 1200);
        assert_eq!(cfg.run.filter.as_deref(), Some("order_"));
        assert_eq!(cfg.run.finish_timeout_ms, RunConfiguration::default().finish_timeout_ms);
        assert_eq!(cfg.device.device_count, 1);
        assert_eq!(cfg.device.quirks, [DriverQuirk::WaitKeepsPayload]);
        cfg.validate().unwrap();
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(CliConfig::from_toml_str("").unwrap(), CliConfig::default());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut cfg = CliConfig::default();
        cfg.run.reuse_loop_count = 3;
        cfg.device.quirks.push(DriverQuirk::TerminateSignals);
        let text = cfg.to_toml().unwrap();
        assert_eq!(CliConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn invalid_device_table_fails_validation() {
        let cfg = CliConfig::from_toml_str("[device]\ndevice_count = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn file_round_trips_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semacheck.toml");
        let mut cfg = CliConfig::default();
        cfg.run.poll_timeout_ms = 0;
        cfg.run.filter = Some("multi_signal".into());
        fs::write(&path, cfg.to_toml().unwrap()).unwrap();

        let loaded = CliConfig::from_file(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.run.poll_timeout(), None);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = CliConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, CliConfig::default());
    }

    #[test]
    fn overrides_beat_file_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semacheck.toml");
        fs::write(&path, "[run]\npoll_timeout_ms = 500\nfail_fast = true\nsettle_delay_ms = 5\n")
            .unwrap();
        let overrides = RunOverrides {
            poll_timeout_ms: Some(10_000),
            fail_fast: Some(false),
            ..Default::default()
        };

        let cfg = CliConfig::layered(Some(&path), &overrides).unwrap();
        assert_eq!(cfg.run.poll_timeout_ms, 10_000);
        assert!(!cfg.run.fail_fast);
        assert_eq!(cfg.run.settle_delay_ms, 5);
    }
}
