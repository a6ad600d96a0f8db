//! Run configuration and its `SEMACHECK_*` environment overrides.
//!
//! Precedence is defaults < `[run]` table of the binary's TOML file <
//! `SEMACHECK_*` environment variables < command-line flags. Every layer above
//! the file is a [`RunOverrides`] applied with [`RunConfiguration::merge_with`],
//! so a layer overrides exactly the fields it sets.

use std::time::Duration;
use std::{env, fmt};

use serde::{Deserialize, Serialize};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("invalid environment variable value for {key}: {value}")]
    InvalidEnvVar { key: String, value: String },
}

// ── LogLevel ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }
}

// ── LogFormat ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

// ── RunConfiguration ────────────────────────────────────────────────

/// Settings shared by every scenario of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    /// Deadline of the pending-signal poller; `0` polls without a deadline.
    pub poll_timeout_ms: u64,
    /// Deadline of blocking finish and wait calls; `0` blocks indefinitely.
    pub finish_timeout_ms: u64,
    /// Pause after a flush before asserting that a command is still pending.
    pub settle_delay_ms: u64,
    pub reuse_loop_count: usize,
    pub buffer_elements: usize,
    pub fail_fast: bool,
    /// Only run scenarios whose name contains this substring.
    pub filter: Option<String>,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 10_000,
            finish_timeout_ms: 30_000,
            settle_delay_ms: 50,
            reuse_loop_count: 10,
            buffer_elements: 256,
            fail_fast: false,
            filter: None,
            log_level: LogLevel::Warn,
            log_format: LogFormat::Pretty,
        }
    }
}

impl RunConfiguration {
    /// `Self::default()` with the `SEMACHECK_*` variables applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::default().merge_with(&RunOverrides::from_env()?))
    }

    // ── Derived values ──────────────────────────────────────────

    pub fn poll_timeout(&self) -> Option<Duration> {
        bounded(self.poll_timeout_ms)
    }

    pub fn finish_timeout(&self) -> Option<Duration> {
        bounded(self.finish_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Whether `name` passes the configured filter.
    pub fn selects(&self, name: &str) -> bool {
        self.filter.as_deref().is_none_or(|f| name.contains(f))
    }

    // ── Validation ──────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reuse_loop_count == 0 {
            return Err(ConfigError::Validation("reuse_loop_count must be >= 1".into()));
        }
        if self.buffer_elements == 0 {
            return Err(ConfigError::Validation("buffer_elements must be >= 1".into()));
        }
        if self.finish_timeout_ms != 0 && self.settle_delay_ms >= self.finish_timeout_ms {
            return Err(ConfigError::Validation(
                "settle_delay_ms must be shorter than finish_timeout_ms".into(),
            ));
        }
        Ok(())
    }

    // ── Merge ───────────────────────────────────────────────────

    /// Apply every field `overrides` sets on top of `self`.
    #[must_use]
    pub fn merge_with(&self, overrides: &RunOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(ms) = overrides.poll_timeout_ms {
            merged.poll_timeout_ms = ms;
        }
        if let Some(ms) = overrides.finish_timeout_ms {
            merged.finish_timeout_ms = ms;
        }
        if let Some(ms) = overrides.settle_delay_ms {
            merged.settle_delay_ms = ms;
        }
        if let Some(count) = overrides.reuse_loop_count {
            merged.reuse_loop_count = count;
        }
        if let Some(elements) = overrides.buffer_elements {
            merged.buffer_elements = elements;
        }
        if let Some(fail_fast) = overrides.fail_fast {
            merged.fail_fast = fail_fast;
        }
        if let Some(filter) = &overrides.filter {
            merged.filter = Some(filter.clone());
        }
        if let Some(level) = overrides.log_level {
            merged.log_level = level;
        }
        if let Some(format) = overrides.log_format {
            merged.log_format = format;
        }
        merged
    }
}

// ── RunOverrides ────────────────────────────────────────────────────

/// A partial [`RunConfiguration`]: `None` leaves the underlying value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub poll_timeout_ms: Option<u64>,
    pub finish_timeout_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub reuse_loop_count: Option<usize>,
    pub buffer_elements: Option<usize>,
    pub fail_fast: Option<bool>,
    pub filter: Option<String>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
}

impl RunOverrides {
    /// Read every `SEMACHECK_*` variable that is set. An empty
    /// `SEMACHECK_FILTER` counts as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut o = Self::default();

        if let Ok(v) = env::var("SEMACHECK_POLL_TIMEOUT_MS") {
            o.poll_timeout_ms = Some(parse_env_u64("SEMACHECK_POLL_TIMEOUT_MS", &v)?);
        }
        if let Ok(v) = env::var("SEMACHECK_FINISH_TIMEOUT_MS") {
            o.finish_timeout_ms = Some(parse_env_u64("SEMACHECK_FINISH_TIMEOUT_MS", &v)?);
        }
        if let Ok(v) = env::var("SEMACHECK_SETTLE_DELAY_MS") {
            o.settle_delay_ms = Some(parse_env_u64("SEMACHECK_SETTLE_DELAY_MS", &v)?);
        }
        if let Ok(v) = env::var("SEMACHECK_REUSE_LOOP_COUNT") {
            o.reuse_loop_count = Some(parse_env_usize("SEMACHECK_REUSE_LOOP_COUNT", &v)?);
        }
        if let Ok(v) = env::var("SEMACHECK_BUFFER_ELEMENTS") {
            o.buffer_elements = Some(parse_env_usize("SEMACHECK_BUFFER_ELEMENTS", &v)?);
        }
        if let Ok(v) = env::var("SEMACHECK_FAIL_FAST") {
            o.fail_fast = Some(parse_env_bool("SEMACHECK_FAIL_FAST", &v)?);
        }
        if let Ok(v) = env::var("SEMACHECK_FILTER") {
            o.filter = Some(v).filter(|f| !f.is_empty());
        }
        if let Ok(v) = env::var("SEMACHECK_LOG_LEVEL") {
            o.log_level = Some(v.parse()?);
        }
        if let Ok(v) = env::var("SEMACHECK_LOG_FORMAT") {
            o.log_format = Some(v.parse()?);
        }

        Ok(o)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_env_usize(key: &str, val: &str) -> Result<usize, ConfigError> {
    val.parse::<usize>().map_err(|_| ConfigError::InvalidEnvVar {
        key: key.to_string(),
        value: val.to_string(),
    })
}

fn parse_env_u64(key: &str, val: &str) -> Result<u64, ConfigError> {
    val.parse::<u64>().map_err(|_| ConfigError::InvalidEnvVar {
        key: key.to_string(),
        value: val.to_string(),
    })
}

fn parse_env_bool(key: &str, val: &str) -> Result<bool, ConfigError> {
    match val.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvVar { key: key.to_string(), value: val.to_string() }),
    }
}
fn bounded(ms: u64) -> Option<Duration> {
    (ms != 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RunConfiguration::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.poll_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.reuse_loop_count, 10);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let cfg = RunConfiguration { poll_timeout_ms: 0, finish_timeout_ms: 0, ..Default::default() };
        assert_eq!(cfg.poll_timeout(), None);
        assert_eq!(cfg.finish_timeout(), None);
        cfg.validate().unwrap();
    }

    #[test]
    fn validation_rejects_degenerate_values() {
        let zero_loops = RunConfiguration { reuse_loop_count: 0, ..Default::default() };
        assert!(zero_loops.validate().is_err());
        let zero_buffer = RunConfiguration { buffer_elements: 0, ..Default::default() };
        assert!(zero_buffer.validate().is_err());
        let slow_settle =
            RunConfiguration { settle_delay_ms: 500, finish_timeout_ms: 500, ..Default::default() };
        let err = slow_settle.validate().unwrap_err();
        assert!(err.to_string().contains("settle_delay_ms"));
    }

    #[test]
    fn run_table_uses_defaults_for_missing_fields() {
        let cfg: RunConfiguration = toml::from_str("poll_timeout_ms = 0\nfilter = \"order\"\n").unwrap();
        assert_eq!(cfg.poll_timeout(), None);
        assert_eq!(cfg.filter.as_deref(), Some("order"));
        assert_eq!(cfg.finish_timeout_ms, RunConfiguration::default().finish_timeout_ms);
    }

    #[test]
    fn merge_applies_only_set_fields() {
        let base = RunConfiguration { settle_delay_ms: 5, filter: Some("a".into()), ..Default::default() };
        let overrides = RunOverrides { fail_fast: Some(true), ..Default::default() };
        let merged = base.merge_with(&overrides);
        assert_eq!(merged.settle_delay_ms, 5);
        assert!(merged.fail_fast);
        assert_eq!(merged.filter.as_deref(), Some("a"));
    }

    #[test]
    fn override_equal_to_default_still_wins() {
        let file = RunConfiguration { poll_timeout_ms: 500, fail_fast: true, ..Default::default() };
        let overrides = RunOverrides {
            poll_timeout_ms: Some(RunConfiguration::default().poll_timeout_ms),
            fail_fast: Some(false),
            log_level: Some(LogLevel::Warn),
            ..Default::default()
        };
        let merged = file.merge_with(&overrides);
        assert_eq!(merged.poll_timeout_ms, 10_000);
        assert!(!merged.fail_fast);
        assert_eq!(merged.log_level, LogLevel::Warn);
    }

    #[test]
    fn empty_overrides_change_nothing() {
        let base = RunConfiguration { reuse_loop_count: 2, ..Default::default() };
        assert!(RunOverrides::default().is_empty());
        assert_eq!(base.merge_with(&RunOverrides::default()), base);
    }

    #[test]
    fn filter_matches_substring() {
        let cfg = RunConfiguration { filter: Some("order".into()), ..Default::default() };
        assert!(cfg.selects("order_2"));
        assert!(!cfg.selects("reuse"));
        assert!(RunConfiguration::default().selects("anything"));
    }

    #[test]
    fn log_enums_parse_case_insensitively() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
