//! `RunConfiguration` overrides from `SEMACHECK_*` variables.

use std::env;

use semacheck_verifier::{ConfigError, LogFormat, LogLevel, RunConfiguration, RunOverrides};
use serial_test::serial;

/// Restores an environment variable on drop.
struct EnvGuard {
    key: String,
    old: Option<String>,
}

impl EnvGuard {
    fn new(key: &str) -> Self {
        let old = env::var(key).ok();
        Self { key: key.to_string(), old }
    }

    fn clear(key: &str) -> Self {
        let guard = Self::new(key);
        unsafe {
            env::remove_var(key);
        }
        guard
    }

    fn set(&self, val: &str) {
        unsafe {
            env::set_var(&self.key, val);
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(ref v) = self.old {
                env::set_var(&self.key, v);
            } else {
                env::remove_var(&self.key);
            }
        }
    }
}

const KEYS: [&str; 9] = [
    "SEMACHECK_POLL_TIMEOUT_MS",
    "SEMACHECK_FINISH_TIMEOUT_MS",
    "SEMACHECK_SETTLE_DELAY_MS",
    "SEMACHECK_REUSE_LOOP_COUNT",
    "SEMACHECK_BUFFER_ELEMENTS",
    "SEMACHECK_FAIL_FAST",
    "SEMACHECK_FILTER",
    "SEMACHECK_LOG_LEVEL",
    "SEMACHECK_LOG_FORMAT",
];

fn clear_all() -> Vec<EnvGuard> {
    KEYS.iter().map(|k| EnvGuard::clear(k)).collect()
}

#[test]
#[serial(semacheck_env)]
fn empty_environment_gives_defaults() {
    let _guards = clear_all();
    assert_eq!(RunConfiguration::from_env().unwrap(), RunConfiguration::default());
}

#[test]
#[serial(semacheck_env)]
fn environment_overrides_fields() {
    let guards = clear_all();
    guards[0].set("250");
    guards[5].set("true");
    guards[6].set("order_");
    guards[7].set("debug");
    guards[8].set("json");

    let cfg = RunConfiguration::from_env().unwrap();
    assert_eq!(cfg.poll_timeout_ms, 250);
    assert!(cfg.fail_fast);
    assert_eq!(cfg.filter.as_deref(), Some("order_"));
    assert_eq!(cfg.log_level, LogLevel::Debug);
    assert_eq!(cfg.log_format, LogFormat::Json);
    assert_eq!(cfg.finish_timeout_ms, RunConfiguration::default().finish_timeout_ms);
}

#[test]
#[serial(semacheck_env)]
fn malformed_number_names_the_variable() {
    let guards = clear_all();
    guards[3].set("many");

    match RunConfiguration::from_env() {
        Err(ConfigError::InvalidEnvVar { key, value }) => {
            assert_eq!(key, "SEMACHECK_REUSE_LOOP_COUNT");
            assert_eq!(value, "many");
        }
        other => panic!("expected InvalidEnvVar, got {other:?}"),
    }
}

#[test]
#[serial(semacheck_env)]
fn unknown_log_level_is_rejected() {
    let guards = clear_all();
    guards[7].set("chatty");
    assert!(matches!(RunConfiguration::from_env(), Err(ConfigError::InvalidLogLevel(_))));
}

#[test]
#[serial(semacheck_env)]
fn unset_variables_produce_no_overrides() {
    let _guards = clear_all();
    assert!(RunOverrides::from_env().unwrap().is_empty());
}

#[test]
#[serial(semacheck_env)]
fn empty_filter_counts_as_unset() {
    let guards = clear_all();
    guards[6].set("");
    assert_eq!(RunOverrides::from_env().unwrap().filter, None);
}

#[test]
#[serial(semacheck_env)]
fn environment_beats_file_even_at_default_values() {
    let guards = clear_all();
    guards[0].set("10000");
    guards[5].set("false");

    let file = RunConfiguration {
        poll_timeout_ms: 500,
        finish_timeout_ms: 900,
        fail_fast: true,
        ..Default::default()
    };
    let merged = file.merge_with(&RunOverrides::from_env().unwrap());

    assert_eq!(merged.poll_timeout_ms, 10_000);
    assert!(!merged.fail_fast);
    assert_eq!(merged.finish_timeout_ms, 900);
    merged.validate().unwrap();
}
