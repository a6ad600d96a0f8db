//! End-to-end tests of the `semacheck` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn semacheck() -> Command {
    let mut cmd = Command::cargo_bin("semacheck").unwrap();
    for (key, _) in std::env::vars() {
        if key.starts_with("SEMACHECK_") {
            cmd.env_remove(key);
        }
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

/// A config file with a fast simulated device and short deadlines.
fn fast_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("semacheck.toml");
    fs::write(
        &path,
        r#"
[run]
poll_timeout_ms = 2000
finish_timeout_ms = 2000
settle_delay_ms = 10
reuse_loop_count = 3

[device]
step_delay_us = 0
idle_tick_us = 100
"#,
    )
    .unwrap();
    path
}

#[test]
fn list_prints_scenarios() {
    semacheck()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("simple_signal_wait"))
        .stdout(predicate::str::contains("order_3"))
        .stdout(predicate::str::contains("invalid_enqueue_command_queue"));
}

#[test]
fn info_prints_every_device() {
    semacheck()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("device#0"))
        .stdout(predicate::str::contains("device#1"))
        .stdout(predicate::str::contains("Semaphores:      true"));
}

#[test]
fn passing_run_exits_zero() {
    let dir = TempDir::new().unwrap();
    semacheck()
        .args(["--config"])
        .arg(fast_config(&dir))
        .args(["run", "--filter", "order_"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("[PASS] in_order_completion"))
        .stdout(predicate::str::contains("Total: 4 | Passed: 4 | Failed: 0"));
}

#[test]
fn failing_run_exits_one() {
    let dir = TempDir::new().unwrap();
    semacheck()
        .arg("--config")
        .arg(fast_config(&dir))
        .args(["run", "--filter", "simple_signal_wait", "--quirk", "wait-keeps-payload"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[FAIL] simple_signal_wait"));
}

#[test]
fn json_report_is_parseable() {
    let dir = TempDir::new().unwrap();
    let output = semacheck()
        .arg("--config")
        .arg(fast_config(&dir))
        .args(["run", "--filter", "queries_", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> =
        json["outcomes"].as_array().unwrap().iter().map(|o| o["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["queries_device_list", "queries_multi_device"]);
    assert_eq!(json["outcomes"][1]["verdict"], "pass");
}

#[test]
fn unknown_format_lists_the_accepted_ones() {
    semacheck()
        .args(["run", "--format", "yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("text, json"));
}

#[test]
fn unknown_quirk_is_a_usage_error() {
    semacheck().args(["run", "--quirk", "flaky"]).assert().code(2);
}

#[test]
fn unknown_device_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    semacheck()
        .arg("--config")
        .arg(fast_config(&dir))
        .args(["run", "--device", "9"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("device 9"));
}

#[test]
fn malformed_config_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[run]\npoll_timeout_ms = \"soon\"\n").unwrap();
    semacheck().arg("--config").arg(&path).arg("list").assert().code(2);
}

#[test]
fn config_prints_merged_values() {
    let dir = TempDir::new().unwrap();
    semacheck()
        .arg("--config")
        .arg(fast_config(&dir))
        .arg("config")
        .env("SEMACHECK_FAIL_FAST", "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("poll_timeout_ms = 2000"))
        .stdout(predicate::str::contains("fail_fast = true"))
        .stdout(predicate::str::contains("[device]"));
}

#[test]
fn environment_overrides_file_with_default_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("semacheck.toml");
    fs::write(&path, "[run]\nfail_fast = true\npoll_timeout_ms = 500\n").unwrap();
    semacheck()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .env("SEMACHECK_FAIL_FAST", "false")
        .env("SEMACHECK_POLL_TIMEOUT_MS", "10000")
        .assert()
        .success()
        .stdout(predicate::str::contains("fail_fast = false"))
        .stdout(predicate::str::contains("poll_timeout_ms = 10000"));
}

#[test]
fn flags_override_file_timeouts() {
    let dir = TempDir::new().unwrap();
    semacheck()
        .arg("--config")
        .arg(fast_config(&dir))
        .args(["run", "--filter", "queries_device_list", "--poll-timeout-ms", "500"])
        .assert()
        .success();
}
