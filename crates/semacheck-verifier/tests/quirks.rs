//! Each non-conformant driver behaviour is caught by the scenario aimed at it.

use std::sync::Arc;

use semacheck_runtime::{DeviceId, SharedRuntime};
use semacheck_sim::{DriverQuirk, SimDeviceConfig, SimRuntime};
use semacheck_verifier::scenarios::find;
use semacheck_verifier::{DeviceCapabilities, Harness, RunConfiguration, Verdict};

fn quirky_runtime(quirk: DriverQuirk) -> SharedRuntime {
    let config = SimDeviceConfig { step_delay_us: 0, idle_tick_us: 100, ..Default::default() }
        .with_quirks([quirk]);
    Arc::new(SimRuntime::new(config).unwrap())
}

fn short_deadlines() -> RunConfiguration {
    RunConfiguration {
        poll_timeout_ms: 300,
        finish_timeout_ms: 300,
        settle_delay_ms: 20,
        reuse_loop_count: 3,
        buffer_elements: 16,
        ..Default::default()
    }
}

fn verdict_under(quirk: DriverQuirk, scenario: &str) -> Verdict {
    let rt = quirky_runtime(quirk);
    let caps = DeviceCapabilities::query(rt.as_ref(), DeviceId(0)).unwrap();
    let harness = Harness::new(rt, DeviceId(0), short_deadlines());
    let scenario = find(scenario).unwrap();
    harness.run_scenario(scenario, &caps).verdict
}

fn assert_fails(quirk: DriverQuirk, scenario: &str) {
    let verdict = verdict_under(quirk, scenario);
    assert!(verdict.is_failure(), "{scenario} under {quirk}: expected failure, got {verdict:?}");
}

#[test]
fn signal_waiting_for_prior_commands_is_caught() {
    assert_fails(DriverQuirk::SignalWaitsForPriorCommands, "no_implicit_dependency");
}

#[test]
fn wait_without_signal_is_caught() {
    assert_fails(DriverQuirk::WaitIgnoresPayload, "wait_blocks_until_signal");
}

#[test]
fn multi_wait_released_by_one_signal_is_caught() {
    assert_fails(DriverQuirk::WaitIgnoresPayload, "multi_wait");
}

#[test]
fn wait_not_consuming_payload_is_caught() {
    assert_fails(DriverQuirk::WaitKeepsPayload, "simple_signal_wait");
}

#[test]
fn signal_skipping_dependencies_is_caught() {
    assert_fails(DriverQuirk::SignalIgnoresDependencies, "order_3");
}

#[test]
fn terminated_signal_is_caught() {
    assert_fails(DriverQuirk::TerminateSignals, "cross_queues_io");
}

#[test]
fn stalled_dependents_are_caught() {
    assert_fails(DriverQuirk::StallDependentCommands, "reuse");
}

#[test]
fn quirks_leave_negative_scenarios_alone() {
    for quirk in DriverQuirk::ALL {
        assert_eq!(verdict_under(quirk, "invalid_create_value"), Verdict::Pass, "{quirk}");
    }
}

#[test]
fn fail_fast_stops_after_first_failure() {
    let config = RunConfiguration { fail_fast: true, ..short_deadlines() };
    let harness = Harness::new(quirky_runtime(DriverQuirk::WaitKeepsPayload), DeviceId(0), config);
    let report = harness.run().unwrap();

    assert_eq!(report.failed(), 1);
    let last = report.outcomes.last().unwrap();
    assert_eq!(last.name, "simple_signal_wait");
    assert!(!report.is_success());
}
