//! Every registered scenario against the conformant reference device.

use std::sync::Arc;

use semacheck_runtime::{DeviceId, SharedRuntime};
use semacheck_sim::{SimDeviceConfig, SimRuntime};
use semacheck_verifier::{Harness, RunConfiguration, Verdict, registry};

fn reference_runtime() -> SharedRuntime {
    let config = SimDeviceConfig { step_delay_us: 0, idle_tick_us: 100, ..Default::default() };
    Arc::new(SimRuntime::new(config).unwrap())
}

fn run_config() -> RunConfiguration {
    RunConfiguration {
        poll_timeout_ms: 5_000,
        finish_timeout_ms: 5_000,
        settle_delay_ms: 20,
        reuse_loop_count: 4,
        buffer_elements: 64,
        ..Default::default()
    }
}

#[test]
fn every_scenario_passes_on_reference_device() {
    let harness = Harness::new(reference_runtime(), DeviceId(0), run_config());
    let report = harness.run().unwrap();

    let failures: Vec<String> = report
        .outcomes
        .iter()
        .filter(|o| o.verdict != Verdict::Pass)
        .map(|o| format!("{}: {:?}", o.name, o.verdict))
        .collect();
    assert!(failures.is_empty(), "non-passing scenarios:\n{}", failures.join("\n"));
    assert_eq!(report.total(), registry().len());
    assert!(report.is_success());
}

#[test]
fn second_device_runs_the_same_scenarios() {
    let mut config = run_config();
    config.filter = Some("queries".into());
    let report = Harness::new(reference_runtime(), DeviceId(1), config).run().unwrap();

    assert_eq!(report.device.device, DeviceId(1));
    assert!(report.total() >= 3);
    assert_eq!(report.failed(), 0, "{report}");
}

#[test]
fn single_device_platform_skips_multi_device_scenarios() {
    let config = SimDeviceConfig { step_delay_us: 0, ..Default::default() }.with_device_count(1);
    let rt: SharedRuntime = Arc::new(SimRuntime::new(config).unwrap());
    let report = Harness::new(rt, DeviceId(0), run_config()).run().unwrap();

    let multi_device = [
        "queries_multi_device",
        "invalid_create_import_device",
        "invalid_create_multi_device",
        "invalid_enqueue_command_queue",
    ];
    for name in multi_device {
        let outcome = report.outcome(name).unwrap();
        assert!(matches!(outcome.verdict, Verdict::Skipped(_)), "{name}: {:?}", outcome.verdict);
    }
    assert!(report.is_success(), "{report}");
}

#[test]
fn reuse_handles_a_single_iteration() {
    let config = RunConfiguration {
        reuse_loop_count: 1,
        filter: Some("reuse".into()),
        ..run_config()
    };
    let report = Harness::new(reference_runtime(), DeviceId(0), config).run().unwrap();
    assert_eq!(report.outcome("reuse").unwrap().verdict, Verdict::Pass);
}

#[test]
fn unsatisfiable_wait_terminates_on_reference_device() {
    let config = RunConfiguration { filter: Some("invalid_command".into()), ..run_config() };
    let report = Harness::new(reference_runtime(), DeviceId(0), config).run().unwrap();
    assert_eq!(report.total(), 1);
    assert_eq!(report.outcome("invalid_command").unwrap().verdict, Verdict::Pass);
}
