//! Sequential scenario runner and its report.

use std::fmt;
use std::time::Instant;

use semacheck_runtime::{ClError, Context, DeviceId, SharedRuntime};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capabilities::DeviceCapabilities;
use crate::config::RunConfiguration;
use crate::error::{ScenarioError, ScenarioResult};
use crate::scenarios::{self, Scenario, ScenarioEnv};

// ── Verdict ──────────────────────────────────────────────────────────────────

/// How one scenario ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail(String),
    Skipped(String),
}

impl Verdict {
    pub fn from_result(result: &ScenarioResult) -> Self {
        match result {
            Ok(()) => Self::Pass,
            Err(ScenarioError::Skipped(reason)) => Self::Skipped(reason.clone()),
            Err(err) => Self::Fail(err.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail(_) => "FAIL",
            Self::Skipped(_) => "SKIP",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub duration_ms: u64,
}

// ── RunReport ────────────────────────────────────────────────────────────────

/// Aggregated outcome of one run on one device.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub device: DeviceCapabilities,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&Verdict) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.verdict)).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.count(|v| *v == Verdict::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(Verdict::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Skipped(_)))
    }

    /// No scenario failed; skips do not count against the run.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, name: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Semaphore Conformance Report ===")?;
        writeln!(f, "Device: {} ({})", self.device.name, self.device.device)?;
        for outcome in &self.outcomes {
            write!(
                f,
                "  [{}] {:<32} {:>6} ms",
                outcome.verdict.label(),
                outcome.name,
                outcome.duration_ms
            )?;
            match &outcome.verdict {
                Verdict::Pass => writeln!(f)?,
                Verdict::Fail(msg) => writeln!(f, "  ERROR: {msg}")?,
                Verdict::Skipped(reason) => writeln!(f, "  ({reason})")?,
            }
        }
        writeln!(
            f,
            "Total: {} | Passed: {} | Failed: {} | Skipped: {}",
            self.total(),
            self.passed(),
            self.failed(),
            self.skipped(),
        )
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

/// Runs the selected scenarios on one device.
pub struct Harness {
    runtime: SharedRuntime,
    device: DeviceId,
    config: RunConfiguration,
}

impl Harness {
    pub fn new(runtime: SharedRuntime, device: DeviceId, config: RunConfiguration) -> Self {
        Self { runtime, device, config }
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Registered scenarios accepted by the configured filter, in order.
    pub fn select(&self) -> Vec<&'static Scenario> {
        scenarios::registry().iter().filter(|s| self.config.selects(s.name)).collect()
    }

    /// Run every selected scenario.
    ///
    /// Fails only when the device itself cannot be queried; scenario
    /// failures are reported in the returned [`RunReport`].
    pub fn run(&self) -> Result<RunReport, ClError> {
        let caps = DeviceCapabilities::query(self.runtime.as_ref(), self.device)?;
        let selected = self.select();
        info!(device = %self.device, name = %caps.name, scenarios = selected.len(), "starting run");

        let mut outcomes = Vec::with_capacity(selected.len());
        for scenario in selected {
            let outcome = self.run_scenario(scenario, &caps);
            let stop = self.config.fail_fast && outcome.verdict.is_failure();
            outcomes.push(outcome);
            if stop {
                warn!(scenario = scenario.name, "stopping after first failure");
                break;
            }
        }

        let report = RunReport { device: caps, outcomes };
        info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "run finished"
        );
        Ok(report)
    }

    /// Run one scenario in a fresh context.
    pub fn run_scenario(&self, scenario: &Scenario, caps: &DeviceCapabilities) -> ScenarioOutcome {
        debug!(scenario = scenario.name, "running");
        let start = Instant::now();
        let result = self.execute(scenario, caps);
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let verdict = Verdict::from_result(&result);
        match &verdict {
            Verdict::Pass => info!(scenario = scenario.name, duration_ms, "passed"),
            Verdict::Skipped(reason) => info!(scenario = scenario.name, %reason, "skipped"),
            Verdict::Fail(msg) => warn!(scenario = scenario.name, error = %msg, "failed"),
        }
        ScenarioOutcome {
            name: scenario.name.to_string(),
            description: scenario.description.to_string(),
            verdict,
            duration_ms,
        }
    }

    fn execute(&self, scenario: &Scenario, caps: &DeviceCapabilities) -> ScenarioResult {
        let context = Context::create(&self.runtime, &[self.device])
            .map_err(|source| ScenarioError::Cl { what: "create context".into(), source })?;
        let env = ScenarioEnv {
            runtime: &self.runtime,
            device: self.device,
            caps,
            context: &context,
            config: &self.config,
        };
        (scenario.run)(&env)
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("device", &self.device)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, verdict: Verdict) -> ScenarioOutcome {
        ScenarioOutcome {
            name: name.into(),
            description: String::new(),
            verdict,
            duration_ms: 3,
        }
    }

    fn report(outcomes: Vec<ScenarioOutcome>) -> RunReport {
        RunReport {
            device: DeviceCapabilities {
                device: DeviceId(0),
                name: "test device".into(),
                vendor: "test".into(),
                version: "OpenCL 3.0".into(),
                extensions: Vec::new(),
                import_handle_types: Vec::new(),
                export_handle_types: Vec::new(),
                out_of_order: true,
            },
            outcomes,
        }
    }

    #[test]
    fn skips_do_not_fail_the_run() {
        let r = report(vec![
            outcome("a", Verdict::Pass),
            outcome("b", Verdict::Skipped("no extension".into())),
        ]);
        assert_eq!((r.total(), r.passed(), r.failed(), r.skipped()), (2, 1, 0, 1));
        assert!(r.is_success());
    }

    #[test]
    fn display_lists_failure_message() {
        let r = report(vec![outcome("order_3", Verdict::Fail("wait 2 did not complete".into()))]);
        let text = r.to_string();
        assert!(text.contains("[FAIL] order_3"));
        assert!(text.contains("ERROR: wait 2 did not complete"));
        assert!(text.contains("Total: 1 | Passed: 0 | Failed: 1 | Skipped: 0"));
        assert!(!r.is_success());
    }

    #[test]
    fn verdict_serializes_flat() {
        let json = serde_json::to_value(outcome("a", Verdict::Skipped("why".into()))).unwrap();
        assert_eq!(json["verdict"], "skipped");
        assert_eq!(json["reason"], "why");
        assert_eq!(json["duration_ms"], 3);
    }

    #[test]
    fn verdict_from_scenario_error() {
        assert_eq!(Verdict::from_result(&Ok(())), Verdict::Pass);
        let skip: ScenarioResult = Err(ScenarioError::skipped("x"));
        assert_eq!(Verdict::from_result(&skip), Verdict::Skipped("x".into()));
        let fail: ScenarioResult = Err(ScenarioError::assertion("y"));
        assert_eq!(Verdict::from_result(&fail), Verdict::Fail("y".into()));
    }
}
