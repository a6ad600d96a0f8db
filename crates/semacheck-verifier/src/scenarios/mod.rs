//! Conformance scenarios and their registry.
//!
//! Every scenario receives a [`ScenarioEnv`] holding the device under test,
//! its capabilities, a fresh context on that device and the run
//! configuration. Scenarios are plain functions; resources they create are
//! released by the handle wrappers on every exit path.

use std::thread;

use semacheck_runtime::{
    CommandQueue, Context, DeviceId, Event, QueueProperties, SharedRuntime, event_ids,
};
use tracing::debug;

use crate::capabilities::{DeviceCapabilities, SemaphoreFunctions};
use crate::config::RunConfiguration;
use crate::error::{ClResultExt, ScenarioError, ScenarioResult};
use crate::poll::PendingSignalPoller;

mod basic;
mod cross_queue;
mod external;
mod multi;
mod negative;
mod ordering;
mod queries;

// ── Environment ──────────────────────────────────────────────────────────────

/// Everything a scenario may use.
pub struct ScenarioEnv<'a> {
    pub runtime: &'a SharedRuntime,
    pub device: DeviceId,
    pub caps: &'a DeviceCapabilities,
    /// Fresh single-device context, owned by the harness.
    pub context: &'a Context,
    pub config: &'a RunConfiguration,
}

impl ScenarioEnv<'_> {
    pub fn semaphores(&self) -> ScenarioResult<SemaphoreFunctions> {
        SemaphoreFunctions::resolve(self.runtime.as_ref(), self.caps)
    }

    /// A queue on the device under test; `ordered` selects in-order execution.
    pub fn queue(&self, ordered: bool) -> ScenarioResult<CommandQueue> {
        self.queue_in(self.context, ordered)
    }

    pub fn queue_in(&self, context: &Context, ordered: bool) -> ScenarioResult<CommandQueue> {
        if !ordered && !self.caps.out_of_order {
            return Err(ScenarioError::skipped("out-of-order queues are not supported"));
        }
        context
            .create_queue(self.device, QueueProperties::ordered(ordered))
            .or_fail("create command queue")
    }

    /// Another single-device context on the device under test.
    pub fn extra_context(&self) -> ScenarioResult<Context> {
        Context::create(self.runtime, &[self.device]).or_fail("create second context")
    }

    /// A context over two devices, skipping when only one exists.
    pub fn multi_device_context(&self) -> ScenarioResult<Context> {
        let devices = self.runtime.devices().or_fail("list devices")?;
        if devices.len() < 2 {
            return Err(ScenarioError::skipped("at least two devices are required"));
        }
        let other = devices.iter().copied().find(|d| *d != self.device).unwrap_or(devices[1]);
        Context::create(self.runtime, &[self.device, other]).or_fail("create multi-device context")
    }

    pub fn user_event(&self) -> ScenarioResult<Event> {
        self.context.create_user_event().or_fail("create user event")
    }

    pub fn poller(&self) -> PendingSignalPoller {
        PendingSignalPoller::new(self.config.poll_timeout())
    }

    pub fn flush(&self, queue: &CommandQueue) -> ScenarioResult {
        queue.flush().or_fail("flush queue")
    }

    pub fn finish(&self, queue: &CommandQueue) -> ScenarioResult {
        queue.finish(self.config.finish_timeout()).or_fail_with(|| format!("finish {}", queue.id()))
    }

    /// Block until every event in `events` is complete.
    pub fn wait_for(&self, events: &[&Event]) -> ScenarioResult {
        self.runtime
            .wait_for_events(&event_ids(events), self.config.finish_timeout())
            .or_fail("wait for events")
    }

    /// Give the device a moment to make any progress it is going to make.
    pub fn settle(&self) {
        debug!(delay = ?self.config.settle_delay(), "settling");
        thread::sleep(self.config.settle_delay());
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

pub type ScenarioFn = fn(&ScenarioEnv<'_>) -> ScenarioResult;

/// One named conformance scenario.
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub run: ScenarioFn,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish_non_exhaustive()
    }
}

const fn scenario(name: &'static str, description: &'static str, run: ScenarioFn) -> Scenario {
    Scenario { name, description, run }
}

static SCENARIOS: &[Scenario] = &[
    // basic
    scenario("simple_signal_wait", "signal then wait on one queue completes", basic::simple_signal_wait),
    scenario(
        "no_implicit_dependency",
        "a signal without a wait list does not wait for earlier commands",
        basic::no_implicit_dependency,
    ),
    scenario(
        "wait_blocks_until_signal",
        "a wait stays pending until its semaphore is signaled",
        basic::wait_blocks_until_signal,
    ),
    scenario("reuse", "one semaphore cycled through chained signal/wait pairs", basic::reuse),
    scenario(
        "invalid_command",
        "a wait that can never be satisfied terminates along with its dependents",
        basic::invalid_command,
    ),
    scenario(
        "in_order_completion",
        "an in-order queue completes signal, wait and tasks in submission order",
        basic::in_order_completion,
    ),
    // cross queue
    scenario("cross_queues_io", "signal and wait on two in-order queues", cross_queue::cross_queues_io),
    scenario(
        "cross_queues_ooo",
        "signal and wait on two out-of-order queues",
        cross_queue::cross_queues_ooo,
    ),
    scenario(
        "ooo_ops_single_queue",
        "buffer producer and consumer ordered by a semaphore on one queue",
        cross_queue::ooo_ops_single_queue,
    ),
    scenario(
        "ooo_ops_cross_queue",
        "buffer producer and consumer ordered by a semaphore across queues",
        cross_queue::ooo_ops_cross_queue,
    ),
    // multi
    scenario("multi_signal", "one signal of two semaphores satisfies two waits", multi::multi_signal),
    scenario("multi_wait", "one wait of two semaphores needs both signals", multi::multi_wait),
    // ordering
    scenario("order_1", "a wait gated on a user event after its signal", ordering::order_1),
    scenario("order_2", "two gated signals and a gated wait released out of order", ordering::order_2),
    scenario("order_3", "signals and waits chained through user events and each other", ordering::order_3),
    // queries
    scenario("queries", "semaphore info, reference count and payload", queries::queries),
    scenario(
        "queries_device_list",
        "device handle list reported for a single-device context",
        queries::queries_device_list,
    ),
    scenario(
        "queries_multi_device",
        "device handle list required and reported in a multi-device context",
        queries::queries_multi_device,
    ),
    // external
    scenario(
        "import_export_fd",
        "signal an exported sync fd semaphore, wait on its import",
        external::import_export_fd,
    ),
    scenario(
        "cross_context",
        "signal in one context, wait in another through an exported handle",
        external::cross_context,
    ),
    scenario(
        "multiple_export",
        "one handle per advertised export type, other types rejected",
        external::multiple_export,
    ),
    scenario("no_re_export", "an imported semaphore cannot be exported", external::no_re_export),
    scenario("external_queries", "export handle types echoed by queries", external::external_queries),
    // negative
    scenario(
        "invalid_create_context",
        "semaphore creation in a released context",
        negative::invalid_create_context,
    ),
    scenario(
        "invalid_create_property",
        "semaphore creation with unknown or duplicated properties",
        negative::invalid_create_property,
    ),
    scenario(
        "invalid_create_value",
        "semaphore creation without a valid type",
        negative::invalid_create_value,
    ),
    scenario(
        "invalid_create_device",
        "semaphore creation with a bad device handle list",
        negative::invalid_create_device,
    ),
    scenario(
        "invalid_create_import_device",
        "import with a device list naming a device outside the context",
        negative::invalid_create_import_device,
    ),
    scenario(
        "invalid_create_multi_device",
        "semaphore creation in a multi-device context without a device list",
        negative::invalid_create_multi_device,
    ),
    scenario(
        "invalid_create_operation",
        "semaphore creation importing and exporting at once",
        negative::invalid_create_operation,
    ),
    scenario("invalid_enqueue_value", "signal and wait with an empty list", negative::invalid_enqueue_value),
    scenario(
        "invalid_enqueue_semaphore",
        "signal and wait on a released semaphore",
        negative::invalid_enqueue_semaphore,
    ),
    scenario(
        "invalid_enqueue_context",
        "signal and wait with a semaphore or event of another context",
        negative::invalid_enqueue_context,
    ),
    scenario(
        "invalid_enqueue_event_wait_list",
        "signal and wait with a released event in the wait list",
        negative::invalid_enqueue_event_wait_list,
    ),
    scenario(
        "invalid_enqueue_event_status",
        "signal and wait after a failed user event",
        negative::invalid_enqueue_event_status,
    ),
    scenario(
        "invalid_enqueue_command_queue",
        "signal and wait on a queue of a device outside the device list",
        negative::invalid_enqueue_command_queue,
    ),
];

/// Every scenario, in run order.
pub fn registry() -> &'static [Scenario] {
    SCENARIOS
}

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = registry().iter().map(|s| s.name).collect();
        assert_eq!(names.len(), registry().len());
    }

    #[test]
    fn find_by_name() {
        assert_eq!(find("order_2").map(|s| s.name), Some("order_2"));
        assert!(find("order_9").is_none());
    }
}
