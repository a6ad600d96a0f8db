//! Property-based tests for the simulated engine.
//!
//! Verified invariants:
//! - every command of an acyclic dependency graph completes, and never before
//!   any of its dependencies.
//! - commands on an in-order queue complete in submission order.
//! - a semaphore cycled through dependency-chained signal/wait pairs ends
//!   unsignaled with every pair complete.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use semacheck_runtime::{
    ClRuntime, DeviceId, EventId, ExecutionStatus, QueueProperties, SemaphoreProperties,
};
use semacheck_sim::{SimDeviceConfig, SimRuntime};

const DEADLINE: Option<Duration> = Some(Duration::from_secs(10));

fn runtime() -> SimRuntime {
    SimRuntime::new(SimDeviceConfig { step_delay_us: 0, ..SimDeviceConfig::default() }).unwrap()
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// For each node, the (earlier) nodes it depends on.
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=12_usize).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                if i == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    proptest::collection::vec(0..i, 0..=3.min(i)).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn dag_completes_respecting_dependencies(dag in dag_strategy(), ordered in any::<bool>()) {
        let rt = runtime();
        let ctx = rt.create_context(&[DeviceId(0)]).unwrap();
        let q = rt.create_queue(ctx, DeviceId(0), QueueProperties::ordered(ordered)).unwrap();

        let mut events: Vec<EventId> = Vec::new();
        for deps in &dag {
            let wait: Vec<EventId> = deps.iter().map(|&d| events[d]).collect();
            events.push(rt.enqueue_task(q, &wait).unwrap());
        }
        rt.finish(q, DEADLINE).unwrap();

        for (i, deps) in dag.iter().enumerate() {
            prop_assert_eq!(rt.event_status(events[i]).unwrap(), ExecutionStatus::Complete);
            let end = rt.event_profile(events[i]).unwrap().end.unwrap();
            for &d in deps {
                let dep_end = rt.event_profile(events[d]).unwrap().end.unwrap();
                prop_assert!(dep_end < end, "node {i} finished before dependency {d}");
            }
        }
    }

    #[test]
    fn in_order_queue_completes_in_submission_order(n in 2..=16_usize) {
        let rt = runtime();
        let ctx = rt.create_context(&[DeviceId(0)]).unwrap();
        let q = rt.create_queue(ctx, DeviceId(0), QueueProperties::IN_ORDER).unwrap();
        let gate = rt.create_user_event(ctx).unwrap();
        let mut events = vec![rt.enqueue_task(q, &[gate]).unwrap()];
        for _ in 1..n {
            events.push(rt.enqueue_task(q, &[]).unwrap());
        }
        rt.flush(q).unwrap();
        rt.set_user_event_status(gate, semacheck_runtime::UserEventStatus::Complete).unwrap();
        rt.finish(q, DEADLINE).unwrap();

        let ends: Vec<u64> =
            events.iter().map(|e| rt.event_profile(*e).unwrap().end.unwrap()).collect();
        prop_assert!(ends.windows(2).all(|w| w[0] < w[1]), "ends out of order: {ends:?}");
    }

    #[test]
    fn reuse_chain_leaves_semaphore_unsignaled(loops in 1..=8_usize) {
        let rt = runtime();
        let ext = rt.semaphore_ext().unwrap();
        let ctx = rt.create_context(&[DeviceId(0)]).unwrap();
        let q = rt.create_queue(ctx, DeviceId(0), QueueProperties::OUT_OF_ORDER).unwrap();
        let sema = ext.create_semaphore(ctx, &SemaphoreProperties::binary()).unwrap();

        let mut task = rt.enqueue_task(q, &[]).unwrap();
        let mut signal = ext.enqueue_signal_semaphores(q, &[sema], &[task]).unwrap();
        let mut all = vec![task, signal];
        for _ in 1..loops {
            let wait = ext.enqueue_wait_semaphores(q, &[sema], &[signal]).unwrap();
            task = rt.enqueue_task(q, &[wait]).unwrap();
            signal = ext.enqueue_signal_semaphores(q, &[sema], &[task]).unwrap();
            all.extend([wait, task, signal]);
        }
        all.push(ext.enqueue_wait_semaphores(q, &[sema], &[signal]).unwrap());
        rt.finish(q, DEADLINE).unwrap();

        for e in all {
            prop_assert_eq!(rt.event_status(e).unwrap(), ExecutionStatus::Complete);
        }
        prop_assert_eq!(ext.semaphore_info(sema).unwrap().payload, 0);
    }
}

#[test]
fn runtime_is_shareable_across_threads() {
    let rt: Arc<dyn ClRuntime> = Arc::new(runtime());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let rt = Arc::clone(&rt);
            std::thread::spawn(move || {
                let ctx = rt.create_context(&[DeviceId(1)]).unwrap();
                let q = rt.create_queue(ctx, DeviceId(1), QueueProperties::OUT_OF_ORDER).unwrap();
                let t = rt.enqueue_task(q, &[]).unwrap();
                rt.wait_for_events(&[t], DEADLINE).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
