//! Scoped-ownership wrappers against the simulated engine.

use std::sync::Arc;
use std::time::Duration;

use semacheck_runtime::{
    ClError, ClRuntime, Context, DeviceId, ExecutionStatus, QueueProperties, Semaphore,
    SemaphoreProperties, SharedRuntime, UserEventStatus,
};
use semacheck_sim::{SimDeviceConfig, SimRuntime};

fn shared() -> SharedRuntime {
    Arc::new(SimRuntime::new(SimDeviceConfig { step_delay_us: 0, ..Default::default() }).unwrap())
}

#[test]
fn dropping_semaphore_releases_reference() {
    let rt = shared();
    let ext = rt.semaphore_ext().unwrap();
    let ctx = Context::create(&rt, &[DeviceId(0)]).unwrap();
    let sema = Semaphore::create(&ext, &ctx, &SemaphoreProperties::binary()).unwrap();
    let id = sema.id();

    let second = sema.try_clone().unwrap();
    assert_eq!(sema.reference_count().unwrap(), 2);
    drop(second);
    assert_eq!(sema.reference_count().unwrap(), 1);
    drop(sema);
    assert_eq!(ext.semaphore_info(id), Err(ClError::InvalidSemaphore));
}

#[test]
fn dropping_event_releases_reference() {
    let rt = shared();
    let ctx = Context::create(&rt, &[DeviceId(0)]).unwrap();
    let user = ctx.create_user_event().unwrap();
    let id = user.id();
    let copy = user.try_clone().unwrap();
    drop(user);
    assert_eq!(copy.status().unwrap(), ExecutionStatus::Submitted);
    drop(copy);
    assert_eq!(rt.event_status(id), Err(ClError::InvalidEvent));
}

#[test]
fn dropping_context_invalidates_it() {
    let rt = shared();
    let ctx = Context::create(&rt, &[DeviceId(0)]).unwrap();
    let id = ctx.id();
    drop(ctx);
    assert_eq!(rt.context_devices(id), Err(ClError::InvalidContext));
}

#[test]
fn dropped_queue_still_runs_its_commands() {
    let rt = shared();
    let ctx = Context::create(&rt, &[DeviceId(0)]).unwrap();
    let queue = ctx.create_queue(DeviceId(0), QueueProperties::OUT_OF_ORDER).unwrap();
    let gate = ctx.create_user_event().unwrap();
    let task = queue.enqueue_task(&[&gate]).unwrap();
    drop(queue);
    gate.set_user_status(UserEventStatus::Complete).unwrap();
    task.wait(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(task.status().unwrap(), ExecutionStatus::Complete);
}

#[test]
fn buffer_round_trip_through_queue() {
    let rt = shared();
    let ctx = Context::create(&rt, &[DeviceId(0)]).unwrap();
    let queue = ctx.create_queue(DeviceId(0), QueueProperties::IN_ORDER).unwrap();
    let src = ctx.create_buffer(16).unwrap();
    let dst = ctx.create_buffer(16).unwrap();
    let fill = queue.fill_buffer(&src, 42, &[]).unwrap();
    let copy = queue.copy_buffer(&src, &dst, &[&fill]).unwrap();
    let data = queue.read_buffer(&dst, &[&copy], Some(Duration::from_secs(5))).unwrap();
    assert_eq!(data, vec![42; 16]);
    assert_eq!(dst.len(), 16);
}
