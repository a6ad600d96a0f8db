//! Semaphore info queries.

use semacheck_runtime::{SemaphoreProperties, SemaphoreType};

use super::ScenarioEnv;
use crate::assertions::{assert_event_complete, assert_payload, ensure};
use crate::error::{ClResultExt, ScenarioResult};

pub(super) fn queries(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let props = SemaphoreProperties::binary();
    let sema = sema_fns.create(env.context, &props).or_fail("create semaphore")?;

    let info = sema.info().or_fail("query semaphore info")?;
    ensure(info.semaphore_type == SemaphoreType::Binary, || {
        format!("type: expected binary, got {:?}", info.semaphore_type)
    })?;
    ensure(info.context == env.context.id(), || {
        format!("context: expected {}, got {}", env.context.id(), info.context)
    })?;
    ensure(info.reference_count == 1, || {
        format!("reference count: expected 1, got {}", info.reference_count)
    })?;
    ensure(info.properties == props, || {
        format!("properties: expected {props:?}, got {:?}", info.properties)
    })?;
    assert_payload(&sema, "new semaphore", 0)?;

    let retained = sema.try_clone().or_fail("retain semaphore")?;
    let count = sema.reference_count().or_fail("query reference count")?;
    ensure(count == 2, || format!("reference count after retain: expected 2, got {count}"))?;
    drop(retained);
    let count = sema.reference_count().or_fail("query reference count")?;
    ensure(count == 1, || format!("reference count after release: expected 1, got {count}"))?;

    let queue = env.queue(false)?;
    let signal = sema_fns.signal(&queue, &[&sema], &[]).or_fail("signal semaphore")?;
    env.wait_for(&[&signal])?;
    assert_payload(&sema, "signaled semaphore", 1)?;
    sema_fns.wait(&queue, &[&sema], &[]).or_fail("wait semaphore")?;
    env.finish(&queue)?;
    assert_payload(&sema, "consumed semaphore", 0)
}

pub(super) fn queries_device_list(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;

    let implicit = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let listed = implicit.info().or_fail("query semaphore info")?.device_handle_list;
    ensure(listed == [env.device], || {
        format!("implicit device list: expected [{}], got {listed:?}", env.device)
    })?;

    let props = SemaphoreProperties::binary().device_handle_list([env.device]);
    let explicit = sema_fns.create(env.context, &props).or_fail("create semaphore with device list")?;
    let info = explicit.info().or_fail("query semaphore info")?;
    ensure(info.device_handle_list == [env.device], || {
        format!("device list: expected [{}], got {:?}", env.device, info.device_handle_list)
    })?;
    ensure(info.properties == props, || {
        format!("properties: expected {props:?}, got {:?}", info.properties)
    })
}

pub(super) fn queries_multi_device(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let context = env.multi_device_context()?;

    let props = SemaphoreProperties::binary().device_handle_list([env.device]);
    let sema = sema_fns.create(&context, &props).or_fail("create semaphore with device list")?;
    let info = sema.info().or_fail("query semaphore info")?;
    ensure(info.context == context.id(), || {
        format!("context: expected {}, got {}", context.id(), info.context)
    })?;
    ensure(info.device_handle_list == [env.device], || {
        format!("device list: expected [{}], got {:?}", env.device, info.device_handle_list)
    })?;

    let queue = env.queue_in(&context, false)?;
    let signal = sema_fns.signal(&queue, &[&sema], &[]).or_fail("signal semaphore")?;
    let wait = sema_fns.wait(&queue, &[&sema], &[&signal]).or_fail("wait semaphore")?;
    env.finish(&queue)?;
    assert_event_complete(&wait, "wait on device-listed semaphore")
}
