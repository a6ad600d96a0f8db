//! External handle export and import.

use semacheck_runtime::{ClError, ExternalHandle, ExternalHandleType, SemaphoreProperties};
use tracing::debug;

use super::ScenarioEnv;
use crate::assertions::{assert_event_complete, ensure, expect_cl_error};
use crate::error::{ClResultExt, ScenarioError, ScenarioResult};

fn exportable_types(env: &ScenarioEnv<'_>) -> ScenarioResult<Vec<ExternalHandleType>> {
    let types: Vec<_> =
        env.caps.export_handle_types.iter().copied().filter(|t| env.caps.can_export(*t)).collect();
    if types.is_empty() {
        return Err(ScenarioError::skipped("no external semaphore handle type can be exported"));
    }
    Ok(types)
}

fn ensure_valid(handle: ExternalHandle) -> ScenarioResult {
    ensure(handle.raw.is_valid(), || {
        format!("exported {} handle is invalid: {}", handle.handle_type, handle.raw)
    })
}

/// Signal a semaphore exported as a sync fd, wait on the semaphore imported
/// from that fd.
pub(super) fn import_export_fd(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let handle_type = ExternalHandleType::SyncFd;
    env.caps.require_external(handle_type)?;
    let queue = env.queue(false)?;

    let props = SemaphoreProperties::binary().export_handle_types([handle_type]);
    let sema_1 = sema_fns.create(env.context, &props).or_fail("create exportable semaphore")?;
    let signal = sema_fns.signal(&queue, &[&sema_1], &[]).or_fail("signal semaphore 1")?;

    let handle =
        sema_1.export_handle(Some(env.device), handle_type).or_fail("export sync fd handle")?;
    ensure_valid(handle)?;
    debug!(handle = %handle.raw, "exported");

    let sema_2 = sema_fns.import(env.context, handle).or_fail("import sync fd handle")?;
    let wait = sema_fns.wait(&queue, &[&sema_2], &[]).or_fail("wait semaphore 2")?;
    env.finish(&queue)?;

    assert_event_complete(&signal, "signal of exported semaphore")?;
    assert_event_complete(&wait, "wait on imported semaphore")
}

/// Signal in one context, wait in a second context on the imported handle.
pub(super) fn cross_context(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let handle_type = env.caps.round_trip_handle_type()?;
    let context_b = env.extra_context()?;
    let queue_a = env.queue(false)?;
    let queue_b = env.queue_in(&context_b, false)?;

    let props = SemaphoreProperties::binary().export_handle_types([handle_type]);
    let sema_a = sema_fns.create(env.context, &props).or_fail("create exportable semaphore")?;
    let handle = sema_a.export_handle(Some(env.device), handle_type).or_fail("export handle")?;
    ensure_valid(handle)?;
    let sema_b = sema_fns.import(&context_b, handle).or_fail("import into second context")?;

    let signal = sema_fns.signal(&queue_a, &[&sema_a], &[]).or_fail("signal in first context")?;
    env.flush(&queue_a)?;
    env.poller().poll(&queue_a, &signal, &[]).or_fail("poll for pending signal")?;
    let wait = sema_fns.wait(&queue_b, &[&sema_b], &[]).or_fail("wait in second context")?;
    env.finish(&queue_a)?;
    env.finish(&queue_b)?;

    assert_event_complete(&signal, "signal in first context")?;
    assert_event_complete(&wait, "wait in second context")
}

/// One handle per advertised export type; a type outside the creation list
/// is rejected.
pub(super) fn multiple_export(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let types = exportable_types(env)?;

    let props = SemaphoreProperties::binary().export_handle_types(types.iter().copied());
    let sema = sema_fns.create(env.context, &props).or_fail("create exportable semaphore")?;
    for &handle_type in &types {
        let handle = sema
            .export_handle(Some(env.device), handle_type)
            .or_fail_with(|| format!("export {handle_type} handle"))?;
        ensure_valid(handle)?;
        ensure(handle.handle_type == handle_type, || {
            format!("requested {handle_type} handle, got {}", handle.handle_type)
        })?;
    }

    let first = types[0];
    let Some(unlisted) = ExternalHandleType::ALL.into_iter().find(|t| *t != first) else {
        return Ok(());
    };
    let single = SemaphoreProperties::binary().export_handle_types([first]);
    let narrow = sema_fns.create(env.context, &single).or_fail("create single-type semaphore")?;
    expect_cl_error(
        narrow.export_handle(Some(env.device), unlisted),
        &[ClError::InvalidValue],
        &format!("export {unlisted} from a semaphore exporting only {first}"),
    )
}

/// Import combined with export is rejected at creation, and an imported
/// semaphore cannot be exported again.
pub(super) fn no_re_export(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let export_types = exportable_types(env)?;
    let import_types: Vec<_> =
        export_types.iter().copied().filter(|t| env.caps.can_round_trip(*t)).collect();
    if import_types.is_empty() {
        return Err(ScenarioError::skipped("no external semaphore handle type can be imported"));
    }

    for &import_type in &import_types {
        let props = SemaphoreProperties::binary().export_handle_types([import_type]);
        let source = sema_fns.create(env.context, &props).or_fail("create exportable semaphore")?;
        let handle = source
            .export_handle(Some(env.device), import_type)
            .or_fail_with(|| format!("export {import_type} handle"))?;

        for &export_type in &export_types {
            let both =
                SemaphoreProperties::binary().import(handle).export_handle_types([export_type]);
            expect_cl_error(
                sema_fns.create(env.context, &both),
                &[ClError::InvalidOperation],
                &format!("create importing {import_type} and exporting {export_type}"),
            )?;

            let imported = sema_fns.import(env.context, handle).or_fail("import handle")?;
            expect_cl_error(
                imported.export_handle(Some(env.device), export_type),
                &[ClError::InvalidOperation],
                &format!("export {export_type} from a semaphore imported from {import_type}"),
            )?;
        }
    }
    Ok(())
}

pub(super) fn external_queries(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let types = exportable_types(env)?;

    let props = SemaphoreProperties::binary().export_handle_types(types.iter().copied());
    let sema = sema_fns.create(env.context, &props).or_fail("create exportable semaphore")?;
    let info = sema.info().or_fail("query semaphore info")?;
    ensure(info.export_handle_types == types, || {
        format!("export handle types: expected {types:?}, got {:?}", info.export_handle_types)
    })?;
    ensure(info.properties == props, || {
        format!("properties: expected {props:?}, got {:?}", info.properties)
    })
}
