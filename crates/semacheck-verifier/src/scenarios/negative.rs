//! Creation and enqueue calls that must be rejected with a specific error.
//!
//! Rejected calls go through the raw entry points so that a released handle
//! can be passed by id after its wrapper is gone.

use semacheck_runtime::{
    ClError, DeviceId, ExternalHandleType, QueueProperties, SemaphoreProperties, SemaphoreProperty,
    SemaphoreType, UserEventStatus, property,
};

use super::ScenarioEnv;
use crate::assertions::expect_cl_error;
use crate::capabilities::{SemaphoreFunctions, SemaphoreOp};
use crate::error::{ClResultExt, ScenarioError, ScenarioResult};

const UNKNOWN_PROPERTY: u64 = 0xFFFF;

// ── Creation ─────────────────────────────────────────────────────────────────

pub(super) fn invalid_create_context(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let released = env.extra_context()?.id();

    expect_cl_error(
        sema_fns.create_raw(released, &SemaphoreProperties::binary()),
        &[ClError::InvalidContext],
        "create in a released context",
    )
}

pub(super) fn invalid_create_property(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;

    let unknown = SemaphoreProperties::binary()
        .with(SemaphoreProperty::Raw { name: UNKNOWN_PROPERTY, value: 0 });
    expect_cl_error(
        sema_fns.create(env.context, &unknown),
        &[ClError::InvalidProperty],
        "create with an unknown property name",
    )?;

    let duplicate =
        SemaphoreProperties::binary().with(SemaphoreProperty::Type(SemaphoreType::Binary));
    expect_cl_error(
        sema_fns.create(env.context, &duplicate),
        &[ClError::InvalidProperty],
        "create with the type given twice",
    )?;

    let unsupported = ExternalHandleType::ALL
        .into_iter()
        .find(|t| !env.caps.export_handle_types.contains(t));
    if let Some(handle_type) = unsupported {
        let props = SemaphoreProperties::binary().export_handle_types([handle_type]);
        expect_cl_error(
            sema_fns.create(env.context, &props),
            &[ClError::InvalidProperty],
            &format!("create exporting unsupported {handle_type} handles"),
        )?;
    }
    Ok(())
}

pub(super) fn invalid_create_value(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;

    expect_cl_error(
        sema_fns.create(env.context, &SemaphoreProperties::new()),
        &[ClError::InvalidValue],
        "create with an empty property list",
    )?;

    let bad_type = SemaphoreProperties::new().with(SemaphoreProperty::Raw {
        name: property::SEMAPHORE_TYPE,
        value: property::SEMAPHORE_TYPE_BINARY + 1,
    });
    expect_cl_error(
        sema_fns.create(env.context, &bad_type),
        &[ClError::InvalidValue],
        "create with an unknown semaphore type",
    )?;

    let untyped = SemaphoreProperties::new().device_handle_list([env.device]);
    expect_cl_error(
        sema_fns.create(env.context, &untyped),
        &[ClError::InvalidValue],
        "create without a semaphore type",
    )
}

pub(super) fn invalid_create_device(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;

    let twice = SemaphoreProperties::binary().device_handle_list([env.device, env.device]);
    expect_cl_error(
        sema_fns.create(env.context, &twice),
        &[ClError::InvalidDevice],
        "create with two devices in the device list",
    )?;

    let devices = env.runtime.devices().or_fail("list devices")?;
    let outside = devices
        .into_iter()
        .find(|d| !env.context.devices().contains(d))
        .unwrap_or(DeviceId(u32::MAX));
    let foreign = SemaphoreProperties::binary().device_handle_list([outside]);
    expect_cl_error(
        sema_fns.create(env.context, &foreign),
        &[ClError::InvalidDevice],
        &format!("create listing {outside}, which is outside the context"),
    )
}

/// Importing with a device list naming a device outside the importing
/// context is rejected the same way as a plain create.
pub(super) fn invalid_create_import_device(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let handle_type = env.caps.round_trip_handle_type()?;
    let devices = env.runtime.devices().or_fail("list devices")?;
    let Some(outside) = devices.into_iter().find(|d| !env.context.devices().contains(d)) else {
        return Err(ScenarioError::skipped("at least two devices are required"));
    };

    let props = SemaphoreProperties::binary().export_handle_types([handle_type]);
    let source = sema_fns.create(env.context, &props).or_fail("create exportable semaphore")?;
    let handle = source.export_handle(Some(env.device), handle_type).or_fail("export handle")?;

    let import = SemaphoreProperties::binary().import(handle).device_handle_list([outside]);
    expect_cl_error(
        sema_fns.create(env.context, &import),
        &[ClError::InvalidDevice],
        &format!("import listing {outside}, which is outside the context"),
    )
}

pub(super) fn invalid_create_multi_device(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let context = env.multi_device_context()?;

    expect_cl_error(
        sema_fns.create_binary(&context),
        &[ClError::InvalidProperty],
        "create in a multi-device context without a device list",
    )
}

pub(super) fn invalid_create_operation(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let handle_type = env.caps.round_trip_handle_type()?;

    let props = SemaphoreProperties::binary().export_handle_types([handle_type]);
    let source = sema_fns.create(env.context, &props).or_fail("create exportable semaphore")?;
    let handle = source.export_handle(Some(env.device), handle_type).or_fail("export handle")?;

    let both = SemaphoreProperties::binary().import(handle).export_handle_types([handle_type]);
    expect_cl_error(
        sema_fns.create(env.context, &both),
        &[ClError::InvalidOperation],
        "create importing and exporting at once",
    )
}

// ── Enqueue ──────────────────────────────────────────────────────────────────

/// Run `check` once for signal and once for wait.
fn for_each_op(
    env: &ScenarioEnv<'_>,
    mut check: impl FnMut(&SemaphoreFunctions, SemaphoreOp) -> ScenarioResult,
) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    SemaphoreOp::BOTH.into_iter().try_for_each(|op| check(&sema_fns, op))
}

pub(super) fn invalid_enqueue_value(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let queue = env.queue(true)?;
    for_each_op(env, |sema_fns, op| {
        expect_cl_error(
            sema_fns.enqueue_raw(op, queue.id(), &[], &[]),
            &[ClError::InvalidOperands, ClError::InvalidValue],
            &format!("{op} with no semaphores"),
        )
    })
}

pub(super) fn invalid_enqueue_semaphore(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let queue = env.queue(true)?;
    for_each_op(env, |sema_fns, op| {
        let released = sema_fns.create_binary(env.context).or_fail("create semaphore")?.id();
        expect_cl_error(
            sema_fns.enqueue_raw(op, queue.id(), &[released], &[]),
            &[ClError::InvalidSemaphore],
            &format!("{op} a released semaphore"),
        )
    })
}

pub(super) fn invalid_enqueue_context(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let queue = env.queue(true)?;
    let other = env.extra_context()?;
    for_each_op(env, |sema_fns, op| {
        let foreign = sema_fns.create_binary(&other).or_fail("create semaphore in second context")?;
        expect_cl_error(
            sema_fns.enqueue_raw(op, queue.id(), &[foreign.id()], &[]),
            &[ClError::InvalidContext],
            &format!("{op} a semaphore from another context"),
        )?;

        let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
        let event = other.create_user_event().or_fail("create user event in second context")?;
        expect_cl_error(
            sema_fns.enqueue_raw(op, queue.id(), &[sema.id()], &[event.id()]),
            &[ClError::InvalidContext],
            &format!("{op} waiting on an event from another context"),
        )
    })
}

pub(super) fn invalid_enqueue_event_wait_list(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let queue = env.queue(true)?;
    for_each_op(env, |sema_fns, op| {
        let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
        let released = env.user_event()?.id();
        expect_cl_error(
            sema_fns.enqueue_raw(op, queue.id(), &[sema.id()], &[released]),
            &[ClError::InvalidEventWaitList],
            &format!("{op} waiting on a released event"),
        )
    })
}

pub(super) fn invalid_enqueue_event_status(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let queue = env.queue(true)?;
    for_each_op(env, |sema_fns, op| {
        let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
        let failed = env.user_event()?;
        failed.set_user_status(UserEventStatus::Failed(-1)).or_fail("fail user event")?;
        expect_cl_error(
            sema_fns.enqueue_raw(op, queue.id(), &[sema.id()], &[failed.id()]),
            &[ClError::ExecStatusErrorForEventsInWaitList],
            &format!("{op} waiting on a failed event"),
        )
    })
}

/// A semaphore bound to one device of a multi-device context cannot be used
/// from a queue on the other device.
pub(super) fn invalid_enqueue_command_queue(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let context = env.multi_device_context()?;
    let Some(other) = context.devices().iter().copied().find(|d| *d != env.device) else {
        return Err(ScenarioError::skipped("multi-device context has a single device"));
    };
    let queue = context
        .create_queue(other, QueueProperties::IN_ORDER)
        .or_fail("create queue on second device")?;

    for_each_op(env, |sema_fns, op| {
        let props = SemaphoreProperties::binary().device_handle_list([env.device]);
        let sema = sema_fns.create(&context, &props).or_fail("create semaphore with device list")?;
        expect_cl_error(
            sema_fns.enqueue_raw(op, queue.id(), &[sema.id()], &[]),
            &[ClError::InvalidCommandQueue],
            &format!("{op} on {other}, which is outside the device list"),
        )
    })
}
