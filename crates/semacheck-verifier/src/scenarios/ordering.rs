//! Signals and waits enqueued in a different order than their dependencies
//! resolve.
//!
//! Each operation is gated on its own user event and the user events are
//! completed in a scrambled order. At every checkpoint exactly the operations
//! whose gates and semaphores allow it must have completed.

use semacheck_runtime::UserEventStatus;

use super::ScenarioEnv;
use crate::assertions::{assert_event_complete, assert_event_in_progress};
use crate::error::{ClResultExt, ScenarioResult};

const COMPLETE: UserEventStatus = UserEventStatus::Complete;

/// The wait is enqueued first but gated; the ungated signal still completes.
pub(super) fn order_1(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let user = env.user_event()?;

    let wait = sema_fns.wait(&queue, &[&sema], &[&user]).or_fail("wait semaphore")?;
    let signal = sema_fns.signal(&queue, &[&sema], &[]).or_fail("signal semaphore")?;
    env.flush(&queue)?;
    env.wait_for(&[&signal])?;

    assert_event_complete(&signal, "signal")?;
    assert_event_in_progress(&wait, "gated wait")?;

    user.set_user_status(COMPLETE).or_fail("complete user event")?;
    env.finish(&queue)?;

    assert_event_complete(&signal, "signal")?;
    assert_event_complete(&wait, "wait")
}

/// Two gated signals and a gated wait; releasing the first signal and the
/// wait lets both complete while the second signal stays pending.
pub(super) fn order_2(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let user_1 = env.user_event()?;
    let user_2 = env.user_event()?;
    let user_3 = env.user_event()?;

    let signal_1 = sema_fns.signal(&queue, &[&sema], &[&user_1]).or_fail("signal 1")?;
    let signal_2 = sema_fns.signal(&queue, &[&sema], &[&user_2]).or_fail("signal 2")?;
    let wait = sema_fns.wait(&queue, &[&sema], &[&user_3]).or_fail("wait semaphore")?;

    user_1.set_user_status(COMPLETE).or_fail("complete user event 1")?;
    env.flush(&queue)?;
    env.poller().poll(&queue, &signal_1, &[&user_1]).or_fail("poll for pending signal 1")?;

    user_3.set_user_status(COMPLETE).or_fail("complete user event 3")?;
    env.flush(&queue)?;
    env.wait_for(&[&wait])?;

    assert_event_complete(&signal_1, "signal 1")?;
    assert_event_in_progress(&signal_2, "gated signal 2")?;
    assert_event_complete(&wait, "wait")?;

    user_2.set_user_status(COMPLETE).or_fail("complete user event 2")?;
    env.finish(&queue)?;

    assert_event_complete(&signal_1, "signal 1")?;
    assert_event_complete(&signal_2, "signal 2")?;
    assert_event_complete(&wait, "wait")
}

/// The second wait depends on the second signal's event; releasing only that
/// signal must complete the pair and leave the other pair untouched.
pub(super) fn order_3(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let user_1 = env.user_event()?;
    let user_2 = env.user_event()?;
    let user_3 = env.user_event()?;

    let signal_1 = sema_fns.signal(&queue, &[&sema], &[&user_1]).or_fail("signal 1")?;
    let signal_2 = sema_fns.signal(&queue, &[&sema], &[&user_2]).or_fail("signal 2")?;
    let wait_1 = sema_fns.wait(&queue, &[&sema], &[&user_3]).or_fail("wait 1")?;
    let wait_2 = sema_fns.wait(&queue, &[&sema], &[&signal_2]).or_fail("wait 2")?;

    user_2.set_user_status(COMPLETE).or_fail("complete user event 2")?;
    env.flush(&queue)?;
    env.wait_for(&[&signal_2, &wait_2])?;

    assert_event_in_progress(&signal_1, "gated signal 1")?;
    assert_event_in_progress(&wait_1, "gated wait 1")?;

    user_1.set_user_status(COMPLETE).or_fail("complete user event 1")?;
    env.flush(&queue)?;
    env.poller().poll(&queue, &signal_1, &[&user_1]).or_fail("poll for pending signal 1")?;

    user_3.set_user_status(COMPLETE).or_fail("complete user event 3")?;
    env.finish(&queue)?;

    assert_event_complete(&signal_1, "signal 1")?;
    assert_event_complete(&signal_2, "signal 2")?;
    assert_event_complete(&wait_1, "wait 1")?;
    assert_event_complete(&wait_2, "wait 2")
}
