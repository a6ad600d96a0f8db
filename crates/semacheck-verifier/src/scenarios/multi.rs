//! One operation targeting several semaphores.

use semacheck_runtime::UserEventStatus;

use super::ScenarioEnv;
use crate::assertions::{assert_event_complete, assert_event_in_progress, assert_payload};
use crate::error::{ClResultExt, ScenarioResult};

pub(super) fn multi_signal(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema_1 = sema_fns.create_binary(env.context).or_fail("create semaphore 1")?;
    let sema_2 = sema_fns.create_binary(env.context).or_fail("create semaphore 2")?;

    let signal = sema_fns.signal(&queue, &[&sema_1, &sema_2], &[]).or_fail("signal semaphores")?;
    env.flush(&queue)?;
    env.poller().poll(&queue, &signal, &[]).or_fail("poll for pending signal")?;

    let wait_1 = sema_fns.wait(&queue, &[&sema_1], &[]).or_fail("wait semaphore 1")?;
    let wait_2 = sema_fns.wait(&queue, &[&sema_2], &[]).or_fail("wait semaphore 2")?;
    env.finish(&queue)?;

    assert_event_complete(&signal, "signal of both semaphores")?;
    assert_event_complete(&wait_1, "wait on semaphore 1")?;
    assert_event_complete(&wait_2, "wait on semaphore 2")?;
    assert_payload(&sema_1, "semaphore 1", 0)?;
    assert_payload(&sema_2, "semaphore 2", 0)
}

pub(super) fn multi_wait(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema_1 = sema_fns.create_binary(env.context).or_fail("create semaphore 1")?;
    let sema_2 = sema_fns.create_binary(env.context).or_fail("create semaphore 2")?;

    let signal_1 = sema_fns.signal(&queue, &[&sema_1], &[]).or_fail("signal semaphore 1")?;
    let signal_2 = sema_fns.signal(&queue, &[&sema_2], &[]).or_fail("signal semaphore 2")?;
    env.flush(&queue)?;
    let poller = env.poller();
    poller.poll(&queue, &signal_1, &[]).or_fail("poll for pending signal 1")?;
    poller.poll(&queue, &signal_2, &[]).or_fail("poll for pending signal 2")?;

    let wait = sema_fns.wait(&queue, &[&sema_1, &sema_2], &[]).or_fail("wait semaphores")?;
    env.finish(&queue)?;

    assert_event_complete(&signal_1, "signal of semaphore 1")?;
    assert_event_complete(&signal_2, "signal of semaphore 2")?;
    assert_event_complete(&wait, "wait on both semaphores")?;
    assert_payload(&sema_1, "semaphore 1", 0)?;
    assert_payload(&sema_2, "semaphore 2", 0)?;

    // Only semaphore 1 signaled: the wait must hold out for semaphore 2.
    let gate = env.user_event()?;
    let signal_1 = sema_fns.signal(&queue, &[&sema_1], &[]).or_fail("signal semaphore 1 again")?;
    let signal_2 =
        sema_fns.signal(&queue, &[&sema_2], &[&gate]).or_fail("gated signal of semaphore 2")?;
    let wait = sema_fns.wait(&queue, &[&sema_1, &sema_2], &[]).or_fail("wait semaphores again")?;
    env.flush(&queue)?;
    env.wait_for(&[&signal_1])?;
    env.settle();
    assert_event_in_progress(&wait, "wait with one semaphore signaled")?;
    assert_payload(&sema_1, "semaphore 1 while the wait is pending", 1)?;

    gate.set_user_status(UserEventStatus::Complete).or_fail("complete user event")?;
    env.finish(&queue)?;
    assert_event_complete(&signal_2, "gated signal of semaphore 2")?;
    assert_event_complete(&wait, "wait after both signals")?;
    assert_payload(&sema_1, "semaphore 1 after the second wait", 0)?;
    assert_payload(&sema_2, "semaphore 2 after the second wait", 0)
}
