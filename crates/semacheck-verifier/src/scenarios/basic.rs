//! Single-queue signal/wait behaviour.

use semacheck_runtime::{ClError, UserEventStatus};
use tracing::debug;

use super::ScenarioEnv;
use crate::assertions::{
    assert_completes_before, assert_event_complete, assert_event_in_progress,
    assert_event_terminated, assert_payload,
};
use crate::error::{ClResultExt, ScenarioResult};

/// Signal then wait on one in-order queue; both complete and the wait
/// consumes the signal.
pub(super) fn simple_signal_wait(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(true)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;

    let signal = sema_fns.signal(&queue, &[&sema], &[]).or_fail("signal semaphore")?;
    let wait = sema_fns.wait(&queue, &[&sema], &[]).or_fail("wait semaphore")?;
    env.finish(&queue)?;

    assert_event_complete(&signal, "signal")?;
    assert_event_complete(&wait, "wait")?;
    assert_payload(&sema, "semaphore after wait", 0)
}

/// On an out-of-order queue a signal without a wait list must not wait for
/// a blocked task enqueued before it.
pub(super) fn no_implicit_dependency(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let gate = env.user_event()?;

    let task = queue.enqueue_task(&[&gate]).or_fail("enqueue task")?;
    let signal = sema_fns.signal(&queue, &[&sema], &[]).or_fail("signal semaphore")?;
    env.flush(&queue)?;
    env.poller().poll(&queue, &signal, &[]).or_fail("poll for pending signal")?;

    let wait = sema_fns.wait(&queue, &[&sema], &[]).or_fail("wait semaphore")?;
    env.flush(&queue)?;
    env.wait_for(&[&wait])?;

    assert_event_in_progress(&task, "gated task")?;
    assert_event_complete(&signal, "signal")?;
    assert_event_complete(&wait, "wait")?;

    gate.set_user_status(UserEventStatus::Complete).or_fail("complete user event")?;
    env.finish(&queue)?;

    assert_event_complete(&task, "gated task")?;
    assert_event_complete(&signal, "signal")?;
    assert_event_complete(&wait, "wait")
}

/// A wait whose signal is still gated stays pending, and completes once the
/// signal is released.
pub(super) fn wait_blocks_until_signal(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let gate = env.user_event()?;

    let signal = sema_fns.signal(&queue, &[&sema], &[&gate]).or_fail("signal semaphore")?;
    let wait = sema_fns.wait(&queue, &[&sema], &[]).or_fail("wait semaphore")?;
    env.flush(&queue)?;
    env.settle();
    assert_event_in_progress(&signal, "gated signal")?;
    assert_event_in_progress(&wait, "unsignaled wait")?;
    assert_payload(&sema, "semaphore before signal", 0)?;

    gate.set_user_status(UserEventStatus::Complete).or_fail("complete user event")?;
    env.wait_for(&[&wait])?;
    env.finish(&queue)?;

    assert_event_complete(&signal, "signal")?;
    assert_event_complete(&wait, "wait")?;
    assert_completes_before(&signal, "signal", &wait, "wait")?;
    assert_payload(&sema, "semaphore after wait", 0)
}

/// Cycle one semaphore through `reuse_loop_count` signal/wait pairs, each
/// step chained to the previous one.
pub(super) fn reuse(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let loops = env.config.reuse_loop_count;

    let mut tasks = Vec::with_capacity(loops);
    let mut signals = Vec::with_capacity(loops);
    let mut waits = Vec::with_capacity(loops);

    tasks.push(queue.enqueue_task(&[]).or_fail("enqueue task 0")?);
    signals.push(sema_fns.signal(&queue, &[&sema], &[&tasks[0]]).or_fail("signal 0")?);
    for i in 1..loops {
        let wait = sema_fns
            .wait(&queue, &[&sema], &[&signals[i - 1]])
            .or_fail_with(|| format!("wait {}", i - 1))?;
        let task = queue.enqueue_task(&[&wait]).or_fail_with(|| format!("enqueue task {i}"))?;
        let signal =
            sema_fns.signal(&queue, &[&sema], &[&task]).or_fail_with(|| format!("signal {i}"))?;
        waits.push(wait);
        tasks.push(task);
        signals.push(signal);
    }
    let last = signals.len() - 1;
    waits.push(
        sema_fns.wait(&queue, &[&sema], &[&signals[last]]).or_fail_with(|| format!("wait {last}"))?,
    );
    debug!(loops, "reuse chain enqueued");
    env.finish(&queue)?;

    for i in 0..loops {
        assert_event_complete(&tasks[i], &format!("task {i}"))?;
        assert_event_complete(&signals[i], &format!("signal {i}"))?;
        assert_event_complete(&waits[i], &format!("wait {i}"))?;
        assert_completes_before(
            &signals[i],
            &format!("signal {i}"),
            &waits[i],
            &format!("wait {i}"),
        )?;
    }
    assert_payload(&sema, "semaphore after final wait", 0)
}

/// A wait on two semaphores where only one can ever be signaled is
/// terminated once its wait list completes, and the failure reaches a signal
/// that depends on it. The signal sharing the wait list still completes.
pub(super) fn invalid_command(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(false)?;
    let sema_1 = sema_fns.create_binary(env.context).or_fail("create semaphore 1")?;
    let sema_2 = sema_fns.create_binary(env.context).or_fail("create semaphore 2")?;
    let user_1 = env.user_event()?;
    let user_2 = env.user_event()?;

    let signal_1 = sema_fns.signal(&queue, &[&sema_1], &[&user_1]).or_fail("signal 1")?;
    let wait = sema_fns.wait(&queue, &[&sema_1, &sema_2], &[&user_1]).or_fail("wait semaphores")?;
    let signal_2 =
        sema_fns.signal(&queue, &[&sema_1], &[&user_2, &wait]).or_fail("signal 2")?;
    env.flush(&queue)?;
    env.settle();

    assert_event_in_progress(&signal_1, "gated signal 1")?;
    assert_event_in_progress(&wait, "gated wait")?;
    assert_event_in_progress(&signal_2, "gated signal 2")?;

    // Drivers may report the doomed wait through the status call itself.
    if let Err(err) = user_1.set_user_status(UserEventStatus::Complete) {
        debug!(%err, "completing the user event reported an error");
    }
    let finished = queue.finish(env.config.finish_timeout());
    if !matches!(finished, Ok(()) | Err(ClError::ExecStatusErrorForEventsInWaitList)) {
        finished.or_fail_with(|| format!("finish {}", queue.id()))?;
    }

    assert_event_complete(&signal_1, "signal 1")?;
    assert_event_terminated(&wait, "unsatisfiable wait")?;
    assert_event_terminated(&signal_2, "signal depending on the wait")
}

/// On an in-order queue everything behind a blocked task stays pending and
/// then completes in submission order.
pub(super) fn in_order_completion(env: &ScenarioEnv<'_>) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue = env.queue(true)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let gate = env.user_event()?;

    let first = queue.enqueue_task(&[&gate]).or_fail("enqueue gated task")?;
    let signal = sema_fns.signal(&queue, &[&sema], &[]).or_fail("signal semaphore")?;
    let wait = sema_fns.wait(&queue, &[&sema], &[]).or_fail("wait semaphore")?;
    let last = queue.enqueue_task(&[]).or_fail("enqueue trailing task")?;
    env.flush(&queue)?;
    env.settle();

    assert_event_in_progress(&first, "gated task")?;
    assert_event_in_progress(&signal, "signal behind gated task")?;
    assert_event_in_progress(&wait, "wait behind gated task")?;
    assert_event_in_progress(&last, "trailing task")?;

    gate.set_user_status(UserEventStatus::Complete).or_fail("complete user event")?;
    env.finish(&queue)?;

    let ordered =
        [(&first, "gated task"), (&signal, "signal"), (&wait, "wait"), (&last, "trailing task")];
    for (event, label) in ordered {
        assert_event_complete(event, label)?;
    }
    for pair in ordered.windows(2) {
        let [(a, a_label), (b, b_label)] = pair else { continue };
        assert_completes_before(a, a_label, b, b_label)?;
    }
    Ok(())
}
