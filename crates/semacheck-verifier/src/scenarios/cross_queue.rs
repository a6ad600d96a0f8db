//! Signal on one queue, wait on another.

use super::ScenarioEnv;
use crate::assertions::{assert_completes_before, assert_event_complete, ensure};
use crate::error::{ClResultExt, ScenarioResult};

const PRODUCER_PATTERN: i32 = 42;
const CONSUMER_PATTERN: i32 = 0xACDC;

fn signal_then_wait_across(env: &ScenarioEnv<'_>, ordered: bool) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let queue_1 = env.queue(ordered)?;
    let queue_2 = env.queue(ordered)?;
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;

    let signal = sema_fns.signal(&queue_1, &[&sema], &[]).or_fail("signal semaphore")?;
    env.flush(&queue_1)?;
    env.poller().poll(&queue_1, &signal, &[]).or_fail("poll for pending signal")?;

    let wait = sema_fns.wait(&queue_2, &[&sema], &[]).or_fail("wait semaphore")?;
    env.finish(&queue_1)?;
    env.finish(&queue_2)?;

    assert_event_complete(&signal, "signal on first queue")?;
    assert_event_complete(&wait, "wait on second queue")?;
    assert_completes_before(&signal, "signal", &wait, "wait")
}

pub(super) fn cross_queues_io(env: &ScenarioEnv<'_>) -> ScenarioResult {
    signal_then_wait_across(env, true)
}

pub(super) fn cross_queues_ooo(env: &ScenarioEnv<'_>) -> ScenarioResult {
    signal_then_wait_across(env, false)
}

/// Producer fills and copies a buffer behind a barrier, then signals. The
/// consumer waits, overwrites the input and copies again. Only the consumer
/// pattern may be read back.
fn producer_consumer(env: &ScenarioEnv<'_>, single_queue: bool) -> ScenarioResult {
    let sema_fns = env.semaphores()?;
    let producer = env.queue(false)?;
    let separate;
    let consumer = if single_queue {
        &producer
    } else {
        separate = env.queue(false)?;
        &separate
    };
    let sema = sema_fns.create_binary(env.context).or_fail("create semaphore")?;
    let n = env.config.buffer_elements;
    let input = env.context.create_buffer(n).or_fail("create input buffer")?;
    let output = env.context.create_buffer(n).or_fail("create output buffer")?;

    let fill = producer.fill_buffer(&input, PRODUCER_PATTERN, &[]).or_fail("producer fill")?;
    producer.copy_buffer(&input, &output, &[&fill]).or_fail("producer copy")?;
    producer.enqueue_barrier(&[]).or_fail("producer barrier")?;

    if single_queue {
        let signal = sema_fns.signal(&producer, &[&sema], &[]).or_fail("signal semaphore")?;
        sema_fns.wait(consumer, &[&sema], &[&signal]).or_fail("wait semaphore")?;
    } else {
        sema_fns.signal(&producer, &[&sema], &[]).or_fail("signal semaphore")?;
        env.flush(&producer)?;
        sema_fns.wait(consumer, &[&sema], &[]).or_fail("wait semaphore")?;
    }

    consumer.enqueue_barrier(&[]).or_fail("consumer barrier")?;
    let refill = consumer.fill_buffer(&input, CONSUMER_PATTERN, &[]).or_fail("consumer fill")?;
    let copy = consumer.copy_buffer(&input, &output, &[&refill]).or_fail("consumer copy")?;
    let data = consumer
        .read_buffer(&output, &[&copy], env.config.finish_timeout())
        .or_fail("read output buffer")?;

    ensure(data.len() == n, || format!("read {} elements, expected {n}", data.len()))?;
    match data.iter().position(|v| *v != CONSUMER_PATTERN) {
        Some(i) => ensure(false, || {
            format!("expected {CONSUMER_PATTERN} was {} at index {i}", data[i])
        }),
        None => Ok(()),
    }
}

pub(super) fn ooo_ops_single_queue(env: &ScenarioEnv<'_>) -> ScenarioResult {
    producer_consumer(env, true)
}

pub(super) fn ooo_ops_cross_queue(env: &ScenarioEnv<'_>) -> ScenarioResult {
    producer_consumer(env, false)
}
