//! Event and semaphore state assertions.

use std::fmt::Debug;

use semacheck_runtime::{ClError, Event, Semaphore};

use crate::error::{ClResultExt, ScenarioError, ScenarioResult};

pub fn assert_event_complete(event: &Event, label: &str) -> ScenarioResult {
    let status = event.status().or_fail_with(|| format!("query status of {label}"))?;
    if status.is_complete() {
        Ok(())
    } else {
        Err(ScenarioError::assertion(format!(
            "{label} ({}): expected COMPLETE, observed {status}",
            event.id()
        )))
    }
}

/// The event is neither complete nor terminated.
pub fn assert_event_in_progress(event: &Event, label: &str) -> ScenarioResult {
    let status = event.status().or_fail_with(|| format!("query status of {label}"))?;
    if status.is_in_progress() {
        Ok(())
    } else {
        Err(ScenarioError::assertion(format!(
            "{label} ({}): expected to be in progress, observed {status}",
            event.id()
        )))
    }
}

pub fn assert_event_terminated(event: &Event, label: &str) -> ScenarioResult {
    let status = event.status().or_fail_with(|| format!("query status of {label}"))?;
    if status.is_terminated() {
        Ok(())
    } else {
        Err(ScenarioError::assertion(format!(
            "{label} ({}): expected an error status, observed {status}",
            event.id()
        )))
    }
}

/// `first` finished no later than `second`, by profiling end time.
pub fn assert_completes_before(
    first: &Event,
    first_label: &str,
    second: &Event,
    second_label: &str,
) -> ScenarioResult {
    let end_of = |event: &Event, label: &str| -> ScenarioResult<u64> {
        let profile = event.profile().or_fail_with(|| format!("query profile of {label}"))?;
        profile.end.ok_or_else(|| {
            ScenarioError::assertion(format!("{label} ({}) has not finished", event.id()))
        })
    };
    let a = end_of(first, first_label)?;
    let b = end_of(second, second_label)?;
    if a <= b {
        Ok(())
    } else {
        Err(ScenarioError::assertion(format!(
            "{second_label} finished at {b}, before {first_label} at {a}"
        )))
    }
}

pub fn assert_payload(semaphore: &Semaphore, label: &str, expected: u64) -> ScenarioResult {
    let payload = semaphore.payload().or_fail_with(|| format!("query payload of {label}"))?;
    if payload == expected {
        Ok(())
    } else {
        Err(ScenarioError::assertion(format!(
            "{label} ({}): expected payload {expected}, observed {payload}",
            semaphore.id()
        )))
    }
}

/// `result` must be an error of one of the `expected` kinds.
pub fn expect_cl_error<T: Debug>(
    result: Result<T, ClError>,
    expected: &[ClError],
    what: &str,
) -> ScenarioResult {
    match result {
        Err(err) if expected.iter().any(|e| e.same_kind(&err)) => Ok(()),
        Err(err) => Err(ScenarioError::assertion(format!(
            "{what}: expected {}, got {err}",
            describe(expected)
        ))),
        Ok(value) => Err(ScenarioError::assertion(format!(
            "{what}: expected {}, but the call succeeded ({value:?})",
            describe(expected)
        ))),
    }
}

fn describe(expected: &[ClError]) -> String {
    expected.iter().map(ToString::to_string).collect::<Vec<_>>().join(" or ")
}

pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> ScenarioResult {
    if condition { Ok(()) } else { Err(ScenarioError::assertion(message())) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_error_passes() {
        expect_cl_error::<()>(Err(ClError::InvalidValue), &[ClError::InvalidValue], "x").unwrap();
        expect_cl_error::<()>(
            Err(ClError::InvalidProperty),
            &[ClError::InvalidValue, ClError::InvalidProperty],
            "x",
        )
        .unwrap();
    }

    #[test]
    fn wrong_error_names_both() {
        let err = expect_cl_error::<()>(Err(ClError::InvalidDevice), &[ClError::InvalidValue], "create")
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("invalid value"), "{text}");
        assert!(text.contains("invalid device"), "{text}");
    }

    #[test]
    fn success_is_a_failure() {
        let err = expect_cl_error(Ok(7), &[ClError::InvalidValue], "enqueue").unwrap_err();
        assert!(err.to_string().contains("succeeded (7)"));
    }

    #[test]
    fn ensure_builds_message_lazily() {
        ensure(true, || unreachable!()).unwrap();
        assert!(matches!(ensure(false, || "nope".into()), Err(ScenarioError::Assertion(_))));
    }
}
