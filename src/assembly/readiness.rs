use crate::record::LogRecord;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of classifying one record in a sorted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Safe to finalize now.
    Ready,
    /// Keep for the next invocation.
    Defer,
    /// Never attributable; drop it.
    Discard,
}

/// Running attribution state threaded through one batch.
///
/// `None` marks "no owner": either nothing has been finalized yet in this
/// batch or the most recent main record was not ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierState {
    pub last_ready_main_pid: Option<i32>,
    pub last_ready_prefix_pid: Option<i32>,
}

/// Classify `record` against `state` and return the verdict together with the
/// state to use for the next record.
pub fn classify(
    record: &LogRecord,
    threshold: Duration,
    now: DateTime<Utc>,
    state: ClassifierState,
) -> (Readiness, ClassifierState) {
    let stale = record.is_older_than(threshold, now);

    if record.is_main() {
        let attached = record.level.is_continuation_class()
            && state.last_ready_main_pid == Some(record.backend_pid);
        let readiness = if stale || attached {
            Readiness::Ready
        } else {
            Readiness::Defer
        };

        let last_ready_main_pid = match readiness {
            Readiness::Ready if record.level.is_main_class() => Some(record.backend_pid),
            Readiness::Ready => state.last_ready_main_pid,
            _ => None,
        };
        let last_ready_prefix_pid = match readiness {
            Readiness::Ready => Some(record.backend_pid),
            _ => None,
        };
        let next = ClassifierState {
            last_ready_main_pid,
            last_ready_prefix_pid,
        };
        return (readiness, next);
    }

    // Continuation records never move the state.
    let readiness = if record.has_pid() {
        if state.last_ready_prefix_pid == Some(record.backend_pid) {
            Readiness::Ready
        } else {
            Readiness::Defer
        }
    } else if state.last_ready_prefix_pid.is_some() {
        Readiness::Ready
    } else if stale {
        Readiness::Discard
    } else {
        Readiness::Defer
    };
    (readiness, state)
}

/// Records split by readiness, each list in the order it was classified.
#[derive(Debug, Default)]
pub struct Partition {
    pub ready: Vec<LogRecord>,
    pub deferred: Vec<LogRecord>,
    pub discarded: usize,
}

/// Fold [`classify`] over an already sorted batch, starting from a fresh state.
pub fn partition(records: Vec<LogRecord>, threshold: Duration, now: DateTime<Utc>) -> Partition {
    let mut out = Partition::default();
    let mut state = ClassifierState::default();

    for record in records {
        let (readiness, next) = classify(&record, threshold, now, state);
        state = next;
        match readiness {
            Readiness::Ready => out.ready.push(record),
            Readiness::Defer => out.deferred.push(record),
            Readiness::Discard => out.discarded += 1,
        }
    }

    out
}
