use crate::record::{LogRecord, UNKNOWN_PID};
use std::cmp::Ordering;

/// Which ordering keys are present on every record of a batch.
///
/// A key that is missing on even one record is ignored entirely, so partially
/// keyed transports fall back to arrival order for that key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortKeys {
    pub backend_pid: bool,
    pub log_line_number: bool,
    pub log_line_number_chunk: bool,
    pub occurred_at: bool,
}

impl SortKeys {
    pub fn uniform(records: &[LogRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        Self {
            backend_pid: records.iter().all(|r| r.backend_pid != UNKNOWN_PID),
            log_line_number: records.iter().all(|r| r.log_line_number != 0),
            log_line_number_chunk: records.iter().all(|r| r.log_line_number_chunk != 0),
            occurred_at: records.iter().all(|r| r.occurred_at.is_some()),
        }
    }

    pub fn any(&self) -> bool {
        self.backend_pid || self.log_line_number || self.log_line_number_chunk || self.occurred_at
    }

    fn compare(&self, a: &LogRecord, b: &LogRecord) -> Ordering {
        let mut ord = Ordering::Equal;
        if self.backend_pid {
            ord = ord.then(a.backend_pid.cmp(&b.backend_pid));
        }
        if self.log_line_number {
            ord = ord.then(a.log_line_number.cmp(&b.log_line_number));
        }
        if self.log_line_number_chunk {
            ord = ord.then(a.log_line_number_chunk.cmp(&b.log_line_number_chunk));
        }
        if self.occurred_at {
            ord = ord.then(a.occurred_at.cmp(&b.occurred_at));
        }
        ord
    }
}

/// Stable-sort `records` by the keys uniformly present in the batch and
/// return the keys that were used.
pub fn sort_stream(records: &mut [LogRecord]) -> SortKeys {
    let keys = SortKeys::uniform(records);
    if keys.any() {
        records.sort_by(|a, b| keys.compare(a, b));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;
    use chrono::{TimeZone, Utc};

    fn make_record(content: &str) -> LogRecord {
        LogRecord::new(LogLevel::Log, content, Utc::now())
    }

    fn contents(records: &[LogRecord]) -> Vec<&str> {
        records.iter().map(|r| r.content.as_str()).collect()
    }

    #[test]
    fn test_sort_by_pid_then_line_number() {
        let mut records = vec![
            make_record("b2").with_pid(20).with_line_number(2),
            make_record("a2").with_pid(10).with_line_number(2),
            make_record("b1").with_pid(20).with_line_number(1),
            make_record("a1").with_pid(10).with_line_number(1),
        ];
        let keys = sort_stream(&mut records);

        assert!(keys.backend_pid && keys.log_line_number);
        assert!(!keys.log_line_number_chunk && !keys.occurred_at);
        assert_eq!(contents(&records), vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn test_partial_key_is_disabled() {
        // Line numbers are missing on one record, so only pid orders the batch
        let mut records = vec![
            make_record("late").with_pid(5).with_line_number(9),
            make_record("early").with_pid(5).with_line_number(1),
            make_record("none").with_pid(5),
            make_record("first").with_pid(1).with_line_number(3),
        ];
        let keys = sort_stream(&mut records);

        assert!(keys.backend_pid);
        assert!(!keys.log_line_number);
        assert_eq!(contents(&records), vec!["first", "late", "early", "none"]);
    }

    #[test]
    fn test_no_keys_preserves_arrival_order() {
        let mut records = vec![make_record("c"), make_record("a"), make_record("b")];
        let keys = sort_stream(&mut records);

        assert!(!keys.any());
        assert_eq!(contents(&records), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_sort_by_occurred_at() {
        let t = |s: i64| Utc.timestamp_opt(1_700_000_000 + s, 0).unwrap();
        let mut records = vec![
            make_record("third").with_occurred_at(t(3)),
            make_record("first").with_occurred_at(t(1)),
            make_record("second-a").with_occurred_at(t(2)),
            make_record("second-b").with_occurred_at(t(2)),
        ];
        sort_stream(&mut records);

        assert_eq!(
            contents(&records),
            vec!["first", "second-a", "second-b", "third"]
        );
    }

    #[test]
    fn test_empty_batch() {
        let mut records: Vec<LogRecord> = Vec::new();
        assert_eq!(sort_stream(&mut records), SortKeys::default());
    }
}
