use crate::record::level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Process id value meaning "the line did not carry a pid".
pub const UNKNOWN_PID: i32 = 0;

/// What the backend analyzer recognised a finalized record to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogClassification {
    #[default]
    Unclassified,
    StatementDuration,
    StatementLog,
    StatementError,
    CollectorIdentify,
}

/// One physical line of database log output after tokenization.
///
/// Continuation records hold only their own text until the stitcher merges
/// them into the owning record. Byte offsets are meaningless until the record
/// has been written into a [`LogFile`](crate::record::LogFile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: Uuid,
    pub content: String,
    pub level: LogLevel,
    pub backend_pid: i32,

    /// `%l` in log_line_prefix (or the provider's record index), 0 when absent
    pub log_line_number: i32,
    /// Split index of a message the transport chunked, 0 when absent
    pub log_line_number_chunk: i32,

    pub occurred_at: Option<DateTime<Utc>>,
    /// Local receipt time, only used to decide when a record is safe to finalize
    pub collected_at: DateTime<Utc>,

    pub byte_start: u64,
    pub byte_content_start: u64,
    pub byte_end: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,

    #[serde(default)]
    pub classification: LogClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, content: impl Into<String>, collected_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            level,
            backend_pid: UNKNOWN_PID,
            log_line_number: 0,
            log_line_number_chunk: 0,
            occurred_at: None,
            collected_at,
            byte_start: 0,
            byte_content_start: 0,
            byte_end: 0,
            username: None,
            database: None,
            application: None,
            classification: LogClassification::Unclassified,
            query: None,
            details: BTreeMap::new(),
        }
    }

    /// A line without a record-start marker.
    pub fn continuation(content: impl Into<String>, collected_at: DateTime<Utc>) -> Self {
        Self::new(LogLevel::Unknown, content, collected_at)
    }

    pub fn with_pid(mut self, backend_pid: i32) -> Self {
        self.backend_pid = backend_pid;
        self
    }

    pub fn with_line_number(mut self, log_line_number: i32) -> Self {
        self.log_line_number = log_line_number;
        self
    }

    pub fn with_chunk(mut self, log_line_number_chunk: i32) -> Self {
        self.log_line_number_chunk = log_line_number_chunk;
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Main records carry a record-start marker.
    pub fn is_main(&self) -> bool {
        self.level.is_known()
    }

    pub fn has_pid(&self) -> bool {
        self.backend_pid != UNKNOWN_PID
    }

    /// True once the record was received more than `threshold` before `now`.
    ///
    /// Records stamped in the future relative to `now` are never stale.
    pub fn is_older_than(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.collected_at)
            .to_std()
            .map(|age| age > threshold)
            .unwrap_or(false)
    }

    pub fn byte_len(&self) -> u64 {
        self.content.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_older_than() {
        let now = Utc::now();
        let threshold = Duration::from_secs(3);

        let old = LogRecord::new(LogLevel::Log, "x\n", now - chrono::Duration::seconds(5));
        assert!(old.is_older_than(threshold, now));

        let fresh = LogRecord::new(LogLevel::Log, "x\n", now);
        assert!(!fresh.is_older_than(threshold, now));

        let boundary = LogRecord::new(LogLevel::Log, "x\n", now - chrono::Duration::seconds(3));
        assert!(!boundary.is_older_than(threshold, now));

        let future = LogRecord::new(LogLevel::Log, "x\n", now + chrono::Duration::seconds(30));
        assert!(!future.is_older_than(threshold, now));
    }

    #[test]
    fn test_continuation_has_no_marker() {
        let record = LogRecord::continuation("  AND x = 1\n", Utc::now());
        assert!(!record.is_main());
        assert!(!record.has_pid());
        assert_eq!(record.byte_len(), 12);
    }
}
