use crate::record::{LogFile, LogRecord, QuerySample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A finalized artifact tagged with its server, ready to leave the agent.
///
/// Dropping the submission releases the artifact's storage.
#[derive(Debug)]
pub struct LogSubmission {
    pub server: String,
    /// Same as `log_file.id`
    pub id: Uuid,
    pub collected_at: DateTime<Utc>,
    pub log_file: LogFile,
    pub query_samples: Vec<QuerySample>,
    pub collector: String,
}

/// Everything about a submission except the artifact bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    pub server: String,
    /// Same as `log_file.id`
    pub id: Uuid,
    pub collected_at: DateTime<Utc>,
    pub collector: String,
    pub byte_size: u64,
    pub records: Vec<LogRecord>,
    pub query_samples: Vec<QuerySample>,
}

impl LogSubmission {
    pub fn metadata(&self) -> SubmissionMetadata {
        SubmissionMetadata {
            server: self.server.clone(),
            id: self.id,
            collected_at: self.collected_at,
            collector: self.collector.clone(),
            byte_size: self.log_file.byte_size,
            records: self.log_file.records.clone(),
            query_samples: self.query_samples.clone(),
        }
    }
}
