use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A slow-query sample extracted from a `duration: ... statement: ...` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySample {
    pub occurred_at: Option<DateTime<Utc>>,
    pub backend_pid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub query: String,
    pub runtime_ms: f64,
}

/// Per-invocation output of the assembly driver that is not part of the artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransientLogState {
    /// None when nothing was finalized in this invocation
    pub collected_at: Option<DateTime<Utc>>,
    pub query_samples: Vec<QuerySample>,
}
