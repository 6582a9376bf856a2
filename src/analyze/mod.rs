mod filter;
mod statement;

pub use filter::{IgnorePatterns, LineFilter, NoFilter};
pub use statement::StatementAnalyzer;

use crate::record::{LogRecord, QuerySample};

/// Semantic analysis over the finalized records of one backend process.
///
/// Implementations are shared read-only across accumulation loops and must be
/// total: malformed text is expected input and never an error.
pub trait BackendAnalyzer: Send + Sync {
    fn analyze(&self, backend_pid: i32, records: Vec<LogRecord>)
        -> (Vec<LogRecord>, Vec<QuerySample>);
}
