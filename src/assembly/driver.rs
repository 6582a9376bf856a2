use crate::analyze::{BackendAnalyzer, LineFilter};
use crate::assembly::group::{analyze_groups, group_by_backend, suppress};
use crate::assembly::readiness::partition;
use crate::assembly::sort::sort_stream;
use crate::assembly::stitch::stitch;
use crate::record::{ArtifactAllocator, LogFile, LogRecord, TransientLogState};
use chrono::{DateTime, Utc};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How long a record must sit before it is finalized on age alone.
pub const DEFAULT_READY_THRESHOLD: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("failed to allocate log artifact: {0}")]
    Allocate(#[source] io::Error),

    #[error("failed to write log artifact: {0}")]
    Write(#[source] io::Error),
}

/// A failed invocation. `records` is the input batch exactly as it was
/// passed in, so the caller can carry all of it over.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct AssemblyFailure {
    #[source]
    pub error: AssemblyError,
    pub records: Vec<LogRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub input: usize,
    pub ready: usize,
    pub deferred: usize,
    pub discarded: usize,
    pub suppressed: usize,
}

/// Result of one successful invocation.
#[derive(Debug, Default)]
pub struct Assembly {
    pub state: TransientLogState,
    pub log_file: LogFile,
    /// Records to resubmit with the next batch
    pub deferred: Vec<LogRecord>,
    pub stats: AssemblyStats,
}

/// Turns a batch of tokenized records into a finalized artifact plus a
/// carry-over set.
///
/// Holds only read-only collaborators; every call starts from fresh
/// classifier state, so one assembler can serve any number of sources.
#[derive(Clone)]
pub struct StreamAssembler {
    threshold: Duration,
    allocator: Arc<dyn ArtifactAllocator>,
    filter: Arc<dyn LineFilter>,
    analyzer: Arc<dyn BackendAnalyzer>,
}

impl StreamAssembler {
    pub fn new(
        allocator: Arc<dyn ArtifactAllocator>,
        filter: Arc<dyn LineFilter>,
        analyzer: Arc<dyn BackendAnalyzer>,
    ) -> Self {
        Self {
            threshold: DEFAULT_READY_THRESHOLD,
            allocator,
            filter,
            analyzer,
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn LineFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Sort, classify, stitch, filter, group, analyze and write `records`.
    ///
    /// An empty ready set is a normal outcome: the returned artifact is empty
    /// and every pending record comes back in `deferred`.
    pub fn analyze_stream_in_groups(
        &self,
        records: Vec<LogRecord>,
        now: DateTime<Utc>,
    ) -> Result<Assembly, AssemblyFailure> {
        let mut stats = AssemblyStats {
            input: records.len(),
            ..Default::default()
        };

        let mut batch = records.clone();
        let keys = sort_stream(&mut batch);

        let split = partition(batch, self.threshold, now);
        stats.ready = split.ready.len();
        stats.deferred = split.deferred.len();
        stats.discarded = split.discarded;

        if split.ready.is_empty() {
            debug!(
                input = stats.input,
                deferred = stats.deferred,
                discarded = stats.discarded,
                "no records ready"
            );
            return Ok(Assembly {
                deferred: split.deferred,
                stats,
                ..Default::default()
            });
        }

        let analyzable = stitch(split.ready);
        let (kept, suppressed) = suppress(analyzable, self.filter.as_ref());
        stats.suppressed = suppressed;

        let groups = group_by_backend(kept);
        let group_count = groups.len();
        let (finalized, query_samples) = analyze_groups(groups, self.analyzer.as_ref());

        let log_file = match self.write_artifact(finalized) {
            Ok(log_file) => log_file,
            Err(error) => return Err(AssemblyFailure { error, records }),
        };

        debug!(
            input = stats.input,
            ready = stats.ready,
            deferred = stats.deferred,
            discarded = stats.discarded,
            suppressed = stats.suppressed,
            groups = group_count,
            bytes = log_file.byte_size,
            sorted_by_pid = keys.backend_pid,
            "assembled log artifact"
        );

        Ok(Assembly {
            state: TransientLogState {
                collected_at: Some(now),
                query_samples,
            },
            log_file,
            deferred: split.deferred,
            stats,
        })
    }

    fn write_artifact(&self, records: Vec<LogRecord>) -> Result<LogFile, AssemblyError> {
        let storage = self.allocator.allocate().map_err(AssemblyError::Allocate)?;
        let mut log_file = LogFile::with_storage(storage);
        for record in records {
            log_file.append(record).map_err(AssemblyError::Write)?;
        }
        log_file.finish().map_err(AssemblyError::Write)?;
        Ok(log_file)
    }
}

impl std::fmt::Debug for StreamAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAssembler")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}
