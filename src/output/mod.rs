mod http;
mod spool;
mod submission;

pub use http::HttpSubmitter;
pub use spool::SpoolWriter;
pub use submission::{LogSubmission, SubmissionMetadata};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read artifact: {0}")]
    Artifact(#[source] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned error status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Delivers finalized artifacts somewhere outside the agent.
#[async_trait]
pub trait Submitter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn submit(&self, submission: &LogSubmission) -> Result<(), OutputError>;
}

/// Used when no destination is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSubmitter;

#[async_trait]
impl Submitter for LoggingSubmitter {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn submit(&self, submission: &LogSubmission) -> Result<(), OutputError> {
        info!(
            server = %submission.server,
            id = %submission.id,
            records = submission.log_file.records.len(),
            bytes = submission.log_file.byte_size,
            samples = submission.query_samples.len(),
            "would have sent log artifact"
        );
        Ok(())
    }
}

/// How often and how patiently a failed submission is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per submitter, including the first
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Submit with exponential backoff. Returns the last error once every attempt
/// has failed.
pub async fn submit_with_retry(
    submitter: &dyn Submitter,
    submission: &LogSubmission,
    policy: RetryPolicy,
) -> Result<(), OutputError> {
    let mut attempts = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        match submitter.submit(submission).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempts += 1;
                if attempts >= policy.max_attempts {
                    return Err(e);
                }

                warn!(
                    server = %submission.server,
                    id = %submission.id,
                    submitter = submitter.name(),
                    attempt = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "failed to submit log artifact, retrying"
                );

                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, policy.max_backoff);
            }
        }
    }
}

/// Hand every submission to each submitter in turn until the channel closes.
///
/// Each submitter retries on its own per `retry`. A submission that still
/// fails is dropped, which cleans up its artifact.
pub async fn run_submitter(
    mut rx: mpsc::Receiver<LogSubmission>,
    submitters: Vec<Arc<dyn Submitter>>,
    retry: RetryPolicy,
) -> usize {
    let mut delivered = 0;

    while let Some(submission) = rx.recv().await {
        let mut ok = true;
        for submitter in &submitters {
            if let Err(e) = submit_with_retry(submitter.as_ref(), &submission, retry).await {
                error!(
                    server = %submission.server,
                    id = %submission.id,
                    submitter = submitter.name(),
                    attempts = retry.max_attempts,
                    error = %e,
                    "giving up on log artifact, discarding"
                );
                ok = false;
            }
        }
        if ok {
            debug!(server = %submission.server, id = %submission.id, "submitted log artifact");
            delivered += 1;
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::NoFilter;
    use crate::assembly::StreamAssembler;
    use crate::record::{LogLevel, LogRecord, MemoryAllocator, QuerySample};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PassThrough;

    impl crate::analyze::BackendAnalyzer for PassThrough {
        fn analyze(&self, _backend_pid: i32, records: Vec<LogRecord>) -> (Vec<LogRecord>, Vec<QuerySample>) {
            (records, Vec::new())
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Submitter for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn submit(&self, _submission: &LogSubmission) -> Result<(), OutputError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(OutputError::Rejected {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    fn make_submission() -> LogSubmission {
        let now = Utc::now();
        let assembler =
            StreamAssembler::new(Arc::new(MemoryAllocator), Arc::new(NoFilter), Arc::new(PassThrough));
        let assembly = assembler
            .analyze_stream_in_groups(
                vec![LogRecord::new(LogLevel::Log, "x\n", now - chrono::Duration::seconds(10))],
                now,
            )
            .unwrap();
        LogSubmission {
            server: "db".to_string(),
            id: assembly.log_file.id,
            collected_at: now,
            log_file: assembly.log_file,
            query_samples: Vec::new(),
            collector: "test".to_string(),
        }
    }

    fn fast_retry(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let flaky = Arc::new(Flaky::new(2));
        let (tx, rx) = mpsc::channel(4);
        tx.send(make_submission()).await.unwrap();
        drop(tx);

        let submitters: Vec<Arc<dyn Submitter>> = vec![flaky.clone() as Arc<dyn Submitter>];
        let delivered = run_submitter(rx, submitters, fast_retry(3)).await;

        assert_eq!(delivered, 1);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let flaky = Arc::new(Flaky::new(usize::MAX));
        let healthy = Arc::new(Flaky::new(0));
        let (tx, rx) = mpsc::channel(4);
        tx.send(make_submission()).await.unwrap();
        drop(tx);

        let submitters: Vec<Arc<dyn Submitter>> = vec![
            flaky.clone() as Arc<dyn Submitter>,
            healthy.clone() as Arc<dyn Submitter>,
        ];
        let delivered = run_submitter(rx, submitters, fast_retry(3)).await;

        assert_eq!(delivered, 0);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }
}
