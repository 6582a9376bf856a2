use crate::assembly::StreamAssembler;
use crate::output::LogSubmission;
use crate::record::{LogClassification, LogRecord};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stable per-server timer offset in `[0, max]`, so loops started together do
/// not all re-evaluate on the same tick.
pub fn jitter_for(server: &str, max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let digest = Sha256::digest(server.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    Duration::from_millis(u64::from_be_bytes(head) % (max_ms + 1))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub invocations: usize,
    pub submitted: usize,
    pub failures: usize,
    pub discarded: usize,
    pub suppressed: usize,
    /// Deferred records still pending when the loop stopped
    pub abandoned: usize,
}

/// The accumulation loop for one server.
///
/// Owns the carry-over buffer. Invokes the assembler whenever records arrive
/// and on every tick, and forwards non-empty results downstream.
#[derive(Debug)]
pub struct StreamRunner {
    server: String,
    assembler: StreamAssembler,
    tick_interval: Duration,
    jitter: Duration,
    collector: String,
}

impl StreamRunner {
    pub fn new(server: impl Into<String>, assembler: StreamAssembler) -> Self {
        let tick_interval = assembler.threshold();
        Self {
            server: server.into(),
            assembler,
            tick_interval,
            jitter: Duration::ZERO,
            collector: "logstitch".to_string(),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_collector(mut self, collector: impl Into<String>) -> Self {
        self.collector = collector.into();
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub async fn run(
        self,
        mut rx: mpsc::Receiver<LogRecord>,
        out: mpsc::Sender<LogSubmission>,
        cancel: CancellationToken,
    ) -> RunnerStats {
        info!(
            server = %self.server,
            tick_ms = self.tick_interval.as_millis() as u64,
            jitter_ms = self.jitter.as_millis() as u64,
            "starting log stream"
        );

        let mut stats = RunnerStats::default();
        let mut deferred: Vec<LogRecord> = Vec::new();
        let start = Instant::now() + self.tick_interval + self.jitter;
        let mut ticker = interval_at(start, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let open = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(record) => {
                        deferred.push(record);
                        while let Ok(record) = rx.try_recv() {
                            deferred.push(record);
                        }
                        self.assemble(&mut deferred, &out, &cancel, &mut stats).await
                    }
                    None => break,
                },
                _ = ticker.tick() => self.assemble(&mut deferred, &out, &cancel, &mut stats).await,
            };
            if !open {
                break;
            }
        }

        stats.abandoned = deferred.len();
        info!(
            server = %self.server,
            submitted = stats.submitted,
            discarded = stats.discarded,
            abandoned = stats.abandoned,
            "log stream stopped"
        );
        stats
    }

    /// One driver invocation over the carry-over buffer. Returns false once
    /// downstream has gone away.
    async fn assemble(
        &self,
        deferred: &mut Vec<LogRecord>,
        out: &mpsc::Sender<LogSubmission>,
        cancel: &CancellationToken,
        stats: &mut RunnerStats,
    ) -> bool {
        if deferred.is_empty() {
            return true;
        }

        let now = Utc::now();
        let batch = std::mem::take(deferred);
        stats.invocations += 1;

        let assembly = match self.assembler.analyze_stream_in_groups(batch, now) {
            Ok(assembly) => assembly,
            Err(failure) => {
                warn!(
                    server = %self.server,
                    error = %failure.error,
                    records = failure.records.len(),
                    "failed to assemble log artifact, keeping records for next attempt"
                );
                stats.failures += 1;
                *deferred = failure.records;
                return true;
            }
        };

        *deferred = assembly.deferred;
        stats.discarded += assembly.stats.discarded;
        stats.suppressed += assembly.stats.suppressed;
        if assembly.stats.discarded > 0 {
            warn!(
                server = %self.server,
                count = assembly.stats.discarded,
                "discarding log lines that could not be attributed"
            );
        }

        if assembly.log_file.is_empty() && assembly.state.query_samples.is_empty() {
            return true;
        }

        for record in &assembly.log_file.records {
            if record.classification == LogClassification::CollectorIdentify {
                info!(
                    server = %self.server,
                    marker = ?record.details.get("server"),
                    "log stream identified"
                );
            }
        }

        let submission = LogSubmission {
            server: self.server.clone(),
            id: assembly.log_file.id,
            collected_at: assembly.state.collected_at.unwrap_or(now),
            log_file: assembly.log_file,
            query_samples: assembly.state.query_samples,
            collector: self.collector.clone(),
        };
        debug!(
            server = %self.server,
            id = %submission.id,
            records = submission.log_file.records.len(),
            bytes = submission.log_file.byte_size,
            deferred = deferred.len(),
            "emitting log artifact"
        );

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            sent = out.send(submission) => sent,
        };
        if sent.is_err() {
            return false;
        }
        stats.submitted += 1;
        true
    }
}
