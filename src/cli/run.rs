use crate::analyze::{IgnorePatterns, StatementAnalyzer};
use crate::assembly::StreamAssembler;
use crate::config::{load_config, Config, ConfigError};
use crate::output::{
    run_submitter, HttpSubmitter, LoggingSubmitter, OutputError, RetryPolicy, SpoolWriter,
    Submitter,
};
use crate::record::TempFileAllocator;
use crate::source::{HttpReceiver, LogSource, LogTail, SourceError};
use crate::stream::{jitter_for, RouterStats, RunnerStats, StreamRouter, StreamRunner};
use crate::tokenizer::{PrefixTokenizer, TokenizerError};
use futures::future::join_all;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SUBMISSION_QUEUE_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("output error: {0}")]
    Output(#[from] OutputError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid listen address '{0}'")]
    Listen(String),
}

/// Totals reported when the agent shuts down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentSummary {
    pub delivered: usize,
    pub router: RouterStats,
    pub streams: HashMap<String, RunnerStats>,
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(config_path) = config_path else {
        eprintln!("Error: config not found");
        eprintln!("Searched locations:");
        eprintln!("  ~/.config/logstitch/config.yml");
        eprintln!("  /etc/logstitch/config.yml");
        eprintln!("\nUse --config <path> to specify a config file, or run 'logstitch config init' to generate one.");
        std::process::exit(1);
    };

    let config = load_from(&config_path)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            ctrl_c.cancel();
        }
    });

    let summary = run_agent(config, cancel).await?;
    info!(
        delivered = summary.delivered,
        routed = summary.router.routed,
        unknown = summary.router.unknown,
        "Shutdown complete"
    );
    Ok(())
}

fn load_from(path: &Path) -> Result<Config, RunError> {
    info!(config_path = %path.display(), "Loading configuration");
    Ok(load_config(path)?)
}

fn collector_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "logstitch".to_string())
}

fn build_submitters(config: &Config) -> Result<Vec<Arc<dyn Submitter>>, RunError> {
    let mut submitters: Vec<Arc<dyn Submitter>> = Vec::new();
    if let Some(dir) = &config.output.spool_dir {
        info!(dir = %dir.display(), "Writing log artifacts to spool directory");
        submitters.push(Arc::new(SpoolWriter::new(dir)));
    }
    if let Some(endpoint) = &config.output.endpoint {
        info!(endpoint = %endpoint, "Submitting log artifacts over HTTP");
        submitters.push(Arc::new(HttpSubmitter::new(
            endpoint,
            config.output.submit_timeout,
        )?));
    }
    if submitters.is_empty() {
        submitters.push(Arc::new(LoggingSubmitter));
    }
    Ok(submitters)
}

/// Run every configured source and accumulation loop until `cancel` fires,
/// then wait for all of them to stop.
pub async fn run_agent(config: Config, cancel: CancellationToken) -> Result<AgentSummary, RunError> {
    let collector = collector_name();
    info!(collector = %collector, servers = config.servers.len(), "Starting log streams");

    let allocator = Arc::new(TempFileAllocator::new(config.output.artifact_dir.clone()));
    let analyzer = Arc::new(StatementAnalyzer::new()?);

    let submitters = build_submitters(&config)?;
    let (sub_tx, sub_rx) = mpsc::channel(SUBMISSION_QUEUE_LEN);
    let retry = RetryPolicy {
        max_attempts: config.output.submit_attempts,
        initial_backoff: config.output.retry_backoff,
        ..Default::default()
    };
    let submitter_handle = tokio::spawn(run_submitter(sub_rx, submitters, retry));

    let (queue_tx, queue_rx) = mpsc::channel(config.stream.queue_len);
    let mut router = StreamRouter::new();
    let mut sources: Vec<Box<dyn LogSource>> = Vec::new();
    let mut tokenizers = HashMap::new();
    let mut runner_handles = Vec::new();

    for (name, server) in &config.servers {
        let tokenizer = Arc::new(PrefixTokenizer::new(server.log_prefix.as_deref())?);
        let filter = Arc::new(IgnorePatterns::new(&server.ignore_patterns)?);
        let assembler = StreamAssembler::new(allocator.clone(), filter, analyzer.clone())
            .with_threshold(config.stream.ready_threshold);

        let (tx, rx) = mpsc::channel(config.stream.queue_len);
        router.register(name.clone(), tx);

        let runner = StreamRunner::new(name.clone(), assembler)
            .with_tick_interval(config.stream.tick_interval)
            .with_jitter(jitter_for(name, config.stream.max_jitter))
            .with_collector(collector.clone());
        let handle = tokio::spawn(runner.run(rx, sub_tx.clone(), cancel.clone()));
        runner_handles.push((name.clone(), handle));

        if let Some(path) = &server.log_tail {
            sources.push(Box::new(LogTail::new(
                name.clone(),
                path.clone(),
                tokenizer.clone(),
                server.log_tail_from_start,
            )));
        }
        tokenizers.insert(name.clone(), tokenizer);
    }
    drop(sub_tx);

    if let Some(http) = &config.http {
        let listen: SocketAddr = http
            .listen
            .parse()
            .map_err(|_| RunError::Listen(http.listen.clone()))?;
        sources.push(Box::new(HttpReceiver::new(listen, tokenizers)));
    }

    let router_handle = tokio::spawn(router.run(queue_rx, cancel.clone()));

    let mut source_handles = Vec::new();
    for source in sources {
        let name = source.name().to_string();
        let queue = queue_tx.clone();
        let cancel = cancel.clone();
        source_handles.push(tokio::spawn(async move {
            let result = source.run(queue, cancel.clone()).await;
            if let Err(e) = &result {
                // A dead source would otherwise leave its server silent forever
                error!(source = %name, error = %e, "Log source failed, shutting down");
                cancel.cancel();
            }
            result
        }));
    }
    drop(queue_tx);

    info!("Log streams started, press Ctrl+C to shutdown");
    cancel.cancelled().await;
    info!("Waiting for log streams to stop");

    let mut first_error: Option<RunError> = None;
    for result in join_all(source_handles).await {
        if let Err(e) = result? {
            first_error.get_or_insert(e.into());
        }
    }

    let router_stats = router_handle.await?;
    let mut streams = HashMap::new();
    for (name, handle) in runner_handles {
        streams.insert(name, handle.await?);
    }
    let delivered = submitter_handle.await?;

    if let Some(e) = first_error {
        return Err(e);
    }

    Ok(AgentSummary {
        delivered,
        router: router_stats,
        streams,
    })
}
