use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub servers: BTreeMap<String, ServerConfig>,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub http: Option<HttpConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn has_http(&self) -> bool {
        self.http.is_some()
    }

    /// Servers with a local file to follow
    pub fn tailed_servers(&self) -> impl Iterator<Item = (&str, &ServerConfig)> {
        self.servers
            .iter()
            .filter(|(_, server)| server.log_tail.is_some())
            .map(|(name, server)| (name.as_str(), server))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Local Postgres log file to follow
    #[serde(default)]
    pub log_tail: Option<PathBuf>,
    /// Read the whole file on startup instead of starting at its end
    #[serde(default)]
    pub log_tail_from_start: bool,
    /// Known log_line_prefix. Detected per line when unset.
    #[serde(default)]
    pub log_prefix: Option<String>,
    /// Records whose content matches any of these are never submitted
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_ready_threshold", with = "humantime_serde")]
    pub ready_threshold: Duration,
    #[serde(default = "default_tick_interval", with = "humantime_serde")]
    pub tick_interval: Duration,
    #[serde(default = "default_max_jitter", with = "humantime_serde")]
    pub max_jitter: Duration,
    #[serde(default = "default_queue_len")]
    pub queue_len: usize,
}

fn default_ready_threshold() -> Duration {
    Duration::from_secs(3)
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_max_jitter() -> Duration {
    Duration::from_millis(500)
}

fn default_queue_len() -> usize {
    10_000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ready_threshold: default_ready_threshold(),
            tick_interval: default_tick_interval(),
            max_jitter: default_max_jitter(),
            queue_len: default_queue_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write `<id>.log` / `<id>.json` pairs here
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
    /// POST each submission here as JSON
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_submit_timeout", with = "humantime_serde")]
    pub submit_timeout: Duration,
    /// Attempts per artifact and destination before it is dropped
    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: usize,
    /// First retry delay; doubles per attempt
    #[serde(default = "default_retry_backoff", with = "humantime_serde")]
    pub retry_backoff: Duration,
    /// Where artifact temp files are created; the system temp dir when unset
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
}

fn default_submit_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_submit_attempts() -> usize {
    5
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(1)
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            spool_dir: None,
            endpoint: None,
            submit_timeout: default_submit_timeout(),
            submit_attempts: default_submit_attempts(),
            retry_backoff: default_retry_backoff(),
            artifact_dir: None,
        }
    }
}
