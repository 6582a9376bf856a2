use crate::record::LogRecord;
use crate::source::{LogSource, SourceError, SourceItem};
use crate::tokenizer::PrefixTokenizer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::{File, Metadata};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const REOPEN_INTERVAL: Duration = Duration::from_secs(1);

/// Lines stamped further back than this before startup are skipped.
const MAX_STARTUP_AGE_SECS: i64 = 60;

/// Follows a local Postgres log file and tokenizes each line.
pub struct LogTail {
    server: String,
    path: PathBuf,
    tokenizer: Arc<PrefixTokenizer>,
    follow: bool,
    lines_newer_than: DateTime<Utc>,

    file: Option<BufReader<File>>,
    file_inode: Option<u64>,
    position: u64,
    // Seek to the end on the next open; only true before the first open
    start_at_end: bool,
    // Bytes of a line whose newline has not been written yet
    partial: Vec<u8>,
    // The last main record was before the cutoff; drop its continuations
    skipping_old: bool,
    missing_logged: bool,
}

impl LogTail {
    pub fn new(
        server: impl Into<String>,
        path: impl Into<PathBuf>,
        tokenizer: Arc<PrefixTokenizer>,
        from_start: bool,
    ) -> Self {
        Self {
            server: server.into(),
            path: path.into(),
            tokenizer,
            follow: true,
            lines_newer_than: Utc::now() - chrono::Duration::seconds(MAX_STARTUP_AGE_SECS),
            file: None,
            file_inode: None,
            position: 0,
            start_at_end: !from_start,
            partial: Vec::new(),
            skipping_old: false,
            missing_logged: false,
        }
    }

    /// Stop at end of file instead of waiting for more data.
    pub fn without_follow(mut self) -> Self {
        self.follow = false;
        self
    }

    /// Skip records whose timestamp is before `cutoff`.
    pub fn with_lines_newer_than(mut self, cutoff: DateTime<Utc>) -> Self {
        self.lines_newer_than = cutoff;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> SourceError {
        SourceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path).map_err(|e| self.io_err(e))?;
        let metadata = file.metadata().map_err(|e| self.io_err(e))?;
        self.file_inode = Some(get_inode(&metadata));

        let mut reader = BufReader::new(file);
        self.position = if self.start_at_end {
            reader.seek(SeekFrom::End(0)).map_err(|e| self.io_err(e))?
        } else {
            0
        };
        self.start_at_end = false;
        self.file = Some(reader);
        self.missing_logged = false;

        debug!(server = %self.server, path = %self.path.display(), offset = self.position, "opened log file");
        Ok(())
    }

    /// Whether the file at `path` is no longer the one we have open, either
    /// because it was replaced or because it was truncated.
    fn check_file_rotation(&self) -> Result<bool, SourceError> {
        let Some(original_inode) = self.file_inode else {
            return Ok(false);
        };
        match std::fs::metadata(&self.path) {
            Ok(metadata) => {
                Ok(get_inode(&metadata) != original_inode || metadata.len() < self.position)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Next complete line including its trailing newline. Returns `None` at
    /// end of file when not following. Invalid UTF-8 is replaced, not
    /// rejected.
    pub async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        loop {
            if self.file.is_none() {
                match self.open() {
                    Ok(()) => {}
                    Err(SourceError::Io { source, .. })
                        if source.kind() == std::io::ErrorKind::NotFound && self.follow =>
                    {
                        if !self.missing_logged {
                            warn!(server = %self.server, path = %self.path.display(), "log file does not exist yet, waiting");
                            self.missing_logged = true;
                        }
                        sleep(REOPEN_INTERVAL).await;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            let read = match self.file.as_mut() {
                Some(file) => file.read_until(b'\n', &mut self.partial),
                None => continue,
            };
            let bytes_read = read.map_err(|e| self.io_err(e))?;
            self.position += bytes_read as u64;

            if bytes_read > 0 {
                if self.partial.ends_with(b"\n") {
                    return Ok(Some(self.take_partial()));
                }
                continue;
            }

            if !self.follow {
                if self.partial.is_empty() {
                    return Ok(None);
                }
                let mut line = self.take_partial();
                line.push('\n');
                return Ok(Some(line));
            }

            if self.check_file_rotation()? {
                info!(server = %self.server, path = %self.path.display(), "log file rotated, reopening");
                self.file = None;
                self.file_inode = None;
                continue;
            }

            sleep(POLL_INTERVAL).await;
        }
    }

    fn take_partial(&mut self) -> String {
        let bytes = std::mem::take(&mut self.partial);
        match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    /// Next tokenized record, skipping records older than the startup cutoff
    /// together with their continuation lines.
    pub async fn next_record(&mut self) -> Result<Option<LogRecord>, SourceError> {
        loop {
            let Some(line) = self.next_line().await? else {
                return Ok(None);
            };
            let record = self.tokenizer.tokenize(&line, Utc::now());
            if record.is_main() {
                self.skipping_old = record
                    .occurred_at
                    .is_some_and(|ts| ts < self.lines_newer_than);
            }
            if self.skipping_old {
                continue;
            }
            return Ok(Some(record));
        }
    }
}

#[async_trait]
impl LogSource for LogTail {
    fn name(&self) -> &str {
        &self.server
    }

    async fn run(
        mut self: Box<Self>,
        queue: mpsc::Sender<SourceItem>,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        info!(server = %self.server, path = %self.path.display(), "starting log tail");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = self.next_record() => {
                    let Some(record) = next? else { break };
                    let item = SourceItem { server: self.server.clone(), record };
                    if queue.send(item).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!(server = %self.server, "log tail stopped");
        Ok(())
    }
}

#[cfg(unix)]
fn get_inode(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn get_inode(metadata: &Metadata) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    if let Ok(created) = metadata.created() {
        created.hash(&mut hasher);
    }
    hasher.finish()
}
