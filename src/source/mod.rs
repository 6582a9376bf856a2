pub mod http;
pub mod tail;

pub use http::{HttpReceiver, LogEvent};
pub use tail::LogTail;

use crate::record::LogRecord;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http receiver error: {0}")]
    Http(String),
}

/// A tokenized record tagged with the server it belongs to.
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub server: String,
    pub record: LogRecord,
}

/// A transport that produces tokenized records into the shared queue until
/// cancelled.
#[async_trait]
pub trait LogSource: Send {
    fn name(&self) -> &str;

    async fn run(
        self: Box<Self>,
        queue: mpsc::Sender<SourceItem>,
        cancel: CancellationToken,
    ) -> Result<(), SourceError>;
}
