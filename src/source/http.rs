use crate::record::{LogLevel, LogRecord};
use crate::source::{LogSource, SourceError, SourceItem};
use crate::tokenizer::PrefixTokenizer;
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// One structured event pushed by a provider that delivers JSON instead of
/// raw log text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEvent {
    /// Either a full log line, or the message body when `level` is set
    pub message: String,
    #[serde(default)]
    pub level: Option<String>,
    /// Sidecar DETAIL text the provider split off the main message
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub backend_pid: Option<i32>,
    #[serde(default)]
    pub log_line_number: Option<i32>,
    #[serde(default)]
    pub log_line_number_chunk: Option<i32>,
}

fn with_newline(text: &str) -> String {
    let mut line = text.to_string();
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

/// Turn one structured event into its main record plus, when the event has a
/// detail sidecar, a DETAIL record that follows it.
pub fn records_from_event(
    event: &LogEvent,
    tokenizer: &PrefixTokenizer,
    collected_at: DateTime<Utc>,
) -> Vec<LogRecord> {
    let message = with_newline(&event.message);
    let mut record = match event.level.as_deref() {
        Some(label) => LogRecord::new(
            LogLevel::from_label(label).unwrap_or_default(),
            message,
            collected_at,
        ),
        None => tokenizer.tokenize(&message, collected_at),
    };

    if let Some(pid) = event.backend_pid {
        record.backend_pid = pid;
    }
    if let Some(line) = event.log_line_number {
        record.log_line_number = line;
    }
    if let Some(chunk) = event.log_line_number_chunk {
        record.log_line_number_chunk = chunk;
    }
    if event.occurred_at.is_some() {
        record.occurred_at = event.occurred_at;
    }

    let detail = event
        .detail
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(|d| {
            let mut detail = record.clone();
            detail.id = uuid::Uuid::new_v4();
            detail.level = LogLevel::Detail;
            detail.content = with_newline(d);
            detail
        });

    let mut records = vec![record];
    records.extend(detail);
    records
}

/// Shared state for the receiver routes
#[derive(Clone)]
pub struct ReceiverState {
    pub queue: mpsc::Sender<SourceItem>,
    pub tokenizers: Arc<HashMap<String, Arc<PrefixTokenizer>>>,
}

impl ReceiverState {
    fn tokenizer(&self, server: &str) -> Result<Arc<PrefixTokenizer>, ApiError> {
        self.tokenizers
            .get(server)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("unknown server: {server}")))
    }

    async fn enqueue(&self, server: &str, records: Vec<LogRecord>) -> Result<usize, ApiError> {
        let count = records.len();
        for record in records {
            let item = SourceItem {
                server: server.to_string(),
                record,
            };
            self.queue
                .send(item)
                .await
                .map_err(|_| ApiError::Unavailable("log queue closed".to_string()))?;
        }
        Ok(count)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub server: String,
    pub accepted: usize,
}

/// POST /drain/:server
pub async fn drain(
    State(state): State<ReceiverState>,
    Path(server): Path<String>,
    body: String,
) -> Result<Json<AcceptedResponse>, ApiError> {
    let tokenizer = state.tokenizer(&server)?;
    let records = tokenizer.tokenize_text(&body, Utc::now());
    let accepted = state.enqueue(&server, records).await?;
    Ok(Json(AcceptedResponse { server, accepted }))
}

/// POST /events/:server
pub async fn events(
    State(state): State<ReceiverState>,
    Path(server): Path<String>,
    Json(events): Json<Vec<LogEvent>>,
) -> Result<Json<AcceptedResponse>, ApiError> {
    let tokenizer = state.tokenizer(&server)?;
    let collected_at = Utc::now();
    let records: Vec<LogRecord> = events
        .iter()
        .flat_map(|event| records_from_event(event, &tokenizer, collected_at))
        .collect();
    let accepted = state.enqueue(&server, records).await?;
    Ok(Json(AcceptedResponse { server, accepted }))
}

async fn health_check() -> &'static str {
    "OK"
}

pub fn router(state: ReceiverState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/drain/:server", post(drain))
        .route("/events/:server", post(events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Accepts pushed log data for the configured servers over HTTP.
pub struct HttpReceiver {
    listen: SocketAddr,
    tokenizers: HashMap<String, Arc<PrefixTokenizer>>,
}

impl HttpReceiver {
    pub fn new(listen: SocketAddr, tokenizers: HashMap<String, Arc<PrefixTokenizer>>) -> Self {
        Self { listen, tokenizers }
    }
}

#[async_trait]
impl LogSource for HttpReceiver {
    fn name(&self) -> &str {
        "http"
    }

    async fn run(
        self: Box<Self>,
        queue: mpsc::Sender<SourceItem>,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let HttpReceiver { listen, tokenizers } = *self;
        let state = ReceiverState {
            queue,
            tokenizers: Arc::new(tokenizers),
        };
        let app = router(state);

        let listener = TcpListener::bind(listen)
            .await
            .map_err(|e| SourceError::Http(format!("bind {listen}: {e}")))?;
        info!(addr = %listen, "starting http log receiver");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                info!("http log receiver shutting down");
            })
            .await
            .map_err(|e| SourceError::Http(e.to_string()))
    }
}
