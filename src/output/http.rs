use crate::output::{LogSubmission, OutputError, SubmissionMetadata, Submitter};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SubmissionBody<'a> {
    #[serde(flatten)]
    metadata: SubmissionMetadata,
    content: &'a str,
}

/// POSTs each submission as one JSON document.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, OutputError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn submit(&self, submission: &LogSubmission) -> Result<(), OutputError> {
        let content = submission
            .log_file
            .content()
            .map_err(OutputError::Artifact)?;
        let body = SubmissionBody {
            metadata: submission.metadata(),
            content: &content,
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(OutputError::Rejected {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{NoFilter, StatementAnalyzer};
    use crate::output::{submit_with_retry, RetryPolicy};
    use crate::assembly::StreamAssembler;
    use crate::record::{LogLevel, LogRecord, MemoryAllocator};
    use axum::{http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn make_submission() -> LogSubmission {
        let now = Utc::now();
        let assembler = StreamAssembler::new(
            Arc::new(MemoryAllocator),
            Arc::new(NoFilter),
            Arc::new(StatementAnalyzer::new().unwrap()),
        );
        let assembly = assembler
            .analyze_stream_in_groups(
                vec![LogRecord::new(
                    LogLevel::Log,
                    "hello\n",
                    now - chrono::Duration::seconds(10),
                )],
                now,
            )
            .unwrap();

        LogSubmission {
            server: "db".to_string(),
            id: Uuid::new_v4(),
            collected_at: now,
            log_file: assembly.log_file,
            query_samples: Vec::new(),
            collector: "test-host".to_string(),
        }
    }

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/submit")
    }

    #[tokio::test]
    async fn test_posts_json_body() {
        let (tx, mut rx) = mpsc::channel::<serde_json::Value>(1);
        let app = Router::new().route(
            "/submit",
            post(move |Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    tx.send(body).await.unwrap();
                    StatusCode::OK
                }
            }),
        );
        let endpoint = serve(app).await;

        let submitter = HttpSubmitter::new(endpoint, Duration::from_secs(5)).unwrap();
        let submission = make_submission();
        submitter.submit(&submission).await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body["server"], "db");
        assert_eq!(body["collector"], "test-host");
        assert_eq!(body["content"], "hello\n");
        assert_eq!(body["byte_size"], 6);
        assert_eq!(body["id"], submission.id.to_string());
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let app = Router::new().route(
            "/submit",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
        );
        let endpoint = serve(app).await;

        let submitter = HttpSubmitter::new(endpoint, Duration::from_secs(5)).unwrap();
        let err = submitter.submit(&make_submission()).await.unwrap_err();
        match err {
            OutputError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retry_after_server_error() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/submit",
            post(move || {
                let counter = counter.clone();
                async move {
                    let call = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    if call == 0 {
                        StatusCode::INTERNAL_SERVER_ERROR
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        );
        let endpoint = serve(app).await;

        let submitter = HttpSubmitter::new(endpoint, Duration::from_secs(5)).unwrap();
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
        };
        submit_with_retry(&submitter, &make_submission(), policy)
            .await
            .unwrap();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
