//! HTTP client for the document question-answering server
//!
//! [`ApiClient`] wraps the server's endpoints:
//!
//! - `POST /upload` -- multipart PDF upload, returns the new session id
//! - `POST /chat` -- streamed answer as server-sent events (see [`events`])
//! - `GET /sessions`, `DELETE /sessions/{id}` -- server-side session list
//! - `GET /health` -- liveness
//!
//! Non-2xx responses are turned into [`DocChatError::Server`] carrying the
//! server's `detail` message when the body has one.

pub mod events;
pub mod sse;

use std::path::Path;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ApiConfig;
use crate::error::{DocChatError, Result};

pub use events::{consume_event_stream, ChatCallbacks, StreamEvent, StreamOutcome};

/// Largest document the client will upload (50 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const NO_RESPONSE_MESSAGE: &str = "No response from server. Please check your connection.";

/// Response body of `POST /upload`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Server-issued session identifier used for every chat request
    pub session_id: String,
    /// Server status string (e.g. "processing", "success")
    #[serde(default)]
    pub status: String,
    /// Name the server stored the document under
    #[serde(default)]
    pub filename: String,
    /// Number of indexed chunks
    #[serde(default)]
    pub chunk_count: u64,
    /// Server-side processing time in seconds
    #[serde(default)]
    pub processing_time: f64,
}

/// Server-side session summary from `GET /sessions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSession {
    /// Server-issued session identifier
    pub session_id: String,
    /// Uploaded document name, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Creation timestamp as reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Number of indexed chunks, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteSessionEntry {
    Id(String),
    Summary(RemoteSession),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteSessionList {
    Bare(Vec<RemoteSessionEntry>),
    Wrapped { sessions: Vec<RemoteSessionEntry> },
}

impl From<RemoteSessionEntry> for RemoteSession {
    fn from(entry: RemoteSessionEntry) -> Self {
        match entry {
            RemoteSessionEntry::Summary(summary) => summary,
            RemoteSessionEntry::Id(session_id) => RemoteSession {
                session_id,
                filename: None,
                created_at: None,
                chunk_count: None,
            },
        }
    }
}

/// Liveness payload from `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy", "ok", or "unhealthy" when the server could not be reached
    pub status: String,
    /// Any other fields the server reports
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl HealthStatus {
    /// Status reported when the health check itself fails
    pub fn unhealthy() -> Self {
        Self {
            status: "unhealthy".to_string(),
            details: serde_json::Map::new(),
        }
    }

    /// Returns true unless the status is `unhealthy`
    pub fn is_healthy(&self) -> bool {
        !self.status.eq_ignore_ascii_case("unhealthy")
    }
}

/// Anything that can stream an answer for a session.
///
/// [`ApiClient`] is the production implementation; tests substitute a
/// scripted backend.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Stream the answer to `question`, reporting events through `callbacks`.
    ///
    /// # Errors
    ///
    /// Request-setup failures only; stream failures go to
    /// [`ChatCallbacks::on_error`].
    async fn stream_chat(
        &self,
        question: &str,
        session_id: &str,
        cancel: &CancellationToken,
        callbacks: &mut (dyn ChatCallbacks + Send),
    ) -> Result<StreamOutcome>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    question: &'a str,
    session_id: &'a str,
}

/// Client for the document QA server.
///
/// # Examples
///
/// ```no_run
/// use docchat::client::ApiClient;
/// use docchat::config::ApiConfig;
///
/// # async fn example() -> docchat::error::Result<()> {
/// let client = ApiClient::new(&ApiConfig::default())?;
/// let upload = client.upload_document("report.pdf").await?;
/// println!("session {}", upload.session_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
}

impl ApiClient {
    /// Build a client from configuration.
    ///
    /// No network I/O happens here. The connect timeout applies to every
    /// request; `request_timeout_secs` bounds non-streaming calls and
    /// `stream_idle_timeout_secs` bounds the silence between chat chunks.
    ///
    /// # Errors
    ///
    /// Returns [`DocChatError::Config`] if the base URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            DocChatError::Config(format!("Invalid API base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(DocChatError::Config(format!(
                "API base URL cannot be a base: {}",
                config.base_url
            ))
            .into());
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("docchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DocChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("Initialized API client: base_url={}", base_url);

        Ok(Self {
            http,
            base_url,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            stream_idle_timeout: Duration::from_secs(config.stream_idle_timeout_secs),
        })
    }

    /// Base URL every endpoint is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    /// Upload a PDF for indexing.
    ///
    /// Only `.pdf` files up to [`MAX_UPLOAD_BYTES`] are accepted; anything
    /// else is rejected before any network call.
    pub async fn upload_document(&self, path: impl AsRef<Path>) -> Result<UploadResponse> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                DocChatError::InvalidInput(format!("Not a file path: {}", path.display()))
            })?;

        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(DocChatError::InvalidInput(
                "Only PDF files are supported.".to_string(),
            )
            .into());
        }

        let size = tokio::fs::metadata(path).await?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(DocChatError::InvalidInput(format!(
                "File size exceeds the {}MB limit.",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            ))
            .into());
        }

        let bytes = tokio::fs::read(path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::info!("Uploading {} ({} bytes)", filename, size);
        let response = self
            .http
            .post(self.endpoint(&["upload"]))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("upload", &e))?;

        let response = check_status(response).await?;
        let upload: UploadResponse = response.json().await.map_err(|e| {
            DocChatError::Transport(format!("Failed to parse upload response: {}", e))
        })?;

        tracing::info!(
            session_id = %upload.session_id,
            chunks = upload.chunk_count,
            "Document indexed"
        );
        Ok(upload)
    }

    /// Ask a question about the document behind `session_id`.
    ///
    /// All results arrive through `callbacks`; the returned outcome only
    /// reports which terminal callback fired.
    ///
    /// # Errors
    ///
    /// Returns [`DocChatError::InvalidInput`] when the question is blank or
    /// the session id is empty. No request is sent and no callback fires.
    pub async fn send_chat_message<C>(
        &self,
        question: &str,
        session_id: &str,
        callbacks: &mut C,
    ) -> Result<StreamOutcome>
    where
        C: ChatCallbacks + ?Sized,
    {
        self.send_chat_message_cancellable(
            question,
            session_id,
            &CancellationToken::new(),
            callbacks,
        )
        .await
    }

    /// Same as [`ApiClient::send_chat_message`], abandoning the request when
    /// `cancel` fires. Once cancelled no further callback is invoked and the
    /// connection is dropped.
    pub async fn send_chat_message_cancellable<C>(
        &self,
        question: &str,
        session_id: &str,
        cancel: &CancellationToken,
        callbacks: &mut C,
    ) -> Result<StreamOutcome>
    where
        C: ChatCallbacks + ?Sized,
    {
        if question.trim().is_empty() {
            return Err(DocChatError::InvalidInput("question must not be empty".into()).into());
        }
        if session_id.trim().is_empty() {
            return Err(DocChatError::InvalidInput("session id must not be empty".into()).into());
        }

        let request = self
            .http
            .post(self.endpoint(&["chat"]))
            .header(ACCEPT, "text/event-stream")
            .json(&ChatRequest {
                question,
                session_id,
            });

        tracing::debug!(session_id = %session_id, "Sending chat request");

        let sent = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),

            sent = tokio::time::timeout(self.stream_idle_timeout, request.send()) => sent,
        };

        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                callbacks.on_error(transport_error("chat", &e));
                return Ok(StreamOutcome::Failed);
            }
            Err(_) => {
                tracing::error!("Chat request timed out waiting for response headers");
                callbacks.on_error(DocChatError::Timeout {
                    seconds: self.stream_idle_timeout.as_secs(),
                });
                return Ok(StreamOutcome::Failed);
            }
        };

        if !response.status().is_success() {
            let read = tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),

                read = tokio::time::timeout(self.stream_idle_timeout, server_error(response)) => read,
            };
            let error = read.unwrap_or_else(|_| {
                tracing::error!("Chat request timed out reading the error response body");
                DocChatError::Timeout {
                    seconds: self.stream_idle_timeout.as_secs(),
                }
            });
            callbacks.on_error(error);
            return Ok(StreamOutcome::Failed);
        }

        Ok(consume_event_stream(
            response.bytes_stream(),
            self.stream_idle_timeout,
            cancel,
            callbacks,
        )
        .await)
    }

    /// List the sessions the server still holds an index for
    pub async fn list_sessions(&self) -> Result<Vec<RemoteSession>> {
        let response = self
            .http
            .get(self.endpoint(&["sessions"]))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error("sessions", &e))?;

        let response = check_status(response).await?;
        let list: RemoteSessionList = response.json().await.map_err(|e| {
            DocChatError::Transport(format!("Failed to parse sessions response: {}", e))
        })?;

        let entries = match list {
            RemoteSessionList::Bare(entries) | RemoteSessionList::Wrapped { sessions: entries } => {
                entries
            }
        };
        Ok(entries.into_iter().map(RemoteSession::from).collect())
    }

    /// Ask the server to drop a session and its index
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        if session_id.trim().is_empty() {
            return Err(DocChatError::InvalidInput("session id must not be empty".into()).into());
        }

        let response = self
            .http
            .delete(self.endpoint(&["sessions", session_id]))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error("delete session", &e))?;

        check_status(response).await?;
        tracing::info!(session_id = %session_id, "Deleted server session");
        Ok(())
    }

    /// Check server liveness.
    ///
    /// Never fails: any error is logged and reported as
    /// [`HealthStatus::unhealthy`].
    pub async fn health(&self) -> HealthStatus {
        match self.try_health().await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                HealthStatus::unhealthy()
            }
        }
    }

    async fn try_health(&self) -> Result<HealthStatus> {
        let response = self
            .http
            .get(self.endpoint(&["health"]))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error("health", &e))?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl ChatBackend for ApiClient {
    async fn stream_chat(
        &self,
        question: &str,
        session_id: &str,
        cancel: &CancellationToken,
        callbacks: &mut (dyn ChatCallbacks + Send),
    ) -> Result<StreamOutcome> {
        self.send_chat_message_cancellable(question, session_id, cancel, callbacks)
            .await
    }
}

fn transport_error(operation: &str, error: &reqwest::Error) -> DocChatError {
    tracing::error!("{} request failed: {}", operation, error);
    if error.is_timeout() {
        DocChatError::Transport(format!("The {} request timed out", operation))
    } else {
        DocChatError::Transport(NO_RESPONSE_MESSAGE.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(server_error(response).await.into())
    }
}

/// Build the error for a non-2xx response, preferring the body's `detail`.
async fn server_error(response: Response) -> DocChatError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!("Server returned error {}: {}", status, body);

    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .filter(|d| !d.is_empty());

    DocChatError::Server {
        status: status.as_u16(),
        message: detail.unwrap_or_else(|| format!("Server error ({})", status.as_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base: &str) -> ApiClient {
        let config = ApiConfig {
            base_url: base.to_string(),
            ..ApiConfig::default()
        };
        ApiClient::new(&config).expect("client")
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client_for("http://localhost:8000");
        assert_eq!(
            client.endpoint(&["chat"]).as_str(),
            "http://localhost:8000/chat"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_ids() {
        let client = client_for("http://example.com/api/");
        assert_eq!(
            client.endpoint(&["sessions", "a b/c"]).as_str(),
            "http://example.com/api/sessions/a%20b%2Fc"
        );
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let config = ApiConfig {
            base_url: "not a url".to_string(),
            ..ApiConfig::default()
        };
        assert!(ApiClient::new(&config).is_err());
    }

    #[test]
    fn test_remote_session_list_accepts_ids_and_objects() {
        let list: RemoteSessionList =
            serde_json::from_str(r#"["abc", {"session_id":"def","filename":"a.pdf"}]"#)
                .expect("parse");
        let sessions: Vec<RemoteSession> = match list {
            RemoteSessionList::Bare(e) | RemoteSessionList::Wrapped { sessions: e } => {
                e.into_iter().map(RemoteSession::from).collect()
            }
        };
        assert_eq!(sessions[0].session_id, "abc");
        assert_eq!(sessions[1].filename.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn test_health_status_flattens_extra_fields() {
        let status: HealthStatus =
            serde_json::from_str(r#"{"status":"healthy","version":"1.0"}"#).expect("parse");
        assert!(status.is_healthy());
        assert_eq!(status.details["version"], "1.0");
        assert!(!HealthStatus::unhealthy().is_healthy());
    }

    #[tokio::test]
    async fn test_blank_question_rejected_before_network() {
        let client = client_for("http://127.0.0.1:9");
        let mut rec = events::tests::Recorder::default();
        let err = client
            .send_chat_message("   ", "abc", &mut rec)
            .await
            .expect_err("blank question");
        assert!(matches!(
            err.downcast_ref::<DocChatError>(),
            Some(DocChatError::InvalidInput(_))
        ));
        assert!(rec.log.is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").expect("write");

        let client = client_for("http://127.0.0.1:9");
        let err = client.upload_document(&path).await.expect_err("non pdf");
        assert_eq!(err.to_string(), "Invalid input: Only PDF files are supported.");
    }
}
