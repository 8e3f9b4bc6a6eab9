//! Typed chat stream events and the callback-driven consumer
//!
//! The `/chat` endpoint answers with `event: <name>` / `data: <json>` records.
//! [`StreamEvent::from_record`] maps one [`SseRecord`] to a typed event and
//! [`consume_event_stream`] drives a whole response body through the
//! [`SseDecoder`], delivering events to a [`ChatCallbacks`] implementation.
//!
//! Delivery rules:
//!
//! - callbacks fire in the order records are parsed from the body;
//! - exactly one terminal callback fires (`on_complete` or `on_error`)
//!   unless the stream is cancelled, in which case none does;
//! - a record that fails to parse is logged and skipped.

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::sse::{SseDecoder, SseRecord};
use crate::error::DocChatError;

/// One event parsed from the chat response stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Next piece of the assistant's answer
    Token(String),
    /// Document passages the answer was grounded on
    Sources(Vec<String>),
    /// The answer is complete; server-side processing time in seconds
    End {
        /// Seconds the server spent answering
        processing_time: f64,
    },
    /// The server gave up; terminal
    Error(String),
}

/// Why a record could not be turned into a [`StreamEvent`]
#[derive(Error, Debug)]
pub enum RecordError {
    /// Record carried data but no `event:` line
    #[error("record has no event name")]
    MissingEvent,

    /// Event name outside `token`, `sources`, `end`, `error`
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    /// The `data:` payload did not match the event's shape
    #[error("invalid '{event}' payload: {source}")]
    Payload {
        /// Event name of the offending record
        event: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourcesPayload {
    List(Vec<String>),
    Wrapped { sources: Vec<String> },
}

#[derive(Debug, Deserialize)]
struct EndPayload {
    processing_time: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
}

impl StreamEvent {
    /// Parse one SSE record into a typed event.
    ///
    /// `sources` accepts either a bare JSON array of strings or an object
    /// with a `sources` array.
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::client::events::StreamEvent;
    /// use docchat::client::sse::SseRecord;
    ///
    /// let record = SseRecord {
    ///     event: Some("end".to_string()),
    ///     data: r#"{"processing_time":1.23}"#.to_string(),
    ///     id: None,
    /// };
    /// let event = StreamEvent::from_record(&record).unwrap();
    /// assert_eq!(event, StreamEvent::End { processing_time: 1.23 });
    /// ```
    pub fn from_record(record: &SseRecord) -> std::result::Result<Self, RecordError> {
        let event = record.event.as_deref().ok_or(RecordError::MissingEvent)?;
        let payload_err = |source| RecordError::Payload {
            event: event.to_string(),
            source,
        };

        match event {
            "token" => serde_json::from_str::<TokenPayload>(&record.data)
                .map(|p| StreamEvent::Token(p.token))
                .map_err(payload_err),
            "sources" => serde_json::from_str::<SourcesPayload>(&record.data)
                .map(|p| match p {
                    SourcesPayload::List(sources) | SourcesPayload::Wrapped { sources } => {
                        StreamEvent::Sources(sources)
                    }
                })
                .map_err(payload_err),
            "end" => serde_json::from_str::<EndPayload>(&record.data)
                .map(|p| StreamEvent::End {
                    processing_time: p.processing_time,
                })
                .map_err(payload_err),
            "error" => serde_json::from_str::<ErrorPayload>(&record.data)
                .map(|p| StreamEvent::Error(p.error))
                .map_err(payload_err),
            other => Err(RecordError::UnknownEvent(other.to_string())),
        }
    }

    /// Returns true for `End` and `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End { .. } | StreamEvent::Error(_))
    }
}

/// Receiver of chat stream events.
///
/// Implementations are invoked synchronously from the stream consumer, one
/// call at a time, in arrival order.
pub trait ChatCallbacks {
    /// A piece of answer text arrived
    fn on_token(&mut self, token: &str);

    /// The list of source passages arrived (may repeat; last one wins)
    fn on_sources(&mut self, sources: Vec<String>);

    /// The answer finished; called at most once
    fn on_complete(&mut self, processing_time: f64);

    /// The request failed; called at most once, never after `on_complete`
    fn on_error(&mut self, error: DocChatError);
}

/// How a chat stream ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamOutcome {
    /// `on_complete` fired with this processing time
    Completed {
        /// Seconds reported by the server
        processing_time: f64,
    },
    /// `on_error` fired
    Failed,
    /// The caller cancelled; no terminal callback fired
    Cancelled,
}

/// Drive a response body to completion, delivering events to `callbacks`.
///
/// `idle_timeout` bounds the wait for each chunk; when it elapses the body
/// is dropped and `on_error` receives [`DocChatError::Timeout`]. After
/// `cancel` fires no callback is invoked.
///
/// # Arguments
///
/// * `byte_stream` - The raw HTTP response body as a stream of byte chunks
/// * `idle_timeout` - Maximum silence between chunks
/// * `cancel` - Token the caller may trigger to abandon the stream
/// * `callbacks` - Receiver of parsed events
pub async fn consume_event_stream<S, C>(
    byte_stream: S,
    idle_timeout: Duration,
    cancel: &CancellationToken,
    callbacks: &mut C,
) -> StreamOutcome
where
    S: Stream<Item = reqwest::Result<Bytes>>,
    C: ChatCallbacks + ?Sized,
{
    let mut decoder = SseDecoder::new();
    tokio::pin!(byte_stream);

    loop {
        let next = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!("Chat stream cancelled by caller");
                return StreamOutcome::Cancelled;
            }

            next = tokio::time::timeout(idle_timeout, byte_stream.next()) => next,
        };

        let chunk = match next {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                tracing::error!("Failed to read chat stream: {}", e);
                callbacks.on_error(DocChatError::Transport(format!(
                    "Failed to read response stream: {}",
                    e
                )));
                return StreamOutcome::Failed;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::error!(
                    "Chat stream idle for {}s, closing",
                    idle_timeout.as_secs()
                );
                callbacks.on_error(DocChatError::Timeout {
                    seconds: idle_timeout.as_secs(),
                });
                return StreamOutcome::Failed;
            }
        };

        for record in decoder.push(&chunk) {
            if let Some(outcome) = dispatch_record(&record, callbacks) {
                return outcome;
            }
        }
    }

    if let Some(record) = decoder.finish() {
        if let Some(outcome) = dispatch_record(&record, callbacks) {
            return outcome;
        }
    }

    tracing::warn!("Chat stream closed without an end event");
    callbacks.on_error(DocChatError::StreamInterrupted);
    StreamOutcome::Failed
}

/// Deliver one record; returns the outcome if the record was terminal.
fn dispatch_record<C>(record: &SseRecord, callbacks: &mut C) -> Option<StreamOutcome>
where
    C: ChatCallbacks + ?Sized,
{
    let event = match StreamEvent::from_record(record) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(data = %record.data, "Skipping malformed stream record: {}", e);
            return None;
        }
    };

    match event {
        StreamEvent::Token(token) => {
            callbacks.on_token(&token);
            None
        }
        StreamEvent::Sources(sources) => {
            callbacks.on_sources(sources);
            None
        }
        StreamEvent::End { processing_time } => {
            callbacks.on_complete(processing_time);
            Some(StreamOutcome::Completed { processing_time })
        }
        StreamEvent::Error(message) => {
            tracing::error!("Server reported stream error: {}", message);
            callbacks.on_error(DocChatError::StreamFailed(message));
            Some(StreamOutcome::Failed)
        }
    }
}
