//! Error types for DocChat
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for DocChat operations
///
/// Variants are grouped by where a failure originates: request setup
/// (rejected before any network call), transport, the server itself,
/// and the local session store. Stream callbacks receive these values
/// directly; everything else travels inside [`Result`] and can be
/// recovered with `downcast_ref::<DocChatError>()`.
#[derive(Error, Debug)]
pub enum DocChatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input (empty question, missing session id, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No document session is active, so there is nothing to ask about
    #[error("No active session: upload a document or resume a session first")]
    NoActiveSession,

    /// A chat stream is already running for the active session
    #[error("A response is still streaming for session {0}")]
    StreamInProgress(String),

    /// Connection refused, DNS failure, unreadable body
    #[error("{0}")]
    Transport(String),

    /// No data arrived within the configured window
    #[error("Timed out after {seconds}s waiting for the server")]
    Timeout {
        /// Configured timeout that elapsed
        seconds: u64,
    },

    /// The response stream closed before an `end` or `error` event
    #[error("Response stream ended before completion")]
    StreamInterrupted,

    /// Non-2xx response; `message` is the server's `detail` when present
    #[error("{message}")]
    Server {
        /// HTTP status code returned by the server
        status: u16,
        /// Server-provided detail or a generic status message
        message: String,
    },

    /// The server reported a failure through an `error` stream event
    #[error("{0}")]
    StreamFailed(String),

    /// Session store errors (database unavailable, corrupt record, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// No stored session with the requested id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DocChatError {
    /// Returns true for failures of the local session store.
    ///
    /// UI code may choose to ignore these; live chat keeps working.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::SessionNotFound(_))
    }
}

/// Result type alias for DocChat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
