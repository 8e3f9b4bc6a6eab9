//! DocChat - chat client library for a document question-answering server
//!
//! This library uploads PDF documents to the server, streams answers to
//! questions about them, and keeps conversations in a local session store.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: HTTP client, server-sent event decoding, stream events
//! - `chat`: Active session state and debounced auto-save
//! - `storage`: Session model and persistent session stores
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers behind each CLI command
//!
//! # Example
//!
//! ```no_run
//! use docchat::{ApiClient, ChatController, Config};
//! use docchat::storage::open_store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let client = ApiClient::new(&config.api)?;
//!     let upload = client.upload_document("report.pdf").await?;
//!
//!     let chat = ChatController::new(open_store(&config.storage), &config);
//!     chat.start_session(upload.session_id, upload.filename).await;
//!     chat.ask(&client, "What is the total?").await?;
//!     chat.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use chat::ChatController;
pub use client::{ApiClient, ChatBackend, ChatCallbacks, StreamEvent, StreamOutcome};
pub use config::Config;
pub use error::{DocChatError, Result};
pub use storage::{ChatSession, Message, Role, SessionStore};
