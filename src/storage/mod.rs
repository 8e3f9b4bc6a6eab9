//! Local session store
//!
//! Chat sessions are kept in a SQLite database in the user's data directory
//! (or an explicit path). Every [`SessionStore`] operation reads or writes
//! the backing store directly; there is no in-memory mirror that could go
//! stale. Failures surface as [`DocChatError::Storage`] so callers can keep
//! chatting when persistence is unavailable.

use crate::config::StorageConfig;
use crate::error::{DocChatError, Result};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod memory;
pub mod types;
pub use memory::MemorySessionStore;
pub use types::{ChatSession, Message, Role};

/// Keyed persistence for [`ChatSession`]s.
///
/// Writes are last-write-wins per id; there is no cross-process locking.
pub trait SessionStore: Send + Sync {
    /// All sessions, most recently updated first
    fn list(&self) -> Result<Vec<ChatSession>>;

    /// One session, or [`DocChatError::SessionNotFound`]
    fn get(&self, id: &str) -> Result<ChatSession>;

    /// Insert or wholesale replace the session with `session.id`
    fn put(&self, session: &ChatSession) -> Result<()>;

    /// Remove a session; deleting an absent id is not an error
    fn delete(&self, id: &str) -> Result<()>;
}

/// Open the configured store, falling back to memory when SQLite is
/// unavailable so that chat keeps working without history.
pub fn open_store(config: &StorageConfig) -> Arc<dyn SessionStore> {
    let opened = match &config.db_path {
        Some(path) => SqliteSessionStore::new_with_path(path),
        None => SqliteSessionStore::new(),
    };

    match opened {
        Ok(store) => {
            tracing::debug!("Using session store at {}", store.db_path().display());
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                "Session history unavailable, keeping sessions in memory only: {}",
                e
            );
            Arc::new(MemorySessionStore::new())
        }
    }
}

/// Run a store operation on the blocking thread pool.
///
/// SQLite calls block, so async callers go through here instead of calling
/// the store directly.
pub async fn with_store<T, F>(store: &Arc<dyn SessionStore>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn SessionStore) -> Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| storage_error("Storage task failed", e))?
}

fn storage_error(context: &str, e: impl std::fmt::Display) -> DocChatError {
    DocChatError::Storage(format!("{}: {}", context, e))
}

/// Fixed-width timestamp so lexical order in SQL equals time order
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| storage_error("Invalid last_updated value", e).into())
}

/// SQLite-backed session store
pub struct SqliteSessionStore {
    db_path: PathBuf,
}

impl SqliteSessionStore {
    /// Create a new store instance
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "docchat", "docchat")
            .ok_or_else(|| DocChatError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| DocChatError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("sessions.db"))
    }

    /// Create a new store instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::storage::SqliteSessionStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SqliteSessionStore::new_with_path(dir.path().join("sessions.db")).unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| storage_error("Failed to create parent directory", e))?;
            }
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .map_err(|e| storage_error("Failed to open database", e).into())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                messages JSON NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_last_updated
                ON sessions (last_updated);",
        )
        .map_err(|e| storage_error("Failed to create tables", e))?;

        Ok(())
    }

    fn row_to_session(
        id: String,
        name: String,
        last_updated: String,
        messages_json: String,
    ) -> Result<ChatSession> {
        let messages: Vec<Message> = serde_json::from_str(&messages_json)
            .map_err(|e| storage_error("Failed to deserialize messages", e))?;
        Ok(ChatSession {
            id,
            name,
            last_updated: decode_timestamp(&last_updated)?,
            messages,
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn list(&self) -> Result<Vec<ChatSession>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, name, last_updated, messages
                FROM sessions
                ORDER BY last_updated DESC, id ASC",
            )
            .map_err(|e| storage_error("Failed to prepare statement", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| storage_error("Failed to query sessions", e))?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, name, last_updated, messages) =
                row.map_err(|e| storage_error("Failed to read session row", e))?;
            match Self::row_to_session(id.clone(), name, last_updated, messages) {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::warn!(session_id = %id, "Skipping unreadable session: {}", e),
            }
        }

        Ok(sessions)
    }

    fn get(&self, id: &str) -> Result<ChatSession> {
        let conn = self.open()?;

        let row = conn
            .query_row(
                "SELECT id, name, last_updated, messages FROM sessions WHERE id = ?",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| storage_error("Failed to query session", e))?;

        match row {
            Some((id, name, last_updated, messages)) => {
                Self::row_to_session(id, name, last_updated, messages)
            }
            None => Err(DocChatError::SessionNotFound(id.to_string()).into()),
        }
    }

    fn put(&self, session: &ChatSession) -> Result<()> {
        let conn = self.open()?;

        let messages_json = serde_json::to_string(&session.messages)
            .map_err(|e| storage_error("Failed to serialize messages", e))?;

        conn.execute(
            "INSERT INTO sessions (id, name, last_updated, messages)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                last_updated = excluded.last_updated,
                messages = excluded.messages",
            params![
                session.id,
                session.name,
                encode_timestamp(&session.last_updated),
                messages_json
            ],
        )
        .map_err(|e| storage_error("Failed to save session", e))?;

        tracing::debug!(
            session_id = %session.id,
            messages = session.messages.len(),
            "Saved session"
        );
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM sessions WHERE id = ?", params![id])
            .map_err(|e| storage_error("Failed to delete session", e))?;
        Ok(())
    }
}
