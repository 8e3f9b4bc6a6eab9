//! In-process session store
//!
//! Used when the SQLite database cannot be opened, and by tests that need a
//! fresh store per case. [`MemorySessionStore::set_available`] simulates a
//! disabled or full backing store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{ChatSession, SessionStore};
use crate::error::{DocChatError, Result};

/// Session store kept entirely in memory
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
    available: AtomicBool,
    puts: AtomicUsize,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            puts: AtomicUsize::new(0),
        }
    }
}

impl MemorySessionStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle availability; while unavailable every operation fails with
    /// [`DocChatError::Storage`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `put` calls so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DocChatError::Storage("session store unavailable".to_string()).into())
        }
    }

    fn lock_error() -> anyhow::Error {
        DocChatError::Storage("session store lock poisoned".to_string()).into()
    }
}

impl SessionStore for MemorySessionStore {
    fn list(&self) -> Result<Vec<ChatSession>> {
        self.check_available()?;
        let sessions = self.sessions.read().map_err(|_| Self::lock_error())?;
        let mut list: Vec<ChatSession> = sessions.values().cloned().collect();
        list.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(list)
    }

    fn get(&self, id: &str) -> Result<ChatSession> {
        self.check_available()?;
        let sessions = self.sessions.read().map_err(|_| Self::lock_error())?;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| DocChatError::SessionNotFound(id.to_string()).into())
    }

    fn put(&self, session: &ChatSession) -> Result<()> {
        self.check_available()?;
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_error())?;
        sessions.insert(session.id.clone(), session.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.check_available()?;
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_error())?;
        sessions.remove(id);
        Ok(())
    }
}
