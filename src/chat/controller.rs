//! Active chat session state
//!
//! [`ChatController`] owns the message list of the session the user is
//! talking to. Stream callbacks mutate the last assistant message in place;
//! once a stream finishes the session is written to the [`SessionStore`]
//! through a [`Debouncer`], so a burst of exchanges produces one write.
//!
//! Persistence rules:
//!
//! - a save is scheduled only when a session id and name are set, the
//!   message list is non-empty, and no stream is in progress;
//! - switching, loading, or clearing a session first stops any running
//!   stream and writes the previous session;
//! - store failures are logged and never interrupt the chat.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::chat::debounce::Debouncer;
use crate::client::{ChatBackend, ChatCallbacks, StreamOutcome};
use crate::config::Config;
use crate::error::{DocChatError, Result};
use crate::storage::{with_store, ChatSession, Message, Role, SessionStore};

/// Identifies one chat request; events for an older request are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

#[derive(Debug)]
struct ActiveStream {
    request: RequestId,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct ChatState {
    session_id: Option<String>,
    session_name: Option<String>,
    messages: Vec<Message>,
    sources: Vec<String>,
    last_processing_time: Option<f64>,
    last_error: Option<String>,
    active: Option<ActiveStream>,
    next_request: u64,
}

impl ChatState {
    fn is_current(&self, request: RequestId) -> bool {
        self.active.as_ref().map(|a| a.request) == Some(request)
    }

    /// Snapshot for persistence, if the session is complete enough to save
    fn persistable(&self) -> Option<ChatSession> {
        if self.active.is_some() || self.messages.is_empty() {
            return None;
        }
        let id = self.session_id.clone()?;
        let name = self.session_name.clone()?;
        Some(ChatSession::new(id, name, self.messages.clone()))
    }

    fn reset(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        self.session_id = None;
        self.session_name = None;
        self.messages.clear();
        self.sources.clear();
        self.last_processing_time = None;
        self.last_error = None;
    }
}

fn lock(state: &Mutex<ChatState>) -> MutexGuard<'_, ChatState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Conversation state for the active document session.
///
/// Constructed once per application (or per test) and shared by reference;
/// there is no global instance.
pub struct ChatController {
    state: Arc<Mutex<ChatState>>,
    store: Arc<dyn SessionStore>,
    autosave: Debouncer,
    error_message: String,
}

impl ChatController {
    /// Create a controller persisting to `store`
    pub fn new(store: Arc<dyn SessionStore>, config: &Config) -> Self {
        let state = Arc::new(Mutex::new(ChatState::default()));

        let save_state = Arc::clone(&state);
        let save_store = Arc::clone(&store);
        let autosave = Debouncer::new(
            Duration::from_millis(config.storage.autosave_delay_ms),
            move || {
                let snapshot = lock(&save_state).persistable();
                let store = Arc::clone(&save_store);
                async move {
                    let Some(session) = snapshot else {
                        return;
                    };
                    let id = session.id.clone();
                    match with_store(&store, move |s| s.put(&session)).await {
                        Ok(()) => tracing::debug!(session_id = %id, "Auto-saved session"),
                        Err(e) => {
                            tracing::warn!(session_id = %id, "Auto-save failed, will retry on next change: {}", e)
                        }
                    }
                }
            },
        );

        Self {
            state,
            store,
            autosave,
            error_message: config.chat.error_message.clone(),
        }
    }

    /// Stop any running stream and write what the session holds so far.
    async fn settle(&self) {
        let abandoned = {
            let mut state = lock(&self.state);
            match state.active.take() {
                Some(active) => {
                    active.cancel.cancel();
                    drop_empty_assistant(&mut state);
                    true
                }
                None => false,
            }
        };
        if abandoned {
            self.schedule_save();
        }
        self.autosave.flush().await;
    }

    /// Make a freshly uploaded document the active session.
    ///
    /// Any stream still running for the previous session is cancelled and
    /// the previous session is saved first.
    pub async fn start_session(&self, session_id: impl Into<String>, name: impl Into<String>) {
        self.settle().await;
        let mut state = lock(&self.state);
        state.reset();
        state.session_id = Some(session_id.into());
        state.session_name = Some(name.into());
        tracing::info!(
            session_id = state.session_id.as_deref().unwrap_or_default(),
            "Started session"
        );
    }

    /// Resume a stored session
    ///
    /// # Errors
    ///
    /// [`DocChatError::SessionNotFound`] if no session has that id, or
    /// [`DocChatError::Storage`] if the store is unavailable.
    pub async fn load_session(&self, session_id: &str) -> Result<()> {
        let id = session_id.to_string();
        let session = with_store(&self.store, move |s| s.get(&id)).await?;

        self.settle().await;
        let mut state = lock(&self.state);
        state.reset();
        state.session_id = Some(session.id);
        state.session_name = Some(session.name);
        state.messages = session.messages;
        tracing::info!(session_id = %session_id, "Loaded session");
        Ok(())
    }

    /// Delete a stored session; the active session is cleared only when it
    /// is the one being deleted.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let is_active = lock(&self.state).session_id.as_deref() == Some(session_id);
        if is_active {
            self.autosave.cancel_pending();
            lock(&self.state).reset();
        }

        let id = session_id.to_string();
        with_store(&self.store, move |s| s.delete(&id)).await?;
        tracing::info!(session_id = %session_id, "Deleted session");
        Ok(())
    }

    /// Forget the active session (after saving it)
    pub async fn clear(&self) {
        self.settle().await;
        lock(&self.state).reset();
    }

    /// Stored sessions, most recent first, read fresh from the store
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        with_store(&self.store, |s| s.list()).await
    }

    /// Write any pending auto-save now; call before exiting
    pub async fn shutdown(&self) {
        self.settle().await;
    }

    /// Ask a question about the active document.
    ///
    /// Appends the user message and an empty assistant message, then fills
    /// the latter as tokens stream in. On failure the assistant message is
    /// replaced by the configured apology and flagged as an error.
    ///
    /// # Errors
    ///
    /// Request-setup failures are returned before anything is sent:
    /// [`DocChatError::InvalidInput`] for a blank question,
    /// [`DocChatError::NoActiveSession`], and
    /// [`DocChatError::StreamInProgress`] while another answer is streaming.
    /// Stream failures are not errors here; they show up in the messages and
    /// in the returned [`StreamOutcome`].
    pub async fn ask<B>(&self, backend: &B, question: &str) -> Result<StreamOutcome>
    where
        B: ChatBackend + ?Sized,
    {
        let question = question.trim();
        if question.is_empty() {
            return Err(DocChatError::InvalidInput("question must not be empty".into()).into());
        }

        let (session_id, request, cancel) = {
            let mut state = lock(&self.state);
            let session_id = state
                .session_id
                .clone()
                .ok_or(DocChatError::NoActiveSession)?;
            if state.active.is_some() {
                return Err(DocChatError::StreamInProgress(session_id).into());
            }

            state.next_request += 1;
            let request = RequestId(state.next_request);
            let cancel = CancellationToken::new();
            state.active = Some(ActiveStream {
                request,
                cancel: cancel.clone(),
            });
            state.messages.push(Message::user(question));
            state.messages.push(Message::assistant(""));
            state.sources.clear();
            state.last_processing_time = None;
            state.last_error = None;
            (session_id, request, cancel)
        };

        let _guard = AbandonGuard {
            state: Arc::clone(&self.state),
            autosave: self.autosave.clone(),
            request,
        };
        let mut sink = StreamSink {
            state: Arc::clone(&self.state),
            request,
            error_message: self.error_message.clone(),
        };

        let result = backend
            .stream_chat(question, &session_id, &cancel, &mut sink)
            .await;

        let finished = {
            let mut state = lock(&self.state);
            if state.is_current(request) {
                state.active = None;
                if let Err(e) = &result {
                    // Setup rejected by the backend; the user message stays.
                    apply_failure(&mut state, &self.error_message, e.to_string());
                } else if matches!(result, Ok(StreamOutcome::Cancelled)) {
                    drop_empty_assistant(&mut state);
                }
                true
            } else {
                false
            }
        };

        if finished {
            self.schedule_save();
        }
        result
    }

    /// Abandon the answer currently streaming, if any.
    ///
    /// No further tokens are applied; partial text is kept.
    pub fn cancel_stream(&self) -> bool {
        match lock(&self.state).active.as_ref() {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn schedule_save(&self) {
        if lock(&self.state).persistable().is_some() {
            self.autosave.schedule();
        }
    }

    /// Active session id
    pub fn session_id(&self) -> Option<String> {
        lock(&self.state).session_id.clone()
    }

    /// Active session name (the document's filename)
    pub fn session_name(&self) -> Option<String> {
        lock(&self.state).session_name.clone()
    }

    /// Copy of the current message list
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.state).messages.clone()
    }

    /// Sources reported for the latest answer
    pub fn sources(&self) -> Vec<String> {
        lock(&self.state).sources.clone()
    }

    /// Server processing time of the latest completed answer
    pub fn last_processing_time(&self) -> Option<f64> {
        lock(&self.state).last_processing_time
    }

    /// Error behind the latest failed answer, for notifications
    pub fn last_error(&self) -> Option<String> {
        lock(&self.state).last_error.clone()
    }

    /// True while an answer is streaming; input should stay disabled
    pub fn is_streaming(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    /// True while an auto-save is waiting for its quiet period
    pub fn save_pending(&self) -> bool {
        self.autosave.is_pending()
    }
}

fn apply_failure(state: &mut ChatState, apology: &str, reason: String) {
    match state.messages.last_mut() {
        Some(last) if last.role == Role::Assistant => {
            *last = Message::assistant_error(apology);
        }
        _ => state.messages.push(Message::assistant_error(apology)),
    }
    state.last_error = Some(reason);
}

fn drop_empty_assistant(state: &mut ChatState) {
    if matches!(state.messages.last(), Some(m) if m.role == Role::Assistant && m.content.is_empty())
    {
        state.messages.pop();
    }
}

/// Releases the active stream when an `ask` future is dropped before the
/// backend returns, so the session does not stay locked in streaming.
struct AbandonGuard {
    state: Arc<Mutex<ChatState>>,
    autosave: Debouncer,
    request: RequestId,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let save = {
            let mut state = lock(&self.state);
            if !state.is_current(self.request) {
                return;
            }
            if let Some(active) = state.active.take() {
                active.cancel.cancel();
            }
            drop_empty_assistant(&mut state);
            tracing::debug!(request = self.request.0, "Chat request dropped mid-stream");
            state.persistable().is_some()
        };
        // Scheduling spawns a timer, which needs a runtime.
        if save && tokio::runtime::Handle::try_current().is_ok() {
            self.autosave.schedule();
        }
    }
}

/// Applies stream events of one request to the shared state
struct StreamSink {
    state: Arc<Mutex<ChatState>>,
    request: RequestId,
    error_message: String,
}

impl StreamSink {
    fn with_current(&self, f: impl FnOnce(&mut ChatState)) {
        let mut state = lock(&self.state);
        if state.is_current(self.request) {
            f(&mut state);
        } else {
            tracing::debug!(request = self.request.0, "Ignoring event from superseded request");
        }
    }
}

impl ChatCallbacks for StreamSink {
    fn on_token(&mut self, token: &str) {
        self.with_current(|state| {
            if let Some(last) = state.messages.last_mut() {
                last.content.push_str(token);
            }
        });
    }

    fn on_sources(&mut self, sources: Vec<String>) {
        self.with_current(|state| state.sources = sources);
    }

    fn on_complete(&mut self, processing_time: f64) {
        self.with_current(|state| {
            state.last_processing_time = Some(processing_time);
            tracing::info!(processing_time, "Answer complete");
        });
    }

    fn on_error(&mut self, error: DocChatError) {
        let apology = self.error_message.clone();
        self.with_current(|state| {
            tracing::error!("Answer failed: {}", error);
            apply_failure(state, &apology, error.to_string());
        });
    }
}
