//! Trailing-edge debouncer
//!
//! [`Debouncer`] runs an async action once a quiet period has passed since
//! the last [`Debouncer::schedule`] call. Rapid successive schedules
//! coalesce into a single run. Each schedule bumps a generation counter;
//! a timer only fires if its generation is still the latest when it wakes.
//! A superseded timer is aborted, so at most one timer task is alive.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

type Action = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Default)]
struct DebounceState {
    generation: u64,
    pending: bool,
    /// Sleeping timer task; taken by the timer once it starts the action
    timer: Option<JoinHandle<()>>,
}

impl DebounceState {
    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Delays an effectful action until input settles.
///
/// Must be used from within a Tokio runtime: `schedule` spawns the timer.
/// Clones share the same timer and action.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use docchat::chat::Debouncer;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
/// let debouncer = Debouncer::new(Duration::from_secs(1), move || {
///     let counter = Arc::clone(&counter);
///     async move {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }
/// });
///
/// debouncer.schedule();
/// debouncer.schedule();
/// tokio::time::sleep(Duration::from_millis(1100)).await;
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    action: Action,
    state: Arc<Mutex<DebounceState>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

fn lock(state: &Mutex<DebounceState>) -> MutexGuard<'_, DebounceState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Debouncer {
    /// Creates a debouncer that runs `action` after `delay` of quiet
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: Action = Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(action()) });
        Self {
            delay,
            action,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Quiet period before the action runs
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the quiet period; the action runs once it elapses
    pub fn schedule(&self) {
        let mut state = lock(&self.state);
        state.abort_timer();
        state.generation = state.generation.wrapping_add(1);
        state.pending = true;
        let generation = state.generation;

        let shared = Arc::clone(&self.state);
        let action = Arc::clone(&self.action);
        let delay = self.delay;

        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let fire = {
                let mut state = lock(&shared);
                if state.generation == generation && state.pending {
                    state.pending = false;
                    state.timer = None;
                    true
                } else {
                    false
                }
            };
            if fire {
                action().await;
            }
        }));
    }

    /// Drop a scheduled run, if any. Returns true if one was pending.
    pub fn cancel_pending(&self) -> bool {
        let mut state = lock(&self.state);
        state.abort_timer();
        state.generation = state.generation.wrapping_add(1);
        std::mem::replace(&mut state.pending, false)
    }

    /// Run a pending action now instead of waiting for the timer.
    ///
    /// Does nothing when nothing is pending.
    pub async fn flush(&self) {
        if self.cancel_pending() {
            (self.action)().await;
        }
    }

    /// Returns true while a run is scheduled but has not started
    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(delay: Duration) -> (Debouncer, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let debouncer = Debouncer::new(delay, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (debouncer, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_after_quiet_period() {
        let (debouncer, runs) = counting(Duration::from_secs(1));
        debouncer.schedule();

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_schedules_coalesce() {
        let (debouncer, runs) = counting(Duration::from_secs(1));
        for _ in 0..10 {
            debouncer.schedule();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_prevents_run() {
        let (debouncer, runs) = counting(Duration::from_secs(1));
        debouncer.schedule();
        assert!(debouncer.cancel_pending());
        assert!(!debouncer.cancel_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_immediately_once() {
        let (debouncer, runs) = counting(Duration::from_secs(1));
        debouncer.flush().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        debouncer.schedule();
        debouncer.flush().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_after_fire_runs_again() {
        let (debouncer, runs) = counting(Duration::from_millis(100));
        debouncer.schedule();
        tokio::time::sleep(Duration::from_millis(150)).await;
        debouncer.schedule();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_aborts_superseded_timer() {
        let (debouncer, runs) = counting(Duration::from_secs(1));
        debouncer.schedule();
        let first = lock(&debouncer.state)
            .timer
            .as_ref()
            .map(|timer| timer.abort_handle())
            .unwrap();

        for _ in 0..100 {
            debouncer.schedule();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(first.is_finished());
        assert!(lock(&debouncer.state).timer.is_some());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(lock(&debouncer.state).timer.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_aborts_timer() {
        let (debouncer, runs) = counting(Duration::from_secs(1));
        debouncer.schedule();
        let timer = lock(&debouncer.state)
            .timer
            .as_ref()
            .map(|timer| timer.abort_handle())
            .unwrap();

        debouncer.cancel_pending();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(timer.is_finished());
        assert!(lock(&debouncer.state).timer.is_none());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_timer() {
        let (debouncer, runs) = counting(Duration::from_secs(1));
        let other = debouncer.clone();
        debouncer.schedule();
        other.schedule();
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
