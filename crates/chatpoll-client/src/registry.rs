use crate::scheduler::BackoffPolicy;
use crate::timer::TimerHandle;
use chatpoll_core::{ChatError, ChatMessage};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Callback receiving each new message, in server order.
pub type MessageHandler = Arc<dyn Fn(ChatMessage) + Send + Sync>;
/// Callback receiving poll failures.
pub type ErrorHandler = Arc<dyn Fn(ChatError) + Send + Sync>;

/// The message handler and optional error handler of one stream.
///
/// A session holds at most one set; registering again replaces it.
#[derive(Clone)]
pub struct StreamHandlers {
    on_message: MessageHandler,
    on_error: Option<ErrorHandler>,
}

impl StreamHandlers {
    pub fn new<F>(on_message: F) -> Self
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        Self {
            on_message: Arc::new(on_message),
            on_error: None,
        }
    }

    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(ChatError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    pub(crate) fn message(&self, message: ChatMessage) {
        (self.on_message)(message);
    }

    pub(crate) fn error(&self, error: ChatError) {
        match &self.on_error {
            Some(handler) => handler(error),
            None => tracing::trace!(error = %error, "No error handler registered"),
        }
    }

    pub fn has_error_handler(&self) -> bool {
        self.on_error.is_some()
    }
}

impl std::fmt::Debug for StreamHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandlers")
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

/// Counters describing how a stream has been polling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Fetches that completed, successfully or not.
    pub polls: u64,
    /// Due ticks skipped because the UI was hidden.
    pub skipped_ticks: u64,
    pub failures: u64,
    pub messages_delivered: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
}

/// Per-session polling bookkeeping.
///
/// Only the session's own poll cycle writes to it; everyone else reads
/// snapshots through [`SessionRegistry::snapshot`].
#[derive(Debug, Clone)]
pub struct PollState {
    /// Consecutive failed fetches; zero after any success.
    pub attempts: u32,
    /// Id of the last message handed to the message handler.
    pub cursor: Option<String>,
    /// Delay the session's timer is currently armed with.
    pub next_delay: Duration,
    pub started_at: DateTime<Utc>,
    pub stats: PollStats,
}

impl PollState {
    pub(crate) fn new(policy: &BackoffPolicy, cursor: Option<String>) -> Self {
        Self {
            attempts: 0,
            cursor,
            next_delay: policy.interval(0),
            started_at: Utc::now(),
            stats: PollStats::default(),
        }
    }

    pub(crate) fn record_skip(&mut self) {
        self.stats.skipped_ticks += 1;
    }

    /// A fetch returned `delivered` messages. Returns the next delay.
    pub(crate) fn record_success(&mut self, delivered: usize, policy: &BackoffPolicy) -> Duration {
        self.attempts = 0;
        self.stats.polls += 1;
        self.stats.last_poll_at = Some(Utc::now());
        self.next_delay = policy.after_success(delivered);
        self.next_delay
    }

    /// A fetch failed transiently. Returns the next delay.
    pub(crate) fn record_failure(&mut self, policy: &BackoffPolicy) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.stats.polls += 1;
        self.stats.failures += 1;
        self.stats.last_poll_at = Some(Utc::now());
        self.next_delay = policy.interval(self.attempts);
        self.next_delay
    }

    /// Moves the cursor to a message about to be delivered.
    pub(crate) fn advance_cursor(&mut self, message_id: &str) {
        self.cursor = Some(message_id.to_string());
        self.stats.messages_delivered += 1;
    }
}

/// What a running poll cycle holds on to for its session.
#[derive(Clone)]
pub(crate) struct SessionSlot {
    pub(crate) session_id: String,
    pub(crate) generation: u64,
    pub(crate) state: Arc<Mutex<PollState>>,
    pub(crate) handlers: StreamHandlers,
    active: Arc<AtomicBool>,
}

impl SessionSlot {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

struct SessionEntry {
    slot: SessionSlot,
    timer: TimerHandle,
}

impl SessionEntry {
    fn shut_down(self) -> Option<String> {
        self.slot.deactivate();
        self.timer.cancel();
        self.slot.state.lock().cursor.clone()
    }
}

/// Active streams keyed by session id.
///
/// Each entry owns the session's only timer; replacing or removing an entry
/// cancels that timer before anything else happens.
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, SessionEntry>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Registers a fresh stream for `session_id` and arms its timer via
    /// `spawn`. An existing stream for the same id is shut down first and
    /// its cursor carried over.
    pub(crate) fn register<F>(
        &self,
        session_id: &str,
        handlers: StreamHandlers,
        policy: &BackoffPolicy,
        spawn: F,
    ) where
        F: FnOnce(SessionSlot) -> TimerHandle,
    {
        let mut entries = self.entries.lock();
        let cursor = entries.remove(session_id).and_then(SessionEntry::shut_down);
        if cursor.is_some() {
            tracing::debug!(session_id, "Replacing active stream, keeping cursor");
        }

        let slot = SessionSlot {
            session_id: session_id.to_string(),
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst),
            state: Arc::new(Mutex::new(PollState::new(policy, cursor))),
            handlers,
            active: Arc::new(AtomicBool::new(true)),
        };
        let timer = spawn(slot.clone());
        entries.insert(session_id.to_string(), SessionEntry { slot, timer });
    }

    /// Stops and forgets the stream for `session_id`. Unknown ids are a
    /// no-op. Returns whether a stream was removed.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.entries.lock().remove(session_id);
        match removed {
            Some(entry) => {
                entry.shut_down();
                true
            }
            None => false,
        }
    }

    /// Like [`remove`](Self::remove), but only if the entry still belongs to
    /// `generation`. A newer stream registered in the meantime is left alone.
    pub(crate) fn purge(&self, session_id: &str, generation: u64) -> bool {
        let mut entries = self.entries.lock();
        let owned = entries
            .get(session_id)
            .is_some_and(|entry| entry.slot.generation == generation);
        if !owned {
            return false;
        }
        if let Some(entry) = entries.remove(session_id) {
            entry.shut_down();
        }
        true
    }

    /// Stops every stream. Returns how many were active.
    pub fn clear(&self) -> usize {
        let drained: Vec<SessionEntry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        let count = drained.len();
        for entry in drained {
            entry.shut_down();
        }
        count
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.lock().contains_key(session_id)
    }

    /// Whether the session has a timer that has not finished or been cancelled.
    pub fn has_live_timer(&self, session_id: &str) -> bool {
        self.entries
            .lock()
            .get(session_id)
            .is_some_and(|entry| entry.slot.is_active() && !entry.timer.is_finished())
    }

    pub fn handlers(&self, session_id: &str) -> Option<StreamHandlers> {
        self.entries
            .lock()
            .get(session_id)
            .map(|entry| entry.slot.handlers.clone())
    }

    pub fn snapshot(&self, session_id: &str) -> Option<PollState> {
        self.entries
            .lock()
            .get(session_id)
            .map(|entry| entry.slot.state.lock().clone())
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn idle_timer(_slot: SessionSlot) -> TimerHandle {
        TimerHandle::spawn(std::future::pending())
    }

    fn noop_handlers() -> StreamHandlers {
        StreamHandlers::new(|_| {})
    }

    #[test]
    fn test_state_transitions() {
        let policy = BackoffPolicy::default();
        let mut state = PollState::new(&policy, None);
        assert_eq!(state.next_delay, Duration::from_millis(3_000));

        assert_eq!(state.record_failure(&policy), Duration::from_millis(6_000));
        assert_eq!(state.record_failure(&policy), Duration::from_millis(12_000));
        assert_eq!(state.attempts, 2);

        state.advance_cursor("m1");
        assert_eq!(state.record_success(1, &policy), Duration::from_millis(2_000));
        assert_eq!(state.attempts, 0);
        assert_eq!(state.cursor.as_deref(), Some("m1"));

        assert_eq!(state.record_success(0, &policy), Duration::from_millis(3_000));
        assert_eq!(state.cursor.as_deref(), Some("m1"));
        assert_eq!(state.stats.polls, 4);
        assert_eq!(state.stats.failures, 2);
        assert_eq!(state.stats.messages_delivered, 1);
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = SessionRegistry::new();
        registry.register("s1", noop_handlers(), &BackoffPolicy::default(), idle_timer);

        assert!(registry.contains("s1"));
        assert!(registry.has_live_timer("s1"));
        assert!(registry.handlers("s1").is_some());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("s1"));
        assert!(!registry.contains("s1"));
        assert!(!registry.has_live_timer("s1"));
        assert!(registry.handlers("s1").is_none());

        // Second removal is a no-op.
        assert!(!registry.remove("s1"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_replacement_keeps_cursor_and_deactivates_old_slot() {
        let registry = SessionRegistry::new();
        let policy = BackoffPolicy::default();
        let mut first: Option<SessionSlot> = None;
        registry.register("s1", noop_handlers(), &policy, |slot| {
            first = Some(slot.clone());
            idle_timer(slot)
        });
        let first = first.unwrap();
        first.state.lock().advance_cursor("m7");

        registry.register("s1", noop_handlers(), &policy, idle_timer);

        assert!(!first.is_active());
        let state = registry.snapshot("s1").unwrap();
        assert_eq!(state.cursor.as_deref(), Some("m7"));
        assert_eq!(state.attempts, 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_purge_ignores_newer_generation() {
        let registry = SessionRegistry::new();
        let policy = BackoffPolicy::default();
        let mut old_generation = 0;
        registry.register("s1", noop_handlers(), &policy, |slot| {
            old_generation = slot.generation;
            idle_timer(slot)
        });
        registry.register("s1", noop_handlers(), &policy, idle_timer);

        assert!(!registry.purge("s1", old_generation));
        assert!(registry.contains("s1"));
    }

    #[tokio::test]
    async fn test_clear_stops_everything() {
        let registry = SessionRegistry::new();
        let policy = BackoffPolicy::default();
        registry.register("b", noop_handlers(), &policy, idle_timer);
        registry.register("a", noop_handlers(), &policy, idle_timer);
        assert_eq!(registry.session_ids(), vec!["a".to_string(), "b".to_string()]);

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.clear(), 0);
    }

    #[test]
    fn test_handlers_without_error_callback() {
        let handlers = noop_handlers();
        assert!(!handlers.has_error_handler());
        // Must not panic.
        handlers.error(ChatError::ServiceUnavailable);
        assert!(noop_handlers().on_error(|_| {}).has_error_handler());
    }
}
