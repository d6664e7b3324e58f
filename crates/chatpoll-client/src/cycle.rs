//! The recurring poll for one session.
//!
//! A cycle runs as a single task: sleep for the armed delay, fetch, dispatch,
//! compute the next delay, repeat. The sleep is the session's only timer and
//! the next one is armed only after the previous batch has been handled, so
//! two polls of the same session never overlap.

use crate::registry::{SessionRegistry, SessionSlot};
use crate::scheduler::BackoffPolicy;
use crate::transport::ChatTransport;
use crate::visibility::Visibility;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub(crate) struct PollCycle {
    slot: SessionSlot,
    transport: Arc<dyn ChatTransport>,
    visibility: Arc<dyn Visibility>,
    policy: BackoffPolicy,
    registry: Weak<SessionRegistry>,
}

impl PollCycle {
    pub(crate) fn new(
        slot: SessionSlot,
        transport: Arc<dyn ChatTransport>,
        visibility: Arc<dyn Visibility>,
        policy: BackoffPolicy,
        registry: Weak<SessionRegistry>,
    ) -> Self {
        Self {
            slot,
            transport,
            visibility,
            policy,
            registry,
        }
    }

    pub(crate) async fn run(self) {
        let mut delay = self.slot.state.lock().next_delay;
        loop {
            tokio::time::sleep(delay).await;
            if !self.slot.is_active() {
                break;
            }

            if !self.visibility.is_visible() {
                self.slot.state.lock().record_skip();
                trace!(session_id = %self.slot.session_id, "UI hidden, skipping poll");
                continue;
            }

            match self.poll_once().await {
                Some(next) => delay = next,
                None => break,
            }
        }
        trace!(session_id = %self.slot.session_id, "Poll cycle finished");
    }

    /// One fetch and its completion handling. Returns the delay to re-arm
    /// with, or `None` when the cycle must end.
    async fn poll_once(&self) -> Option<Duration> {
        let session_id = self.slot.session_id.as_str();
        let cursor = self.slot.state.lock().cursor.clone();
        debug!(session_id, cursor = ?cursor, "Polling for messages");

        let result = self.transport.fetch_messages(session_id, cursor.as_deref()).await;

        // Stopped while the request was in flight: drop the result.
        if !self.slot.is_active() {
            debug!(session_id, "Discarding poll result for stopped stream");
            return None;
        }

        match result {
            Ok(batch) => {
                let next = self
                    .slot
                    .state
                    .lock()
                    .record_success(batch.len(), &self.policy);
                if !batch.is_empty() {
                    debug!(session_id, count = batch.len(), "Received messages");
                }
                for message in batch {
                    if !self.slot.is_active() {
                        return None;
                    }
                    self.slot.state.lock().advance_cursor(&message.id);
                    self.slot.handlers.message(message);
                }
                self.slot.is_active().then_some(next)
            }
            Err(e) if e.is_permanent() => {
                info!(session_id, error = %e, "Session not available, stopping stream");
                self.slot.deactivate();
                if let Some(registry) = self.registry.upgrade() {
                    registry.purge(session_id, self.slot.generation);
                }
                self.slot.handlers.error(e);
                None
            }
            Err(e) => {
                let next = self.slot.state.lock().record_failure(&self.policy);
                warn!(
                    session_id,
                    error = %e,
                    delay_ms = next.as_millis() as u64,
                    "Poll failed, backing off"
                );
                self.slot.handlers.error(e);
                Some(next)
            }
        }
    }
}
