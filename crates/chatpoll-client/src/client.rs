use crate::config::ClientConfig;
use crate::cycle::PollCycle;
use crate::health::{HealthProbe, HttpHealthProbe, StaticHealth};
use crate::registry::{PollState, SessionRegistry, StreamHandlers};
use crate::scheduler::BackoffPolicy;
use crate::timer::TimerHandle;
use crate::transport::{ChatTransport, HttpTransport};
use crate::visibility::{Visibility, VisibilityGate};
use chatpoll_core::{
    ChatError, ChatMessage, ChatResult, ChatSession, CreateSessionRequest, SendMessageRequest,
    ServerStatus,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Item delivered by [`ChatClient::subscribe`].
#[derive(Debug)]
pub enum StreamEvent {
    Message(ChatMessage),
    Error(ChatError),
}

/// Session lifecycle manager and entry point of the polling engine.
///
/// Creates, validates and deletes sessions on the remote service, and wires
/// a poll cycle to each session the caller starts streaming. Dropping the
/// client stops every stream it started.
pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    health: Arc<dyn HealthProbe>,
    visibility: Arc<dyn Visibility>,
    policy: BackoffPolicy,
    registry: Arc<SessionRegistry>,
}

/// Builder for [`ChatClient`] with injectable collaborators.
pub struct ChatClientBuilder {
    transport: Arc<dyn ChatTransport>,
    health: Arc<dyn HealthProbe>,
    visibility: Arc<dyn Visibility>,
    policy: BackoffPolicy,
}

impl ChatClientBuilder {
    pub fn health_probe(mut self, health: Arc<dyn HealthProbe>) -> Self {
        self.health = health;
        self
    }

    /// Predicate consulted before every due poll tick.
    pub fn visibility(mut self, visibility: Arc<dyn Visibility>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ChatClient {
        ChatClient {
            transport: self.transport,
            health: self.health,
            visibility: self.visibility,
            policy: self.policy,
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}

impl ChatClient {
    /// HTTP client for the service described by `config`, always visible.
    pub fn new(config: &ClientConfig) -> Self {
        Self::builder(Arc::new(HttpTransport::new(config)))
            .health_probe(Arc::new(HttpHealthProbe::from_config(config)))
            .policy(config.backoff_policy())
            .build()
    }

    /// Starts a builder around `transport`. Defaults: healthy, visible,
    /// default backoff policy.
    pub fn builder(transport: Arc<dyn ChatTransport>) -> ChatClientBuilder {
        ChatClientBuilder {
            transport,
            health: Arc::new(StaticHealth(true)),
            visibility: Arc::new(VisibilityGate::new()),
            policy: BackoffPolicy::default(),
        }
    }

    // ── Session lifecycle ────────────────────────────────────────────────

    /// Create a session on the server. Does not start polling.
    pub async fn create_session(
        &self,
        agent_type: &str,
        project_id: Option<&str>,
    ) -> ChatResult<ChatSession> {
        let mut request = CreateSessionRequest::new(agent_type);
        request.project_id = project_id.map(str::to_string);

        match self.transport.create_session(&request).await {
            Ok(session) => {
                info!(
                    session_id = %session.session_id,
                    agent_type = %session.agent_type,
                    "Created chat session"
                );
                Ok(session)
            }
            Err(ChatError::ServiceUnavailable) => {
                debug!("Agent chat service disabled, no session created");
                Err(ChatError::ServiceUnavailable)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create chat session");
                Err(e)
            }
        }
    }

    /// Best-effort existence check. Any failure reads as `false`.
    pub async fn validate_session(&self, session_id: &str) -> bool {
        match self.transport.get_session(session_id).await {
            Ok(()) => true,
            Err(e) => {
                debug!(session_id, error = %e, "Session validation failed");
                false
            }
        }
    }

    pub async fn send_message(
        &self,
        session_id: &str,
        request: &SendMessageRequest,
    ) -> ChatResult<ChatMessage> {
        self.transport.send_message(session_id, request).await
    }

    /// Full message history of a session, from the beginning.
    pub async fn get_chat_history(&self, session_id: &str) -> ChatResult<Vec<ChatMessage>> {
        match self.transport.fetch_messages(session_id, None).await {
            Err(ChatError::ServiceUnavailable) => Err(ChatError::RequestFailed {
                operation: "get chat history",
                status: 404,
            }),
            other => other,
        }
    }

    /// Tear down local polling for the session, then delete it remotely.
    pub async fn delete_session(&self, session_id: &str) -> ChatResult<()> {
        self.stop_streaming(session_id);
        self.transport.delete_session(session_id).await?;
        info!(session_id, "Deleted chat session");
        Ok(())
    }

    /// Server availability: the health probe first, then the chat service's
    /// own status endpoint. Any failure along the way reads as offline.
    pub async fn get_server_status(&self) -> ServerStatus {
        if !self.health.check_health().await {
            return ServerStatus::Offline;
        }

        match self.transport.chat_status().await {
            Ok(()) => ServerStatus::Online,
            Err(e) => {
                debug!(error = %e, status = ?e.status(), "Chat status probe failed");
                ServerStatus::Offline
            }
        }
    }

    // ── Streaming ────────────────────────────────────────────────────────

    /// Start polling `session_id`, delivering messages to `handlers`.
    ///
    /// Replaces any stream already running for the session. Must be called
    /// from within a tokio runtime.
    pub fn start_streaming(&self, session_id: &str, handlers: StreamHandlers) {
        let transport = self.transport.clone();
        let visibility = self.visibility.clone();
        let policy = self.policy;
        let registry = Arc::downgrade(&self.registry);

        self.registry
            .register(session_id, handlers, &self.policy, move |slot| {
                let cycle = PollCycle::new(slot, transport, visibility, policy, registry);
                TimerHandle::spawn(cycle.run())
            });
        info!(
            session_id,
            delay_ms = self.policy.interval(0).as_millis() as u64,
            "Started message stream"
        );
    }

    /// Channel-based variant of [`start_streaming`](Self::start_streaming).
    ///
    /// The stream keeps polling until stopped, even if the receiver is
    /// dropped.
    pub fn subscribe(&self, session_id: &str) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let error_tx = tx.clone();
        let handlers = StreamHandlers::new(move |message| {
            let _ = tx.send(StreamEvent::Message(message));
        })
        .on_error(move |error| {
            let _ = error_tx.send(StreamEvent::Error(error));
        });
        self.start_streaming(session_id, handlers);
        rx
    }

    /// Stop polling `session_id`. Unknown or already stopped ids are a no-op.
    pub fn stop_streaming(&self, session_id: &str) {
        if self.registry.remove(session_id) {
            info!(session_id, "Stopped message stream");
        }
    }

    /// Stop every active stream.
    pub fn cleanup(&self) {
        let stopped = self.registry.clear();
        if stopped > 0 {
            info!(count = stopped, "Stopped all message streams");
        }
    }

    // ── Inspection ───────────────────────────────────────────────────────

    pub fn is_streaming(&self, session_id: &str) -> bool {
        self.registry.has_live_timer(session_id)
    }

    pub fn poll_state(&self, session_id: &str) -> Option<PollState> {
        self.registry.snapshot(session_id)
    }

    pub fn active_sessions(&self) -> Vec<String> {
        self.registry.session_ids()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }
}
