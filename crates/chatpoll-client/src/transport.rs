use crate::config::ClientConfig;
use async_trait::async_trait;
use chatpoll_core::{
    timestamp, ChatError, ChatMessage, ChatResult, ChatSession, CreateSessionRequest,
    SendMessageRequest,
};
use chrono::Utc;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Request/response access to the remote agent chat service.
///
/// Implementations map HTTP outcomes onto [`ChatError`]: a 404 from the
/// create or fetch endpoints becomes [`ChatError::ServiceUnavailable`], any
/// other non-success status becomes [`ChatError::RequestFailed`], and
/// transport failures become [`ChatError::Network`].
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn create_session(&self, request: &CreateSessionRequest) -> ChatResult<ChatSession>;

    /// Succeeds when the session exists on the server.
    async fn get_session(&self, session_id: &str) -> ChatResult<()>;

    async fn send_message(
        &self,
        session_id: &str,
        request: &SendMessageRequest,
    ) -> ChatResult<ChatMessage>;

    /// Messages newer than `after`, oldest first. `None` means from the
    /// beginning of the session.
    async fn fetch_messages(
        &self,
        session_id: &str,
        after: Option<&str>,
    ) -> ChatResult<Vec<ChatMessage>>;

    async fn delete_session(&self, session_id: &str) -> ChatResult<()>;

    /// Probe of the chat service's own status endpoint.
    async fn chat_status(&self) -> ChatResult<()>;
}

/// [`ChatTransport`] over HTTP/JSON using `reqwest`.
pub struct HttpTransport {
    api_root: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: String,
    #[serde(default)]
    agent_type: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Whether a 404 means "service gone" for this endpoint or is just another
/// failed request.
#[derive(Clone, Copy)]
enum NotFound {
    Unavailable,
    Failed,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Build on a caller-supplied client (proxies, TLS roots, ...).
    pub fn with_client(config: &ClientConfig, http: reqwest::Client) -> Self {
        Self {
            api_root: config.api_root(),
            http,
        }
    }

    /// `api_root` plus `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> ChatResult<Url> {
        let mut url = Url::parse(&self.api_root).map_err(|e| {
            ChatError::Config(format!("Invalid API root '{}': {e}", self.api_root))
        })?;
        url.path_segments_mut()
            .map_err(|()| ChatError::Config(format!("API root '{}' has no path", self.api_root)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn session_endpoint(&self, session_id: &str, tail: Option<&str>) -> ChatResult<Url> {
        if matches!(session_id, "" | "." | "..") {
            return Err(ChatError::InvalidSessionId(session_id.to_string()));
        }
        let mut segments = vec!["sessions", session_id];
        segments.extend(tail);
        self.endpoint(&segments)
    }
}

async fn execute(request: RequestBuilder, operation: &'static str) -> ChatResult<Response> {
    request
        .send()
        .await
        .map_err(|e| ChatError::Network(format!("{operation}: {e}")))
}

fn check_status(
    response: Response,
    operation: &'static str,
    not_found: NotFound,
) -> ChatResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        if let NotFound::Unavailable = not_found {
            return Err(ChatError::ServiceUnavailable);
        }
    }
    Err(ChatError::RequestFailed {
        operation,
        status: status.as_u16(),
    })
}

async fn decode<T: DeserializeOwned>(response: Response, operation: &'static str) -> ChatResult<T> {
    response
        .json()
        .await
        .map_err(|e| ChatError::Network(format!("invalid {operation} response: {e}")))
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn create_session(&self, request: &CreateSessionRequest) -> ChatResult<ChatSession> {
        const OP: &str = "create session";
        let url = self.endpoint(&["sessions"])?;
        let response = execute(self.http.post(url).json(request), OP).await?;
        let response = check_status(response, OP, NotFound::Unavailable)?;
        let body: CreateSessionResponse = decode(response, OP).await?;

        let created_at = body
            .created_at
            .as_deref()
            .and_then(|raw| timestamp::parse(raw).ok())
            .unwrap_or_else(Utc::now);

        Ok(ChatSession {
            session_id: body.session_id,
            agent_type: body
                .agent_type
                .unwrap_or_else(|| request.agent_type.clone()),
            project_id: body.project_id.or_else(|| request.project_id.clone()),
            created_at,
        })
    }

    async fn get_session(&self, session_id: &str) -> ChatResult<()> {
        const OP: &str = "get session";
        let url = self.session_endpoint(session_id, None)?;
        let response = execute(self.http.get(url), OP).await?;
        check_status(response, OP, NotFound::Failed)?;
        Ok(())
    }

    async fn send_message(
        &self,
        session_id: &str,
        request: &SendMessageRequest,
    ) -> ChatResult<ChatMessage> {
        const OP: &str = "send message";
        let url = self.session_endpoint(session_id, Some("send"))?;
        let response = execute(self.http.post(url).json(request), OP).await?;
        let response = check_status(response, OP, NotFound::Failed)?;
        decode(response, OP).await
    }

    async fn fetch_messages(
        &self,
        session_id: &str,
        after: Option<&str>,
    ) -> ChatResult<Vec<ChatMessage>> {
        const OP: &str = "fetch messages";
        let url = self.session_endpoint(session_id, Some("messages"))?;
        let mut request = self.http.get(url);
        if let Some(cursor) = after {
            request = request.query(&[("after", cursor)]);
        }
        let response = execute(request, OP).await?;
        let response = check_status(response, OP, NotFound::Unavailable)?;
        decode(response, OP).await
    }

    async fn delete_session(&self, session_id: &str) -> ChatResult<()> {
        const OP: &str = "delete session";
        let url = self.session_endpoint(session_id, None)?;
        let response = execute(self.http.delete(url), OP).await?;
        check_status(response, OP, NotFound::Failed)?;
        Ok(())
    }

    async fn chat_status(&self) -> ChatResult<()> {
        const OP: &str = "check chat status";
        let url = self.endpoint(&["status"])?;
        let response = execute(self.http.get(url), OP).await?;
        check_status(response, OP, NotFound::Unavailable)?;
        Ok(())
    }
}
