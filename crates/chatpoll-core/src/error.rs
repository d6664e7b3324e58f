use thiserror::Error;

/// A convenience `Result` alias using [`ChatError`].
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors produced while talking to the agent chat service.
///
/// The first three variants form the polling taxonomy: a not-found response
/// is permanent for a session, while request and network failures are
/// transient and retried with backoff.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The remote endpoint reported not-found; the chat service is disabled
    /// or the session no longer exists.
    #[error("Agent chat service is not available")]
    ServiceUnavailable,

    /// The remote endpoint answered with a non-success status other than 404.
    #[error("Failed to {operation}: HTTP {status}")]
    RequestFailed {
        /// Human-readable name of the operation, e.g. `"fetch messages"`.
        operation: &'static str,
        /// The HTTP status code returned by the server.
        status: u16,
    },

    /// The request never produced a usable response (connection refused,
    /// reset, malformed body, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// A session id that cannot name a single URL path segment.
    #[error("Invalid session id: '{0}'")]
    InvalidSessionId(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Whether the error ends a polling stream for good.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ChatError::ServiceUnavailable | ChatError::InvalidSessionId(_)
        )
    }

    /// The HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::ServiceUnavailable => Some(404),
            ChatError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn only_not_found_class_is_permanent() {
        assert!(ChatError::ServiceUnavailable.is_permanent());
        assert!(ChatError::InvalidSessionId("..".into()).is_permanent());
        assert!(!ChatError::Network("connection refused".into()).is_permanent());
        assert!(!ChatError::RequestFailed {
            operation: "fetch messages",
            status: 500,
        }
        .is_permanent());
    }

    #[test]
    fn request_failed_display_names_operation_and_status() {
        let err = ChatError::RequestFailed {
            operation: "delete session",
            status: 502,
        };
        assert_eq!(err.to_string(), "Failed to delete session: HTTP 502");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn network_error_has_no_status() {
        assert_eq!(ChatError::Network("reset".into()).status(), None);
    }
}
