use crate::scheduler::BackoffPolicy;
use chatpoll_core::{ChatError, ChatResult};
use serde::{Deserialize, Serialize};

/// Connection settings for the agent chat service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path prefix of the chat API, joined to `base_url`.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Full URL of the server health endpoint. Defaults to
    /// `{base_url}/api/health` when unset.
    #[serde(default)]
    pub health_url: Option<String>,
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Polling cadence, all values in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Fixed interval used right after a poll that returned messages.
    #[serde(default = "default_active_interval_ms")]
    pub active_interval_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8181".to_string()
}

fn default_api_prefix() -> String {
    "/api/agent-chat".to_string()
}

fn default_base_interval_ms() -> u64 {
    3_000
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_active_interval_ms() -> u64 {
    2_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            health_url: None,
            polling: PollingConfig::default(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: default_base_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            active_interval_ms: default_active_interval_ms(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Root of the chat API, without a trailing slash.
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }

    pub fn health_endpoint(&self) -> String {
        match &self.health_url {
            Some(url) => url.clone(),
            None => format!("{}/api/health", self.base_url.trim_end_matches('/')),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::from(self.polling)
    }

    /// Rejects settings that would make polling misbehave.
    pub fn validate(&self) -> ChatResult<()> {
        self.polling.validate()
    }
}

impl PollingConfig {
    /// Every interval must be non-zero.
    pub fn validate(&self) -> ChatResult<()> {
        let fields = [
            ("base_interval_ms", self.base_interval_ms),
            ("max_interval_ms", self.max_interval_ms),
            ("active_interval_ms", self.active_interval_ms),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ChatError::Config(format!(
                    "polling.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}
