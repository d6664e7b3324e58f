use crate::config::ClientConfig;
use async_trait::async_trait;

/// Lower-level server health check, independent of the chat service.
///
/// Never fails: any transport error or non-success status reads as
/// unhealthy.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check_health(&self) -> bool;
}

/// [`HealthProbe`] with a fixed answer, for embedding without a separate
/// health endpoint.
#[derive(Debug, Clone, Copy)]
pub struct StaticHealth(pub bool);

#[async_trait]
impl HealthProbe for StaticHealth {
    async fn check_health(&self) -> bool {
        self.0
    }
}

/// [`HealthProbe`] issuing `GET` against a fixed health URL.
pub struct HttpHealthProbe {
    url: String,
    http: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.health_endpoint())
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check_health(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                if !healthy {
                    tracing::debug!(url = %self.url, status = %response.status(), "Health check failed");
                }
                healthy
            }
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "Health check unreachable");
                false
            }
        }
    }
}
