//! `chatpoll.toml` loading.

use chatpoll_client::ClientConfig;
use chatpoll_core::{ChatError, ChatResult};
use serde::Deserialize;
use std::path::Path;

/// Top-level CLI configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Fallback log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub client: ClientConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            client: ClientConfig::default(),
        }
    }
}

/// Read `path` as TOML. A missing file yields the defaults.
pub fn load_config(path: &Path) -> ChatResult<CliConfig> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        ChatError::Config(format!(
            "Failed to read config '{}': {}",
            path.display(),
            e
        ))
    })?;
    let config: CliConfig = toml::from_str(&content).map_err(|e| {
        ChatError::Config(format!(
            "Failed to parse config '{}': {}",
            path.display(),
            e
        ))
    })?;
    config.client.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp.as_file_mut(),
            r#"
log_level = "debug"
log_json = true

[client]
base_url = "http://chat.internal:9000"
health_url = "http://chat.internal:9000/healthz"

[client.polling]
base_interval_ms = 1000
active_interval_ms = 500
"#
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);
        assert_eq!(config.client.base_url, "http://chat.internal:9000");
        assert_eq!(config.client.api_prefix, "/api/agent-chat");
        assert_eq!(
            config.client.health_endpoint(),
            "http://chat.internal:9000/healthz"
        );
        assert_eq!(config.client.polling.base_interval_ms, 1000);
        assert_eq!(config.client.polling.max_interval_ms, 30_000);
        assert_eq!(config.client.polling.active_interval_ms, 500);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp.as_file_mut()).unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.client.base_url, "http://localhost:8181");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/path/chatpoll.toml")).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.client.polling.base_interval_ms, 3_000);
    }

    #[test]
    fn test_zero_poll_interval_returns_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp.as_file_mut(),
            r#"
[client.polling]
base_interval_ms = 0
"#
        )
        .unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
        assert!(err.to_string().contains("base_interval_ms"));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp.as_file_mut(), "{{{{invalid toml!!!!").unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
        let err_msg = err.to_string();
        assert!(
            err_msg.contains("Failed to parse config"),
            "unexpected error: {err_msg}"
        );
    }
}
