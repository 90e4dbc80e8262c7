//! Global configuration types for Confab.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! server bind address, conversation memory limits, and streaming timeouts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
///
/// Loaded from `~/.confab/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub provider: ProviderSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8420
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Limits for conversation memory and response streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum user/assistant turns kept in a conversation window.
    #[serde(default = "default_memory_max_messages")]
    pub memory_max_messages: usize,

    /// Maximum turns returned when listing a conversation's history.
    #[serde(default = "default_preview_max_messages")]
    pub preview_max_messages: usize,

    /// Fragments buffered between the generation task and the consumer.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// How long a fragment send may wait on a full buffer before the
    /// consumer is treated as stalled.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Upper bound on a single generation.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Idle time after which an unused window is dropped from memory.
    #[serde(default = "default_memory_idle_secs")]
    pub memory_idle_secs: u64,

    /// Model used when neither the request nor its app names one.
    #[serde(default)]
    pub default_model_id: Option<String>,
}

fn default_memory_max_messages() -> usize {
    20
}

fn default_preview_max_messages() -> usize {
    100
}

fn default_stream_buffer() -> usize {
    64
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_generation_timeout_secs() -> u64 {
    600
}

fn default_memory_idle_secs() -> u64 {
    1800
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            memory_max_messages: default_memory_max_messages(),
            preview_max_messages: default_preview_max_messages(),
            stream_buffer: default_stream_buffer(),
            send_timeout_secs: default_send_timeout_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
            memory_idle_secs: default_memory_idle_secs(),
            default_model_id: None,
        }
    }
}

impl ChatConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn memory_idle(&self) -> Duration {
        Duration::from_secs(self.memory_idle_secs)
    }
}

/// HTTP settings shared by all provider clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    600
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.server.port, 8420);
        assert_eq!(config.chat.memory_max_messages, 20);
        assert_eq!(config.chat.preview_max_messages, 100);
        assert_eq!(config.chat.stream_buffer, 64);
        assert!(config.chat.default_model_id.is_none());
        assert_eq!(config.provider.request_timeout_secs, 600);
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.chat.generation_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
[server]
port = 9000

[chat]
memory_max_messages = 6
default_model_id = "gpt-main"
send_timeout_secs = 5
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.chat.memory_max_messages, 6);
        assert_eq!(config.chat.default_model_id.as_deref(), Some("gpt-main"));
        assert_eq!(config.chat.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.chat.memory_idle_secs, 1800);
    }
}
