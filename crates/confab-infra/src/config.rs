//! Global configuration loader for Confab.
//!
//! Reads `config.toml` from the data directory (`~/.confab/` by default)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use confab_types::config::GlobalConfig;

use crate::sqlite::pool::default_database_url;

/// Resolve the data directory.
///
/// Priority:
/// 1. `CONFAB_HOME` environment variable
/// 2. `~/.confab`
/// 3. `.confab` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var("CONFAB_HOME").ok(), dirs::home_dir())
}

fn data_dir_from(env: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    match home {
        Some(home) => home.join(".confab"),
        None => PathBuf::from(".confab"),
    }
}

/// `CONFAB_DATABASE_URL`, else the database file inside `data_dir`.
pub fn resolve_database_url(data_dir: &Path) -> String {
    std::env::var("CONFAB_DATABASE_URL")
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| default_database_url(data_dir))
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`GlobalConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.server.port, 8420);
        assert_eq!(config.chat.memory_max_messages, 20);
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[server]
port = 9100

[chat]
default_model_id = "ollama-local"
stream_buffer = 8

[provider]
request_timeout_secs = 45
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.chat.default_model_id.as_deref(), Some("ollama-local"));
        assert_eq!(config.chat.stream_buffer, 8);
        assert_eq!(config.provider.request_timeout_secs, 45);
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.server.port, 8420);
        assert!(config.chat.default_model_id.is_none());
    }

    #[test]
    fn data_dir_prefers_env_then_home() {
        assert_eq!(
            data_dir_from(Some("/srv/confab".into()), Some("/home/u".into())),
            PathBuf::from("/srv/confab")
        );
        assert_eq!(
            data_dir_from(Some("  ".into()), Some("/home/u".into())),
            PathBuf::from("/home/u/.confab")
        );
        assert_eq!(data_dir_from(None, None), PathBuf::from(".confab"));
    }
}
