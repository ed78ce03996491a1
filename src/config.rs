use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HrdaiConfig {
    pub api: ApiConfig,
    pub client: ClientConfig,
    pub storage: StorageConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Upper bound on a single end-of-session beacon delivery.
    pub beacon_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub state_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    /// Shown as the first assistant message when the greeting request fails.
    pub intro_message: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".into(),
            beacon_timeout_ms: 2000,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let state_path = default_hrdai_dir()
            .join("state.toml")
            .to_string_lossy()
            .into_owned();
        Self { state_path }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            intro_message: "Hi! I'm your HrdAI assistant. Tell me about your day, the people \
                            in your life, or anything you'd like me to remember."
                .into(),
        }
    }
}

/// Returns `~/.hrdai/`
pub fn default_hrdai_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hrdai")
}

/// Returns the default config file path: `~/.hrdai/config.toml`
pub fn default_config_path() -> PathBuf {
    default_hrdai_dir().join("config.toml")
}

impl HrdaiConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            HrdaiConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (HRDAI_API_URL, HRDAI_LOG_LEVEL, HRDAI_STATE).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HRDAI_API_URL") {
            self.api.base_url = val;
        }
        if let Ok(val) = std::env::var("HRDAI_LOG_LEVEL") {
            self.client.log_level = val;
        }
        if let Ok(val) = std::env::var("HRDAI_STATE") {
            self.storage.state_path = val;
        }
    }

    /// Resolve the state file path, expanding `~` if needed.
    pub fn resolved_state_path(&self) -> PathBuf {
        expand_tilde(&self.storage.state_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HrdaiConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.beacon_timeout_ms, 2000);
        assert_eq!(config.client.log_level, "warn");
        assert!(config.storage.state_path.ends_with("state.toml"));
        assert!(!config.chat.intro_message.is_empty());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[api]
base_url = "https://demo.example.com/api"

[client]
log_level = "debug"

[chat]
intro_message = "Hello there"
"#;
        let config: HrdaiConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.base_url, "https://demo.example.com/api");
        assert_eq!(config.client.log_level, "debug");
        assert_eq!(config.chat.intro_message, "Hello there");
        // defaults still apply for unset fields
        assert_eq!(config.api.beacon_timeout_ms, 2000);
        assert!(config.storage.state_path.ends_with("state.toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = HrdaiConfig::default();
        std::env::set_var("HRDAI_API_URL", "http://127.0.0.1:9000/api");
        std::env::set_var("HRDAI_LOG_LEVEL", "trace");
        std::env::set_var("HRDAI_STATE", "/tmp/hrdai-state.toml");

        config.apply_env_overrides();

        assert_eq!(config.api.base_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.client.log_level, "trace");
        assert_eq!(config.storage.state_path, "/tmp/hrdai-state.toml");

        // Clean up
        std::env::remove_var("HRDAI_API_URL");
        std::env::remove_var("HRDAI_LOG_LEVEL");
        std::env::remove_var("HRDAI_STATE");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = HrdaiConfig::load_from(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.chat.intro_message, ChatConfig::default().intro_message);
    }
}
