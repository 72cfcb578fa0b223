use crate::streaming::DEFAULT_REVEAL_INTERVAL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no key is set in the config file
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const CONFIG_FILE: &str = "config.toml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the Generative Language API
    pub api_key: Option<String>,

    /// Model name used in the request path
    pub model: String,

    /// API root, without a trailing slash
    pub base_url: String,

    /// Fixed sampling parameters sent with every request
    pub generation: GenerationConfig,

    /// Delay between revealed words, in milliseconds
    pub reveal_interval_ms: u64,

    /// HTTP timeout for a single generate call, in seconds
    pub request_timeout_secs: u64,

    /// Where history, theme and logs are kept
    pub data_dir: PathBuf,
}

/// Sampling parameters forwarded as `generationConfig`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            generation: GenerationConfig::default(),
            reveal_interval_ms: DEFAULT_REVEAL_INTERVAL.as_millis() as u64,
            request_timeout_secs: 60,
            data_dir: default_data_dir(),
        }
    }
}

/// `~/.phichat`, falling back to the working directory when there is no home
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".phichat")
}

impl Config {
    /// Load configuration from the default data directory
    pub fn load() -> Result<Self> {
        Self::load_from(&default_data_dir())
    }

    /// Load `config.toml` from `data_dir`, using defaults when it is absent
    pub fn load_from(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let config_path = data_dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Save configuration to `config.toml` in the data directory
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .context("Failed to create data directory")?;
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(self.data_dir.join(CONFIG_FILE), content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Get API key from config or environment
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_widget_parameters() {
        let config = Config::default();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.reveal_interval(), Duration::from_millis(40));
        assert_eq!(config.generation.top_k, 40);
        assert_eq!(config.generation.max_output_tokens, 1024);
    }

    #[test]
    fn missing_file_yields_defaults_rooted_at_dir() {
        let temp = TempDir::new().expect("tempdir");
        let config = Config::load_from(temp.path()).expect("load");
        assert_eq!(config.data_dir, temp.path());
        assert_eq!(config.reveal_interval_ms, 40);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(
            temp.path().join(CONFIG_FILE),
            "model = \"gemini-1.5-pro\"\n\n[generation]\ntemperature = 0.2\n",
        )
        .expect("write");

        let config = Config::load_from(temp.path()).expect("load");
        assert_eq!(config.model, "gemini-1.5-pro");
        assert!((config.generation.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.generation.top_k, 40);
        assert_eq!(config.reveal_interval_ms, 40);
    }

    #[test]
    fn save_then_load() {
        let temp = TempDir::new().expect("tempdir");
        let mut config = Config::load_from(temp.path()).expect("load");
        config.api_key = Some("abc".to_string());
        config.reveal_interval_ms = 5;
        config.save().expect("save");

        let loaded = Config::load_from(temp.path()).expect("reload");
        assert_eq!(loaded.api_key.as_deref(), Some("abc"));
        assert_eq!(loaded.reveal_interval_ms, 5);
    }

    #[test]
    fn blank_key_in_file_is_ignored() {
        let config = Config {
            api_key: Some("  ".to_string()),
            ..Config::default()
        };
        // Only the file value is checked here; the env var may or may not be set.
        assert_ne!(config.api_key().as_deref(), Some("  "));
    }
}
