use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the Gemini API
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    pub api_key_env: Option<String>,

    /// Base URL of the generative language API
    pub base_url: String,

    /// Model used for `generateContent`
    pub model: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Directory holding the bundled font files
    pub assets_dir: PathBuf,

    /// gemchat home directory
    #[serde(skip)]
    pub gemchat_home: PathBuf,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub developer: String,
    pub fade_in_ms: u64,
    pub tick_rate_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Gemini Chat".to_string(),
            developer: "gemchat contributors".to_string(),
            fade_in_ms: 1000,
            tick_rate_ms: 100,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let gemchat_home = default_home();

        Config {
            api_key: None,
            api_key_env: Some(DEFAULT_API_KEY_ENV.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 60,
            assets_dir: gemchat_home.join("assets").join("fonts"),
            gemchat_home,
            ui: UiConfig::default(),
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gemchat")
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        default_home().join("config.toml")
    }

    /// Load configuration from `path`, or from the default location.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.gemchat_home = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(default_home);

        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Get API key from config or environment
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|key| !key.trim().is_empty())
            })
    }

    /// Check if API key is configured
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }

    /// API key with everything but the last four characters hidden
    pub fn masked_api_key(&self) -> String {
        match self.get_api_key() {
            Some(key) if key.chars().count() <= 8 => "****".to_string(),
            Some(key) => {
                let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
                format!("****{}", tail)
            }
            None => "(not set)".to_string(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.ui.fade_in_ms)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.ui.tick_rate_ms.max(10))
    }

    pub fn log_path(&self) -> PathBuf {
        self.gemchat_home.join("gemchat.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.gemchat_home, dir.path());
        assert_eq!(config.ui.fade_in_ms, 1000);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = \"gemini-1.5-pro\"\n[ui]\ntitle = \"Chat\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.ui.title, "Chat");
        assert_eq!(config.ui.tick_rate_ms, 100);
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api_key = Some("abc123".to_string());
        config.request_timeout_secs = 5;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("abc123"));
        assert_eq!(loaded.request_timeout_secs, 5);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = [").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn api_key_prefers_config_value_and_masks() {
        let mut config = Config::default();
        config.api_key_env = None;
        assert!(!config.has_api_key());
        assert_eq!(config.masked_api_key(), "(not set)");

        config.api_key = Some("secret-key-9876".to_string());
        assert_eq!(config.get_api_key().as_deref(), Some("secret-key-9876"));
        assert_eq!(config.masked_api_key(), "****9876");

        config.api_key = Some("abcd".to_string());
        assert_eq!(config.masked_api_key(), "****");
        config.api_key = Some("short-12".to_string());
        assert_eq!(config.masked_api_key(), "****");

        config.api_key = Some("   ".to_string());
        assert!(!config.has_api_key());
    }
}
