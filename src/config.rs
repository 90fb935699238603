use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const APP_DIR: &str = "feed-archivist";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_raw_storage_path")]
    pub raw_storage_path: String,

    /// Raw files whose mtime is older than this are folded into monthly archives.
    #[serde(default = "default_archive_after_days")]
    pub archive_after_days: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_url")]
    pub url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Program launched when nothing answers on `url`.
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_program_args")]
    pub args: Vec<String>,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_startup_grace")]
    pub startup_grace_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir()
        .join("rss_storage.sqlite")
        .to_string_lossy()
        .to_string()
}

fn default_raw_storage_path() -> String {
    data_dir().join("rss_raw_data").to_string_lossy().to_string()
}

fn default_archive_after_days() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("{}/{}", APP_DIR, env!("CARGO_PKG_VERSION"))
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_inference_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_program() -> String {
    "ollama".to_string()
}

fn default_program_args() -> Vec<String> {
    vec!["serve".to_string()]
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_startup_grace() -> u64 {
    2000
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: default_inference_url(),
            model: default_model(),
            program: default_program(),
            args: default_program_args(),
            probe_timeout_ms: default_probe_timeout(),
            startup_grace_ms: default_startup_grace(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            raw_storage_path: default_raw_storage_path(),
            archive_after_days: default_archive_after_days(),
            user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout(),
            inference: InferenceConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }
}
