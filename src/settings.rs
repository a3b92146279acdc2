use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CapitalIqError, Result};

/// Environment override for the analysis service, applied on load.
pub const API_URL_ENV: &str = "CAPITAL_IQ_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_output_dir() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("capital-iq")
        .to_string_lossy()
        .to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            output_dir: default_output_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = url.trim().to_string();
            }
        }
        self
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("capital-iq")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Settings as saved on disk, merged over defaults. No environment override.
pub fn load_saved_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

/// Effective settings: saved values with the environment applied last.
pub fn load_settings() -> Settings {
    load_saved_settings().with_env()
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CapitalIqError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_output_dir() -> PathBuf {
    PathBuf::from(&load_settings().output_dir)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

/// Reject anything that is not an absolute http(s) URL.
pub fn validate_api_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(CapitalIqError::Settings(format!(
            "API URL must start with http:// or https://, got '{url}'"
        )));
    }
    Ok(trimmed.to_string())
}
