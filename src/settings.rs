//! On-disk settings file (`~/.matterdesk/settings.toml`).
//!
//! Every field has a default so a missing or partial file is valid. Secrets
//! are never read from this file; they come from the environment only.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const SETTINGS_ENV: &str = "MATTERDESK_SETTINGS";

/// Base directory for local state.
pub fn matterdesk_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".matterdesk")
}

pub fn default_settings_path() -> PathBuf {
    matterdesk_home().join("settings.toml")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub gateway: GatewaySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: String,
    pub libsql_path: Option<PathBuf>,
    pub rest_url: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: "libsql".to_string(),
            libsql_path: None,
            rest_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: String,
    pub local_root: Option<String>,
    pub bucket: String,
    pub rest_url: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            local_root: None,
            bucket: "corporate-matters".to_string(),
            rest_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: String,
    /// Colorize pretty output.
    pub ansi: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
            ansi: true,
        }
    }
}

impl Settings {
    /// Load from `MATTERDESK_SETTINGS` or the default path. A missing file
    /// yields defaults; an unreadable or malformed one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(SETTINGS_ENV) {
            Some(raw) if !raw.is_empty() => PathBuf::from(raw),
            _ => default_settings_path(),
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file; using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SettingsFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::SettingsFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
