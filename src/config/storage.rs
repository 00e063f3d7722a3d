use std::path::{Component, PathBuf};

use secrecy::SecretString;
use url::Url;

use crate::config::helpers::{optional_env, parse_base_url, parse_string_env};
use crate::error::ConfigError;
use crate::settings::{Settings, matterdesk_home};

/// Where uploaded matter documents live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Rest,
}

impl StorageBackend {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "local" | "fs" => Ok(Self::Local),
            "rest" | "remote" => Ok(Self::Rest),
            other => Err(ConfigError::InvalidValue {
                key: "STORAGE_BACKEND".to_string(),
                message: format!("unsupported backend '{other}'"),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Rest => "rest",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_root: PathBuf,
    pub bucket: String,
    pub rest_url: Option<Url>,
    pub rest_api_key: Option<SecretString>,
}

fn validate_local_root(raw: &str) -> Result<PathBuf, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "STORAGE_LOCAL_ROOT".to_string(),
            message: "storage root must not be empty".to_string(),
        });
    }

    let raw_path = PathBuf::from(trimmed);
    let mut normalized = PathBuf::new();
    for component in raw_path.components() {
        match component {
            Component::ParentDir => {
                return Err(ConfigError::InvalidValue {
                    key: "STORAGE_LOCAL_ROOT".to_string(),
                    message: "storage root must not contain '..' components".to_string(),
                });
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "STORAGE_LOCAL_ROOT".to_string(),
            message: "storage root must not be empty".to_string(),
        });
    }
    Ok(normalized)
}

fn validate_bucket(raw: &str) -> Result<String, ConfigError> {
    let bucket = raw.trim();
    let valid = !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ConfigError::InvalidValue {
            key: "STORAGE_BUCKET".to_string(),
            message: format!("'{bucket}' is not a valid bucket name"),
        });
    }
    Ok(bucket.to_string())
}

impl StorageConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let backend = StorageBackend::from_str(&parse_string_env(
            "STORAGE_BACKEND",
            settings.storage.backend.clone(),
        )?)?;

        let local_root = match optional_env("STORAGE_LOCAL_ROOT")?
            .or_else(|| settings.storage.local_root.clone())
        {
            Some(raw) => validate_local_root(&raw)?,
            None => matterdesk_home().join("files"),
        };

        let rest_url = optional_env("STORAGE_REST_URL")?
            .or_else(|| settings.storage.rest_url.clone())
            .map(|raw| parse_base_url("STORAGE_REST_URL", &raw))
            .transpose()?;
        let rest_api_key = optional_env("STORAGE_REST_API_KEY")?.map(SecretString::from);

        if backend == StorageBackend::Rest {
            if rest_url.is_none() {
                return Err(ConfigError::MissingRequired {
                    key: "STORAGE_REST_URL".to_string(),
                });
            }
            if rest_api_key.is_none() {
                return Err(ConfigError::MissingRequired {
                    key: "STORAGE_REST_API_KEY".to_string(),
                });
            }
        }

        Ok(Self {
            backend,
            local_root,
            bucket: validate_bucket(&parse_string_env(
                "STORAGE_BUCKET",
                settings.storage.bucket.clone(),
            )?)?,
            rest_url,
            rest_api_key,
        })
    }
}
