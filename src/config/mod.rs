//! Resolved runtime configuration.
//!
//! Resolution order, lowest to highest precedence: built-in defaults, the
//! settings file, then environment variables (after `.env` is loaded).

pub(crate) mod helpers;
mod storage;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use url::Url;

use crate::config::helpers::{
    optional_env, parse_base_url, parse_bool_env, parse_string_env, parse_u16_env,
};
use crate::error::ConfigError;
use crate::settings::{Settings, matterdesk_home};

pub use storage::{StorageBackend, StorageConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    LibSql,
    Rest,
}

impl DatabaseBackend {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "libsql" | "sqlite" => Ok(Self::LibSql),
            "rest" | "postgrest" => Ok(Self::Rest),
            other => Err(ConfigError::InvalidValue {
                key: "DATABASE_BACKEND".to_string(),
                message: format!("unsupported backend '{other}'"),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LibSql => "libsql",
            Self::Rest => "rest",
        }
    }
}

pub fn default_libsql_path() -> PathBuf {
    matterdesk_home().join("matterdesk.db")
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub libsql_path: PathBuf,
    pub rest_url: Option<Url>,
    pub rest_api_key: Option<SecretString>,
}

impl DatabaseConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let backend = DatabaseBackend::from_str(&parse_string_env(
            "DATABASE_BACKEND",
            settings.database.backend.clone(),
        )?)?;

        let libsql_path = optional_env("LIBSQL_PATH")?
            .map(PathBuf::from)
            .or_else(|| settings.database.libsql_path.clone())
            .unwrap_or_else(default_libsql_path);

        let rest_url = optional_env("DATABASE_REST_URL")?
            .or_else(|| settings.database.rest_url.clone())
            .map(|raw| parse_base_url("DATABASE_REST_URL", &raw))
            .transpose()?;
        let rest_api_key = optional_env("DATABASE_REST_API_KEY")?.map(SecretString::from);

        if backend == DatabaseBackend::Rest {
            if rest_url.is_none() {
                return Err(ConfigError::MissingRequired {
                    key: "DATABASE_REST_URL".to_string(),
                });
            }
            if rest_api_key.is_none() {
                return Err(ConfigError::MissingRequired {
                    key: "DATABASE_REST_API_KEY".to_string(),
                });
            }
        }

        Ok(Self {
            backend,
            libsql_path,
            rest_url,
            rest_api_key,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token for `/api/*`. Generated at startup when unset.
    pub auth_token: Option<SecretString>,
}

impl GatewayConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            host: parse_string_env("GATEWAY_HOST", settings.gateway.host.clone())?,
            port: parse_u16_env("GATEWAY_PORT", settings.gateway.port)?,
            auth_token: optional_env("GATEWAY_AUTH_TOKEN")?.map(SecretString::from),
        })
    }

    /// Listen address; `localhost` maps to the IPv4 loopback.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host = if self.host.eq_ignore_ascii_case("localhost") {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        let ip: IpAddr = host.parse().map_err(|e| ConfigError::InvalidValue {
            key: "GATEWAY_HOST".to_string(),
            message: format!("'{}' is not an IP address: {e}", self.host),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub ansi: bool,
}

impl LoggingConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let raw = parse_string_env("MATTERDESK_LOG_FORMAT", settings.logging.format.clone())?;
        let format = match raw.to_ascii_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "MATTERDESK_LOG_FORMAT".to_string(),
                    message: format!("expected 'pretty' or 'json', got '{other}'"),
                });
            }
        };
        let ansi = parse_bool_env("MATTERDESK_LOG_ANSI", settings.logging.ansi)?;
        Ok(Self { format, ansi })
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load `.env`, the settings file, and environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let settings = Settings::load()?;
        Self::resolve(&settings)
    }

    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::resolve(settings)?,
            storage: StorageConfig::resolve(settings)?,
            gateway: GatewayConfig::resolve(settings)?,
            logging: LoggingConfig::resolve(settings)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_uses_local_defaults() {
        let config = Config::resolve(&Settings::default()).expect("config");
        assert_eq!(config.database.backend, DatabaseBackend::LibSql);
        assert!(config.database.libsql_path.ends_with("matterdesk.db"));
        assert_eq!(config.gateway.port, 8787);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.logging.ansi);
    }

    #[test]
    fn logging_color_follows_settings_file() {
        let mut settings = Settings::default();
        settings.logging.ansi = false;
        let logging = LoggingConfig::resolve(&settings).expect("logging");
        assert!(!logging.ansi);
    }

    #[test]
    fn rest_database_requires_url() {
        let mut settings = Settings::default();
        settings.database.backend = "rest".to_string();
        let err = DatabaseConfig::resolve(&settings).expect_err("missing url");
        assert!(
            matches!(err, ConfigError::MissingRequired { ref key } if key == "DATABASE_REST_URL")
        );
    }

    #[test]
    fn unknown_backends_are_rejected() {
        let mut settings = Settings::default();
        settings.database.backend = "mongo".to_string();
        let err = DatabaseConfig::resolve(&settings).expect_err("unsupported");
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "DATABASE_BACKEND")
        );

        let mut settings = Settings::default();
        settings.logging.format = "xml".to_string();
        assert!(LoggingConfig::resolve(&settings).is_err());
    }

    #[test]
    fn gateway_socket_addr_accepts_ip_or_localhost() {
        let mut gateway = GatewayConfig {
            host: "localhost".to_string(),
            port: 9000,
            auth_token: None,
        };
        assert_eq!(
            gateway.socket_addr().expect("addr"),
            "127.0.0.1:9000".parse::<SocketAddr>().expect("literal")
        );

        gateway.host = "0.0.0.0".to_string();
        assert_eq!(gateway.socket_addr().expect("addr").port(), 9000);

        gateway.host = "matters.internal".to_string();
        assert!(gateway.socket_addr().is_err());
    }
}
