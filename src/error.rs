//! Error types for every layer of the service.

use std::path::PathBuf;

use uuid::Uuid;

use crate::db::RecordKind;

/// Configuration resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("failed to read settings file {path:?}: {reason}")]
    SettingsFile { path: PathBuf, reason: String },
}

/// Failures from the record store collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: RecordKind, id: Uuid },

    #[error("{kind} '{id}' matched {count} records")]
    Ambiguous {
        kind: RecordKind,
        id: Uuid,
        count: usize,
    },

    #[error("unknown column '{column}' for {kind}")]
    UnknownColumn { kind: RecordKind, column: String },

    #[error("remote table API returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("migration failed: {0}")]
    Migration(String),
}

#[cfg(feature = "libsql")]
impl From<libsql::Error> for DatabaseError {
    fn from(err: libsql::Error) -> Self {
        Self::Query(err.to_string())
    }
}

impl From<reqwest::Error> for DatabaseError {
    fn from(err: reqwest::Error) -> Self {
        Self::Query(err.to_string())
    }
}

/// Failures from the file store collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("object '{bucket}/{path}' not found")]
    NotFound { bucket: String, path: String },

    #[error("object '{bucket}/{path}' already exists")]
    AlreadyExists { bucket: String, path: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote storage returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage not configured: {0}")]
    NotConfigured(String),
}

/// Errors raised by a single user action against a matter.
///
/// Every variant is scoped to the action that produced it; none of them leave
/// the process in an unusable state.
#[derive(Debug, thiserror::Error)]
pub enum MatterError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A later step of a multi-step action failed after an earlier step was
    /// already persisted. The earlier step is not rolled back.
    #[error("{applied} succeeded but {failed_step} failed: {source}")]
    Consistency {
        applied: String,
        failed_step: String,
        #[source]
        source: DatabaseError,
    },
}

impl MatterError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Gateway startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },
}
