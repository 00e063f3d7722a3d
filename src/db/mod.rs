//! Record store abstraction layer.
//!
//! Provides a backend-agnostic `RecordStore` trait with generic
//! create/read/update/delete over the four record kinds. Two implementations
//! exist:
//!
//! - `libsql` (default): embedded libSQL database file
//! - `rest`: PostgREST-compatible remote table API over HTTP
//!
//! Typed access (`MatterStore`, `MatterTaskStore`, ...) lives in `records` and is
//! blanket-implemented for every `RecordStore`, so `Arc<dyn RecordStore>`
//! consumers get both surfaces from one handle.

#[cfg(feature = "libsql")]
pub mod libsql;

#[cfg(feature = "libsql")]
pub mod libsql_migrations;

pub mod records;
pub mod rest;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::DatabaseError;

pub use records::{
    DocumentRecord, MatterDocumentStore, MatterRecord, MatterStatus, MatterStore,
    MatterTaskStore, NewDocumentRecord, NewMatterRecord, NewProfileRecord, NewTaskRecord,
    OfficerRole, ProfileRecord, ProfileStore, TaskRecord, TaskStatus, UpdateMatterParams,
    UpdateTaskParams,
};

/// Column values keyed by column name, as sent to the store.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A persisted row, as returned by the store.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Create a record store backend from configuration, run migrations, and return it.
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn RecordStore>, DatabaseError> {
    match config.backend {
        #[cfg(feature = "libsql")]
        DatabaseBackend::LibSql => {
            let backend = libsql::LibSqlBackend::new_local(&config.libsql_path)
                .await
                .map_err(|e| DatabaseError::Pool(e.to_string()))?;
            backend.run_migrations().await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "libsql"))]
        DatabaseBackend::LibSql => Err(DatabaseError::Pool(
            "libSQL backend unavailable. Enable the 'libsql' feature.".to_string(),
        )),
        DatabaseBackend::Rest => {
            let url = config.rest_url.as_ref().ok_or_else(|| {
                DatabaseError::Pool("DATABASE_REST_URL required for the rest backend".to_string())
            })?;
            let key = config.rest_api_key.clone().ok_or_else(|| {
                DatabaseError::Pool(
                    "DATABASE_REST_API_KEY required for the rest backend".to_string(),
                )
            })?;
            let backend = rest::RestBackend::new(url.clone(), key)?;
            backend.run_migrations().await?;
            Ok(Arc::new(backend))
        }
    }
}

/// The four record kinds the service persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Matter,
    Task,
    Document,
    Profile,
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Text,
    }
}

const fn integer(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Integer,
    }
}

const MATTER_COLUMNS: &[Column] = &[
    text("id"),
    text("type_of_matter"),
    text("request_form"),
    text("requester_name"),
    text("requester_position"),
    text("requesting_division"),
    text("date_requested"),
    text("date_received"),
    text("request_type"),
    text("land_description"),
    text("zoning"),
    text("survey_plan_no"),
    text("lease_type"),
    text("lease_commencement"),
    text("lease_expiry"),
    text("legal_issues"),
    text("organisation_responsible"),
    text("assigned_officer"),
    text("assigned_date"),
    text("status"),
    text("due_date"),
    text("created_by"),
    text("created_at"),
    text("updated_at"),
];

const TASK_COLUMNS: &[Column] = &[
    text("id"),
    text("matter_id"),
    text("task_type"),
    text("description"),
    text("assigned_officer"),
    text("due_date"),
    text("status"),
    text("created_at"),
    text("completed_at"),
    text("updated_at"),
];

const DOCUMENT_COLUMNS: &[Column] = &[
    text("id"),
    text("matter_id"),
    text("title"),
    text("doc_type"),
    text("storage_path"),
    integer("file_size"),
    text("mime_type"),
    text("uploaded_by"),
    text("uploaded_at"),
];

const PROFILE_COLUMNS: &[Column] = &[
    text("id"),
    text("email"),
    text("full_name"),
    text("role"),
    text("division"),
    text("created_at"),
    text("updated_at"),
];

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [Self::Matter, Self::Task, Self::Document, Self::Profile];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matter => "matter",
            Self::Task => "task",
            Self::Document => "document",
            Self::Profile => "profile",
        }
    }

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Matter => "corporate_matters",
            Self::Task => "corporate_matter_tasks",
            Self::Document => "corporate_matter_documents",
            Self::Profile => "profiles",
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            Self::Matter => MATTER_COLUMNS,
            Self::Task => TASK_COLUMNS,
            Self::Document => DOCUMENT_COLUMNS,
            Self::Profile => PROFILE_COLUMNS,
        }
    }

    pub fn column(self, name: &str) -> Option<Column> {
        self.columns().iter().copied().find(|c| c.name == name)
    }

    /// Column stamped with the insertion instant when the caller leaves it empty.
    pub fn created_column(self) -> &'static str {
        match self {
            Self::Document => "uploaded_at",
            _ => "created_at",
        }
    }

    /// Whether updates bump an `updated_at` column.
    pub fn tracks_updates(self) -> bool {
        !matches!(self, Self::Document)
    }

    /// Reject any field name that is not a column of this kind.
    pub fn check_fields(self, fields: &Fields) -> Result<(), DatabaseError> {
        for key in fields.keys() {
            self.check_column(key)?;
        }
        Ok(())
    }

    pub fn check_column(self, name: &str) -> Result<(), DatabaseError> {
        if self.column(name).is_none() {
            return Err(DatabaseError::UnknownColumn {
                kind: self,
                column: name.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One predicate of a read filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq {
        column: String,
        value: serde_json::Value,
    },
    In {
        column: String,
        values: Vec<serde_json::Value>,
    },
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. } | Self::In { column, .. } => column,
        }
    }
}

/// Conjunction of column predicates. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<serde_json::Value>) -> Self {
        self.conditions.push(Condition::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn is_in<V: Into<serde_json::Value>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn check(&self, kind: RecordKind) -> Result<(), DatabaseError> {
        for condition in &self.conditions {
            kind.check_column(condition.column())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Single-column sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Descending,
        }
    }
}

/// Format an instant the way every backend stores timestamps.
pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fill in `id` and the creation timestamp columns when the caller left them out.
pub fn apply_create_defaults(kind: RecordKind, fields: &mut Fields, now: DateTime<Utc>) {
    fields
        .entry("id")
        .or_insert_with(|| serde_json::Value::String(Uuid::new_v4().to_string()));
    let stamp = serde_json::Value::String(fmt_ts(&now));
    fields
        .entry(kind.created_column())
        .or_insert_with(|| stamp.clone());
    if kind.tracks_updates() {
        fields.entry("updated_at").or_insert(stamp);
    }
}

/// Generic record store collaborator.
///
/// Every call is an independent round trip; there are no multi-call
/// transactions and concurrent writers overwrite each other.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, kind: RecordKind, fields: Fields) -> Result<Record, DatabaseError>;

    async fn read(
        &self,
        kind: RecordKind,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Record>, DatabaseError>;

    /// Fetch exactly one record by id. Zero or multiple matches are errors.
    async fn read_one(&self, kind: RecordKind, id: Uuid) -> Result<Record, DatabaseError>;

    async fn update(
        &self,
        kind: RecordKind,
        id: Uuid,
        fields: Fields,
    ) -> Result<Record, DatabaseError>;

    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<(), DatabaseError>;

    /// Prepare the backing schema, if the backend owns it.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}
