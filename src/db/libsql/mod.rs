//! libSQL/Turso backend for the record store.
//!
//! Column names only ever come from the per-kind whitelist in
//! [`RecordKind::columns`]; every value is bound as a positional parameter.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::params::Params;
use uuid::Uuid;

use crate::db::libsql_migrations::SCHEMA;
use crate::db::{
    ColumnType, Condition, Direction, Fields, Filter, Order, Record, RecordKind, RecordStore,
    apply_create_defaults, fmt_ts,
};
use crate::error::DatabaseError;

/// Embedded libSQL database. Each call opens a fresh connection.
pub struct LibSqlBackend {
    db: libsql::Database,
}

impl LibSqlBackend {
    /// Open (or create) a database file at `path`.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        Ok(Self { db })
    }

    pub async fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db
            .connect()
            .map_err(|e| DatabaseError::Pool(e.to_string()))
    }

    async fn query_records(
        &self,
        kind: RecordKind,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<Vec<Record>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn.query(sql, Params::Positional(params)).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_record(kind, &row)?);
        }
        Ok(out)
    }
}

fn select_list(kind: RecordKind) -> String {
    kind.columns()
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convert a JSON field value into a bindable libSQL value for `column`.
fn to_sql_value(
    kind: RecordKind,
    column: &str,
    value: &serde_json::Value,
) -> Result<libsql::Value, DatabaseError> {
    let Some(col) = kind.column(column) else {
        return Err(DatabaseError::UnknownColumn {
            kind,
            column: column.to_string(),
        });
    };
    let converted = match (value, col.ty) {
        (serde_json::Value::Null, _) => libsql::Value::Null,
        (serde_json::Value::Number(n), ColumnType::Integer) => {
            libsql::Value::Integer(n.as_i64().ok_or_else(|| {
                DatabaseError::Serialization(format!("{column}: {n} is not an integer"))
            })?)
        }
        (serde_json::Value::String(s), ColumnType::Text) => libsql::Value::Text(s.clone()),
        (serde_json::Value::Bool(b), ColumnType::Integer) => libsql::Value::Integer(i64::from(*b)),
        (other, ColumnType::Text) => libsql::Value::Text(other.to_string()),
        (other, ColumnType::Integer) => {
            return Err(DatabaseError::Serialization(format!(
                "{column}: expected integer, got {other}"
            )));
        }
    };
    Ok(converted)
}

fn from_sql_value(value: libsql::Value) -> Result<serde_json::Value, DatabaseError> {
    Ok(match value {
        libsql::Value::Null => serde_json::Value::Null,
        libsql::Value::Integer(i) => serde_json::Value::from(i),
        libsql::Value::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        libsql::Value::Text(s) => serde_json::Value::String(s),
        libsql::Value::Blob(_) => {
            return Err(DatabaseError::Serialization(
                "unexpected blob column".to_string(),
            ));
        }
    })
}

fn row_to_record(kind: RecordKind, row: &libsql::Row) -> Result<Record, DatabaseError> {
    let mut record = Record::new();
    for (idx, col) in kind.columns().iter().enumerate() {
        let raw = row.get_value(idx as i32)?;
        record.insert(col.name.to_string(), from_sql_value(raw)?);
    }
    Ok(record)
}

/// Render a filter into a `WHERE` clause, pushing bound values onto `params`.
fn where_clause(
    kind: RecordKind,
    filter: &Filter,
    params: &mut Vec<libsql::Value>,
) -> Result<String, DatabaseError> {
    filter.check(kind)?;
    if filter.conditions.is_empty() {
        return Ok(String::new());
    }

    let mut parts = Vec::with_capacity(filter.conditions.len());
    for condition in &filter.conditions {
        match condition {
            Condition::Eq { column, value } if value.is_null() => {
                parts.push(format!("{column} IS NULL"));
            }
            Condition::Eq { column, value } => {
                params.push(to_sql_value(kind, column, value)?);
                parts.push(format!("{column} = ?{}", params.len()));
            }
            Condition::In { values, .. } if values.is_empty() => {
                parts.push("0 = 1".to_string());
            }
            Condition::In { column, values } => {
                let mut slots = Vec::with_capacity(values.len());
                for value in values {
                    params.push(to_sql_value(kind, column, value)?);
                    slots.push(format!("?{}", params.len()));
                }
                parts.push(format!("{column} IN ({})", slots.join(", ")));
            }
        }
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

fn order_clause(kind: RecordKind, order: Option<&Order>) -> Result<String, DatabaseError> {
    let Some(order) = order else {
        return Ok(String::new());
    };
    kind.check_column(&order.column)?;
    let dir = match order.direction {
        Direction::Ascending => "ASC",
        Direction::Descending => "DESC",
    };
    Ok(format!(" ORDER BY {} {}", order.column, dir))
}

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn create(&self, kind: RecordKind, mut fields: Fields) -> Result<Record, DatabaseError> {
        kind.check_fields(&fields)?;
        apply_create_defaults(kind, &mut fields, Utc::now());

        let id = fields
            .get("id")
            .and_then(|v| v.as_str())
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| DatabaseError::Serialization(format!("invalid id: {e}")))?
            .ok_or_else(|| DatabaseError::Serialization("id must be a string".to_string()))?;

        let mut columns = Vec::with_capacity(fields.len());
        let mut slots = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len());
        for (column, value) in &fields {
            params.push(to_sql_value(kind, column, value)?);
            columns.push(column.as_str());
            slots.push(format!("?{}", params.len()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            kind.table(),
            columns.join(", "),
            slots.join(", ")
        );
        tracing::debug!(%kind, %id, "inserting record");
        let conn = self.connect().await?;
        conn.execute(&sql, Params::Positional(params)).await?;

        self.read_one(kind, id).await
    }

    async fn read(
        &self,
        kind: RecordKind,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Record>, DatabaseError> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT {} FROM {}{}{}",
            select_list(kind),
            kind.table(),
            where_clause(kind, filter, &mut params)?,
            order_clause(kind, order)?
        );
        tracing::debug!(%kind, conditions = filter.conditions.len(), "reading records");
        self.query_records(kind, &sql, params).await
    }

    async fn read_one(&self, kind: RecordKind, id: Uuid) -> Result<Record, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            select_list(kind),
            kind.table()
        );
        let mut found = self
            .query_records(kind, &sql, vec![libsql::Value::Text(id.to_string())])
            .await?;
        match found.len() {
            0 => Err(DatabaseError::NotFound { kind, id }),
            1 => Ok(found.remove(0)),
            count => Err(DatabaseError::Ambiguous { kind, id, count }),
        }
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: Uuid,
        mut fields: Fields,
    ) -> Result<Record, DatabaseError> {
        kind.check_fields(&fields)?;
        if fields.contains_key("id") {
            return Err(DatabaseError::Query(format!(
                "{kind} id cannot be changed"
            )));
        }
        if kind.tracks_updates() {
            fields.insert(
                "updated_at".to_string(),
                serde_json::Value::String(fmt_ts(&Utc::now())),
            );
        }
        if fields.is_empty() {
            return self.read_one(kind, id).await;
        }

        let mut params = vec![libsql::Value::Text(id.to_string())];
        let mut assignments = Vec::with_capacity(fields.len());
        for (column, value) in &fields {
            params.push(to_sql_value(kind, column, value)?);
            assignments.push(format!("{column} = ?{}", params.len()));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?1",
            kind.table(),
            assignments.join(", ")
        );
        tracing::debug!(%kind, %id, columns = fields.len(), "updating record");
        let conn = self.connect().await?;
        let changed = conn.execute(&sql, Params::Positional(params)).await?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { kind, id });
        }

        self.read_one(kind, id).await
    }

    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<(), DatabaseError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
        tracing::debug!(%kind, %id, "deleting record");
        let conn = self.connect().await?;
        let deleted = conn
            .execute(
                &sql,
                Params::Positional(vec![libsql::Value::Text(id.to_string())]),
            )
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound { kind, id });
        }
        Ok(())
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }
}
