//! PostgREST-compatible remote table backend.
//!
//! Tables are reached at `{base}/rest/v1/{table}`. Filters are encoded as
//! `column=eq.value` / `column=in.("a","b")` query pairs and ordering as
//! `order=column.asc`. Writes ask for `Prefer: return=representation` so the
//! persisted row comes back in the same round trip.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use url::Url;
use uuid::Uuid;

use crate::db::{
    Condition, Direction, Fields, Filter, Order, Record, RecordKind, RecordStore,
    apply_create_defaults, fmt_ts,
};
use crate::error::DatabaseError;

pub struct RestBackend {
    client: reqwest::Client,
    base: Url,
    api_key: SecretString,
}

impl RestBackend {
    pub fn new(base: Url, api_key: SecretString) -> Result<Self, DatabaseError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        Ok(Self {
            client,
            base,
            api_key,
        })
    }

    fn table_url(&self, kind: RecordKind) -> Result<Url, DatabaseError> {
        self.base
            .join(&format!("rest/v1/{}", kind.table()))
            .map_err(|e| DatabaseError::Pool(format!("invalid table URL: {e}")))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret())
    }

    async fn rows(&self, resp: reqwest::Response) -> Result<Vec<Record>, DatabaseError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DatabaseError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<Vec<Record>>()
            .await
            .map_err(|e| DatabaseError::Serialization(e.to_string()))
    }

    async fn fetch(
        &self,
        kind: RecordKind,
        pairs: Vec<(String, String)>,
    ) -> Result<Vec<Record>, DatabaseError> {
        let url = self.table_url(kind)?;
        let resp = self
            .request(reqwest::Method::GET, url)
            .query(&pairs)
            .send()
            .await?;
        self.rows(resp).await
    }
}

fn id_pair(id: Uuid) -> (String, String) {
    ("id".to_string(), format!("eq.{id}"))
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quoted(value: &serde_json::Value) -> String {
    let raw = scalar(value).replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{raw}\"")
}

/// Encode a filter and order as PostgREST query pairs.
pub fn query_pairs(
    kind: RecordKind,
    filter: &Filter,
    order: Option<&Order>,
) -> Result<Vec<(String, String)>, DatabaseError> {
    filter.check(kind)?;
    let mut pairs = vec![("select".to_string(), "*".to_string())];
    for condition in &filter.conditions {
        let pair = match condition {
            Condition::Eq { column, value } if value.is_null() => {
                (column.clone(), "is.null".to_string())
            }
            Condition::Eq { column, value } => (column.clone(), format!("eq.{}", scalar(value))),
            Condition::In { column, values } => {
                let list = values.iter().map(quoted).collect::<Vec<_>>().join(",");
                (column.clone(), format!("in.({list})"))
            }
        };
        pairs.push(pair);
    }
    if let Some(order) = order {
        kind.check_column(&order.column)?;
        let dir = match order.direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        pairs.push(("order".to_string(), format!("{}.{}", order.column, dir)));
    }
    Ok(pairs)
}

fn single(kind: RecordKind, id: Uuid, mut rows: Vec<Record>) -> Result<Record, DatabaseError> {
    match rows.len() {
        0 => Err(DatabaseError::NotFound { kind, id }),
        1 => Ok(rows.remove(0)),
        count => Err(DatabaseError::Ambiguous { kind, id, count }),
    }
}

#[async_trait]
impl RecordStore for RestBackend {
    async fn create(&self, kind: RecordKind, mut fields: Fields) -> Result<Record, DatabaseError> {
        kind.check_fields(&fields)?;
        apply_create_defaults(kind, &mut fields, Utc::now());
        let id = fields
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| DatabaseError::Serialization("id must be a UUID string".to_string()))?;

        tracing::debug!(%kind, %id, "inserting remote record");
        let resp = self
            .request(reqwest::Method::POST, self.table_url(kind)?)
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await?;
        single(kind, id, self.rows(resp).await?)
    }

    async fn read(
        &self,
        kind: RecordKind,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Record>, DatabaseError> {
        tracing::debug!(%kind, conditions = filter.conditions.len(), "reading remote records");
        self.fetch(kind, query_pairs(kind, filter, order)?).await
    }

    async fn read_one(&self, kind: RecordKind, id: Uuid) -> Result<Record, DatabaseError> {
        let rows = self
            .fetch(kind, vec![("select".to_string(), "*".to_string()), id_pair(id)])
            .await?;
        single(kind, id, rows)
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: Uuid,
        mut fields: Fields,
    ) -> Result<Record, DatabaseError> {
        kind.check_fields(&fields)?;
        if fields.contains_key("id") {
            return Err(DatabaseError::Query(format!("{kind} id cannot be changed")));
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

        tracing::debug!(%kind, %id, columns = fields.len(), "updating remote record");
        let resp = self
            .request(reqwest::Method::PATCH, self.table_url(kind)?)
            .query(&[id_pair(id)])
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await?;
        single(kind, id, self.rows(resp).await?)
    }

    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<(), DatabaseError> {
        tracing::debug!(%kind, %id, "deleting remote record");
        let resp = self
            .request(reqwest::Method::DELETE, self.table_url(kind)?)
            .query(&[id_pair(id)])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        if self.rows(resp).await?.is_empty() {
            return Err(DatabaseError::NotFound { kind, id });
        }
        Ok(())
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        tracing::info!(base = %self.base, "remote table API owns its schema; skipping migrations");
        Ok(())
    }
}
