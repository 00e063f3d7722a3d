//! Shared fixtures for unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::db::{Fields, Filter, Order, Record, RecordKind, RecordStore};
use crate::error::DatabaseError;
use crate::matters::intake::MatterIntake;

/// Temp-file libSQL store with migrations applied. Keep the `TempDir` alive
/// for the duration of the test.
#[cfg(feature = "libsql")]
pub async fn test_db() -> (Arc<dyn RecordStore>, tempfile::TempDir) {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let path = tmpdir.path().join("matterdesk_test.db");
    let backend = crate::db::libsql::LibSqlBackend::new_local(&path)
        .await
        .expect("local backend should initialize");
    backend
        .run_migrations()
        .await
        .expect("migrations should succeed");
    (Arc::new(backend), tmpdir)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn sample_intake() -> MatterIntake {
    MatterIntake {
        type_of_matter: "Legal Advice".to_string(),
        request_form: "Email".to_string(),
        requester_name: "Mele Tupou".to_string(),
        requesting_division: Some("Lands".to_string()),
        date_requested: Some(date(2023, 12, 28)),
        date_received: Some(date(2024, 1, 1)),
        request_type: "Legal Opinion".to_string(),
        ..MatterIntake::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOp {
    Create,
    Read,
    Update,
}

/// Record store wrapper that fails selected operations on selected kinds.
pub struct FailingStore {
    inner: Arc<dyn RecordStore>,
    failures: Mutex<HashSet<(FailOp, RecordKind)>>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            failures: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_on(&self, op: FailOp, kind: RecordKind) {
        self.failures
            .lock()
            .expect("failure set lock")
            .insert((op, kind));
    }

    fn check(&self, op: FailOp, kind: RecordKind) -> Result<(), DatabaseError> {
        let failing = self
            .failures
            .lock()
            .expect("failure set lock")
            .contains(&(op, kind));
        if failing {
            return Err(DatabaseError::Query(format!(
                "injected {op:?} failure for {kind}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn create(&self, kind: RecordKind, fields: Fields) -> Result<Record, DatabaseError> {
        self.check(FailOp::Create, kind)?;
        self.inner.create(kind, fields).await
    }

    async fn read(
        &self,
        kind: RecordKind,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Record>, DatabaseError> {
        self.check(FailOp::Read, kind)?;
        self.inner.read(kind, filter, order).await
    }

    async fn read_one(&self, kind: RecordKind, id: Uuid) -> Result<Record, DatabaseError> {
        self.inner.read_one(kind, id).await
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: Uuid,
        fields: Fields,
    ) -> Result<Record, DatabaseError> {
        self.check(FailOp::Update, kind)?;
        self.inner.update(kind, id, fields).await
    }

    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<(), DatabaseError> {
        self.inner.delete(kind, id).await
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.inner.run_migrations().await
    }
}
