//! Typed records and the per-kind store traits layered over [`RecordStore`].
//!
//! Each sub-trait is blanket-implemented for every `RecordStore`, so a single
//! `Arc<dyn RecordStore>` serves both the generic and the typed surface.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Fields, Filter, Order, Record, RecordKind, RecordStore, fmt_ts};
use crate::error::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatterStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Closed,
}

impl MatterStatus {
    pub const ALL: [MatterStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Closed => "Closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

/// Profile roles that make someone assignable as an officer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficerRole {
    LegalOfficer,
    SeniorLegalOfficer,
    DeputySecretary,
    Secretary,
}

impl OfficerRole {
    pub const ALL: [OfficerRole; 4] = [
        Self::LegalOfficer,
        Self::SeniorLegalOfficer,
        Self::DeputySecretary,
        Self::Secretary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LegalOfficer => "legal_officer",
            Self::SeniorLegalOfficer => "senior_legal_officer",
            Self::DeputySecretary => "deputy_secretary",
            Self::Secretary => "secretary",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatterRecord {
    pub id: Uuid,
    pub type_of_matter: String,
    pub request_form: String,
    pub requester_name: String,
    pub requester_position: Option<String>,
    pub requesting_division: Option<String>,
    pub date_requested: NaiveDate,
    pub date_received: NaiveDate,
    pub request_type: String,
    pub land_description: Option<String>,
    pub zoning: Option<String>,
    pub survey_plan_no: Option<String>,
    pub lease_type: Option<String>,
    pub lease_commencement: Option<NaiveDate>,
    pub lease_expiry: Option<NaiveDate>,
    pub legal_issues: Option<String>,
    pub organisation_responsible: Option<String>,
    pub assigned_officer: Option<Uuid>,
    pub assigned_date: Option<NaiveDate>,
    pub status: MatterStatus,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMatterRecord {
    pub type_of_matter: String,
    pub request_form: String,
    pub requester_name: String,
    pub requester_position: Option<String>,
    pub requesting_division: Option<String>,
    pub date_requested: NaiveDate,
    pub date_received: NaiveDate,
    pub request_type: String,
    pub land_description: Option<String>,
    pub zoning: Option<String>,
    pub survey_plan_no: Option<String>,
    pub lease_type: Option<String>,
    pub lease_commencement: Option<NaiveDate>,
    pub lease_expiry: Option<NaiveDate>,
    pub legal_issues: Option<String>,
    pub organisation_responsible: Option<String>,
    pub assigned_officer: Option<Uuid>,
    pub assigned_date: Option<NaiveDate>,
    pub status: MatterStatus,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
}

/// Partial matter edit. `None` leaves a column untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateMatterParams {
    pub status: Option<MatterStatus>,
    pub assigned_officer: Option<Option<Uuid>>,
    pub assigned_date: Option<Option<NaiveDate>>,
    pub requester_position: Option<Option<String>>,
    pub requesting_division: Option<Option<String>>,
    pub legal_issues: Option<Option<String>>,
    pub organisation_responsible: Option<Option<String>>,
}

impl UpdateMatterParams {
    pub fn status(status: MatterStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(status) = self.status {
            fields.insert("status".to_string(), status.as_str().into());
        }
        put_opt(&mut fields, "assigned_officer", &self.assigned_officer);
        put_opt(&mut fields, "assigned_date", &self.assigned_date);
        put_opt(&mut fields, "requester_position", &self.requester_position);
        put_opt(&mut fields, "requesting_division", &self.requesting_division);
        put_opt(&mut fields, "legal_issues", &self.legal_issues);
        put_opt(
            &mut fields,
            "organisation_responsible",
            &self.organisation_responsible,
        );
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub matter_id: Uuid,
    pub task_type: Option<String>,
    pub description: String,
    pub assigned_officer: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTaskRecord {
    pub matter_id: Uuid,
    pub task_type: Option<String>,
    pub description: String,
    pub assigned_officer: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTaskParams {
    pub status: Option<TaskStatus>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub description: Option<String>,
    pub assigned_officer: Option<Option<Uuid>>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl UpdateTaskParams {
    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(status) = self.status {
            fields.insert("status".to_string(), status.as_str().into());
        }
        if let Some(completed_at) = &self.completed_at {
            fields.insert(
                "completed_at".to_string(),
                completed_at
                    .as_ref()
                    .map(|ts| serde_json::Value::String(fmt_ts(ts)))
                    .unwrap_or(serde_json::Value::Null),
            );
        }
        if let Some(description) = &self.description {
            fields.insert("description".to_string(), description.clone().into());
        }
        put_opt(&mut fields, "assigned_officer", &self.assigned_officer);
        put_opt(&mut fields, "due_date", &self.due_date);
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub matter_id: Uuid,
    pub title: String,
    pub doc_type: Option<String>,
    pub storage_path: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDocumentRecord {
    pub matter_id: Uuid,
    pub title: String,
    pub doc_type: Option<String>,
    pub storage_path: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub uploaded_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub division: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn officer_role(&self) -> Option<OfficerRole> {
        self.role.as_deref().and_then(OfficerRole::from_db_value)
    }

    /// Name to show for the profile, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProfileRecord {
    pub id: Option<Uuid>,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub division: Option<String>,
}

fn put_opt<T: Serialize>(fields: &mut Fields, column: &str, value: &Option<Option<T>>) {
    if let Some(inner) = value {
        let json = serde_json::to_value(inner).unwrap_or(serde_json::Value::Null);
        fields.insert(column.to_string(), json);
    }
}

/// Serialize an insert payload into store fields, dropping absent values.
fn to_fields<T: Serialize>(input: &T) -> Result<Fields, DatabaseError> {
    match serde_json::to_value(input).map_err(|e| DatabaseError::Serialization(e.to_string()))? {
        serde_json::Value::Object(mut map) => {
            map.retain(|_, v| !v.is_null());
            Ok(map)
        }
        other => Err(DatabaseError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn from_record<T: DeserializeOwned>(kind: RecordKind, record: Record) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::Object(record))
        .map_err(|e| DatabaseError::Serialization(format!("invalid {kind} record: {e}")))
}

fn from_records<T: DeserializeOwned>(
    kind: RecordKind,
    records: Vec<Record>,
) -> Result<Vec<T>, DatabaseError> {
    records
        .into_iter()
        .map(|record| from_record(kind, record))
        .collect()
}

#[async_trait]
pub trait MatterStore: Send + Sync {
    async fn create_matter(&self, input: &NewMatterRecord) -> Result<MatterRecord, DatabaseError>;
    /// All matters, newest first.
    async fn list_matters(&self) -> Result<Vec<MatterRecord>, DatabaseError>;
    async fn list_matters_with_status(
        &self,
        status: MatterStatus,
    ) -> Result<Vec<MatterRecord>, DatabaseError>;
    async fn get_matter(&self, id: Uuid) -> Result<MatterRecord, DatabaseError>;
    async fn update_matter(
        &self,
        id: Uuid,
        input: &UpdateMatterParams,
    ) -> Result<MatterRecord, DatabaseError>;
}

#[async_trait]
pub trait MatterTaskStore: Send + Sync {
    /// Tasks of one matter, newest first.
    async fn list_matter_tasks(&self, matter_id: Uuid) -> Result<Vec<TaskRecord>, DatabaseError>;
    async fn get_matter_task(&self, id: Uuid) -> Result<TaskRecord, DatabaseError>;
    async fn create_matter_task(&self, input: &NewTaskRecord) -> Result<TaskRecord, DatabaseError>;
    async fn update_matter_task(
        &self,
        id: Uuid,
        input: &UpdateTaskParams,
    ) -> Result<TaskRecord, DatabaseError>;
}

#[async_trait]
pub trait MatterDocumentStore: Send + Sync {
    /// Documents of one matter, most recently uploaded first.
    async fn list_matter_documents(
        &self,
        matter_id: Uuid,
    ) -> Result<Vec<DocumentRecord>, DatabaseError>;
    async fn get_matter_document(&self, id: Uuid) -> Result<DocumentRecord, DatabaseError>;
    async fn create_matter_document(
        &self,
        input: &NewDocumentRecord,
    ) -> Result<DocumentRecord, DatabaseError>;
    async fn delete_matter_document(&self, id: Uuid) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profiles holding an officer role, ordered by full name.
    async fn list_officers(&self) -> Result<Vec<ProfileRecord>, DatabaseError>;
    async fn get_profile(&self, id: Uuid) -> Result<ProfileRecord, DatabaseError>;
    async fn create_profile(&self, input: &NewProfileRecord)
    -> Result<ProfileRecord, DatabaseError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> MatterStore for S {
    async fn create_matter(&self, input: &NewMatterRecord) -> Result<MatterRecord, DatabaseError> {
        let record = self.create(RecordKind::Matter, to_fields(input)?).await?;
        from_record(RecordKind::Matter, record)
    }

    async fn list_matters(&self) -> Result<Vec<MatterRecord>, DatabaseError> {
        let records = self
            .read(
                RecordKind::Matter,
                &Filter::all(),
                Some(&Order::desc("created_at")),
            )
            .await?;
        from_records(RecordKind::Matter, records)
    }

    async fn list_matters_with_status(
        &self,
        status: MatterStatus,
    ) -> Result<Vec<MatterRecord>, DatabaseError> {
        let records = self
            .read(
                RecordKind::Matter,
                &Filter::all().eq("status", status.as_str()),
                Some(&Order::desc("created_at")),
            )
            .await?;
        from_records(RecordKind::Matter, records)
    }

    async fn get_matter(&self, id: Uuid) -> Result<MatterRecord, DatabaseError> {
        let record = self.read_one(RecordKind::Matter, id).await?;
        from_record(RecordKind::Matter, record)
    }

    async fn update_matter(
        &self,
        id: Uuid,
        input: &UpdateMatterParams,
    ) -> Result<MatterRecord, DatabaseError> {
        let record = self
            .update(RecordKind::Matter, id, input.to_fields())
            .await?;
        from_record(RecordKind::Matter, record)
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> MatterTaskStore for S {
    async fn list_matter_tasks(&self, matter_id: Uuid) -> Result<Vec<TaskRecord>, DatabaseError> {
        let records = self
            .read(
                RecordKind::Task,
                &Filter::all().eq("matter_id", matter_id.to_string()),
                Some(&Order::desc("created_at")),
            )
            .await?;
        from_records(RecordKind::Task, records)
    }

    async fn get_matter_task(&self, id: Uuid) -> Result<TaskRecord, DatabaseError> {
        let record = self.read_one(RecordKind::Task, id).await?;
        from_record(RecordKind::Task, record)
    }

    async fn create_matter_task(&self, input: &NewTaskRecord) -> Result<TaskRecord, DatabaseError> {
        let record = self.create(RecordKind::Task, to_fields(input)?).await?;
        from_record(RecordKind::Task, record)
    }

    async fn update_matter_task(
        &self,
        id: Uuid,
        input: &UpdateTaskParams,
    ) -> Result<TaskRecord, DatabaseError> {
        let record = self.update(RecordKind::Task, id, input.to_fields()).await?;
        from_record(RecordKind::Task, record)
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> MatterDocumentStore for S {
    async fn list_matter_documents(
        &self,
        matter_id: Uuid,
    ) -> Result<Vec<DocumentRecord>, DatabaseError> {
        let records = self
            .read(
                RecordKind::Document,
                &Filter::all().eq("matter_id", matter_id.to_string()),
                Some(&Order::desc("uploaded_at")),
            )
            .await?;
        from_records(RecordKind::Document, records)
    }

    async fn get_matter_document(&self, id: Uuid) -> Result<DocumentRecord, DatabaseError> {
        let record = self.read_one(RecordKind::Document, id).await?;
        from_record(RecordKind::Document, record)
    }

    async fn create_matter_document(
        &self,
        input: &NewDocumentRecord,
    ) -> Result<DocumentRecord, DatabaseError> {
        let record = self.create(RecordKind::Document, to_fields(input)?).await?;
        from_record(RecordKind::Document, record)
    }

    async fn delete_matter_document(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.delete(RecordKind::Document, id).await
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> ProfileStore for S {
    async fn list_officers(&self) -> Result<Vec<ProfileRecord>, DatabaseError> {
        let records = self
            .read(
                RecordKind::Profile,
                &Filter::all().is_in("role", OfficerRole::ALL.map(OfficerRole::as_str)),
                Some(&Order::asc("full_name")),
            )
            .await?;
        from_records(RecordKind::Profile, records)
    }

    async fn get_profile(&self, id: Uuid) -> Result<ProfileRecord, DatabaseError> {
        let record = self.read_one(RecordKind::Profile, id).await?;
        from_record(RecordKind::Profile, record)
    }

    async fn create_profile(
        &self,
        input: &NewProfileRecord,
    ) -> Result<ProfileRecord, DatabaseError> {
        let record = self.create(RecordKind::Profile, to_fields(input)?).await?;
        from_record(RecordKind::Profile, record)
    }
}
