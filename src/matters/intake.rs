//! Matter intake, manual edits, listing, and the dashboard summary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    MatterRecord, MatterStatus, MatterStore, NewMatterRecord, ProfileStore, RecordStore,
    UpdateMatterParams,
};
use crate::error::{DatabaseError, MatterError};
use crate::matters::due_date::due_date_for;
use crate::matters::model::{
    LEASE_TYPES, MATTER_TYPES, MatterView, REQUEST_FORMS, REQUEST_TYPES, clean_text,
    double_option, vocabulary_match,
};

/// Number of matters shown in the dashboard's recent list.
pub const RECENT_MATTERS: usize = 10;

/// Intake form for a new matter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatterIntake {
    pub type_of_matter: String,
    pub request_form: String,
    pub requester_name: String,
    pub requester_position: Option<String>,
    pub requesting_division: Option<String>,
    pub date_requested: Option<NaiveDate>,
    pub date_received: Option<NaiveDate>,
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
}

fn required_vocab(
    field: &str,
    vocabulary: &[&'static str],
    value: &str,
) -> Result<String, MatterError> {
    if value.trim().is_empty() {
        return Err(MatterError::validation(format!("{field} is required")));
    }
    vocabulary_match(vocabulary, value)
        .map(str::to_string)
        .ok_or_else(|| MatterError::validation(format!("unknown {field} '{}'", value.trim())))
}

impl MatterIntake {
    /// Validate the form and build the record to insert.
    ///
    /// The due date is fixed here from the received date. `today` stamps the
    /// assignment date when an officer is assigned at intake.
    pub fn into_record(
        self,
        created_by: Option<Uuid>,
        today: NaiveDate,
    ) -> Result<NewMatterRecord, MatterError> {
        let requester_name = self.requester_name.trim().to_string();
        if requester_name.is_empty() {
            return Err(MatterError::validation("requester_name is required"));
        }
        let type_of_matter = required_vocab("type_of_matter", MATTER_TYPES, &self.type_of_matter)?;
        let request_form = required_vocab("request_form", REQUEST_FORMS, &self.request_form)?;
        let request_type = required_vocab("request_type", REQUEST_TYPES, &self.request_type)?;
        let date_requested = self
            .date_requested
            .ok_or_else(|| MatterError::validation("date_requested is required"))?;
        let date_received = self
            .date_received
            .ok_or_else(|| MatterError::validation("date_received is required"))?;

        let lease_type = match clean_text(self.lease_type) {
            Some(raw) => Some(
                vocabulary_match(LEASE_TYPES, &raw)
                    .map(str::to_string)
                    .ok_or_else(|| MatterError::validation(format!("unknown lease_type '{raw}'")))?,
            ),
            None => None,
        };
        if let (Some(start), Some(end)) = (self.lease_commencement, self.lease_expiry)
            && end < start
        {
            return Err(MatterError::validation(
                "lease_expiry must not be before lease_commencement",
            ));
        }

        Ok(NewMatterRecord {
            type_of_matter,
            request_form,
            requester_name,
            requester_position: clean_text(self.requester_position),
            requesting_division: clean_text(self.requesting_division),
            date_requested,
            date_received,
            request_type,
            land_description: clean_text(self.land_description),
            zoning: clean_text(self.zoning),
            survey_plan_no: clean_text(self.survey_plan_no),
            lease_type,
            lease_commencement: self.lease_commencement,
            lease_expiry: self.lease_expiry,
            legal_issues: clean_text(self.legal_issues),
            organisation_responsible: clean_text(self.organisation_responsible),
            assigned_officer: self.assigned_officer,
            assigned_date: self.assigned_officer.map(|_| today),
            status: MatterStatus::Pending,
            due_date: Some(due_date_for(date_received)),
            created_by,
        })
    }
}

/// Record a new matter. Status starts at Pending.
pub async fn create_matter(
    store: &dyn RecordStore,
    intake: MatterIntake,
    created_by: Option<Uuid>,
    today: NaiveDate,
) -> Result<MatterRecord, MatterError> {
    let record = intake.into_record(created_by, today)?;
    let matter = store.create_matter(&record).await?;
    tracing::info!(
        matter_id = %matter.id,
        due_date = ?matter.due_date,
        "matter recorded"
    );
    Ok(matter)
}

/// Manual edit of an existing matter. Never touches the due date.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatterEdit {
    pub status: Option<MatterStatus>,
    #[serde(deserialize_with = "double_option")]
    pub assigned_officer: Option<Option<Uuid>>,
    #[serde(deserialize_with = "double_option")]
    pub requester_position: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub requesting_division: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub legal_issues: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub organisation_responsible: Option<Option<String>>,
}

impl MatterEdit {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assigned_officer.is_none()
            && self.requester_position.is_none()
            && self.requesting_division.is_none()
            && self.legal_issues.is_none()
            && self.organisation_responsible.is_none()
    }
}

fn clean_patch(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(clean_text)
}

pub async fn edit_matter(
    store: &dyn RecordStore,
    matter_id: Uuid,
    edit: MatterEdit,
    today: NaiveDate,
) -> Result<MatterRecord, MatterError> {
    if edit.is_empty() {
        return Err(MatterError::validation("no fields to update"));
    }
    let existing = store.get_matter(matter_id).await?;

    let assigned_date = match edit.assigned_officer {
        Some(Some(officer)) if existing.assigned_officer != Some(officer) => Some(Some(today)),
        Some(None) => Some(None),
        _ => None,
    };
    let params = UpdateMatterParams {
        status: edit.status,
        assigned_officer: edit.assigned_officer,
        assigned_date,
        requester_position: clean_patch(edit.requester_position),
        requesting_division: clean_patch(edit.requesting_division),
        legal_issues: clean_patch(edit.legal_issues),
        organisation_responsible: clean_patch(edit.organisation_responsible),
    };

    let updated = store.update_matter(matter_id, &params).await?;
    if updated.status != existing.status {
        tracing::info!(
            matter_id = %matter_id,
            from = existing.status.as_str(),
            to = updated.status.as_str(),
            "matter status edited"
        );
    }
    Ok(updated)
}

/// Filter for the matter list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatterQuery {
    pub status: Option<MatterStatus>,
    pub search: Option<String>,
}

fn matches_search(matter: &MatterRecord, needle: &str) -> bool {
    let fields = [
        Some(matter.requester_name.as_str()),
        Some(matter.type_of_matter.as_str()),
        Some(matter.request_type.as_str()),
        matter.requesting_division.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Matters newest first, optionally narrowed by status and a
/// case-insensitive search over requester, matter type, request type and
/// division.
pub async fn list_matters(
    store: &dyn RecordStore,
    query: &MatterQuery,
    now: DateTime<Utc>,
) -> Result<Vec<MatterView>, MatterError> {
    let matters = match query.status {
        Some(status) => store.list_matters_with_status(status).await?,
        None => store.list_matters().await?,
    };
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    Ok(matters
        .into_iter()
        .filter(|m| needle.as_deref().is_none_or(|n| matches_search(m, n)))
        .map(|m| MatterView::new(m, now))
        .collect())
}

/// A single matter with its assigned officer's display name.
pub async fn matter_detail(
    store: &dyn RecordStore,
    matter_id: Uuid,
    now: DateTime<Utc>,
) -> Result<MatterView, MatterError> {
    let matter = store.get_matter(matter_id).await?;
    let officer_name = match matter.assigned_officer {
        Some(officer_id) => match store.get_profile(officer_id).await {
            Ok(profile) => Some(profile.display_name().to_string()),
            Err(DatabaseError::NotFound { .. }) => {
                tracing::debug!(%officer_id, "assigned officer has no profile");
                None
            }
            Err(e) => return Err(e.into()),
        },
        None => None,
    };
    Ok(MatterView::new(matter, now).with_officer_name(officer_name))
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    /// Completed and Closed together.
    pub completed: usize,
    pub overdue: usize,
    pub due_soon: usize,
    pub recent: Vec<MatterView>,
}

pub async fn dashboard(
    store: &dyn RecordStore,
    now: DateTime<Utc>,
) -> Result<DashboardStats, MatterError> {
    let views: Vec<MatterView> = store
        .list_matters()
        .await?
        .into_iter()
        .map(|m| MatterView::new(m, now))
        .collect();

    let count = |pred: &dyn Fn(&MatterView) -> bool| views.iter().filter(|v| pred(v)).count();
    let stats = DashboardStats {
        total: views.len(),
        pending: count(&|v| v.matter.status == MatterStatus::Pending),
        in_progress: count(&|v| v.matter.status == MatterStatus::InProgress),
        completed: count(&|v| {
            matches!(
                v.matter.status,
                MatterStatus::Completed | MatterStatus::Closed
            )
        }),
        overdue: count(&|v| v.flags.is_overdue),
        due_soon: count(&|v| v.flags.is_due_soon),
        recent: views.iter().take(RECENT_MATTERS).cloned().collect(),
    };
    Ok(stats)
}
