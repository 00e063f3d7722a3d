//! Request and response DTOs for the web gateway API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{DocumentRecord, ProfileRecord, TaskStatus};
use crate::matters::{CompletionRollup, MatterView, TaskView};

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub channel: &'static str,
    pub uptime_secs: u64,
}

// --- Matters ---

#[derive(Debug, Serialize)]
pub struct MattersListResponse {
    pub matters: Vec<MatterView>,
    pub total: usize,
}

// --- Tasks ---

#[derive(Debug, Serialize)]
pub struct TasksListResponse {
    pub matter_id: Uuid,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
    /// Answer to "mark matter Completed?" if every task ends up Completed.
    /// Absent means "not yet asked"; the matter is left unchanged.
    #[serde(default)]
    pub confirm_matter_completion: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task: TaskView,
    pub rollup: CompletionRollup,
    /// Every task of the matter is Completed and the matter was not; a client
    /// that did not pre-answer should ask its user and edit the matter.
    pub completion_prompted: bool,
}

// --- Documents ---

#[derive(Debug, Serialize)]
pub struct DocumentsListResponse {
    pub matter_id: Uuid,
    pub documents: Vec<DocumentRecord>,
}

// --- Officers ---

#[derive(Debug, Serialize)]
pub struct OfficerInfo {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: String,
    pub role: Option<String>,
    pub division: Option<String>,
}

impl From<ProfileRecord> for OfficerInfo {
    fn from(profile: ProfileRecord) -> Self {
        Self {
            id: profile.id,
            full_name: profile.full_name,
            email: profile.email,
            role: profile.role,
            division: profile.division,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OfficersResponse {
    pub officers: Vec<OfficerInfo>,
}

// --- Generic ---

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_request_parses_display_status() {
        let req: TaskStatusRequest =
            serde_json::from_str(r#"{"status":"In Progress"}"#).expect("parse");
        assert_eq!(req.status, TaskStatus::InProgress);
        assert_eq!(req.confirm_matter_completion, None);

        let req: TaskStatusRequest = serde_json::from_str(
            r#"{"status":"Completed","confirm_matter_completion":true}"#,
        )
        .expect("parse");
        assert_eq!(req.confirm_matter_completion, Some(true));
    }

    #[test]
    fn task_status_request_rejects_unknown_status() {
        assert!(serde_json::from_str::<TaskStatusRequest>(r#"{"status":"Done"}"#).is_err());
    }

    #[test]
    fn action_response_ok_sets_success() {
        let resp = ActionResponse::ok("deleted");
        assert!(resp.success);
        assert_eq!(resp.message, "deleted");
    }
}
