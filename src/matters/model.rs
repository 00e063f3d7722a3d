//! Intake vocabularies and the read-side views returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::{MatterRecord, TaskRecord};
use crate::matters::derived::{DueFlags, evaluate};

pub const MATTER_TYPES: &[&str] = &[
    "Legal Clearance",
    "Legal Advice",
    "Drafting & Contract Review",
    "Vetting of Instrument",
    "Interpretation of Legislation",
    "Legal Clearance/Clarification of Court Order/Judgement",
    "Other",
];

pub const REQUEST_FORMS: &[&str] = &[
    "Verbal",
    "WhatsApp",
    "Note",
    "Email",
    "Inter-Office Memo",
    "Letter",
];

pub const REQUEST_TYPES: &[&str] = &[
    "Legal Opinion",
    "Legal Brief",
    "Status Brief",
    "Investigative Brief",
    "Draft/Vet Instrument",
    "Contract/Agreement Review",
    "Forfeiture Clearance",
    "Other",
];

pub const TASK_TYPES: &[&str] = &[
    "Prepare Legal Opinion",
    "Draft Legal Brief",
    "Draft Status Brief",
    "Draft Investigative Brief",
    "Draft/Vet Instrument",
    "Contract Review",
    "Forfeiture Clearance",
    "Research",
    "Workshop/Meeting",
    "Other",
];

pub const DOCUMENT_TYPES: &[&str] = &[
    "Inter-Office Memo",
    "Background Documents",
    "Draft Opinion",
    "Final Opinion",
    "Legal Brief",
    "Status Brief",
    "Investigative Brief",
    "Contract Draft",
    "Final Contract",
    "Forfeiture Approval Form",
    "Supporting Documents",
    "Other",
];

pub const LEASE_TYPES: &[&str] = &["Ground Lease", "Building Lease", "Sublease", "License", "Other"];

/// Check `value` against a vocabulary, returning the canonical spelling.
///
/// Matching ignores ASCII case and surrounding whitespace.
pub fn vocabulary_match(vocabulary: &[&'static str], value: &str) -> Option<&'static str> {
    let needle = value.trim();
    vocabulary
        .iter()
        .copied()
        .find(|entry| entry.eq_ignore_ascii_case(needle))
}

/// Trim a free-text field, mapping blank input to `None`.
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Deserialize a field that distinguishes "absent" (`None`) from an explicit
/// `null` (`Some(None)`). Pair with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A matter with its derived flags and resolved officer name.
#[derive(Debug, Clone, Serialize)]
pub struct MatterView {
    #[serde(flatten)]
    pub matter: MatterRecord,
    #[serde(flatten)]
    pub flags: DueFlags,
    pub assigned_officer_name: Option<String>,
}

impl MatterView {
    pub fn new(matter: MatterRecord, now: DateTime<Utc>) -> Self {
        let flags = evaluate(matter.due_date, matter.status, now);
        Self {
            matter,
            flags,
            assigned_officer_name: None,
        }
    }

    pub fn with_officer_name(mut self, name: Option<String>) -> Self {
        self.assigned_officer_name = name;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: TaskRecord,
    #[serde(flatten)]
    pub flags: DueFlags,
}

impl TaskView {
    pub fn new(task: TaskRecord, now: DateTime<Utc>) -> Self {
        let flags = evaluate(task.due_date, task.status, now);
        Self { task, flags }
    }
}
