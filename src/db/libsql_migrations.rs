//! SQLite-dialect schema for the libSQL backend.
//!
//! Every statement is idempotent so the schema can be applied on each start.
//! Timestamps are RFC 3339 text written by the application; dates are
//! `YYYY-MM-DD` text.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    full_name TEXT,
    role TEXT,
    division TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS corporate_matters (
    id TEXT PRIMARY KEY,
    type_of_matter TEXT NOT NULL,
    request_form TEXT NOT NULL,
    requester_name TEXT NOT NULL,
    requester_position TEXT,
    requesting_division TEXT,
    date_requested TEXT NOT NULL,
    date_received TEXT NOT NULL,
    request_type TEXT NOT NULL,
    land_description TEXT,
    zoning TEXT,
    survey_plan_no TEXT,
    lease_type TEXT,
    lease_commencement TEXT,
    lease_expiry TEXT,
    legal_issues TEXT,
    organisation_responsible TEXT,
    assigned_officer TEXT,
    assigned_date TEXT,
    status TEXT NOT NULL DEFAULT 'Pending',
    due_date TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_corporate_matters_status
    ON corporate_matters(status);
CREATE INDEX IF NOT EXISTS idx_corporate_matters_created_at
    ON corporate_matters(created_at);

CREATE TABLE IF NOT EXISTS corporate_matter_tasks (
    id TEXT PRIMARY KEY,
    matter_id TEXT NOT NULL,
    task_type TEXT,
    description TEXT NOT NULL,
    assigned_officer TEXT,
    due_date TEXT,
    status TEXT NOT NULL DEFAULT 'Pending',
    created_at TEXT NOT NULL,
    completed_at TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_corporate_matter_tasks_matter
    ON corporate_matter_tasks(matter_id);

CREATE TABLE IF NOT EXISTS corporate_matter_documents (
    id TEXT PRIMARY KEY,
    matter_id TEXT NOT NULL,
    title TEXT NOT NULL,
    doc_type TEXT,
    storage_path TEXT NOT NULL,
    file_size INTEGER,
    mime_type TEXT,
    uploaded_by TEXT,
    uploaded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_corporate_matter_documents_matter
    ON corporate_matter_documents(matter_id);
"#;
