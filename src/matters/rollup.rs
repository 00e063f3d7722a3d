//! Task-to-matter status rollup.
//!
//! Two rules run synchronously after the task write that triggers them:
//!
//! - Adding a task to a Pending matter moves the matter to In Progress.
//! - Completing a task, when every task of the matter is now Completed, asks
//!   the acting user whether the matter itself should be marked Completed.
//!
//! Neither rule is atomic. Each step is its own store call and a failure after
//! the first write is reported as [`MatterError::Consistency`] with the earlier
//! write left in place.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    MatterRecord, MatterStatus, MatterStore, MatterTaskStore, NewTaskRecord, RecordStore,
    TaskRecord, TaskStatus, UpdateMatterParams, UpdateTaskParams,
};
use crate::error::{DatabaseError, MatterError};
use crate::matters::derived::Lifecycle;
use crate::matters::model::{TASK_TYPES, clean_text, vocabulary_match};

/// Asks the acting user to confirm marking a matter Completed.
#[async_trait]
pub trait CompletionPrompt: Send + Sync {
    /// `true` to complete the matter, `false` to leave it as is.
    async fn confirm_matter_completion(&self, matter: &MatterRecord, task_count: usize) -> bool;
}

/// A decision made before the rule ran, e.g. supplied with an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetAnswer(pub bool);

#[async_trait]
impl CompletionPrompt for PresetAnswer {
    async fn confirm_matter_completion(&self, _matter: &MatterRecord, _task_count: usize) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTaskInput {
    pub task_type: Option<String>,
    pub description: String,
    pub assigned_officer: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

impl NewTaskInput {
    fn into_record(self, matter_id: Uuid) -> Result<NewTaskRecord, MatterError> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(MatterError::validation("description is required"));
        }
        let task_type = match clean_text(self.task_type) {
            Some(raw) => Some(
                vocabulary_match(TASK_TYPES, &raw)
                    .map(str::to_string)
                    .ok_or_else(|| MatterError::validation(format!("unknown task_type '{raw}'")))?,
            ),
            None => None,
        };
        Ok(NewTaskRecord {
            matter_id,
            task_type,
            description,
            assigned_officer: self.assigned_officer,
            due_date: self.due_date,
            status: TaskStatus::Pending,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskAdded {
    pub task: TaskRecord,
    pub matter_status: MatterStatus,
    /// The matter moved from Pending to In Progress because of this task.
    pub escalated: bool,
}

/// Create a task under `matter_id`, escalating a Pending matter to In Progress.
pub async fn add_task(
    store: &dyn RecordStore,
    matter_id: Uuid,
    input: NewTaskInput,
) -> Result<TaskAdded, MatterError> {
    let record = input.into_record(matter_id)?;
    let matter = store.get_matter(matter_id).await?;
    let task = store.create_matter_task(&record).await?;
    tracing::info!(%matter_id, task_id = %task.id, "task added");

    if matter.status != MatterStatus::Pending {
        return Ok(TaskAdded {
            task,
            matter_status: matter.status,
            escalated: false,
        });
    }

    match store
        .update_matter(matter_id, &UpdateMatterParams::status(MatterStatus::InProgress))
        .await
    {
        Ok(updated) => {
            tracing::info!(%matter_id, "matter moved to In Progress by first task");
            Ok(TaskAdded {
                task,
                matter_status: updated.status,
                escalated: true,
            })
        }
        Err(source) => {
            tracing::warn!(
                %matter_id,
                task_id = %task.id,
                error = %source,
                "task created but matter escalation failed"
            );
            Err(MatterError::Consistency {
                applied: format!("task {} created", task.id),
                failed_step: "matter status update to In Progress".to_string(),
                source,
            })
        }
    }
}

/// What happened to the parent matter after a task status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRollup {
    /// Not every task is Completed, the change was not a completion, or the
    /// matter is already Completed or Closed.
    NotTriggered,
    /// Every task is Completed but the user declined to complete the matter.
    Declined,
    MatterCompleted,
}

impl CompletionRollup {
    /// Whether the all-tasks-complete condition held and a prompt was issued.
    pub fn prompted(self) -> bool {
        !matches!(self, Self::NotTriggered)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusChanged {
    pub task: TaskRecord,
    pub rollup: CompletionRollup,
}

fn consistency(task: &TaskRecord, failed_step: &str, source: DatabaseError) -> MatterError {
    tracing::warn!(
        task_id = %task.id,
        matter_id = %task.matter_id,
        error = %source,
        "{failed_step} failed after task update"
    );
    MatterError::Consistency {
        applied: format!("task {} set to {}", task.id, task.status.as_str()),
        failed_step: failed_step.to_string(),
        source,
    }
}

/// Change a task's status. Completing a task stamps `completed_at` and may
/// complete the parent matter after confirmation through `prompt`.
///
/// When `matter_id` is given the task must belong to that matter.
pub async fn set_task_status(
    store: &dyn RecordStore,
    prompt: &dyn CompletionPrompt,
    matter_id: Option<Uuid>,
    task_id: Uuid,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Result<TaskStatusChanged, MatterError> {
    let existing = store.get_matter_task(task_id).await?;
    if let Some(expected) = matter_id
        && existing.matter_id != expected
    {
        return Err(MatterError::validation(format!(
            "task {task_id} does not belong to matter {expected}"
        )));
    }
    if existing.status.is_terminal() {
        return Err(MatterError::validation(format!(
            "task {task_id} is already Completed"
        )));
    }

    let params = UpdateTaskParams {
        status: Some(status),
        completed_at: (status == TaskStatus::Completed).then_some(Some(now)),
        ..UpdateTaskParams::default()
    };
    let task = store.update_matter_task(task_id, &params).await?;
    tracing::info!(
        %task_id,
        from = existing.status.as_str(),
        to = task.status.as_str(),
        "task status changed"
    );

    if status != TaskStatus::Completed {
        return Ok(TaskStatusChanged {
            task,
            rollup: CompletionRollup::NotTriggered,
        });
    }

    let siblings = match store.list_matter_tasks(task.matter_id).await {
        Ok(siblings) => siblings,
        Err(e) => return Err(consistency(&task, "re-reading matter tasks", e)),
    };
    let all_complete =
        !siblings.is_empty() && siblings.iter().all(|t| t.status == TaskStatus::Completed);
    if !all_complete {
        return Ok(TaskStatusChanged {
            task,
            rollup: CompletionRollup::NotTriggered,
        });
    }

    let matter = match store.get_matter(task.matter_id).await {
        Ok(matter) => matter,
        Err(e) => return Err(consistency(&task, "reading parent matter", e)),
    };
    if matter.status.is_terminal() {
        tracing::debug!(matter_id = %matter.id, "matter already terminal; skipping prompt");
        return Ok(TaskStatusChanged {
            task,
            rollup: CompletionRollup::NotTriggered,
        });
    }

    if !prompt
        .confirm_matter_completion(&matter, siblings.len())
        .await
    {
        tracing::info!(matter_id = %matter.id, "matter completion declined");
        return Ok(TaskStatusChanged {
            task,
            rollup: CompletionRollup::Declined,
        });
    }

    match store
        .update_matter(matter.id, &UpdateMatterParams::status(MatterStatus::Completed))
        .await
    {
        Ok(_) => {
            tracing::info!(matter_id = %matter.id, "matter completed after all tasks");
            Ok(TaskStatusChanged {
                task,
                rollup: CompletionRollup::MatterCompleted,
            })
        }
        Err(e) => Err(consistency(&task, "matter status update to Completed", e)),
    }
}
