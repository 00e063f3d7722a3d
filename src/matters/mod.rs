//! Corporate matter workflow: intake, derived due-date flags, the task rollup
//! rules, and document attachments.

pub mod derived;
pub mod documents;
pub mod due_date;
pub mod intake;
pub mod model;
pub mod rollup;

pub use derived::{DueFlags, Lifecycle, evaluate};
pub use due_date::due_date_for;
pub use intake::{DashboardStats, MatterEdit, MatterIntake, MatterQuery};
pub use model::{MatterView, TaskView};
pub use rollup::{
    CompletionPrompt, CompletionRollup, NewTaskInput, PresetAnswer, TaskAdded, TaskStatusChanged,
};
