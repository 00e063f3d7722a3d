//! Overdue / due-soon flags computed on every read and never persisted.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::db::{MatterStatus, TaskStatus};

/// Width of the due-soon window ahead of now.
pub const DUE_SOON_WINDOW_DAYS: i64 = 3;

/// Anything with a lifecycle that can reach a terminal state.
pub trait Lifecycle: Copy {
    fn is_terminal(self) -> bool;
}

impl Lifecycle for MatterStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }
}

impl Lifecycle for TaskStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DueFlags {
    pub is_overdue: bool,
    pub is_due_soon: bool,
}

/// Instant a date-only due date is compared at: midnight UTC.
pub fn due_instant(due: NaiveDate) -> DateTime<Utc> {
    due.and_time(NaiveTime::MIN).and_utc()
}

pub fn is_overdue<S: Lifecycle>(due: Option<NaiveDate>, status: S, now: DateTime<Utc>) -> bool {
    match due {
        Some(due) if !status.is_terminal() => due_instant(due) < now,
        _ => false,
    }
}

pub fn is_due_soon<S: Lifecycle>(due: Option<NaiveDate>, status: S, now: DateTime<Utc>) -> bool {
    match due {
        Some(due) if !status.is_terminal() => {
            let at = due_instant(due);
            at > now && at < now + Duration::days(DUE_SOON_WINDOW_DAYS)
        }
        _ => false,
    }
}

pub fn evaluate<S: Lifecycle>(due: Option<NaiveDate>, status: S, now: DateTime<Utc>) -> DueFlags {
    DueFlags {
        is_overdue: is_overdue(due, status, now),
        is_due_soon: is_due_soon(due, status, now),
    }
}
