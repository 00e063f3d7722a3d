use chrono::{Duration, NaiveDate};

/// Calendar days between receipt of a request and its due date.
pub const TURNAROUND_DAYS: i64 = 14;

/// Due date for a matter received on `received`.
///
/// Plain calendar days: weekends and holidays are not skipped. Applied once at
/// intake and never recomputed when the matter is edited.
pub fn due_date_for(received: NaiveDate) -> NaiveDate {
    received + Duration::days(TURNAROUND_DAYS)
}
