//! matterdesk: corporate legal matter tracking.
//!
//! Matters are recorded on intake with a computed due date, assigned to an
//! officer, broken into tasks, and closed out. Status rolls up from tasks to
//! their matter, overdue and due-soon flags are derived on read, and
//! attachments live in a file store beside their metadata records.

pub mod channels;
pub mod config;
pub mod db;
pub mod error;
pub mod matters;
pub mod settings;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
