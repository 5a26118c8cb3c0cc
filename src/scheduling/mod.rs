//! Installing, querying and removing the daily OS trigger, plus the durable
//! run status that the triggered runner reports into.

pub mod adapter;
pub mod cron;
pub mod display;
pub mod error_log;
pub mod manager;
pub mod platform;
pub mod status;
pub mod task_scheduler;
pub mod validate;

use chrono::{DateTime, Local};

pub use manager::SchedulerManager;
pub use platform::SchedulerKind;
pub use status::StatusStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Local>,
    pub error_message: String,
    pub date_attempted: Option<String>,
}

/// Snapshot computed on demand from live OS state and the status file.
#[derive(Debug, Clone)]
pub struct ScheduleStatus {
    pub enabled: bool,
    /// `HH:MM`, derived from the installed trigger.
    pub schedule_time: Option<String>,
    pub last_run: Option<DateTime<Local>>,
    pub next_run: Option<DateTime<Local>>,
    pub recent_errors: Vec<ErrorRecord>,
    pub platform: SchedulerKind,
}
