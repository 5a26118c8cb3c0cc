use std::path::Path;

use super::adapter::{SchedulerAdapter, create_adapter};
use super::platform;
use super::validate::validate_time;
use super::{ScheduleStatus, SchedulerKind, StatusStore};

const STATUS_ERROR_LIMIT: usize = 5;

/// Front door for the daily trigger. Delegates to the platform adapter and
/// never caches: every query goes back to the OS scheduler.
pub struct SchedulerManager {
    platform: SchedulerKind,
    adapter: Option<Box<dyn SchedulerAdapter>>,
    status: Option<StatusStore>,
    command: String,
}

impl SchedulerManager {
    /// Manager for the running OS whose trigger re-invokes this executable with `config_path`.
    pub fn new(config_path: &Path, status: Option<StatusStore>) -> Self {
        let platform = platform::detect();
        let exe = std::env::current_exe().unwrap_or_else(|_| "talkbut".into());
        Self::with_adapter(
            platform,
            create_adapter(platform),
            status,
            build_command(&exe, config_path),
        )
    }

    pub fn with_adapter(
        platform: SchedulerKind,
        adapter: Option<Box<dyn SchedulerAdapter>>,
        status: Option<StatusStore>,
        command: String,
    ) -> Self {
        Self {
            platform,
            adapter,
            status,
            command,
        }
    }

    pub fn platform(&self) -> SchedulerKind {
        self.platform
    }

    pub async fn enable(&self, time: &str) -> bool {
        self.install(time).await
    }

    /// Re-creates the trigger at a new time. Creation replaces, so there is no separate remove.
    pub async fn update(&self, time: &str) -> bool {
        self.install(time).await
    }

    pub async fn disable(&self) -> bool {
        match &self.adapter {
            Some(adapter) => adapter.remove_job().await,
            None => false,
        }
    }

    pub async fn is_enabled(&self) -> bool {
        match &self.adapter {
            Some(adapter) => adapter.job_exists().await,
            None => false,
        }
    }

    pub async fn status(&self) -> ScheduleStatus {
        let enabled = self.is_enabled().await;
        let next_run = match (&self.adapter, enabled) {
            (Some(adapter), true) => adapter.next_run().await,
            _ => None,
        };
        let (last_run, recent_errors) = match &self.status {
            Some(store) => (store.last_run(), store.recent_errors(STATUS_ERROR_LIMIT)),
            None => (None, Vec::new()),
        };

        ScheduleStatus {
            enabled,
            schedule_time: next_run.map(|t| t.format("%H:%M").to_string()),
            last_run,
            next_run,
            recent_errors,
            platform: self.platform,
        }
    }

    async fn install(&self, time: &str) -> bool {
        let Some(adapter) = &self.adapter else {
            tracing::warn!("Scheduling is not supported on this platform");
            return false;
        };
        let time = match validate_time(time) {
            Ok(time) => time,
            Err(e) => {
                tracing::warn!("Rejected schedule time {time:?}: {e}");
                return false;
            }
        };
        adapter.create_job(time, &self.command).await
    }
}

/// Command line the OS trigger runs: this binary's `run` subcommand with the config path.
pub fn build_command(exe: &Path, config_path: &Path) -> String {
    format!(
        "{} --config {} run",
        quote(&exe.display().to_string()),
        quote(&config_path.display().to_string())
    )
}

fn quote(s: &str) -> String {
    if s.chars().any(char::is_whitespace) {
        format!("\"{s}\"")
    } else {
        s.to_string()
    }
}
