//! The unattended entry point the OS trigger launches once a day.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{Local, NaiveDate};

use crate::collect::{CommitSource, GitCommitSource, TimeWindow, collect_from_repositories};
use crate::config::{self, Config};
use crate::logs::{DailyLog, LogStore};
use crate::scheduling::StatusStore;
use crate::scheduling::error_log;
use crate::summarize::{self, SummarizeError, Summarizer, classify_message};

/// A lock older than this is left over from a crashed run.
const STALE_LOCK_AGE: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to load configuration: {0}")]
    Configuration(String),
    #[error("No repositories configured")]
    NoRepositoriesConfigured,
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
    #[error("Failed to save daily log: {0}")]
    Io(String),
    #[error("Another run holds {}", .0.display())]
    Locked(PathBuf),
}

impl RunError {
    pub fn is_transient(&self) -> bool {
        match self {
            RunError::Summarize(e) => e.is_transient(),
            RunError::Io(message) => classify_message(message),
            _ => false,
        }
    }
}

pub struct AutomatedRunner {
    config: Config,
    source: Arc<dyn CommitSource>,
    summarizer: Arc<dyn Summarizer>,
    max_retries: u32,
    backoff_base: Duration,
}

impl AutomatedRunner {
    pub fn new(config: Config, source: Arc<dyn CommitSource>, summarizer: Arc<dyn Summarizer>) -> Self {
        let max_retries = config.schedule.max_retries;
        Self {
            config,
            source,
            summarizer,
            max_retries,
            backoff_base: Duration::from_secs(1),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[cfg(test)]
    fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Build a runner from the config file with the real git source and LLM summarizer.
    pub fn from_config_path(path: &Path) -> Result<Self, RunError> {
        let config = config::load(path).map_err(|e| RunError::Configuration(format!("{e:#}")))?;
        let summarizer = summarize::from_config(config.llm.as_ref());
        Ok(Self::new(config, Arc::new(GitCommitSource::new()), summarizer))
    }

    fn status_store(&self) -> StatusStore {
        StatusStore::new(&self.config.schedule.status_file, self.config.schedule.max_errors)
    }

    /// Run for `date` and report the outcome. Returns the process exit code.
    pub async fn run(&self, date: NaiveDate) -> i32 {
        let _lock = match RunLock::acquire(&lock_path(&self.config.schedule.status_file)) {
            Ok(lock) => lock,
            Err(e) => {
                tracing::error!("{e}");
                return 1;
            }
        };

        let status = self.status_store();
        match self.execute(date).await {
            Ok(0) => {
                println!("No commits found for {date}");
                self.record_success(&status, date);
                0
            }
            Ok(n) => {
                println!("Successfully created daily log for {date} ({n} commit(s))");
                self.record_success(&status, date);
                0
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Run for {date} failed: {message}");
                let date = date.to_string();
                if let Err(e) = error_log::append_error(
                    &self.config.schedule.error_log,
                    &message,
                    Some(&date),
                ) {
                    tracing::warn!("Could not write error log: {e:#}");
                }
                if let Err(e) = status.record_run(false, Some(&message), Some(&date)) {
                    tracing::warn!("Could not record run status: {e:#}");
                }
                1
            }
        }
    }

    fn record_success(&self, status: &StatusStore, date: NaiveDate) {
        if let Err(e) = status.record_run(true, None, None) {
            tracing::warn!("Could not record run status: {e:#}");
        }
        let store = LogStore::new(&self.config.storage.log_dir);
        if let Err(e) = store.prune(self.config.storage.retention_days, date) {
            tracing::warn!("Could not prune old logs: {e:#}");
        }
    }

    /// Collect once, then summarize and save with retries. Returns the commit count.
    async fn execute(&self, date: NaiveDate) -> Result<usize, RunError> {
        let repos = &self.config.git.repositories;
        if repos.is_empty() {
            return Err(RunError::NoRepositoriesConfigured);
        }

        let window = TimeWindow::day(date);
        let author = self.config.git.author.as_deref();
        let commits = collect_from_repositories(self.source.as_ref(), repos, &window, author).await;
        if commits.is_empty() {
            return Ok(0);
        }

        let attempts = self.max_retries.max(1);
        let mut attempt = 0;
        loop {
            match self.summarize_and_save(date, &commits).await {
                Ok(()) => return Ok(commits.len()),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    let backoff = backoff_delay(self.backoff_base, attempt);
                    tracing::warn!(
                        "Attempt {}/{attempts} failed: {e}. Retrying in {backoff:?}",
                        attempt + 1
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn summarize_and_save(
        &self,
        date: NaiveDate,
        commits: &[crate::collect::CommitRecord],
    ) -> Result<(), RunError> {
        let summary = self.summarizer.summarize(commits, date).await?;
        let log = DailyLog::from_summary(date, commits, summary);
        LogStore::new(&self.config.storage.log_dir)
            .write(&log)
            .map_err(|e| RunError::Io(format!("{e:#}")))?;
        Ok(())
    }
}

/// Entry point for `talkbut run`: load config, run for today, return the exit code.
pub async fn run_scheduled(config_path: &Path, max_retries: Option<u32>) -> i32 {
    let runner = match AutomatedRunner::from_config_path(config_path) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    let runner = match max_retries {
        Some(n) => runner.with_max_retries(n),
        None => runner,
    };
    runner.run(Local::now().date_naive()).await
}

/// `base * 2^attempt`, saturating instead of overflowing for large attempt counts.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn lock_path(status_file: &Path) -> PathBuf {
    let mut name = status_file.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive marker file held for the duration of one run.
struct RunLock {
    path: PathBuf,
}

impl RunLock {
    fn acquire(path: &Path) -> Result<Self, RunError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RunError::Io(e.to_string()))?;
        }
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !evict_stale_lock(path) {
                        return Err(RunError::Locked(path.to_path_buf()));
                    }
                }
                Err(e) => return Err(RunError::Io(format!("{}: {e}", path.display()))),
            }
        }
        Err(RunError::Locked(path.to_path_buf()))
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Remove the lock if it is older than [`STALE_LOCK_AGE`]. Returns whether it was removed.
fn evict_stale_lock(path: &Path) -> bool {
    let age = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok());
    match age {
        Some(age) if age > STALE_LOCK_AGE => {
            tracing::warn!("Removing stale lock {}", path.display());
            std::fs::remove_file(path).is_ok()
        }
        _ => false,
    }
}
