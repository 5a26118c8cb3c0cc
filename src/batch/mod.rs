//! Backfilling daily logs over a date range, skipping dates already on disk.

pub mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::NaiveDate;

use crate::collect::{CommitSource, TimeWindow, collect_from_repositories};
use crate::config::{Config, RepositoryConfig};
use crate::dates::{self, DateParseError};
use crate::logs::{DailyLog, LogStore};
use crate::summarize::Summarizer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Artifact written. `changed` is false when it replaced one built from the same commits.
    Processed { commits: usize, changed: bool },
    /// Artifact already existed and `force` was off.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub date: NaiveDate,
    pub outcome: Outcome,
}

/// Every input date lands in exactly one of `processed`, `skipped` or `failed`.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total_dates: usize,
    pub processed: Vec<NaiveDate>,
    pub skipped: Vec<NaiveDate>,
    pub failed: Vec<(NaiveDate, String)>,
    pub duration: Duration,
}

impl BatchResult {
    fn record(&mut self, result: &ProcessResult) {
        match &result.outcome {
            Outcome::Processed { .. } => self.processed.push(result.date),
            Outcome::Skipped => self.skipped.push(result.date),
            Outcome::Failed(e) => self.failed.push((result.date, e.clone())),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct BatchProcessor {
    source: Arc<dyn CommitSource>,
    summarizer: Arc<dyn Summarizer>,
    store: LogStore,
    repos: Vec<RepositoryConfig>,
    default_author: Option<String>,
}

impl BatchProcessor {
    pub fn new(
        config: &Config,
        source: Arc<dyn CommitSource>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let mut repos = config.git.repositories.clone();
        if repos.is_empty() {
            tracing::info!("No repositories configured, using the current directory");
            repos.push(RepositoryConfig {
                name: Some("Current Directory".to_string()),
                path: PathBuf::from("."),
            });
        }
        Self {
            source,
            summarizer,
            store: LogStore::new(&config.storage.log_dir),
            repos,
            default_author: config.git.author.clone(),
        }
    }

    /// Expand `since..=until` (until defaults to `today`) and process each date.
    /// `progress` sees every result with its 1-based index and the total.
    pub async fn process_date_range(
        &self,
        since: &str,
        until: Option<&str>,
        today: NaiveDate,
        force: bool,
        author: Option<&str>,
        progress: impl FnMut(usize, usize, &ProcessResult),
    ) -> Result<BatchResult, DateParseError> {
        let dates = dates::expand(since, until, today)?;
        Ok(self.process_dates(&dates, force, author, progress).await)
    }

    pub async fn process_dates(
        &self,
        dates: &[NaiveDate],
        force: bool,
        author: Option<&str>,
        mut progress: impl FnMut(usize, usize, &ProcessResult),
    ) -> BatchResult {
        let start = Instant::now();
        let author = author.or(self.default_author.as_deref());
        let mut result = BatchResult {
            total_dates: dates.len(),
            ..Default::default()
        };

        for (i, &date) in dates.iter().enumerate() {
            let outcome = self.process_date(date, force, author).await;
            let date_result = ProcessResult { date, outcome };
            result.record(&date_result);
            progress(i + 1, dates.len(), &date_result);
        }

        result.duration = start.elapsed();
        result
    }

    async fn process_date(&self, date: NaiveDate, force: bool, author: Option<&str>) -> Outcome {
        if !force && self.store.exists(date) {
            return Outcome::Skipped;
        }
        match self.build_log(date, author).await {
            Ok((commits, changed)) => Outcome::Processed { commits, changed },
            Err(e) => {
                tracing::error!("Failed to process {date}: {e:#}");
                Outcome::Failed(format!("{e:#}"))
            }
        }
    }

    async fn build_log(&self, date: NaiveDate, author: Option<&str>) -> Result<(usize, bool)> {
        let window = TimeWindow::day(date);
        let commits =
            collect_from_repositories(self.source.as_ref(), &self.repos, &window, author).await;

        let log = if commits.is_empty() {
            DailyLog::empty(date)
        } else {
            let summary = self.summarizer.summarize(&commits, date).await?;
            DailyLog::from_summary(date, &commits, summary)
        };
        let changed = self.store.write(&log)?;
        Ok((commits.len(), changed))
    }
}
