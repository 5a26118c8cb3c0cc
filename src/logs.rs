//! Daily log artifacts: one JSON file per calendar date under `storage.log_dir`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::collect::CommitRecord;
use crate::summarize::Summary;

pub const NO_COMMITS_SUMMARY: &str = "No commits found for this date.";

const FILE_PREFIX: &str = "daily_log_";
const FILE_SUFFIX: &str = ".json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    pub commits: u64,
    pub files: u64,
    pub insertions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub summary: String,
    pub stats: LogStats,
    #[serde(default)]
    pub categories: BTreeMap<String, u32>,
    #[serde(default)]
    pub highlights: Vec<String>,
    /// SHA-256 over the sorted commit hashes this log was built from.
    #[serde(default)]
    pub source_digest: String,
}

impl DailyLog {
    /// The artifact written for a day without any commits.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            summary: NO_COMMITS_SUMMARY.to_string(),
            stats: LogStats::default(),
            categories: BTreeMap::new(),
            highlights: Vec::new(),
            source_digest: source_digest(&[]),
        }
    }

    pub fn from_summary(date: NaiveDate, commits: &[CommitRecord], summary: Summary) -> Self {
        let files: BTreeSet<(&str, &str)> = commits
            .iter()
            .flat_map(|c| c.files_changed.iter().map(|f| (c.repo_name.as_str(), f.as_str())))
            .collect();
        Self {
            date,
            summary: summary.summary_text,
            stats: LogStats {
                commits: commits.len() as u64,
                files: files.len() as u64,
                insertions: commits.iter().map(|c| c.insertions).sum(),
                deletions: commits.iter().map(|c| c.deletions).sum(),
            },
            categories: summary.categories,
            highlights: summary.highlights,
            source_digest: source_digest(commits),
        }
    }
}

/// Order-independent fingerprint of a commit set.
pub fn source_digest(commits: &[CommitRecord]) -> String {
    let mut hashes: Vec<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
    hashes.sort_unstable();
    hashes.dedup();
    let mut hasher = Sha256::new();
    for hash in hashes {
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d")))
    }

    /// Presence of the artifact is what marks a date as already processed.
    pub fn exists(&self, date: NaiveDate) -> bool {
        self.path(date).is_file()
    }

    pub fn read(&self, date: NaiveDate) -> Result<Option<DailyLog>> {
        let path = self.path(date);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read log: {}", path.display()))?;
        let log = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse log: {}", path.display()))?;
        Ok(Some(log))
    }

    /// Replace the artifact for `log.date`. Returns `false` when an existing
    /// artifact was built from the same commits.
    pub fn write(&self, log: &DailyLog) -> Result<bool> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create log dir: {}", self.dir.display()))?;

        let path = self.path(log.date);
        let changed = match self.read(log.date) {
            Ok(Some(previous)) => previous.source_digest != log.source_digest,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("Replacing unreadable log: {e:#}");
                true
            }
        };

        let json = serde_json::to_string_pretty(log)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write log: {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace log: {}", path.display()))?;
        Ok(changed)
    }

    /// Dates that have an artifact, ascending.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut dates: Vec<NaiveDate> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| date_from_file_name(&e.file_name().to_string_lossy()))
            .collect();
        dates.sort();
        Ok(dates)
    }

    /// Delete artifacts dated more than `retention_days` before `today`.
    /// Returns how many were removed. `0` keeps everything.
    pub fn prune(&self, retention_days: u32, today: NaiveDate) -> Result<usize> {
        if retention_days == 0 {
            return Ok(0);
        }
        let Some(cutoff) = today.checked_sub_signed(TimeDelta::days(i64::from(retention_days)))
        else {
            return Ok(0);
        };

        let mut removed = 0;
        for date in self.dates()?.into_iter().filter(|d| *d < cutoff) {
            let path = self.path(date);
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove log: {}", path.display()))?;
            removed += 1;
        }
        if removed > 0 {
            tracing::info!("Pruned {removed} daily log(s) older than {cutoff}");
        }
        Ok(removed)
    }
}

fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
