//! Commit Source: fetching commit records for a time window from configured repositories.

pub mod git;

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::RepositoryConfig;

pub use git::GitCommitSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<FixedOffset>,
    pub message: String,
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub insertions: u64,
    #[serde(default)]
    pub deletions: u64,
    /// Set by [`collect_from_repositories`]; empty when a source is queried directly.
    #[serde(default)]
    pub repo_name: String,
}

impl CommitRecord {
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Local wall-clock window, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: NaiveDateTime,
    pub until: NaiveDateTime,
}

impl TimeWindow {
    /// `00:00:00` through `23:59:59` of `date`.
    pub fn day(date: NaiveDate) -> Self {
        let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Self {
            since: date.and_time(NaiveTime::MIN),
            until: date.and_time(end),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Not a git repository: {}", .0.display())]
    NotARepository(PathBuf),
    #[error("git failed in {}: {message}", .repo.display())]
    Git { repo: PathBuf, message: String },
    #[error("Failed to run git: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected git log output: {0}")]
    Parse(String),
}

#[async_trait::async_trait]
pub trait CommitSource: Send + Sync {
    async fn collect(
        &self,
        repo: &Path,
        window: &TimeWindow,
        author: Option<&str>,
    ) -> Result<Vec<CommitRecord>, CollectError>;
}

/// Collect from every repository, skipping the ones that fail. Commits are
/// tagged with their repository name and returned newest-first.
pub async fn collect_from_repositories(
    source: &dyn CommitSource,
    repos: &[RepositoryConfig],
    window: &TimeWindow,
    author: Option<&str>,
) -> Vec<CommitRecord> {
    let mut all = Vec::new();
    for repo in repos {
        let name = repo.display_name();
        match source.collect(&repo.path, window, author).await {
            Ok(commits) => {
                tracing::debug!("Collected {} commit(s) from {name}", commits.len());
                all.extend(commits.into_iter().map(|mut c| {
                    c.repo_name = name.clone();
                    c
                }));
            }
            Err(e) => {
                tracing::warn!("Failed to collect from {name} for {}: {e}", window.since.date());
            }
        }
    }
    all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    all
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Commit source backed by a map of repo path to commits (or an error message).
    #[derive(Default)]
    pub struct FakeSource {
        pub repos: HashMap<PathBuf, Result<Vec<CommitRecord>, String>>,
        pub calls: Mutex<Vec<(PathBuf, TimeWindow, Option<String>)>>,
    }

    impl FakeSource {
        pub fn with_repo(mut self, path: &str, commits: Vec<CommitRecord>) -> Self {
            self.repos.insert(PathBuf::from(path), Ok(commits));
            self
        }

        pub fn with_broken_repo(mut self, path: &str, message: &str) -> Self {
            self.repos.insert(PathBuf::from(path), Err(message.to_string()));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl CommitSource for FakeSource {
        async fn collect(
            &self,
            repo: &Path,
            window: &TimeWindow,
            author: Option<&str>,
        ) -> Result<Vec<CommitRecord>, CollectError> {
            self.calls
                .lock()
                .unwrap()
                .push((repo.to_path_buf(), *window, author.map(String::from)));
            match self.repos.get(repo) {
                Some(Ok(commits)) => Ok(commits
                    .iter()
                    .filter(|c| {
                        let t = c.timestamp.naive_local();
                        t >= window.since && t <= window.until
                    })
                    .cloned()
                    .collect()),
                Some(Err(message)) => Err(CollectError::Git {
                    repo: repo.to_path_buf(),
                    message: message.clone(),
                }),
                None => Err(CollectError::NotARepository(repo.to_path_buf())),
            }
        }
    }

    pub fn commit(hash: &str, timestamp: &str, message: &str) -> CommitRecord {
        CommitRecord {
            hash: hash.to_string(),
            author: "Dev".into(),
            email: "dev@example.com".into(),
            timestamp: DateTime::parse_from_rfc3339(timestamp).unwrap(),
            message: message.to_string(),
            files_changed: vec!["src/lib.rs".into()],
            insertions: 10,
            deletions: 2,
            repo_name: String::new(),
        }
    }

    pub fn repo(name: &str, path: &str) -> RepositoryConfig {
        RepositoryConfig {
            name: Some(name.to_string()),
            path: PathBuf::from(path),
        }
    }
}
