use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ErrorRecord;

pub const DEFAULT_MAX_ERRORS: usize = 50;

/// Persisted shape of the status file.
///
/// Error entries stay as raw JSON so one malformed record never poisons the rest.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StatusDocument {
    #[serde(default)]
    last_run: Option<String>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct StoredError {
    timestamp: String,
    error_message: String,
    #[serde(default)]
    date_attempted: Option<String>,
}

/// Durable record of the last successful run plus a bounded error history.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
    max_errors: usize,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>, max_errors: usize) -> Self {
        Self {
            path: path.into(),
            max_errors: max_errors.max(1),
        }
    }

    #[cfg(test)]
    fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Success stamps `last_run`; failure appends an error, evicting the oldest past `max_errors`.
    pub fn record_run(
        &self,
        success: bool,
        error: Option<&str>,
        date_attempted: Option<&str>,
    ) -> Result<()> {
        let mut doc = self.read();
        let now = Local::now();

        if success {
            doc.last_run = Some(now.to_rfc3339());
        } else {
            let record = StoredError {
                timestamp: now.to_rfc3339(),
                error_message: error.unwrap_or("Unknown error").to_string(),
                date_attempted: date_attempted.map(str::to_string),
            };
            doc.errors.push(serde_json::to_value(record)?);
            if doc.errors.len() > self.max_errors {
                let excess = doc.errors.len() - self.max_errors;
                doc.errors.drain(..excess);
            }
        }

        self.write(&doc)
    }

    pub fn last_run(&self) -> Option<DateTime<Local>> {
        self.read().last_run.as_deref().and_then(parse_timestamp)
    }

    /// Up to `limit` errors, most recent first. Malformed entries are skipped.
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
        self.read()
            .errors
            .into_iter()
            .rev()
            .filter_map(|raw| {
                let stored: StoredError = serde_json::from_value(raw).ok()?;
                Some(ErrorRecord {
                    timestamp: parse_timestamp(&stored.timestamp)?,
                    error_message: stored.error_message,
                    date_attempted: stored.date_attempted,
                })
            })
            .take(limit)
            .collect()
    }

    pub fn clear_errors(&self) -> Result<()> {
        let mut doc = self.read();
        doc.errors.clear();
        self.write(&doc)
    }

    fn read(&self) -> StatusDocument {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return StatusDocument::default();
            }
            Err(e) => {
                tracing::warn!("Cannot read status file {}: {e}", self.path.display());
                return StatusDocument::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    "Status file {} is corrupt, starting fresh: {e}",
                    self.path.display()
                );
                StatusDocument::default()
            }
        }
    }

    fn write(&self, doc: &StatusDocument) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write status: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace status: {}", self.path.display()))
    }
}

/// RFC 3339 with offset, or a naive ISO timestamp taken as local time.
fn parse_timestamp(s: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).earliest()
}
