use std::path::Path;

use chrono::DateTime;
use tokio::process::Command;

use super::{CollectError, CommitRecord, CommitSource, TimeWindow};

const RECORD_START: char = '\u{1e}';
const FIELD_SEP: char = '\u{1f}';
const HEADER_END: char = '\u{1d}';

/// Hash, author name, author email, strict ISO author date, raw body.
const LOG_FORMAT: &str = "--format=%x1e%H%x1f%an%x1f%ae%x1f%aI%x1f%B%x1d";
const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reads history by shelling out to the `git` executable.
pub struct GitCommitSource {
    program: String,
}

impl GitCommitSource {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl Default for GitCommitSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CommitSource for GitCommitSource {
    async fn collect(
        &self,
        repo: &Path,
        window: &TimeWindow,
        author: Option<&str>,
    ) -> Result<Vec<CommitRecord>, CollectError> {
        if !repo.is_dir() {
            return Err(CollectError::NotARepository(repo.to_path_buf()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg("-C")
            .arg(repo)
            .args(["log", "--no-merges", "--numstat", "--date=iso-strict", LOG_FORMAT])
            .arg(format!("--since={}", window.since.format(WINDOW_FORMAT)))
            .arg(format!("--until={}", window.until.format(WINDOW_FORMAT)));
        if let Some(author) = author {
            cmd.arg(format!("--author={author}"));
        }

        let output = cmd.output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            // An empty repository has no HEAD yet and therefore no commits.
            if stderr.contains("does not have any commits yet") {
                return Ok(Vec::new());
            }
            if stderr.contains("not a git repository") {
                return Err(CollectError::NotARepository(repo.to_path_buf()));
            }
            return Err(CollectError::Git {
                repo: repo.to_path_buf(),
                message: stderr.trim().to_string(),
            });
        }

        parse_log(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse `git log --numstat` output produced with [`LOG_FORMAT`].
pub fn parse_log(output: &str) -> Result<Vec<CommitRecord>, CollectError> {
    output
        .split(RECORD_START)
        .filter(|chunk| !chunk.trim().is_empty())
        .map(parse_record)
        .collect()
}

fn parse_record(chunk: &str) -> Result<CommitRecord, CollectError> {
    let (header, numstat) = chunk
        .split_once(HEADER_END)
        .ok_or_else(|| CollectError::Parse(format!("missing header terminator in {chunk:?}")))?;

    let mut fields = header.splitn(5, FIELD_SEP);
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| CollectError::Parse(format!("missing {name} in {header:?}")))
    };
    let hash = next("hash")?.trim().to_string();
    let author = next("author")?.to_string();
    let email = next("email")?.to_string();
    let date = next("date")?;
    let message = next("message")?.trim().to_string();

    let timestamp = DateTime::parse_from_rfc3339(date.trim())
        .map_err(|e| CollectError::Parse(format!("bad date {date:?}: {e}")))?;

    let mut record = CommitRecord {
        hash,
        author,
        email,
        timestamp,
        message,
        files_changed: Vec::new(),
        insertions: 0,
        deletions: 0,
        repo_name: String::new(),
    };

    for line in numstat.lines().filter(|l| !l.trim().is_empty()) {
        let mut cols = line.splitn(3, '\t');
        let (Some(added), Some(removed), Some(path)) = (cols.next(), cols.next(), cols.next())
        else {
            continue;
        };
        // Binary files report "-" for both counts.
        record.insertions += added.parse::<u64>().unwrap_or(0);
        record.deletions += removed.parse::<u64>().unwrap_or(0);
        record.files_changed.push(path.to_string());
    }

    Ok(record)
}
