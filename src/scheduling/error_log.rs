use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat};

/// Append one `[timestamp] message (date: ...)` line to the plain-text error log.
pub fn append_error(path: &Path, message: &str, date_attempted: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open error log: {}", path.display()))?;
    file.write_all(format_entry(Local::now(), message, date_attempted).as_bytes())
        .with_context(|| format!("Failed to write error log: {}", path.display()))
}

fn format_entry(timestamp: DateTime<Local>, message: &str, date_attempted: Option<&str>) -> String {
    let mut line = format!(
        "[{}] {}",
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, false),
        message.replace('\n', " ")
    );
    if let Some(date) = date_attempted {
        line.push_str(&format!(" (date: {date})"));
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_entry_with_and_without_date() {
        let ts = Local.with_ymd_and_hms(2025, 6, 10, 18, 0, 5).unwrap();
        let with = format_entry(ts, "API failure: timeout", Some("2025-06-10"));
        assert!(with.starts_with("[2025-06-10T18:00:05"));
        assert!(with.ends_with("] API failure: timeout (date: 2025-06-10)\n"));

        let without = format_entry(ts, "bad config", None);
        assert!(without.ends_with("] bad config\n"));
        assert!(!without.contains("(date:"));
    }

    #[test]
    fn test_multiline_message_stays_on_one_line() {
        let ts = Local.with_ymd_and_hms(2025, 6, 10, 18, 0, 0).unwrap();
        let entry = format_entry(ts, "first\nsecond", None);
        assert_eq!(entry.lines().count(), 1);
    }

    #[test]
    fn test_append_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/errors.log");
        append_error(&path, "one", None).unwrap();
        append_error(&path, "two", Some("2025-06-09")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] one"));
        assert!(lines[1].ends_with("] two (date: 2025-06-09)"));
    }
}
