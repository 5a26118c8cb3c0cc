use chrono::{DateTime, Local};

use super::adapter::{SchedulerAdapter, next_occurrence, run_command, to_local};
use super::validate::ScheduleTime;

/// Trailing comment that identifies the talkbut line in the user's crontab.
pub const MARKER: &str = "# TalkBut automated daily logging";

/// Scheduler backed by the user's crontab (`crontab -l` / `crontab -`).
pub struct CronScheduler {
    program: String,
    base_args: Vec<String>,
}

impl CronScheduler {
    pub fn new() -> Self {
        Self {
            program: "crontab".to_string(),
            base_args: Vec::new(),
        }
    }

    #[cfg(test)]
    fn with_program(program: &str, base_args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            base_args: base_args.iter().map(|a| a.to_string()).collect(),
        }
    }

    async fn crontab(&self, arg: &str, stdin: Option<&str>) -> std::io::Result<std::process::Output> {
        let mut args: Vec<&str> = self.base_args.iter().map(String::as_str).collect();
        args.push(arg);
        run_command(&self.program, &args, stdin).await
    }

    /// Current table, `Ok(None)` when the user has no crontab at all.
    async fn read_table(&self) -> std::io::Result<Option<String>> {
        let output = self.crontab("-l", None).await?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
        } else {
            Ok(None)
        }
    }

    async fn write_table(&self, table: &str) -> bool {
        match self.crontab("-", Some(table)).await {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                tracing::warn!(
                    "crontab rejected new table: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                tracing::warn!("Failed to run crontab: {e}");
                false
            }
        }
    }

    /// `crontab -r`. A table that is already gone counts as removed.
    async fn clear_table(&self) -> bool {
        match self.crontab("-r", None).await {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if stderr.to_lowercase().contains("no crontab") {
                    return true;
                }
                tracing::warn!("crontab -r failed: {}", stderr.trim());
                false
            }
            Err(e) => {
                tracing::warn!("Failed to run crontab: {e}");
                false
            }
        }
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SchedulerAdapter for CronScheduler {
    async fn create_job(&self, time: ScheduleTime, command: &str) -> bool {
        let current = match self.read_table().await {
            Ok(table) => table.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to run crontab: {e}");
                return false;
            }
        };
        self.write_table(&with_job(&current, time, command)).await
    }

    async fn remove_job(&self) -> bool {
        let current = match self.read_table().await {
            Ok(Some(table)) => table,
            Ok(None) => return true,
            Err(e) => {
                tracing::warn!("Failed to run crontab: {e}");
                return false;
            }
        };

        let remaining = without_job(&current);
        if remaining.is_empty() {
            return self.clear_table().await;
        }
        self.write_table(&format!("{remaining}\n")).await
    }

    async fn job_exists(&self) -> bool {
        matches!(self.read_table().await, Ok(Some(table)) if table.contains(MARKER))
    }

    async fn next_run(&self) -> Option<DateTime<Local>> {
        let table = self.read_table().await.ok()??;
        let (hour, minute) = scheduled_time(&table)?;
        to_local(next_occurrence(Local::now().naive_local(), hour, minute)?)
    }
}

/// The table with every talkbut line removed, trimmed, without a trailing newline.
pub fn without_job(table: &str) -> String {
    table
        .lines()
        .filter(|line| !line.contains(MARKER))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// The table with exactly one talkbut line, appended after the user's own entries.
pub fn with_job(table: &str, time: ScheduleTime, command: &str) -> String {
    let mut out = without_job(table);
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!(
        "{} {} * * * {command} {MARKER}\n",
        time.minute, time.hour
    ));
    out
}

/// `(hour, minute)` from the talkbut line's first two cron fields.
pub fn scheduled_time(table: &str) -> Option<(u32, u32)> {
    let line = table.lines().find(|line| line.contains(MARKER))?;
    let mut fields = line.split_whitespace();
    let minute: u32 = fields.next()?.parse().ok()?;
    let hour: u32 = fields.next()?.parse().ok()?;
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMD: &str = "/usr/local/bin/talkbut --config /home/me/.talkbut/config.toml run";

    fn t(hour: u32, minute: u32) -> ScheduleTime {
        ScheduleTime { hour, minute }
    }

    #[test]
    fn test_with_job_on_empty_table() {
        let table = with_job("", t(18, 5), CMD);
        assert_eq!(table, format!("5 18 * * * {CMD} {MARKER}\n"));
    }

    #[test]
    fn test_with_job_keeps_user_lines_and_replaces_old_job() {
        let existing = format!(
            "MAILTO=me\n0 * * * * backup.sh\n30 9 * * * old-command {MARKER}\n"
        );
        let table = with_job(&existing, t(7, 45), CMD);
        assert!(table.starts_with("MAILTO=me\n0 * * * * backup.sh\n"));
        assert_eq!(table.matches(MARKER).count(), 1);
        assert!(!table.contains("old-command"));
        assert!(table.contains("45 7 * * * "));
    }

    #[test]
    fn test_with_job_is_idempotent() {
        let once = with_job("0 1 * * * other\n", t(9, 0), CMD);
        let twice = with_job(&once, t(9, 0), CMD);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_without_job() {
        let table = format!("0 1 * * * other\n5 18 * * * {CMD} {MARKER}\n");
        assert_eq!(without_job(&table), "0 1 * * * other");
        assert_eq!(without_job(&format!("5 18 * * * x {MARKER}\n")), "");
    }

    #[test]
    fn test_scheduled_time() {
        let table = with_job("0 1 * * * other\n", t(6, 7), CMD);
        assert_eq!(scheduled_time(&table), Some((6, 7)));
        assert_eq!(scheduled_time("0 1 * * * other\n"), None);
        assert_eq!(scheduled_time(&format!("* 1 * * * x {MARKER}")), None);
        assert_eq!(scheduled_time(&format!("0 25 * * * x {MARKER}")), None);
    }

    #[cfg(unix)]
    mod with_fake_crontab {
        use super::*;
        use std::path::Path;

        /// Shell script that emulates crontab, storing the table next to itself.
        fn fake_crontab(dir: &Path) -> CronScheduler {
            let script = dir.join("crontab.sh");
            std::fs::write(
                &script,
                r#"TAB="$(dirname "$0")/table"
case "$1" in
  -l) [ -f "$TAB" ] || { echo "no crontab for user" >&2; exit 1; }; cat "$TAB" ;;
  -r) rm -f "$TAB" ;;
  -) cat > "$TAB" ;;
  *) exit 2 ;;
esac
"#,
            )
            .unwrap();
            CronScheduler::with_program("sh", &[script.to_str().unwrap()])
        }

        #[tokio::test]
        async fn test_create_query_remove_cycle() {
            let dir = tempfile::tempdir().unwrap();
            let cron = fake_crontab(dir.path());

            assert!(!cron.job_exists().await);
            assert!(cron.next_run().await.is_none());
            assert!(cron.remove_job().await, "removing with no table is a no-op");

            assert!(cron.create_job(t(9, 30), CMD).await);
            assert!(cron.job_exists().await);
            let next = cron.next_run().await.unwrap();
            assert_eq!(next.format("%H:%M").to_string(), "09:30");

            assert!(cron.create_job(t(10, 15), CMD).await);
            let table = std::fs::read_to_string(dir.path().join("table")).unwrap();
            assert_eq!(table.matches(MARKER).count(), 1);
            assert!(table.contains("15 10 * * *"));

            assert!(cron.remove_job().await);
            assert!(!cron.job_exists().await);
            assert!(!dir.path().join("table").exists());
        }

        #[tokio::test]
        async fn test_remove_keeps_foreign_lines() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("table"), "0 3 * * * nightly.sh\n").unwrap();
            let cron = fake_crontab(dir.path());

            assert!(cron.create_job(t(18, 0), CMD).await);
            assert!(cron.remove_job().await);

            let table = std::fs::read_to_string(dir.path().join("table")).unwrap();
            assert_eq!(table, "0 3 * * * nightly.sh\n");
        }

        #[tokio::test]
        async fn test_failed_table_removal_is_false() {
            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("crontab.sh");
            std::fs::write(
                &script,
                r#"case "$1" in
  -l) echo "0 9 * * * talkbut-run # TalkBut automated daily logging" ;;
  -r) echo "crontab: permission denied" >&2; exit 1 ;;
  *) exit 2 ;;
esac
"#,
            )
            .unwrap();
            let cron = CronScheduler::with_program("sh", &[script.to_str().unwrap()]);

            assert!(cron.job_exists().await);
            assert!(!cron.remove_job().await);
        }

        #[tokio::test]
        async fn test_missing_binary_is_false() {
            let cron = CronScheduler::with_program("talkbut-no-such-crontab", &[]);
            assert!(!cron.create_job(t(9, 0), CMD).await);
            assert!(!cron.remove_job().await);
            assert!(!cron.job_exists().await);
            assert!(cron.next_run().await.is_none());
        }
    }
}
