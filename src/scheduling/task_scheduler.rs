use chrono::{DateTime, Local, NaiveDateTime};

use super::adapter::{SchedulerAdapter, next_occurrence, run_command, to_local};
use super::validate::ScheduleTime;

pub const TASK_NAME: &str = "TalkButDailyLog";

const NEXT_RUN_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Scheduler backed by Windows Task Scheduler through `schtasks`.
pub struct TaskScheduler {
    program: String,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self {
            program: "schtasks".to_string(),
        }
    }

    async fn schtasks(&self, args: &[&str]) -> Option<std::process::Output> {
        match run_command(&self.program, args, None).await {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!("Failed to run {}: {e}", self.program);
                None
            }
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SchedulerAdapter for TaskScheduler {
    async fn create_job(&self, time: ScheduleTime, command: &str) -> bool {
        let start = time.to_string();
        let args = [
            "/Create", "/SC", "DAILY", "/TN", TASK_NAME, "/TR", command, "/ST", &start, "/F",
        ];
        match self.schtasks(&args).await {
            Some(output) if output.status.success() => true,
            Some(output) => {
                tracing::warn!(
                    "schtasks /Create failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            None => false,
        }
    }

    async fn remove_job(&self) -> bool {
        let Some(output) = self.schtasks(&["/Delete", "/TN", TASK_NAME, "/F"]).await else {
            return false;
        };
        output.status.success()
            || String::from_utf8_lossy(&output.stderr)
                .to_lowercase()
                .contains("cannot find")
    }

    async fn job_exists(&self) -> bool {
        self.schtasks(&["/Query", "/TN", TASK_NAME])
            .await
            .is_some_and(|output| output.status.success())
    }

    async fn next_run(&self) -> Option<DateTime<Local>> {
        let output = self
            .schtasks(&["/Query", "/TN", TASK_NAME, "/V", "/FO", "LIST"])
            .await?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        to_local(parse_next_run(&text, Local::now().naive_local())?)
    }
}

/// Next run from verbose `schtasks /Query` output.
///
/// Reads the "Next Run Time" field, falling back to the daily "Start Time"
/// when the former is missing or in an unknown locale format.
pub fn parse_next_run(output: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let next_run = field(output, "Next Run Time:").and_then(|value| {
        NEXT_RUN_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    });
    if next_run.is_some() {
        return next_run;
    }

    let start = field(output, "Start Time:")?;
    let (hour, rest) = start.split_once(':')?;
    let mut hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = rest.get(..2)?.parse().ok()?;
    let upper = rest.to_ascii_uppercase();
    if upper.ends_with("PM") && hour < 12 {
        hour += 12;
    } else if upper.ends_with("AM") && hour == 12 {
        hour = 0;
    }
    if hour > 23 || minute > 59 {
        return None;
    }
    next_occurrence(now, hour, minute)
}

fn field<'a>(output: &'a str, label: &str) -> Option<&'a str> {
    output
        .lines()
        .find(|line| line.contains(label))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim())
}
