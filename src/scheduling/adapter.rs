use std::process::{Output, Stdio};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::cron::CronScheduler;
use super::platform::SchedulerKind;
use super::task_scheduler::TaskScheduler;
use super::validate::ScheduleTime;

/// One named, recurring, daily OS trigger owned by talkbut.
///
/// Every operation is fallible but never raises: a missing scheduler binary,
/// a permission problem or an unreadable table all surface as `false`/`None`.
#[async_trait::async_trait]
pub trait SchedulerAdapter: Send + Sync {
    /// Install the trigger, replacing any previous talkbut trigger.
    async fn create_job(&self, time: ScheduleTime, command: &str) -> bool;
    /// Remove the trigger. Succeeds when nothing was installed.
    async fn remove_job(&self) -> bool;
    async fn job_exists(&self) -> bool;
    async fn next_run(&self) -> Option<DateTime<Local>>;
}

pub fn create_adapter(kind: SchedulerKind) -> Option<Box<dyn SchedulerAdapter>> {
    match kind {
        SchedulerKind::Cron => Some(Box::new(CronScheduler::new())),
        SchedulerKind::TaskScheduler => Some(Box::new(TaskScheduler::new())),
        SchedulerKind::Unsupported => None,
    }
}

/// Next wall-clock occurrence of `hour:minute` strictly after `now`.
pub fn next_occurrence(now: NaiveDateTime, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    let today = now.date().and_hms_opt(hour, minute, 0)?;
    if today > now {
        Some(today)
    } else {
        Some(today + TimeDelta::days(1))
    }
}

pub(crate) fn to_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&naive).earliest()
}

/// Run a scheduler CLI to completion, optionally feeding `stdin`.
pub(crate) async fn run_command(
    program: &str,
    args: &[&str],
    stdin: Option<&str>,
) -> std::io::Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = cmd.spawn()?;
    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        pipe.write_all(input.as_bytes()).await?;
        pipe.shutdown().await?;
    }
    child.wait_with_output().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_next_occurrence_later_today() {
        assert_eq!(next_occurrence(at(8, 0), 18, 30), Some(at(18, 30)));
    }

    #[test]
    fn test_next_occurrence_passed_rolls_to_tomorrow() {
        let next = next_occurrence(at(19, 0), 18, 30).unwrap();
        assert_eq!(next, at(18, 30) + TimeDelta::days(1));
    }

    #[test]
    fn test_next_occurrence_exact_time_rolls_to_tomorrow() {
        let next = next_occurrence(at(18, 30), 18, 30).unwrap();
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2025, 6, 11).unwrap());
    }

    #[test]
    fn test_next_occurrence_rejects_invalid_time() {
        assert_eq!(next_occurrence(at(8, 0), 24, 0), None);
    }

    #[test]
    fn test_unsupported_has_no_adapter() {
        assert!(create_adapter(SchedulerKind::Unsupported).is_none());
        assert!(create_adapter(SchedulerKind::Cron).is_some());
        assert!(create_adapter(SchedulerKind::TaskScheduler).is_some());
    }

    #[tokio::test]
    async fn test_run_command_missing_binary_is_error() {
        let result = run_command("talkbut-definitely-not-a-binary", &[], None).await;
        assert!(result.is_err());
    }
}
