use serde::Serialize;

/// OS scheduler backend available on the running machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    Cron,
    TaskScheduler,
    Unsupported,
}

impl SchedulerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cron => "cron",
            Self::TaskScheduler => "task_scheduler",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn detect() -> SchedulerKind {
    from_os(std::env::consts::OS)
}

fn from_os(os: &str) -> SchedulerKind {
    match os {
        "linux" | "macos" | "freebsd" | "openbsd" | "netbsd" => SchedulerKind::Cron,
        "windows" => SchedulerKind::TaskScheduler,
        _ => SchedulerKind::Unsupported,
    }
}
