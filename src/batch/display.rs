use super::{BatchResult, Outcome, ProcessResult};

const RULE: &str = "============================================================";

pub fn format_start(total_dates: usize, since: &str, until: Option<&str>) -> String {
    format!(
        "Batch Processing\n   Total dates: {total_dates}\n   Range: {since} to {}\n",
        until.unwrap_or("today")
    )
}

/// One line per date: `[i/N] YYYY-MM-DD - ...`.
pub fn format_progress(index: usize, total: usize, result: &ProcessResult) -> String {
    let prefix = format!("[{index}/{total}] {}", result.date.format("%Y-%m-%d"));
    match &result.outcome {
        Outcome::Skipped => format!("{prefix} - Skipped (log already exists)"),
        Outcome::Processed { commits, changed } => {
            let commits = match commits {
                0 => "no commits".to_string(),
                n => format!("{n} commit(s)"),
            };
            let unchanged = if *changed { "" } else { ", unchanged" };
            format!("{prefix} - Processed ({commits}{unchanged})")
        }
        Outcome::Failed(error) => format!("{prefix} - Failed: {error}"),
    }
}

pub fn format_summary(result: &BatchResult) -> String {
    let mut lines = vec![
        String::new(),
        RULE.to_string(),
        "Batch Processing Summary".to_string(),
        RULE.to_string(),
        format!("Total dates:  {}", result.total_dates),
        format!("Processed:    {}", result.processed.len()),
        format!("Skipped:      {}", result.skipped.len()),
        format!("Failed:       {}", result.failed.len()),
        format!("Duration:     {:.2}s", result.duration.as_secs_f64()),
    ];

    if !result.failed.is_empty() {
        lines.push(String::new());
        lines.push("Failed Dates:".to_string());
        for (date, error) in &result.failed {
            lines.push(format!("   - {}: {error}", date.format("%Y-%m-%d")));
        }
    }
    if !result.processed.is_empty() {
        lines.push(String::new());
        lines.push(format!("Successfully processed {} date(s)", result.processed.len()));
    }
    lines.push(RULE.to_string());
    lines.join("\n")
}
