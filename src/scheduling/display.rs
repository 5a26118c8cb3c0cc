use super::ScheduleStatus;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_status(status: &ScheduleStatus) -> String {
    let mut lines = vec![
        "=== Automated Daily Logging Status ===".to_string(),
        String::new(),
        format!("Platform: {}", status.platform),
    ];

    lines.push(if status.enabled {
        "Status: ENABLED ✓".to_string()
    } else {
        "Status: DISABLED".to_string()
    });
    lines.push(format!(
        "Schedule Time: {}",
        status.schedule_time.as_deref().unwrap_or("Not configured")
    ));
    lines.push(match status.last_run {
        Some(t) => format!("Last Run: {}", t.format(TIME_FORMAT)),
        None => "Last Run: Never".to_string(),
    });
    lines.push(match (status.next_run, status.enabled) {
        (Some(t), _) => format!("Next Run: {}", t.format(TIME_FORMAT)),
        (None, true) => "Next Run: Unable to determine".to_string(),
        (None, false) => "Next Run: N/A (disabled)".to_string(),
    });

    lines.push(String::new());
    if status.recent_errors.is_empty() {
        lines.push("Recent Errors: None".to_string());
    } else {
        lines.push("Recent Errors:".to_string());
        for (i, error) in status.recent_errors.iter().enumerate() {
            lines.push(format!(
                "  {}. [{}] {}",
                i + 1,
                error.timestamp.format(TIME_FORMAT),
                error.error_message
            ));
            if let Some(date) = &error.date_attempted {
                lines.push(format!("     Date attempted: {date}"));
            }
        }
    }

    lines.join("\n")
}
