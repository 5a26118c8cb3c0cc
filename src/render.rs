use anyhow::Result;

use crate::logs::DailyLog;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
    Text,
}

pub fn render(log: &DailyLog, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Json => serde_json::to_string_pretty(log)?,
        ReportFormat::Markdown => markdown(log),
        ReportFormat::Text => text(log),
    })
}

fn markdown(log: &DailyLog) -> String {
    let s = &log.stats;
    let mut out = format!("# Daily Log: {}\n\n{}\n\n", log.date, log.summary);
    out.push_str(&format!(
        "## Stats\n\n- Commits: {}\n- Files changed: {}\n- Lines: +{} / -{}\n",
        s.commits, s.files, s.insertions, s.deletions
    ));
    if !log.categories.is_empty() {
        out.push_str("\n## Categories\n\n");
        for (name, count) in &log.categories {
            out.push_str(&format!("- {name}: {count}\n"));
        }
    }
    if !log.highlights.is_empty() {
        out.push_str("\n## Highlights\n\n");
        for h in &log.highlights {
            out.push_str(&format!("- {h}\n"));
        }
    }
    out
}

fn text(log: &DailyLog) -> String {
    let s = &log.stats;
    let mut lines = vec![
        format!("Daily Log {}", log.date),
        log.summary.clone(),
        format!(
            "{} commit(s), {} file(s), +{} -{}",
            s.commits, s.files, s.insertions, s.deletions
        ),
    ];
    if !log.categories.is_empty() {
        let cats: Vec<String> = log.categories.iter().map(|(k, v)| format!("{k}={v}")).collect();
        lines.push(format!("Categories: {}", cats.join(", ")));
    }
    lines.extend(log.highlights.iter().map(|h| format!("* {h}")));
    lines.join("\n")
}
