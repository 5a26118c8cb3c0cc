mod batch;
mod collect;
mod config;
mod dates;
mod llm;
mod logs;
mod render;
mod runner;
mod scheduling;
mod summarize;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use batch::BatchProcessor;
use collect::GitCommitSource;
use render::ReportFormat;
use scheduling::display::format_status;
use scheduling::validate::validate_time;
use scheduling::{SchedulerManager, StatusStore};

#[derive(Parser)]
#[command(
    name = "talkbut",
    version,
    about = "Daily work logs from your git history"
)]
struct Cli {
    #[arg(short, long, env = "TALKBUT_CONFIG", default_value = "~/.talkbut/config.toml")]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create ~/.talkbut with a default config
    Init,
    /// Generate today's log (this is what the scheduled job runs)
    Run {
        /// Attempts for retryable summarizer failures (default: schedule.max_retries)
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Manage the automated daily schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Backfill logs for a range of dates
    Batch {
        /// Start date: YYYY-MM-DD, today, yesterday, "N days ago", "N weeks ago"
        #[arg(long)]
        since: String,
        /// End date (default: today)
        #[arg(long)]
        until: Option<String>,
        /// Regenerate logs that already exist
        #[arg(long)]
        force: bool,
        /// Only include commits by this author (default: git.author)
        #[arg(long)]
        author: Option<String>,
    },
    /// Print a stored daily log
    Show {
        #[arg(default_value = "today")]
        date: String,
        #[arg(long, value_enum, default_value_t)]
        format: ReportFormat,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Install the daily job
    Enable {
        /// Time in HH:MM (24-hour)
        #[arg(short, long)]
        time: String,
    },
    /// Remove the daily job
    Disable,
    /// Change the time of the installed job
    Update {
        /// Time in HH:MM (24-hour)
        #[arg(short, long)]
        time: String,
    },
    /// Show schedule state, last/next run and recent errors
    Status,
    /// Forget recorded run errors
    ClearErrors,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(&cli.config);
    match cli.command {
        Commands::Init => {
            config::init_config_dir(&config_path).await?;
            tracing::info!("Initialized {}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { max_retries } => {
            let code = runner::run_scheduled(&config_path, max_retries).await;
            Ok(exit_code(code == 0))
        }
        Commands::Schedule { action } => schedule(&config_path, action).await,
        Commands::Batch {
            since,
            until,
            force,
            author,
        } => batch(&config_path, &since, until.as_deref(), force, author.as_deref()).await,
        Commands::Show { date, format } => {
            let cfg = config::load(&config_path)?;
            let date = dates::parse(&date, Local::now().date_naive())?;
            let store = logs::LogStore::new(&cfg.storage.log_dir);
            match store.read(date)? {
                Some(log) => {
                    println!("{}", render::render(&log, format)?);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("No daily log for {date}. Try 'talkbut batch --since {date}'.");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Expanded and absolute, since the scheduled job embeds it in its command line.
fn resolve_config_path(raw: &str) -> PathBuf {
    let path = config::expand_tilde(raw);
    std::path::absolute(&path).unwrap_or(path)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn schedule(config_path: &Path, action: ScheduleAction) -> Result<ExitCode> {
    let cfg = config::load(config_path)
        .context("Run 'talkbut init' to create a config first")?;
    let status = StatusStore::new(&cfg.schedule.status_file, cfg.schedule.max_errors);
    let manager = SchedulerManager::new(config_path, Some(status.clone()));

    match action {
        ScheduleAction::Enable { time } => {
            if !check_time(&time) {
                return Ok(ExitCode::FAILURE);
            }
            if manager.is_enabled().await {
                println!("Automated logging is already enabled.");
                println!("Use 'talkbut schedule update --time HH:MM' to change the time.");
                return Ok(ExitCode::SUCCESS);
            }
            println!("Enabling automated daily logging at {time}...");
            if !manager.enable(&time).await {
                eprintln!("Failed to enable automated logging on {}.", manager.platform());
                eprintln!("Please check that you have permission to create scheduled tasks.");
                return Ok(ExitCode::FAILURE);
            }
            config::set_schedule(config_path, true, Some(&time))?;
            println!("Automated logging enabled. Schedule: daily at {time}");
            print_next_run(&manager).await;
        }
        ScheduleAction::Disable => {
            if !manager.is_enabled().await {
                println!("Automated logging is already disabled.");
                return Ok(ExitCode::SUCCESS);
            }
            println!("Disabling automated daily logging...");
            if !manager.disable().await {
                eprintln!("Failed to disable automated logging.");
                eprintln!("Please check that you have permission to remove scheduled tasks.");
                return Ok(ExitCode::FAILURE);
            }
            config::set_schedule(config_path, false, None)?;
            println!("Automated logging disabled.");
        }
        ScheduleAction::Update { time } => {
            if !check_time(&time) {
                return Ok(ExitCode::FAILURE);
            }
            if !manager.is_enabled().await {
                println!("Automated logging is not enabled.");
                println!("Use 'talkbut schedule enable --time HH:MM' to enable it first.");
                return Ok(ExitCode::SUCCESS);
            }
            println!("Updating schedule to {time}...");
            if !manager.update(&time).await {
                eprintln!("Failed to update schedule.");
                eprintln!("Please check that you have permission to modify scheduled tasks.");
                return Ok(ExitCode::FAILURE);
            }
            config::set_schedule(config_path, true, Some(&time))?;
            println!("Schedule updated. New schedule: daily at {time}");
            print_next_run(&manager).await;
        }
        ScheduleAction::Status => {
            println!("{}", format_status(&manager.status().await));
        }
        ScheduleAction::ClearErrors => {
            status.clear_errors()?;
            println!("Cleared recorded errors.");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn check_time(time: &str) -> bool {
    match validate_time(time) {
        Ok(_) => true,
        Err(e) => {
            eprintln!("Invalid time format: {e}");
            false
        }
    }
}

async fn print_next_run(manager: &SchedulerManager) {
    if let Some(next) = manager.status().await.next_run {
        println!("  Next run: {}", next.format("%Y-%m-%d %H:%M:%S"));
    }
}

async fn batch(
    config_path: &Path,
    since: &str,
    until: Option<&str>,
    force: bool,
    author: Option<&str>,
) -> Result<ExitCode> {
    let cfg = config::load(config_path)?;
    let summarizer = summarize::from_config(cfg.llm.as_ref());
    let processor = BatchProcessor::new(&cfg, Arc::new(GitCommitSource::new()), summarizer);

    let today = Local::now().date_naive();
    let total = dates::expand(since, until, today)?.len();
    println!("{}", batch::display::format_start(total, since, until));

    let result = processor
        .process_date_range(since, until, today, force, author, |i, n, r| {
            println!("{}", batch::display::format_progress(i, n, r))
        })
        .await?;
    println!("{}", batch::display::format_summary(&result));
    Ok(exit_code(!result.has_failures()))
}
