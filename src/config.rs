use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub git: GitConfig,
    /// Only required once a summary actually has to be generated.
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitConfig {
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub name: Option<String>,
    pub path: PathBuf,
}

impl RepositoryConfig {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    /// Base URL for the API. Optional, each provider has a default.
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    /// Name of an environment variable holding the key, used when `api_key` is unset.
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key
            && !key.trim().is_empty()
        {
            return Some(key.clone());
        }
        let var = self.api_key_env.as_deref()?;
        std::env::var(var).ok().filter(|k| !k.trim().is_empty())
    }
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Daily logs older than this many days are pruned after a scheduled run. 0 keeps everything.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_schedule_time")]
    pub time: String,
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
    #[serde(default = "default_error_log")]
    pub error_log: PathBuf,
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: default_schedule_time(),
            status_file: default_status_file(),
            error_log: default_error_log(),
            max_errors: default_max_errors(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_schedule_time() -> String {
    "18:00".to_string()
}

fn default_status_file() -> PathBuf {
    default_base_dir().join("schedule_status.json")
}

fn default_error_log() -> PathBuf {
    default_base_dir().join("schedule_errors.log")
}

fn default_max_errors() -> usize {
    crate::scheduling::status::DEFAULT_MAX_ERRORS
}

fn default_max_retries() -> u32 {
    3
}

pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".talkbut")
}

fn default_log_dir() -> PathBuf {
    default_base_dir().join("logs")
}

pub fn load(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    config.expand_paths();
    Ok(config)
}

impl Config {
    fn expand_paths(&mut self) {
        for repo in &mut self.git.repositories {
            repo.path = expand_path(&repo.path);
        }
        self.storage.log_dir = expand_path(&self.storage.log_dir);
        self.schedule.status_file = expand_path(&self.schedule.status_file);
        self.schedule.error_log = expand_path(&self.schedule.error_log);
    }
}

/// Persist `schedule.enabled` (and optionally `schedule.time`) into the config file.
///
/// Edits go through `toml_edit` so comments and unrelated sections survive. The
/// edited document must still parse as a [`Config`] before it replaces the file.
pub fn set_schedule(path: &Path, enabled: bool, time: Option<&str>) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let mut doc: toml_edit::DocumentMut = content
        .parse()
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;

    let table = doc
        .entry("schedule")
        .or_insert_with(toml_edit::table)
        .as_table_mut()
        .context("[schedule] in config is not a table")?;
    table["enabled"] = toml_edit::value(enabled);
    if let Some(time) = time {
        table["time"] = toml_edit::value(time);
    }

    let text = doc.to_string();
    toml::from_str::<Config>(&text).context("Edited config is invalid")?;

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, text.as_bytes())
        .with_context(|| format!("Failed to write config: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace config: {}", path.display()))
}

pub async fn init_config_dir(config_path: &Path) -> Result<()> {
    let base = default_base_dir();
    tokio::fs::create_dir_all(base.join("logs")).await?;

    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if !config_path.exists() {
        tokio::fs::write(config_path, DEFAULT_CONFIG).await?;
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"[git]
# author = "you@example.com"
repositories = [
    # { name = "my-project", path = "~/code/my-project" },
]

[llm]
provider = "google"
# base_url = "https://generativelanguage.googleapis.com/v1beta/openai"  # optional, uses provider default
model = "gemini-2.0-flash"
api_key_env = "GEMINI_API_KEY"
max_tokens = 2000

# Other provider examples:
# provider = "openai"
# model = "gpt-4o-mini"
#
# provider = "anthropic"
# model = "claude-sonnet-4-5-20250929"

[storage]
log_dir = "~/.talkbut/logs"
# Delete daily logs older than N days after each scheduled run. 0 keeps everything.
retention_days = 0

[schedule]
enabled = false
time = "18:00"
status_file = "~/.talkbut/schedule_status.json"
error_log = "~/.talkbut/schedule_errors.log"
max_errors = 50
max_retries = 3
"#;

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_tilde(s),
        None => path.to_path_buf(),
    }
}
