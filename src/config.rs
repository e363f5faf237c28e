use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jira: JiraConfig,
    pub trackit: TrackitConfig,
    pub database: DatabaseConfig,
    /// Directory holding one sub-directory of attachments per work order number.
    pub attachment_folder: PathBuf,
    /// Priority name -> business days until due.
    #[serde(default)]
    pub due_date_days: HashMap<String, u32>,
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_diagnostics_file")]
    pub diagnostics_file: PathBuf,
    pub history_file: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Deadline for a single attachment upload.
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
    pub url: String,
    pub project_key: String,
    pub username: String,
    pub api_token: String,
    #[serde(default = "default_reporter")]
    pub reporter: String,
    /// Only this project receives the "Change Request" issue type.
    #[serde(default = "default_change_request_project")]
    pub change_request_project: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackitConfig {
    pub url: String,
    pub api_username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub query: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_diagnostics_file() -> PathBuf {
    PathBuf::from("traceback.txt")
}

fn default_poll_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_upload_timeout() -> u64 {
    3600
}

fn default_reporter() -> String {
    "api".into()
}

fn default_change_request_project() -> String {
    "CRQ".into()
}

fn default_page_size() -> u32 {
    1000
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trackit-jira")
}

pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Invalid config {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).context("Failed to parse config TOML")?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    fn validate(&self) -> Result<()> {
        if self.jira.project_key.trim().is_empty() {
            bail!("jira.project_key must not be empty");
        }
        if self.jira.page_size == 0 {
            bail!("jira.page_size must be greater than zero");
        }
        if self.database.query.trim().is_empty() {
            bail!("database.query must not be empty");
        }
        Ok(())
    }
}
