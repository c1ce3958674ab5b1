use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use crate::error::PipelineError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub projects: BTreeMap<String, ProjectConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_summary_timeout")]
    pub summary_timeout_secs: u64,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// One monitored presale project on the portal.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub index_url: String,
    pub base_url: String,
    pub summary_url: String,
    pub building_suffix: String,
}

fn default_data_dir() -> String { "data".to_string() }
fn default_utc_offset() -> i32 { 8 }
fn default_timeout() -> u64 { 30 }
fn default_summary_timeout() -> u64 { 15 }
fn default_max_workers() -> usize { 5 }
fn default_request_delay() -> u64 { 300 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            summary_timeout_secs: default_summary_timeout(),
            max_workers: default_max_workers(),
            request_delay_ms: default_request_delay(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn summary_timeout(&self) -> Duration {
        Duration::from_secs(self.summary_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Worker count for the fetch pools; never zero.
    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: String,
    pub data_dir: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Apply environment overrides on top of the file values.
    pub fn with_env(mut self, env: &EnvConfig) -> Self {
        if let Some(dir) = &env.data_dir {
            self.system.data_dir = dir.clone();
        }
        self
    }

    pub fn project(&self, name: &str) -> Result<&ProjectConfig, PipelineError> {
        self.projects
            .get(name)
            .ok_or_else(|| PipelineError::UnknownProject(name.to_string()))
    }
}

impl EnvConfig {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        Self {
            config_path: std::env::var("PRESALE_CONFIG")
                .unwrap_or_else(|_| "config.toml".to_string()),
            data_dir: std::env::var("PRESALE_DATA_DIR").ok(),
        }
    }
}
