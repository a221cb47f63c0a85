// src/config/models.rs
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::warehouse::TableRef;

pub const DEFAULT_DATASET: &str = "core";
pub const DEFAULT_TABLE: &str = "fomc_statements";
pub const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com/";
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no project configured: pass --project or set GOOGLE_CLOUD_PROJECT")]
    MissingProject,

    #[error("invalid project identifier {0:?}")]
    InvalidProject(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("invalid poll settings: {0}")]
    InvalidPoll(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default = "default_dataset")]
    pub dataset: String,

    #[serde(default = "default_table")]
    pub table: String,

    /// Job location, e.g. "US" or "europe-west2"
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub bigquery: BigQueryConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BigQueryConfig {
    #[serde(default = "default_api_base")]
    pub api_base: Url,

    /// Per-request HTTP timeout. Unset means requests wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_metadata_host")]
    pub metadata_host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// node_exporter textfile collector target
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

fn default_dataset() -> String {
    DEFAULT_DATASET.to_string()
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_api_base() -> Url {
    Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL")
}

fn default_metadata_host() -> String {
    DEFAULT_METADATA_HOST.to_string()
}

fn default_initial_interval_ms() -> u64 {
    500
}

fn default_max_interval_ms() -> u64 {
    5_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: None,
            dataset: default_dataset(),
            table: default_table(),
            location: None,
            bigquery: BigQueryConfig::default(),
            auth: AuthConfig::default(),
            poll: PollConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_secs: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            metadata_host: default_metadata_host(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

impl PollConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

impl BigQueryConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Settings {
    /// Checks every field needed before talking to the warehouse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.project_id()?;

        if self.dataset.trim().is_empty() {
            return Err(ConfigError::EmptyField("dataset"));
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::EmptyField("table"));
        }

        if self.poll.initial_interval_ms == 0 {
            return Err(ConfigError::InvalidPoll(
                "initial_interval_ms must be positive".to_string(),
            ));
        }
        if self.poll.initial_interval_ms > self.poll.max_interval_ms {
            return Err(ConfigError::InvalidPoll(format!(
                "initial_interval_ms ({}) exceeds max_interval_ms ({})",
                self.poll.initial_interval_ms, self.poll.max_interval_ms
            )));
        }

        Ok(())
    }

    /// The validated, trimmed project identifier.
    pub fn project_id(&self) -> Result<&str, ConfigError> {
        let project = self
            .project
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingProject)?;

        if project.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidProject(project.to_string()));
        }

        Ok(project)
    }

    pub fn destination(&self) -> Result<TableRef, ConfigError> {
        Ok(TableRef::new(
            self.project_id()?,
            self.dataset.trim(),
            self.table.trim(),
        ))
    }
}
