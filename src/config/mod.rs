// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Environment variable supplying the default project identifier.
pub const PROJECT_ENV_VAR: &str = "GOOGLE_CLOUD_PROJECT";

/// Prefix for setting overrides, e.g. `INGESTION_POLL__MAX_INTERVAL_MS`.
pub const ENV_PREFIX: &str = "INGESTION";

/// Resolve settings from an optional config file (YAML or JSON), `INGESTION_*`
/// variables, `GOOGLE_CLOUD_PROJECT` and the CLI project flag.
pub fn load_settings(path: Option<&Path>, cli_project: Option<String>) -> Result<Settings> {
    load_settings_with_env(path, cli_project, std::env::var(PROJECT_ENV_VAR).ok())
}

/// Same as [`load_settings`] with the `GOOGLE_CLOUD_PROJECT` value passed in.
pub fn load_settings_with_env(
    path: Option<&Path>,
    cli_project: Option<String>,
    env_project: Option<String>,
) -> Result<Settings> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = path {
        debug!("Loading configuration from: {}", path.display());
        builder = builder.add_source(::config::File::from(path));
    }

    let raw = builder
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("Failed to read configuration")?;

    let mut settings: Settings = raw
        .try_deserialize()
        .context("Failed to parse configuration")?;

    // CLI flag, then file/INGESTION_PROJECT, then GOOGLE_CLOUD_PROJECT.
    // A blank value at any level falls through to the next one.
    settings.project = non_blank(cli_project)
        .or_else(|| non_blank(settings.project.take()))
        .or_else(|| non_blank(env_project));

    settings.validate()?;
    Ok(settings)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
