// src/main.rs
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use ingestion::{
    config,
    health::run_health_check,
    metrics::MetricsRegistry,
    warehouse::BigQueryClient,
};

/// Append a health-check row to the FOMC statements table.
#[derive(Parser, Debug)]
#[command(name = "ingestion", version, about)]
struct Args {
    /// Target project; defaults to GOOGLE_CLOUD_PROJECT
    #[arg(short, long)]
    project: Option<String>,

    /// Optional YAML or JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "ingestion=debug"
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only the confirmation line
    let filter = match args.log_level.as_deref() {
        Some(level) => tracing_subscriber::EnvFilter::try_new(level)?,
        None => tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("ingestion=info".parse()?),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = config::load_settings(args.config.as_deref(), args.project)?;
    let destination = settings.destination()?;
    info!("Writing health check to {}", destination);

    let metrics = MetricsRegistry::new()?;
    let client = BigQueryClient::new(&destination.project, &settings)?;

    let report = run_health_check(
        &client,
        &destination,
        &metrics,
        settings.metrics.textfile.as_deref(),
    )
    .await?;
    println!("{}", report);

    Ok(())
}
