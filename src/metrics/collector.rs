// src/metrics/collector.rs
use anyhow::{Context, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }

    /// Write the exposition for the node_exporter textfile collector.
    /// Goes through a temp file and rename so scrapes never see a partial file.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let metrics = self.gather()?;
        let tmp = path.with_extension("prom.tmp");

        std::fs::write(&tmp, metrics)
            .with_context(|| format!("Failed to write metrics to {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move metrics into {}", path.display()))?;

        tracing::debug!("Wrote metrics textfile {}", path.display());
        Ok(())
    }

    /// Like [`write_textfile`](Self::write_textfile), but a failure is only logged.
    pub fn export_textfile(&self, path: &Path) -> bool {
        match self.write_textfile(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Metrics textfile not written: {:#}", e);
                false
            }
        }
    }
}

pub struct MetricsCollector {
    pub rows_written_total: IntCounterVec,
    pub failures_total: IntCounterVec,
    pub load_duration_seconds: Histogram,
    pub last_success_timestamp_seconds: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let rows_written_total = IntCounterVec::new(
            Opts::new(
                "ingestion_healthcheck_rows_written_total",
                "Health-check rows acknowledged by the warehouse",
            ),
            &["destination"],
        )?;
        registry.register(Box::new(rows_written_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new(
                "ingestion_healthcheck_failures_total",
                "Failed health-check writes",
            ),
            &["destination"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let load_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "ingestion_healthcheck_load_duration_seconds",
            "Time from load submission to job completion",
        ))?;
        registry.register(Box::new(load_duration_seconds.clone()))?;

        let last_success_timestamp_seconds = IntGauge::new(
            "ingestion_healthcheck_last_success_timestamp_seconds",
            "Unix time of the last successful health-check write",
        )?;
        registry.register(Box::new(last_success_timestamp_seconds.clone()))?;

        Ok(Self {
            rows_written_total,
            failures_total,
            load_duration_seconds,
            last_success_timestamp_seconds,
        })
    }

    pub fn record_success(&self, destination: &str, rows: u64, duration: std::time::Duration) {
        self.rows_written_total
            .with_label_values(&[destination])
            .inc_by(rows);

        self.load_duration_seconds.observe(duration.as_secs_f64());

        self.last_success_timestamp_seconds
            .set(chrono::Utc::now().timestamp());
    }

    pub fn record_failure(&self, destination: &str, duration: std::time::Duration) {
        self.failures_total
            .with_label_values(&[destination])
            .inc();

        self.load_duration_seconds.observe(duration.as_secs_f64());
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
