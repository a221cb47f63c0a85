// src/health/writer.rs
use super::record::HealthCheckRecord;
use crate::metrics::{MetricsCollector, MetricsRegistry, Timer};
use crate::warehouse::{TableRef, WarehouseClient, WarehouseError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Writes one health-check row through an injected warehouse client.
pub struct HealthCheckWriter<'a> {
    client: &'a dyn WarehouseClient,
    metrics: Option<Arc<MetricsCollector>>,
}

/// Outcome of an acknowledged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub destination: TableRef,
    pub job_id: String,
    pub rows: u64,
}

impl fmt::Display for WriteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.rows == 1 { "row" } else { "rows" };
        write!(f, "wrote {} {} -> {}", self.rows, noun, self.destination)
    }
}

impl<'a> HealthCheckWriter<'a> {
    pub fn new(client: &'a dyn WarehouseClient, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self { client, metrics }
    }

    /// Build today's record, load it into `destination` and wait for the job.
    pub async fn write(&self, destination: &TableRef) -> Result<WriteReport, WarehouseError> {
        let timer = Timer::new();
        let label = destination.to_string();

        let result = self.submit_and_wait(destination).await;

        match &result {
            Ok(report) => {
                info!("Health check written to {} by job {}", label, report.job_id);
                if let Some(metrics) = &self.metrics {
                    metrics.record_success(&label, report.rows, timer.elapsed());
                }
            }
            Err(e) => {
                error!("Health check write to {} failed: {}", label, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(&label, timer.elapsed());
                }
            }
        }

        result
    }

    async fn submit_and_wait(&self, destination: &TableRef) -> Result<WriteReport, WarehouseError> {
        let record = HealthCheckRecord::today();
        let batch = record.into_batch()?;

        let job = self.client.submit_load(destination, &batch).await?;
        let job = self.client.wait_for_completion(&job).await?;

        Ok(WriteReport {
            destination: destination.clone(),
            rows: job.output_rows.unwrap_or(batch.len() as u64),
            job_id: job.job_id,
        })
    }
}

/// Write the health check, then export metrics to `textfile` if set.
/// The write's own result is returned whatever happens to the export.
pub async fn run_health_check(
    client: &dyn WarehouseClient,
    destination: &TableRef,
    metrics: &MetricsRegistry,
    textfile: Option<&Path>,
) -> Result<WriteReport, WarehouseError> {
    let result = HealthCheckWriter::new(client, Some(metrics.collector()))
        .write(destination)
        .await;

    if let Some(path) = textfile {
        metrics.export_textfile(path);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{JobState, LoadJob, RowBatch};
    use async_trait::async_trait;
    use chrono::Local;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeWarehouse {
        submitted: Mutex<Vec<(TableRef, RowBatch)>>,
        waited: Mutex<u32>,
        fail_submit: bool,
        fail_job: bool,
    }

    #[async_trait]
    impl WarehouseClient for FakeWarehouse {
        async fn submit_load(
            &self,
            destination: &TableRef,
            rows: &RowBatch,
        ) -> Result<LoadJob, WarehouseError> {
            if self.fail_submit {
                return Err(WarehouseError::Api {
                    status: 403,
                    message: "Access Denied".into(),
                });
            }

            self.submitted
                .lock()
                .unwrap()
                .push((destination.clone(), rows.clone()));

            Ok(LoadJob {
                project: destination.project.clone(),
                job_id: "healthcheck_fake".into(),
                location: None,
                state: JobState::Pending,
                output_rows: None,
            })
        }

        async fn wait_for_completion(&self, job: &LoadJob) -> Result<LoadJob, WarehouseError> {
            *self.waited.lock().unwrap() += 1;

            if self.fail_job {
                return Err(WarehouseError::JobFailed {
                    job_id: job.job_id.clone(),
                    reason: "notFound".into(),
                    message: "Not found: Dataset acme:core".into(),
                });
            }

            Ok(LoadJob {
                state: JobState::Done,
                output_rows: Some(1),
                ..job.clone()
            })
        }
    }

    fn destination() -> TableRef {
        TableRef::new("acme", "core", "fomc_statements")
    }

    #[tokio::test]
    async fn test_writes_one_health_check_row() {
        let warehouse = FakeWarehouse::default();
        let writer = HealthCheckWriter::new(&warehouse, None);

        let report = writer.write(&destination()).await.unwrap();

        assert_eq!(report.to_string(), "wrote 1 row -> acme.core.fomc_statements");
        assert_eq!(report.job_id, "healthcheck_fake");
        assert_eq!(*warehouse.waited.lock().unwrap(), 1);

        let submitted = warehouse.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);

        let (table, batch) = &submitted[0];
        assert_eq!(table.to_string(), "acme.core.fomc_statements");
        assert_eq!(batch.len(), 1);

        let row: serde_json::Value = serde_json::from_str(batch.lines().next().unwrap()).unwrap();
        assert_eq!(row["section"], "HealthCheck");
        assert_eq!(row["text"], "ok");
        assert_eq!(
            row["publish_date"],
            Local::now().date_naive().format("%Y-%m-%d").to_string()
        );
    }

    #[tokio::test]
    async fn test_submit_error_propagates() {
        let warehouse = FakeWarehouse {
            fail_submit: true,
            ..FakeWarehouse::default()
        };
        let writer = HealthCheckWriter::new(&warehouse, None);

        let err = writer.write(&destination()).await.unwrap_err();

        assert!(matches!(err, WarehouseError::Api { status: 403, .. }));
        assert_eq!(*warehouse.waited.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_job_counts_as_failure() {
        let registry = MetricsRegistry::new().unwrap();
        let warehouse = FakeWarehouse {
            fail_job: true,
            ..FakeWarehouse::default()
        };
        let writer = HealthCheckWriter::new(&warehouse, Some(registry.collector()));

        let err = writer.write(&destination()).await.unwrap_err();
        assert!(matches!(err, WarehouseError::JobFailed { .. }));

        let collector = registry.collector();
        assert_eq!(
            collector
                .failures_total
                .with_label_values(&["acme.core.fomc_statements"])
                .get(),
            1
        );
        assert_eq!(
            collector
                .rows_written_total
                .with_label_values(&["acme.core.fomc_statements"])
                .get(),
            0
        );
    }

    #[tokio::test]
    async fn test_broken_textfile_keeps_confirmation() {
        let registry = MetricsRegistry::new().unwrap();
        let warehouse = FakeWarehouse::default();

        let report = run_health_check(
            &warehouse,
            &destination(),
            &registry,
            Some(Path::new("/nonexistent_dir/ingestion.prom")),
        )
        .await
        .unwrap();

        assert_eq!(report.to_string(), "wrote 1 row -> acme.core.fomc_statements");
    }

    #[tokio::test]
    async fn test_broken_textfile_keeps_warehouse_error() {
        let registry = MetricsRegistry::new().unwrap();
        let warehouse = FakeWarehouse {
            fail_submit: true,
            ..FakeWarehouse::default()
        };

        let err = run_health_check(
            &warehouse,
            &destination(),
            &registry,
            Some(Path::new("/nonexistent_dir/ingestion.prom")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WarehouseError::Api { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_textfile_written_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingestion.prom");
        let registry = MetricsRegistry::new().unwrap();
        let warehouse = FakeWarehouse::default();

        run_health_check(&warehouse, &destination(), &registry, Some(&path))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(
            "ingestion_healthcheck_rows_written_total{destination=\"acme.core.fomc_statements\"} 1"
        ));
    }

    #[tokio::test]
    async fn test_success_recorded_in_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let warehouse = FakeWarehouse::default();
        let writer = HealthCheckWriter::new(&warehouse, Some(registry.collector()));

        writer.write(&destination()).await.unwrap();

        let collector = registry.collector();
        assert_eq!(
            collector
                .rows_written_total
                .with_label_values(&["acme.core.fomc_statements"])
                .get(),
            1
        );
        assert!(collector.last_success_timestamp_seconds.get() > 0);
    }
}
