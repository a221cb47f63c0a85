// src/warehouse/mod.rs
mod auth;
mod batch;
mod bigquery;
mod table;

pub use auth::TokenSource;
pub use batch::RowBatch;
pub use bigquery::BigQueryClient;
pub use table::TableRef;

use async_trait::async_trait;

/// A managed analytical store that accepts append load jobs.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Submit `rows` as an append load into `destination`.
    async fn submit_load(
        &self,
        destination: &TableRef,
        rows: &RowBatch,
    ) -> Result<LoadJob, WarehouseError>;

    /// Block until the job is done. A job that finished with an error is
    /// reported as `WarehouseError::JobFailed`.
    async fn wait_for_completion(&self, job: &LoadJob) -> Result<LoadJob, WarehouseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done,
}

impl JobState {
    pub fn parse(state: &str) -> Self {
        match state {
            "DONE" => JobState::Done,
            "RUNNING" => JobState::Running,
            _ => JobState::Pending,
        }
    }
}

/// Handle to a submitted load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub project: String,
    pub job_id: String,
    pub location: Option<String>,
    pub state: JobState,
    pub output_rows: Option<u64>,
}

impl LoadJob {
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to serialize rows: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("credentials unavailable: {0}")]
    Auth(String),

    #[error("warehouse API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("load job {job_id} failed: {reason}: {message}")]
    JobFailed {
        job_id: String,
        reason: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_parse() {
        assert_eq!(JobState::parse("DONE"), JobState::Done);
        assert_eq!(JobState::parse("RUNNING"), JobState::Running);
        assert_eq!(JobState::parse("PENDING"), JobState::Pending);
    }

    #[test]
    fn test_job_failed_message() {
        let err = WarehouseError::JobFailed {
            job_id: "healthcheck_1".into(),
            reason: "notFound".into(),
            message: "Not found: Table acme:core.fomc_statements".into(),
        };
        assert_eq!(
            err.to_string(),
            "load job healthcheck_1 failed: notFound: Not found: Table acme:core.fomc_statements"
        );
    }
}
