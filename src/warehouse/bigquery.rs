// src/warehouse/bigquery.rs
use super::{JobState, LoadJob, RowBatch, TableRef, TokenSource, WarehouseClient, WarehouseError};
use crate::config::Settings;
use crate::poll::PollStrategy;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// BigQuery v2 REST client submitting multipart load jobs.
pub struct BigQueryClient {
    project: String,
    location: Option<String>,
    api_base: Url,
    http: Client,
    token: TokenSource,
    poll: PollStrategy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: Option<JobStatus>,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    // int64 values are encoded as JSON strings
    #[serde(default)]
    output_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl BigQueryClient {
    /// Build a client bound to `project`, using the endpoint, credential and
    /// polling settings from `settings`.
    pub fn new(project: &str, settings: &Settings) -> Result<Self, WarehouseError> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.bigquery.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            project: project.to_string(),
            location: settings.location.clone(),
            api_base: settings.bigquery.api_base.clone(),
            http: builder.build()?,
            token: TokenSource::from_config(&settings.auth)?,
            poll: PollStrategy::new(settings.poll.clone()),
        })
    }

    /// Replace the credential source, e.g. with a static token.
    pub fn with_token_source(mut self, token: TokenSource) -> Self {
        self.token = token;
        self
    }

    fn upload_url(&self) -> Result<Url, WarehouseError> {
        let mut url = self.api_base.join(&format!(
            "upload/bigquery/v2/projects/{}/jobs",
            self.project
        ))?;
        url.query_pairs_mut().append_pair("uploadType", "multipart");
        Ok(url)
    }

    fn job_url(&self, job: &LoadJob) -> Result<Url, WarehouseError> {
        let mut url = self.api_base.join(&format!(
            "bigquery/v2/projects/{}/jobs/{}",
            job.project, job.job_id
        ))?;
        if let Some(location) = &job.location {
            url.query_pairs_mut().append_pair("location", location);
        }
        Ok(url)
    }

    fn load_job_body(&self, job_id: &str, destination: &TableRef) -> serde_json::Value {
        let mut job_reference = json!({
            "projectId": self.project,
            "jobId": job_id,
        });
        if let Some(location) = &self.location {
            job_reference["location"] = json!(location);
        }

        json!({
            "jobReference": job_reference,
            "configuration": {
                "load": {
                    "destinationTable": destination.to_json(),
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": "WRITE_APPEND",
                    "createDisposition": "CREATE_NEVER",
                }
            }
        })
    }

    async fn fetch_job(&self, job: &LoadJob) -> Result<LoadJob, WarehouseError> {
        let token = self.token.token(&self.http).await?;
        let response = self
            .http
            .get(self.job_url(job)?)
            .bearer_auth(token)
            .send()
            .await?;

        let resource: JobResource = Self::parse(response).await?;
        Self::into_load_job(resource)
    }

    async fn parse(response: Response) -> Result<JobResource, WarehouseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);

        Err(WarehouseError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn into_load_job(resource: JobResource) -> Result<LoadJob, WarehouseError> {
        let reference = resource.job_reference;
        let status = resource.status;

        if let Some(error) = status.as_ref().and_then(|s| s.error_result.as_ref()) {
            return Err(WarehouseError::JobFailed {
                job_id: reference.job_id,
                reason: error.reason.clone().unwrap_or_else(|| "unknown".to_string()),
                message: error.message.clone().unwrap_or_default(),
            });
        }

        let output_rows = resource
            .statistics
            .and_then(|s| s.load)
            .and_then(|l| l.output_rows)
            .and_then(|rows| rows.parse().ok());

        Ok(LoadJob {
            project: reference.project_id,
            job_id: reference.job_id,
            location: reference.location,
            state: status
                .map(|s| JobState::parse(&s.state))
                .unwrap_or(JobState::Pending),
            output_rows,
        })
    }
}

/// Encode a `multipart/related` upload: job metadata followed by the rows.
fn multipart_related(boundary: &str, metadata: &serde_json::Value, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    async fn submit_load(
        &self,
        destination: &TableRef,
        rows: &RowBatch,
    ) -> Result<LoadJob, WarehouseError> {
        let job_id = format!("healthcheck_{}", Uuid::new_v4().simple());
        let boundary = format!("ingestion_{}", Uuid::new_v4().simple());
        let metadata = self.load_job_body(&job_id, destination);
        let body = multipart_related(&boundary, &metadata, rows.as_bytes());

        debug!(
            "Submitting load job {} ({} rows) to {}",
            job_id,
            rows.len(),
            destination
        );

        let token = self.token.token(&self.http).await?;
        let response = self
            .http
            .post(self.upload_url()?)
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let job = Self::into_load_job(Self::parse(response).await?)?;
        info!("Load job {} submitted, state {:?}", job.job_id, job.state);
        Ok(job)
    }

    async fn wait_for_completion(&self, job: &LoadJob) -> Result<LoadJob, WarehouseError> {
        if job.is_done() {
            return Ok(job.clone());
        }

        self.poll
            .wait_until(|| async {
                let current = self.fetch_job(job).await?;
                Ok::<_, WarehouseError>(current.is_done().then_some(current))
            })
            .await
    }
}
