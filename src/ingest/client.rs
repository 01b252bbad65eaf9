//! HTTP client wrapper for the ingestion API.

use crate::config::get_config;
use crate::ingest::types::{
    IngestError, JobStatusReport, PresignGrant, QueryAnswer, SingleUploadReceipt,
};
use async_trait::async_trait;
use reqwest::{Client, Method, multipart};
use serde_json::json;

/// Boundary to the ingestion server consumed by workers, pollers, and the
/// orchestrator. Implemented by [`IngestClient`] for production use and by
/// scripted stubs in tests.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Request write grants for a batch of filenames in one round trip.
    ///
    /// The response carries one grant per filename, in input order.
    async fn presign_batch(&self, filenames: &[String]) -> Result<Vec<PresignGrant>, IngestError>;

    /// Transfer raw document bytes to a presigned upload endpoint.
    async fn transfer(
        &self,
        upload_url: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), IngestError>;

    /// Notify the server that a transfer finished, triggering processing.
    async fn confirm(&self, job_id: &str, s3_key: &str) -> Result<(), IngestError>;

    /// Fetch the server-reported status for one job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, IngestError>;

    /// Single-file degenerate path: multipart upload without a presign step.
    async fn upload_single(
        &self,
        filename: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<SingleUploadReceipt, IngestError>;
}

/// Lightweight HTTP client for the ingestion API.
pub struct IngestClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl IngestClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, IngestError> {
        Self::with_base_url(&get_config().ingest_api_url)
    }

    /// Construct a client against an explicit API base URL.
    pub fn with_base_url(url: &str) -> Result<Self, IngestError> {
        let client = Client::builder().user_agent("docflow/0.2").build()?;
        let base_url = normalize_base_url(url).map_err(IngestError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized ingest HTTP client");

        Ok(Self { client, base_url })
    }

    /// Ask a question against the ingested corpus.
    ///
    /// The query endpoint is an external collaborator; this wrapper only
    /// forwards the text and decodes `{answer, sources}`.
    pub async fn query(&self, query: &str) -> Result<QueryAnswer, IngestError> {
        let response = self
            .request(Method::POST, "query")
            .query(&[("query", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IngestError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Query request failed");
            return Err(error);
        }

        Ok(response.json().await?)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client.request(method, url)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), IngestError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IngestError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Ingest API request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl IngestApi for IngestClient {
    async fn presign_batch(&self, filenames: &[String]) -> Result<Vec<PresignGrant>, IngestError> {
        let response = self
            .request(Method::POST, "presign-batch")
            .json(&json!({ "filenames": filenames }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IngestError::UnexpectedStatus { status, body };
            tracing::error!(files = filenames.len(), error = %error, "Presign request failed");
            return Err(error);
        }

        let grants: Vec<PresignGrant> = response.json().await?;
        tracing::debug!(files = filenames.len(), grants = grants.len(), "Presign batch granted");
        Ok(grants)
    }

    async fn transfer(
        &self,
        upload_url: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), IngestError> {
        let byte_count = content.len();
        let response = self
            .client
            .put(upload_url)
            .header("Content-Type", content_type)
            .body(content)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(bytes = byte_count, "Transfer accepted by storage");
        })
        .await
    }

    async fn confirm(&self, job_id: &str, s3_key: &str) -> Result<(), IngestError> {
        let response = self
            .request(Method::POST, "confirm")
            .query(&[("job_id", job_id), ("s3_key", s3_key)])
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(job_id, s3_key, "Transfer confirmed");
        })
        .await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, IngestError> {
        let response = self
            .request(Method::GET, &format!("status/{job_id}"))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::UnexpectedStatus { status, body });
        }

        Ok(response.json().await?)
    }

    async fn upload_single(
        &self,
        filename: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<SingleUploadReceipt, IngestError> {
        let part = multipart::Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .request(Method::POST, "upload")
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IngestError::UnexpectedStatus { status, body };
            tracing::error!(filename, error = %error, "Single-file upload failed");
            return Err(error);
        }

        let receipt: SingleUploadReceipt = response.json().await?;
        tracing::debug!(filename, job_id = %receipt.job_id, "Single-file upload accepted");
        Ok(receipt)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
