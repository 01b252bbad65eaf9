//! Batch composition: presign fan-out, per-job pipelines, fan-in completion.

use crate::config::get_config;
use crate::ingest::client::IngestApi;
use crate::ingest::poller::StatusPoller;
use crate::ingest::registry::JobRegistry;
use crate::ingest::types::{DocumentSource, IngestError, Job, JobState};
use crate::ingest::worker::UploadWorker;
use crate::metrics::{MetricsSnapshot, UploadMetrics};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Tunable settings for a batch submission.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Cadence of status polls per job.
    pub poll_interval: Duration,
    /// Ceiling on status poll attempts per job before a forced failure.
    pub max_poll_attempts: u32,
    /// Content type declared on raw transfers and multipart uploads.
    pub content_type: String,
}

impl UploadOptions {
    /// Derive options from the process configuration, applying defaults.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.unwrap_or(2_000)),
            max_poll_attempts: config.poll_max_attempts.unwrap_or(300),
            content_type: config
                .upload_content_type
                .clone()
                .unwrap_or_else(|| "application/pdf".to_string()),
        }
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2_000),
            max_poll_attempts: 300,
            content_type: "application/pdf".to_string(),
        }
    }
}

/// Drives a full batch: presign, concurrent upload pipelines, and polling.
///
/// The orchestrator holds no job-specific logic. It owns the shared registry
/// and the current batch's cancellation token; submitting a new batch cancels
/// the previous batch's pollers before the registry is replaced, so stale
/// background polls never accumulate across repeated submissions.
pub struct UploadOrchestrator<A: IngestApi + ?Sized> {
    api: Arc<A>,
    registry: Arc<JobRegistry>,
    metrics: Arc<UploadMetrics>,
    options: UploadOptions,
    batch_cancel: Mutex<CancellationToken>,
}

impl<A: IngestApi + ?Sized + 'static> UploadOrchestrator<A> {
    /// Build an orchestrator around an API handle.
    pub fn new(api: Arc<A>, options: UploadOptions) -> Self {
        Self {
            api,
            registry: Arc::new(JobRegistry::new()),
            metrics: Arc::new(UploadMetrics::new()),
            options,
            batch_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Handle to the shared job registry.
    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// Current upload counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Cancel the active batch's pollers, e.g. on shutdown.
    pub fn cancel_all(&self) {
        self.batch_cancel
            .lock()
            .expect("batch token lock poisoned")
            .cancel();
    }

    /// Submit a batch of documents for ingestion.
    ///
    /// Requests grants for every filename in one round trip, populates the
    /// registry in input order, and spawns one pipeline task per job. Each
    /// pipeline runs its transfer and confirmation, then polls status until
    /// terminal. Returns the server-assigned job ids in input order; callers
    /// observe completion through the registry's aggregate signal.
    ///
    /// A presign failure aborts the whole batch before any job identity
    /// exists; per-job failures after that point stay local to their job.
    pub async fn submit_batch(
        &self,
        documents: Vec<DocumentSource>,
    ) -> Result<Vec<String>, IngestError> {
        if documents.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        let cancel = self.begin_batch();
        let filenames: Vec<String> = documents
            .iter()
            .map(|document| document.filename.clone())
            .collect();

        let grants = self.api.presign_batch(&filenames).await?;
        if grants.len() != documents.len() {
            return Err(IngestError::GrantCountMismatch {
                expected: documents.len(),
                actual: grants.len(),
            });
        }

        let jobs: Vec<Job> = grants
            .iter()
            .zip(&filenames)
            .map(|(grant, filename)| Job::from_grant(grant, filename.clone()))
            .collect();
        let job_ids: Vec<String> = jobs.iter().map(|job| job.id.clone()).collect();
        self.registry.replace_all(jobs);
        self.metrics.record_batch(documents.len() as u64);
        tracing::info!(documents = documents.len(), "Batch submitted");

        for (grant, document) in grants.into_iter().zip(documents) {
            let job_id = grant.job_id.clone();
            let worker = UploadWorker::new(
                self.api.clone(),
                self.registry.clone(),
                self.metrics.clone(),
                grant,
                document.content,
                self.options.content_type.clone(),
            );
            let poller = StatusPoller::new(
                self.api.clone(),
                self.registry.clone(),
                self.metrics.clone(),
                job_id,
                self.options.poll_interval,
                self.options.max_poll_attempts,
                cancel.clone(),
            );
            tokio::spawn(async move {
                if worker.run().await {
                    poller.run().await;
                }
            });
        }

        Ok(job_ids)
    }

    /// Degenerate single-file path: multipart upload without a presign step.
    ///
    /// The server stores the object and enqueues processing itself, so the
    /// job enters the registry at `Confirmed` and is polled like any other.
    pub async fn submit_single(&self, document: DocumentSource) -> Result<String, IngestError> {
        let cancel = self.begin_batch();
        let receipt = self
            .api
            .upload_single(
                &document.filename,
                document.content,
                &self.options.content_type,
            )
            .await?;

        self.registry.replace_all(vec![Job {
            id: receipt.job_id.clone(),
            filename: document.filename,
            s3_key: None,
            state: JobState::Confirmed,
            last_error: None,
        }]);
        self.metrics.record_batch(1);
        tracing::info!(job_id = %receipt.job_id, "Single-file upload submitted");

        let poller = StatusPoller::new(
            self.api.clone(),
            self.registry.clone(),
            self.metrics.clone(),
            receipt.job_id.clone(),
            self.options.poll_interval,
            self.options.max_poll_attempts,
            cancel,
        );
        tokio::spawn(poller.run());

        Ok(receipt.job_id)
    }

    /// Stop the previous batch's pollers and clear the registry.
    ///
    /// Clearing before the presign call means a batch-level failure leaves an
    /// empty registry rather than stale jobs from the replaced batch.
    fn begin_batch(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        {
            let mut guard = self.batch_cancel.lock().expect("batch token lock poisoned");
            guard.cancel();
            *guard = fresh.clone();
        }
        self.registry.replace_all(Vec::new());
        fresh
    }
}
