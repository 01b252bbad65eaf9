//! Per-file upload pipeline: transfer the raw bytes, then confirm server-side.

use crate::ingest::client::IngestApi;
use crate::ingest::registry::JobRegistry;
use crate::ingest::types::{JobState, PresignGrant};
use crate::metrics::UploadMetrics;
use std::sync::Arc;

/// Executes one job's transfer and confirmation steps.
///
/// Every failure path resolves the job to a terminal state; a job is never
/// left stranded in `Uploading`. Workers are independent of each other.
pub struct UploadWorker<A: IngestApi + ?Sized> {
    api: Arc<A>,
    registry: Arc<JobRegistry>,
    metrics: Arc<UploadMetrics>,
    grant: PresignGrant,
    content: Vec<u8>,
    content_type: String,
}

impl<A: IngestApi + ?Sized> UploadWorker<A> {
    /// Build a worker for one presigned job.
    pub fn new(
        api: Arc<A>,
        registry: Arc<JobRegistry>,
        metrics: Arc<UploadMetrics>,
        grant: PresignGrant,
        content: Vec<u8>,
        content_type: String,
    ) -> Self {
        Self {
            api,
            registry,
            metrics,
            grant,
            content,
            content_type,
        }
    }

    /// Run the transfer and confirmation steps.
    ///
    /// Returns `true` when the job reached `Confirmed` and is eligible for
    /// status polling.
    pub async fn run(self) -> bool {
        let Self {
            api,
            registry,
            metrics,
            grant,
            content,
            content_type,
        } = self;

        registry.update(&grant.job_id, JobState::Uploading, None);

        if let Err(err) = api.transfer(&grant.upload_url, content, &content_type).await {
            tracing::warn!(job_id = %grant.job_id, error = %err, "Transfer failed");
            if registry.update(
                &grant.job_id,
                JobState::Failed,
                Some(format!("transfer failed: {err}")),
            ) {
                metrics.record_failed();
            }
            return false;
        }

        if let Err(err) = api.confirm(&grant.job_id, &grant.s3_key).await {
            // The object may be orphaned in storage; the job still terminates locally.
            tracing::warn!(job_id = %grant.job_id, error = %err, "Confirmation failed");
            if registry.update(
                &grant.job_id,
                JobState::Failed,
                Some(format!("confirmation failed: {err}")),
            ) {
                metrics.record_failed();
            }
            return false;
        }

        registry.update(&grant.job_id, JobState::Confirmed, None);
        tracing::debug!(job_id = %grant.job_id, "Upload confirmed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{IngestError, Job, JobStatusReport, SingleUploadReceipt};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted API stub recording calls and failing on demand.
    struct StubApi {
        fail_transfer: bool,
        fail_confirm: bool,
        confirms: Mutex<Vec<(String, String)>>,
    }

    impl StubApi {
        fn new(fail_transfer: bool, fail_confirm: bool) -> Self {
            Self {
                fail_transfer,
                fail_confirm,
                confirms: Mutex::new(Vec::new()),
            }
        }

        fn refused() -> IngestError {
            IngestError::UnexpectedStatus {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "refused".into(),
            }
        }
    }

    #[async_trait]
    impl IngestApi for StubApi {
        async fn presign_batch(
            &self,
            _filenames: &[String],
        ) -> Result<Vec<PresignGrant>, IngestError> {
            unimplemented!("not exercised by worker tests")
        }

        async fn transfer(
            &self,
            _upload_url: &str,
            _content: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), IngestError> {
            if self.fail_transfer {
                Err(Self::refused())
            } else {
                Ok(())
            }
        }

        async fn confirm(&self, job_id: &str, s3_key: &str) -> Result<(), IngestError> {
            self.confirms
                .lock()
                .expect("lock")
                .push((job_id.to_string(), s3_key.to_string()));
            if self.fail_confirm {
                Err(Self::refused())
            } else {
                Ok(())
            }
        }

        async fn job_status(&self, _job_id: &str) -> Result<JobStatusReport, IngestError> {
            unimplemented!("not exercised by worker tests")
        }

        async fn upload_single(
            &self,
            _filename: &str,
            _content: Vec<u8>,
            _content_type: &str,
        ) -> Result<SingleUploadReceipt, IngestError> {
            unimplemented!("not exercised by worker tests")
        }
    }

    fn harness(api: Arc<StubApi>) -> (UploadWorker<StubApi>, Arc<JobRegistry>) {
        let registry = Arc::new(JobRegistry::new());
        let grant = PresignGrant {
            job_id: "a".into(),
            s3_key: "k1".into(),
            upload_url: "http://storage/u1".into(),
        };
        registry.replace_all(vec![Job::from_grant(&grant, "doc.pdf")]);
        let worker = UploadWorker::new(
            api,
            registry.clone(),
            Arc::new(UploadMetrics::new()),
            grant,
            b"%PDF-1.4".to_vec(),
            "application/pdf".into(),
        );
        (worker, registry)
    }

    #[tokio::test]
    async fn successful_pipeline_reaches_confirmed() {
        let api = Arc::new(StubApi::new(false, false));
        let (worker, registry) = harness(api.clone());

        assert!(worker.run().await);
        let job = registry.job("a").expect("job");
        assert_eq!(job.state, JobState::Confirmed);
        assert_eq!(
            api.confirms.lock().expect("lock").as_slice(),
            &[("a".to_string(), "k1".to_string())]
        );
    }

    #[tokio::test]
    async fn transfer_failure_terminates_without_confirming() {
        let api = Arc::new(StubApi::new(true, false));
        let (worker, registry) = harness(api.clone());

        assert!(!worker.run().await);
        let job = registry.job("a").expect("job");
        assert_eq!(job.state, JobState::Failed);
        assert!(
            job.last_error
                .as_deref()
                .expect("diagnostic")
                .starts_with("transfer failed")
        );
        assert!(api.confirms.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn confirm_failure_still_terminates_the_job() {
        let api = Arc::new(StubApi::new(false, true));
        let (worker, registry) = harness(api);

        assert!(!worker.run().await);
        let job = registry.job("a").expect("job");
        assert_eq!(job.state, JobState::Failed);
        assert!(
            job.last_error
                .as_deref()
                .expect("diagnostic")
                .starts_with("confirmation failed")
        );
    }
}
