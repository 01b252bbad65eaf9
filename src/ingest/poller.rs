//! Per-job status polling until a terminal state is observed.

use crate::ingest::client::IngestApi;
use crate::ingest::registry::JobRegistry;
use crate::ingest::types::JobState;
use crate::metrics::UploadMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Polls server-reported status for one confirmed job on a fixed cadence.
///
/// The polling lifetime is bounded three ways: the job's own terminal
/// transition, the batch cancellation token, and a maximum attempt count
/// after which the job is forced to `Failed` with a timeout diagnostic.
/// A transient request error is a no-op for that tick.
pub struct StatusPoller<A: IngestApi + ?Sized> {
    api: Arc<A>,
    registry: Arc<JobRegistry>,
    metrics: Arc<UploadMetrics>,
    job_id: String,
    interval: Duration,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl<A: IngestApi + ?Sized> StatusPoller<A> {
    /// Build a poller for one confirmed job.
    pub fn new(
        api: Arc<A>,
        registry: Arc<JobRegistry>,
        metrics: Arc<UploadMetrics>,
        job_id: String,
        interval: Duration,
        max_attempts: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            registry,
            metrics,
            job_id,
            interval,
            max_attempts,
            cancel,
        }
    }

    /// Run the polling loop until the job terminates, the token is
    /// cancelled, or the attempt ceiling is reached.
    pub async fn run(self) {
        // First poll fires one full interval after confirmation.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);

        for attempt in 1..=self.max_attempts {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(job_id = %self.job_id, "Polling cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            self.metrics.record_poll();
            match self.api.job_status(&self.job_id).await {
                Ok(report) => match report.status.as_str() {
                    "completed" => {
                        if self.registry.update(&self.job_id, JobState::Completed, None) {
                            self.metrics.record_completed();
                        }
                        tracing::info!(job_id = %self.job_id, attempt, "Job completed");
                        return;
                    }
                    "failed" => {
                        let diagnostic = report
                            .error
                            .unwrap_or_else(|| "server reported ingestion failure".to_string());
                        if self.registry.update(
                            &self.job_id,
                            JobState::Failed,
                            Some(diagnostic),
                        ) {
                            self.metrics.record_failed();
                        }
                        tracing::warn!(job_id = %self.job_id, attempt, "Job failed server-side");
                        return;
                    }
                    other => {
                        self.registry.update(&self.job_id, JobState::Processing, None);
                        tracing::debug!(job_id = %self.job_id, status = other, "Job still processing");
                    }
                },
                Err(err) => {
                    tracing::warn!(
                        job_id = %self.job_id,
                        attempt,
                        error = %err,
                        "Status poll failed; retrying next tick"
                    );
                }
            }
        }

        let diagnostic = format!(
            "status polling timed out after {} attempts",
            self.max_attempts
        );
        tracing::warn!(job_id = %self.job_id, "{diagnostic}");
        if self
            .registry
            .update(&self.job_id, JobState::Failed, Some(diagnostic))
        {
            self.metrics.record_failed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{
        IngestError, Job, JobStatusReport, PresignGrant, SingleUploadReceipt,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Replays a scripted sequence of status responses; the last entry
    /// repeats once the script is exhausted.
    struct ScriptedStatus {
        script: Mutex<VecDeque<Result<JobStatusReport, IngestError>>>,
        calls: AtomicU64,
    }

    impl ScriptedStatus {
        fn new(script: Vec<Result<JobStatusReport, IngestError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU64::new(0),
            })
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn report(status: &str) -> Result<JobStatusReport, IngestError> {
        Ok(JobStatusReport {
            status: status.to_string(),
            error: None,
        })
    }

    fn transient() -> Result<JobStatusReport, IngestError> {
        Err(IngestError::UnexpectedStatus {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "gateway hiccup".into(),
        })
    }

    #[async_trait]
    impl IngestApi for ScriptedStatus {
        async fn presign_batch(
            &self,
            _filenames: &[String],
        ) -> Result<Vec<PresignGrant>, IngestError> {
            unimplemented!("not exercised by poller tests")
        }

        async fn transfer(
            &self,
            _upload_url: &str,
            _content: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), IngestError> {
            unimplemented!("not exercised by poller tests")
        }

        async fn confirm(&self, _job_id: &str, _s3_key: &str) -> Result<(), IngestError> {
            unimplemented!("not exercised by poller tests")
        }

        async fn job_status(&self, _job_id: &str) -> Result<JobStatusReport, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().expect("script lock");
            if script.len() > 1 {
                script.pop_front().expect("entry")
            } else {
                clone_entry(script.front().expect("script must not be empty"))
            }
        }

        async fn upload_single(
            &self,
            _filename: &str,
            _content: Vec<u8>,
            _content_type: &str,
        ) -> Result<SingleUploadReceipt, IngestError> {
            unimplemented!("not exercised by poller tests")
        }
    }

    fn clone_entry(
        entry: &Result<JobStatusReport, IngestError>,
    ) -> Result<JobStatusReport, IngestError> {
        match entry {
            Ok(report) => Ok(report.clone()),
            Err(_) => transient(),
        }
    }

    fn confirmed_registry() -> Arc<JobRegistry> {
        let registry = Arc::new(JobRegistry::new());
        registry.replace_all(vec![Job {
            id: "a".into(),
            filename: "doc.pdf".into(),
            s3_key: Some("k1".into()),
            state: JobState::Confirmed,
            last_error: None,
        }]);
        registry
    }

    fn poller(
        api: Arc<ScriptedStatus>,
        registry: Arc<JobRegistry>,
        max_attempts: u32,
        cancel: CancellationToken,
    ) -> StatusPoller<ScriptedStatus> {
        StatusPoller::new(
            api,
            registry,
            Arc::new(UploadMetrics::new()),
            "a".into(),
            Duration::from_secs(2),
            max_attempts,
            cancel,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_terminal_status_with_exact_poll_count() {
        let api = ScriptedStatus::new(vec![
            report("processing"),
            report("processing"),
            report("completed"),
        ]);
        let registry = confirmed_registry();
        assert!(!registry.all_terminal());

        poller(api.clone(), registry.clone(), 50, CancellationToken::new())
            .run()
            .await;

        assert_eq!(api.calls(), 3);
        assert_eq!(registry.job("a").expect("job").state, JobState::Completed);
        assert!(registry.all_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_carries_server_diagnostic() {
        let api = ScriptedStatus::new(vec![Ok(JobStatusReport {
            status: "failed".into(),
            error: Some("unreadable pdf".into()),
        })]);
        let registry = confirmed_registry();

        poller(api.clone(), registry.clone(), 50, CancellationToken::new())
            .run()
            .await;

        assert_eq!(api.calls(), 1);
        let job = registry.job("a").expect("job");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("unreadable pdf"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retry_on_the_next_tick() {
        let api = ScriptedStatus::new(vec![
            transient(),
            report("processing"),
            report("completed"),
        ]);
        let registry = confirmed_registry();

        poller(api.clone(), registry.clone(), 50, CancellationToken::new())
            .run()
            .await;

        assert_eq!(api.calls(), 3);
        assert_eq!(registry.job("a").expect("job").state, JobState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_ceiling_forces_timeout_failure() {
        let api = ScriptedStatus::new(vec![report("processing")]);
        let registry = confirmed_registry();

        poller(api.clone(), registry.clone(), 3, CancellationToken::new())
            .run()
            .await;

        assert_eq!(api.calls(), 3);
        let job = registry.job("a").expect("job");
        assert_eq!(job.state, JobState::Failed);
        assert!(
            job.last_error
                .as_deref()
                .expect("diagnostic")
                .contains("timed out after 3 attempts")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling_without_touching_state() {
        let api = ScriptedStatus::new(vec![report("processing")]);
        let registry = confirmed_registry();
        let cancel = CancellationToken::new();
        cancel.cancel();

        poller(api.clone(), registry.clone(), 50, cancel).run().await;

        assert_eq!(api.calls(), 0);
        assert_eq!(registry.job("a").expect("job").state, JobState::Confirmed);
    }
}
