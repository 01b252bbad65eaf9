use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload activity.
#[derive(Default)]
pub struct UploadMetrics {
    batches_submitted: AtomicU64,
    documents_submitted: AtomicU64,
    documents_completed: AtomicU64,
    documents_failed: AtomicU64,
    status_polls: AtomicU64,
}

impl UploadMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted batch and the number of documents it carries.
    pub fn record_batch(&self, document_count: u64) {
        self.batches_submitted.fetch_add(1, Ordering::Relaxed);
        self.documents_submitted
            .fetch_add(document_count, Ordering::Relaxed);
    }

    /// Record a document that reached the `Completed` state.
    pub fn record_completed(&self) {
        self.documents_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a document that reached the `Failed` state.
    pub fn record_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one issued status poll request.
    pub fn record_poll(&self) {
        self.status_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            documents_submitted: self.documents_submitted.load(Ordering::Relaxed),
            documents_completed: self.documents_completed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            status_polls: self.status_polls.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of upload counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of batches submitted since startup.
    pub batches_submitted: u64,
    /// Total documents submitted across all batches.
    pub documents_submitted: u64,
    /// Documents that reached the `Completed` state.
    pub documents_completed: u64,
    /// Documents that reached the `Failed` state.
    pub documents_failed: u64,
    /// Status poll requests issued across all jobs.
    pub status_polls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_batches_and_outcomes() {
        let metrics = UploadMetrics::new();
        metrics.record_batch(3);
        metrics.record_completed();
        metrics.record_completed();
        metrics.record_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_submitted, 1);
        assert_eq!(snapshot.documents_submitted, 3);
        assert_eq!(snapshot.documents_completed, 2);
        assert_eq!(snapshot.documents_failed, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let metrics = UploadMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_submitted, 0);
        assert_eq!(snapshot.status_polls, 0);
    }
}
