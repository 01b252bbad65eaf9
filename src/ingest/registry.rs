//! Shared job collection and the aggregate completion signal.

use crate::ingest::types::{Job, JobState};
use std::sync::Mutex;
use tokio::sync::watch;

/// Holds the current job set for the active batch.
///
/// The registry is the only resource shared between upload workers and status
/// pollers. All mutation goes through [`JobRegistry::update`], which applies
/// forward-only state transitions and republishes the aggregate "in progress"
/// signal after every change. The lock is never held across an await.
pub struct JobRegistry {
    jobs: Mutex<Vec<Job>>,
    in_progress: watch::Sender<bool>,
}

impl JobRegistry {
    /// Create an empty registry; with no jobs, nothing is in progress.
    pub fn new() -> Self {
        let (in_progress, _) = watch::channel(false);
        Self {
            jobs: Mutex::new(Vec::new()),
            in_progress,
        }
    }

    /// Atomically replace the whole job set with a new batch.
    pub fn replace_all(&self, jobs: Vec<Job>) {
        let all_terminal = {
            let mut guard = self.jobs.lock().expect("job registry lock poisoned");
            *guard = jobs;
            guard.iter().all(|job| job.state.is_terminal())
        };
        self.in_progress.send_replace(!all_terminal);
    }

    /// Advance one job's state, recording a diagnostic on failure.
    ///
    /// Updates that do not move forward in the state order, target a job
    /// already in a terminal state, or reference an id absent from the
    /// registry are ignored. Returns whether the update was applied.
    pub fn update(&self, job_id: &str, state: JobState, error: Option<String>) -> bool {
        let (applied, all_terminal) = {
            let mut guard = self.jobs.lock().expect("job registry lock poisoned");
            let applied = match guard.iter_mut().find(|job| job.id == job_id) {
                Some(job) if state.rank() > job.state.rank() => {
                    job.state = state;
                    if state == JobState::Failed {
                        job.last_error = error;
                    }
                    true
                }
                _ => false,
            };
            (applied, guard.iter().all(|job| job.state.is_terminal()))
        };
        if applied {
            self.in_progress.send_replace(!all_terminal);
        }
        applied
    }

    /// True iff every job in the registry is `Completed` or `Failed`.
    ///
    /// Vacuously true for an empty registry.
    pub fn all_terminal(&self) -> bool {
        self.jobs
            .lock()
            .expect("job registry lock poisoned")
            .iter()
            .all(|job| job.state.is_terminal())
    }

    /// Clone the current job records for rendering or inspection.
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs
            .lock()
            .expect("job registry lock poisoned")
            .clone()
    }

    /// Look up one job by id.
    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.jobs
            .lock()
            .expect("job registry lock poisoned")
            .iter()
            .find(|job| job.id == job_id)
            .cloned()
    }

    /// Subscribe to the aggregate "in progress" indicator (`!all_terminal`).
    pub fn watch_in_progress(&self) -> watch::Receiver<bool> {
        self.in_progress.subscribe()
    }

    /// Wait until every job in the registry has reached a terminal state.
    pub async fn wait_all_terminal(&self) {
        let mut rx = self.in_progress.subscribe();
        // wait_for returns immediately when the current value already matches
        let _ = rx.wait_for(|in_progress| !*in_progress).await;
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
