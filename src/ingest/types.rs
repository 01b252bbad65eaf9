//! Core data types and error definitions for the upload pipeline.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned while coordinating uploads with the ingestion API.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid ingest API URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Server responded with an unexpected status code.
    #[error("Unexpected ingest API response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the server.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A batch submission carried no documents.
    #[error("Batch must contain at least one document")]
    EmptyBatch,
    /// Presign response did not cover every submitted filename.
    #[error("Presign grant count mismatch: expected {expected}, got {actual}")]
    GrantCountMismatch {
        /// Number of filenames submitted for presigning.
        expected: usize,
        /// Number of grants returned by the server.
        actual: usize,
    },
}

/// Lifecycle state of one ingestion job.
///
/// States only advance forward through
/// `Pending → Uploading → Confirmed → Processing → {Completed, Failed}`;
/// `Completed` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Grant received, transfer not yet started.
    Pending,
    /// Raw bytes are being transferred to storage.
    Uploading,
    /// Transfer confirmed server-side; eligible for polling.
    Confirmed,
    /// Server reported the job as still in flight.
    Processing,
    /// Server reported successful ingestion.
    Completed,
    /// Transfer, confirmation, or server-side processing failed.
    Failed,
}

impl JobState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in the forward-only partial order; terminal states share the top rank.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Uploading => 1,
            Self::Confirmed => 2,
            Self::Processing => 3,
            Self::Completed | Self::Failed => 4,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One tracked unit of ingestion work for exactly one file.
#[derive(Debug, Clone)]
pub struct Job {
    /// Opaque identifier assigned by the server at presign time.
    pub id: String,
    /// Original client-side filename; display-only.
    pub filename: String,
    /// Server-assigned storage key; absent for the single-file degenerate path.
    pub s3_key: Option<String>,
    /// Current lifecycle state.
    pub state: JobState,
    /// Diagnostic recorded when the job fails.
    pub last_error: Option<String>,
}

impl Job {
    /// Create a job record from a presign grant, starting at `Pending`.
    pub fn from_grant(grant: &PresignGrant, filename: impl Into<String>) -> Self {
        Self {
            id: grant.job_id.clone(),
            filename: filename.into(),
            s3_key: Some(grant.s3_key.clone()),
            state: JobState::Pending,
            last_error: None,
        }
    }
}

/// Single-use write grant for one file, as returned by `POST /presign-batch`.
#[derive(Debug, Clone, Deserialize)]
pub struct PresignGrant {
    /// Job identifier assigned by the server.
    pub job_id: String,
    /// Storage key the confirmation step must reference.
    pub s3_key: String,
    /// Time-limited direct-upload endpoint, consumed exactly once.
    pub upload_url: String,
}

/// Server-reported job status, as returned by `GET /status/<job_id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusReport {
    /// Status vocabulary includes `completed` and `failed`; anything else
    /// means the job is still processing.
    pub status: String,
    /// Optional diagnostic recorded by the server for failed jobs.
    #[serde(default)]
    pub error: Option<String>,
}

/// Receipt for the single-file degenerate path (`POST /upload`).
#[derive(Debug, Clone, Deserialize)]
pub struct SingleUploadReceipt {
    /// Job identifier assigned by the server.
    pub job_id: String,
}

/// Answer returned by the query endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryAnswer {
    /// Generated answer text.
    pub answer: String,
    /// Source excerpts the answer was grounded on.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// A document staged for upload: its display name and raw content.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Client-side filename forwarded to the presign call.
    pub filename: String,
    /// Raw file bytes transferred to the presigned endpoint.
    pub content: Vec<u8>,
}
