//! Upload orchestration: presigned transfers, confirmation, and status polling.

pub mod client;
mod orchestrator;
pub mod poller;
pub mod registry;
pub mod types;
mod worker;

pub use client::{IngestApi, IngestClient};
pub use orchestrator::{UploadOptions, UploadOrchestrator};
pub use poller::StatusPoller;
pub use registry::JobRegistry;
pub use types::{
    DocumentSource, IngestError, Job, JobState, JobStatusReport, PresignGrant, QueryAnswer,
    SingleUploadReceipt,
};
pub use worker::UploadWorker;
