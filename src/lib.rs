#![deny(missing_docs)]

//! Core library for the docflow ingestion client.

/// Environment-driven configuration management.
pub mod config;
/// Upload orchestration: presign, transfer, confirm, and status polling.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload metrics helpers.
pub mod metrics;
