//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{
    Classification, CrawlJob, DataPoint, Document, Fingerprint, Frequency, JobStatus,
    NewDocument, Source, SourceDraft,
};
use crate::storage::{DedupDecision, ItemCommit};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("An active source already monitors {0}")]
    DuplicateSource(String),

    #[error("Crawl job not found: {0}")]
    JobNotFound(i64),

    #[error("Crawl job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: i64,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Crawl job {0} is not running")]
    JobNotRunning(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every mutating method is one transaction: a status transition, a source
/// change, or one item's full ingestion together with its job counters.
pub trait Storage {
    // ===== Source Registry =====

    /// Registers a validated source draft
    ///
    /// Fails with [`StorageError::DuplicateSource`] if an active source
    /// already uses the same url.
    fn create_source(&mut self, draft: &SourceDraft) -> StorageResult<Source>;

    /// Gets a source by ID
    fn get_source(&self, source_id: i64) -> StorageResult<Option<Source>>;

    /// Lists all sources, oldest first
    fn list_sources(&self) -> StorageResult<Vec<Source>>;

    /// Lists sources with the active flag set
    fn list_active_sources(&self) -> StorageResult<Vec<Source>>;

    /// Toggles the active flag
    fn set_source_active(&mut self, source_id: i64, active: bool) -> StorageResult<Source>;

    /// Changes the informational crawl frequency
    fn update_source_frequency(
        &mut self,
        source_id: i64,
        frequency: Frequency,
    ) -> StorageResult<Source>;

    // ===== Job Management =====

    /// Creates a new job in `pending`
    fn create_job(&mut self, source_id: i64) -> StorageResult<CrawlJob>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<Option<CrawlJob>>;

    /// Lists all jobs, most recently created first
    fn list_jobs(&self) -> StorageResult<Vec<CrawlJob>>;

    /// Applies one lifecycle transition
    ///
    /// Stamps `started_at` on entering `running`, `completed_at` on entering
    /// a terminal state, and records `error_message` only for `failed`.
    fn transition_job(
        &mut self,
        job_id: i64,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> StorageResult<CrawlJob>;

    /// Fails every job left `pending` or `running` by a previous process
    ///
    /// Returns the IDs of the recovered jobs.
    fn recover_interrupted_jobs(&mut self, message: &str) -> StorageResult<Vec<i64>>;

    // ===== Deduplication & Ingestion =====

    /// Decides how content relates to what is already stored for a source
    fn lookup(
        &self,
        source_id: i64,
        url: &str,
        fingerprint: &Fingerprint,
    ) -> StorageResult<DedupDecision>;

    /// Records one attempted item against a running job
    ///
    /// With a document, performs insert-if-absent on `(source, fingerprint)`
    /// and writes its data points; the first writer wins and a later writer
    /// observes [`ItemCommit::Unchanged`]. Counters are updated in the same
    /// transaction.
    fn commit_item(&mut self, job_id: i64, document: Option<&NewDocument>)
        -> StorageResult<ItemCommit>;

    // ===== Documents =====

    /// Gets a document by ID
    fn get_document(&self, document_id: i64) -> StorageResult<Option<Document>>;

    /// Lists documents of a source, newest first
    fn list_documents(&self, source_id: i64) -> StorageResult<Vec<Document>>;

    /// Gets all data points of a document
    fn get_data_points(&self, document_id: i64) -> StorageResult<Vec<DataPoint>>;

    // ===== Statistics =====

    /// Counts jobs by status
    fn count_jobs_by_status(&self) -> StorageResult<HashMap<JobStatus, u64>>;

    /// Counts documents by classification
    fn count_documents_by_classification(&self) -> StorageResult<HashMap<Classification, u64>>;

    /// Gets total data point count
    fn count_data_points(&self) -> StorageResult<u64>;

    /// Mean confidence over all data points, if any exist
    fn average_data_point_confidence(&self) -> StorageResult<Option<f64>>;
}
