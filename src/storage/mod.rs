//! Storage module for persisting crawl data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The source registry
//! - Crawl job lifecycle and counters
//! - Race-safe document deduplication and ingestion

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::CrawlerError;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CrawlerError> {
    Ok(SqliteStorage::new(path)?)
}

/// How fetched content relates to what is already stored for its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    /// No document with this fingerprint exists for the source
    New,

    /// The fingerprint is already stored; nothing new was observed
    Unchanged,

    /// The url previously resolved to a different fingerprint
    ChangedFrom(i64),
}

impl DedupDecision {
    /// Returns true if the content should be classified and stored
    pub fn is_new_content(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Outcome of committing one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCommit {
    /// A document was written together with its data points
    Inserted {
        document_id: i64,
        decision: DedupDecision,
    },

    /// Another writer (or an earlier crawl) already stored the fingerprint
    Unchanged,

    /// The item failed before ingestion; only the attempt was counted
    Skipped,
}

impl ItemCommit {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }
}
