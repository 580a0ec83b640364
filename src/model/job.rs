//! Crawl job lifecycle
//!
//! A job moves `Pending -> Running -> Done | Failed` and never leaves a
//! terminal state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::CrawlerError;

/// Represents the current status of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job row created, processing not yet started
    Pending,

    /// Items are being fetched and ingested
    Running,

    /// All discovered items were processed
    Done,

    /// A job-fatal error stopped processing
    Failed,
}

impl JobStatus {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true while polling clients should keep polling
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if `self -> next` is a legal lifecycle step
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running) | (Self::Running, Self::Done) | (Self::Running, Self::Failed)
        )
    }

    /// Validates a transition, returning the new status
    ///
    /// An illegal transition means the orchestrator has a bug; it is reported
    /// as [`CrawlerError::InvalidTransition`] and must not be retried.
    pub fn transition_to(self, next: JobStatus) -> Result<JobStatus, CrawlerError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CrawlerError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::Running, Self::Done, Self::Failed]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.to_db_string())
    }
}

/// One execution attempt against a source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlJob {
    pub id: i64,
    pub source_id: i64,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Items attempted, skipped ones included
    pub items_crawled: u64,
    /// Items that produced a new or changed document
    pub items_new: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CrawlJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock time between start and completion, if both are known
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}
