//! Domain model shared by the pipeline, storage and CLI
//!
//! # Components
//!
//! - `Source`: a monitored origin and its registration draft
//! - `CrawlJob` / `JobStatus`: one job run and its lifecycle state machine
//! - `Document` / `DataPoint`: ingested content and the facts extracted from it

mod document;
mod job;
mod source;

pub use document::{
    clamp_confidence, Classification, DataPoint, DataPointDraft, DataValue, Document,
    Fingerprint, NewDocument,
};
pub use job::{CrawlJob, JobStatus};
pub use source::{Country, Frequency, ParseEnumError, Sector, Source, SourceDraft, SourceKind};
