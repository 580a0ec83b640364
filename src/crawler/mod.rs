//! Crawler module for job execution and content ingestion
//!
//! This module contains the core pipeline, including:
//! - HTTP fetching with retry and backoff
//! - Normalization and fingerprinting
//! - Page discovery from the entry page
//! - Classification, theme tagging and data point extraction
//! - Job orchestration

mod classifier;
mod extractor;
mod fetcher;
mod normalizer;
mod orchestrator;
mod parser;

pub use classifier::{classify, tag_themes, Classified};
pub use extractor::{ExtractionError, Extractor, RuleExtractor};
pub use fetcher::{build_http_client, parse_content_type, FetchError, Fetcher, RawContent, RetryPolicy};
pub use normalizer::{collapse_whitespace, decode_body, fingerprint, normalize, NormalizedText, TableRow};
pub use orchestrator::{JobEvent, Orchestrator, SharedStorage, INTERRUPTED_MESSAGE};
pub use parser::{discover_items, extract_links};
