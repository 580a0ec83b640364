//! policy-crawler: crawl job orchestration for regulatory and market sources
//!
//! This crate monitors registered sources (regulators, exchanges, gazettes),
//! runs on-demand crawl jobs against them, and turns fetched pages into
//! deduplicated documents and typed data points with provenance.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("Source {0} is inactive")]
    SourceInactive(i64),

    #[error("Crawl job not found: {0}")]
    JobNotFound(i64),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] crawler::ExtractionError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition {
        from: model::JobStatus,
        to: model::JobStatus,
    },

    #[error("Disallowed by robots.txt: {url}")]
    RobotsDenied { url: String },

    #[error("Crawl job {0} was cancelled")]
    Cancelled(i64),

    #[error("Crawl job exceeded its deadline of {0}s")]
    DeadlineExceeded(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Orchestrator;
pub use model::{Classification, CrawlJob, DataPoint, Document, JobStatus, Source, SourceDraft};
pub use url::normalize_url;
