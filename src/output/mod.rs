//! Output module for operator-facing reports
//!
//! This module handles:
//! - Aggregating statistics over jobs, documents and data points
//! - Rendering sources and jobs as plain text

mod report;
pub mod stats;

pub use report::{render_job, render_jobs, render_sources};
pub use stats::{load_statistics, print_statistics, render_statistics, CrawlStatistics};
