//! Statistics over jobs, documents and data points
//!
//! This module aggregates counts from the storage layer and renders them
//! for the `stats` command.

use crate::model::{Classification, JobStatus};
use crate::storage::{Storage, StorageResult};
use std::collections::HashMap;
use std::fmt::Write;

/// Ingestion statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    pub total_sources: u64,
    pub active_sources: u64,

    /// Count of jobs by status
    pub jobs_by_status: HashMap<JobStatus, u64>,

    /// Count of documents by classification
    pub documents_by_classification: HashMap<Classification, u64>,

    pub total_data_points: u64,

    /// Mean data point confidence, if any points exist
    pub average_confidence: Option<f64>,
}

impl CrawlStatistics {
    pub fn total_jobs(&self) -> u64 {
        self.jobs_by_status.values().sum()
    }

    pub fn total_documents(&self) -> u64 {
        self.documents_by_classification.values().sum()
    }

    /// Share of finished jobs that ended `done`, as a percentage
    pub fn success_rate(&self) -> Option<f64> {
        let done = self.jobs_by_status.get(&JobStatus::Done).copied().unwrap_or(0);
        let failed = self
            .jobs_by_status
            .get(&JobStatus::Failed)
            .copied()
            .unwrap_or(0);
        let finished = done + failed;
        (finished > 0).then(|| done as f64 / finished as f64 * 100.0)
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    let sources = storage.list_sources()?;
    let active_sources = sources.iter().filter(|s| s.active).count() as u64;

    Ok(CrawlStatistics {
        total_sources: sources.len() as u64,
        active_sources,
        jobs_by_status: storage.count_jobs_by_status()?,
        documents_by_classification: storage.count_documents_by_classification()?,
        total_data_points: storage.count_data_points()?,
        average_confidence: storage.average_data_point_confidence()?,
    })
}

/// Renders statistics as a plain-text report
pub fn render_statistics(stats: &CrawlStatistics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Ingestion Statistics ===\n");

    let _ = writeln!(out, "Sources:");
    let _ = writeln!(
        out,
        "  Registered: {} ({} active)",
        stats.total_sources, stats.active_sources
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Jobs by Status ({} total):", stats.total_jobs());
    for status in JobStatus::all_states() {
        let count = stats.jobs_by_status.get(&status).copied().unwrap_or(0);
        let _ = writeln!(out, "  {}: {}", status, count);
    }
    if let Some(rate) = stats.success_rate() {
        let _ = writeln!(out, "  Success rate: {:.1}%", rate);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Documents ({} total):", stats.total_documents());
    let mut by_class: Vec<_> = stats.documents_by_classification.iter().collect();
    by_class.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_db_string().cmp(b.0.to_db_string())));
    for (classification, count) in by_class {
        let _ = writeln!(out, "  {}: {}", classification, count);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Data Points:");
    let _ = writeln!(out, "  Total: {}", stats.total_data_points);
    match stats.average_confidence {
        Some(avg) => {
            let _ = writeln!(out, "  Mean confidence: {:.2}", avg);
        }
        None => {
            let _ = writeln!(out, "  Mean confidence: n/a");
        }
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &CrawlStatistics) {
    print!("{}", render_statistics(stats));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn sample() -> CrawlStatistics {
        CrawlStatistics {
            total_sources: 3,
            active_sources: 2,
            jobs_by_status: HashMap::from([(JobStatus::Done, 3), (JobStatus::Failed, 1)]),
            documents_by_classification: HashMap::from([
                (Classification::Policy, 4),
                (Classification::Data, 6),
            ]),
            total_data_points: 12,
            average_confidence: Some(0.8125),
        }
    }

    #[test]
    fn test_totals_and_success_rate() {
        let stats = sample();
        assert_eq!(stats.total_jobs(), 4);
        assert_eq!(stats.total_documents(), 10);
        assert_eq!(stats.success_rate(), Some(75.0));
    }

    #[test]
    fn test_success_rate_without_finished_jobs() {
        let stats = CrawlStatistics {
            jobs_by_status: HashMap::from([(JobStatus::Running, 1)]),
            ..sample()
        };
        assert_eq!(stats.success_rate(), None);
    }

    #[test]
    fn test_render_orders_classifications_by_count() {
        let report = render_statistics(&sample());
        let data = report.find("data: 6").unwrap();
        let policy = report.find("policy: 4").unwrap();
        assert!(data < policy);
        assert!(report.contains("Registered: 3 (2 active)"));
        assert!(report.contains("Success rate: 75.0%"));
        assert!(report.contains("Mean confidence: 0.81"));
    }

    #[test]
    fn test_load_from_empty_storage() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_jobs(), 0);
        assert_eq!(stats.total_data_points, 0);
        assert_eq!(stats.average_confidence, None);
        assert!(render_statistics(&stats).contains("Mean confidence: n/a"));
    }
}
