//! Plain-text rendering of sources and jobs for the CLI

use crate::model::{CrawlJob, Source};
use chrono::{DateTime, SecondsFormat, Utc};

fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn opt_ts(value: &Option<DateTime<Utc>>) -> String {
    value.as_ref().map(ts).unwrap_or_else(|| "-".to_string())
}

/// One line per source
pub fn render_sources(sources: &[Source]) -> String {
    if sources.is_empty() {
        return "No sources registered\n".to_string();
    }

    let mut out = format!(
        "{:>4}  {:<8}  {:<3}  {:<8}  {:<9}  {:<9}  {}\n",
        "ID", "STATE", "CC", "SECTOR", "FREQUENCY", "KIND", "NAME / URL"
    );
    for source in sources {
        out.push_str(&format!(
            "{:>4}  {:<8}  {:<3}  {:<8}  {:<9}  {:<9}  {} <{}>\n",
            source.id,
            if source.active { "active" } else { "inactive" },
            source.country,
            source.sector,
            source.frequency,
            source.kind,
            source.name,
            source.url
        ));
    }
    out
}

/// One line per job
pub fn render_jobs(jobs: &[CrawlJob]) -> String {
    if jobs.is_empty() {
        return "No crawl jobs\n".to_string();
    }

    let mut out = format!(
        "{:>4}  {:>6}  {:<7}  {:>7}  {:>5}  {}\n",
        "ID", "SOURCE", "STATUS", "CRAWLED", "NEW", "CREATED"
    );
    for job in jobs {
        out.push_str(&format!(
            "{:>4}  {:>6}  {:<7}  {:>7}  {:>5}  {}\n",
            job.id,
            job.source_id,
            job.status,
            job.items_crawled,
            job.items_new,
            ts(&job.created_at)
        ));
    }
    out
}

/// Detailed view of a single job
pub fn render_job(job: &CrawlJob) -> String {
    let mut out = format!("Job {} (source {})\n", job.id, job.source_id);
    out.push_str(&format!("  Status:        {}\n", job.status));
    out.push_str(&format!("  Items crawled: {}\n", job.items_crawled));
    out.push_str(&format!("  Items new:     {}\n", job.items_new));
    out.push_str(&format!("  Created:       {}\n", ts(&job.created_at)));
    out.push_str(&format!("  Started:       {}\n", opt_ts(&job.started_at)));
    out.push_str(&format!("  Completed:     {}\n", opt_ts(&job.completed_at)));
    if let Some(duration) = job.duration() {
        out.push_str(&format!(
            "  Duration:      {:.1}s\n",
            duration.num_milliseconds() as f64 / 1000.0
        ));
    }
    if let Some(message) = &job.error_message {
        out.push_str(&format!("  Error:         {}\n", message));
    }
    out
}
