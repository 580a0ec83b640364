//! Crawl job orchestration
//!
//! The orchestrator validates a source, creates its job, and runs the job on
//! its own tokio task. Items within a job run with bounded concurrency; each
//! item goes fetch → normalize → fingerprint → lookup → classify/extract →
//! commit, where the commit is one storage transaction.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::classifier::{classify, tag_themes};
use crate::crawler::extractor::{Extractor, RuleExtractor};
use crate::crawler::fetcher::{Fetcher, RawContent};
use crate::crawler::normalizer::{decode_body, fingerprint, normalize};
use crate::crawler::parser::discover_items;
use crate::model::{CrawlJob, Frequency, JobStatus, NewDocument, Source, SourceDraft};
use crate::robots::RobotsCache;
use crate::storage::{ItemCommit, SqliteStorage, Storage, StorageError, StorageResult};
use crate::url::normalize_url;
use crate::{CrawlerError, Result};
use chrono::Utc;
use futures::stream::{self, TryStreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use url::Url;

/// Storage handle shared by the orchestrator and its job tasks
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Buffered events per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 64;

/// Message recorded on jobs found unfinished by [`Orchestrator::recover_interrupted_jobs`]
pub const INTERRUPTED_MESSAGE: &str = "Interrupted: the process running this job exited";

/// Job lifecycle notification
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The job entered `running`
    Started(CrawlJob),

    /// The job reached `done` or `failed`; counters are final
    Finished(CrawlJob),
}

impl JobEvent {
    pub fn job(&self) -> &CrawlJob {
        match self {
            Self::Started(job) | Self::Finished(job) => job,
        }
    }
}

/// Runs crawl jobs and exposes their status
///
/// Cloning is cheap; clones share storage, HTTP client and event channel.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    crawler: CrawlerConfig,
    storage: SharedStorage,
    fetcher: Fetcher,
    robots: RobotsCache,
    extractor: Arc<dyn Extractor>,
    events: broadcast::Sender<JobEvent>,
    cancellations: Mutex<HashMap<i64, Arc<AtomicBool>>>,
}

impl Orchestrator {
    /// Creates an orchestrator with the rule-based extractor
    pub fn new(config: &Config, storage: SharedStorage) -> Result<Self> {
        Self::with_extractor(config, storage, Arc::new(RuleExtractor::new()?))
    }

    /// Creates an orchestrator with a custom extraction strategy
    pub fn with_extractor(
        config: &Config,
        storage: SharedStorage,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self> {
        let fetcher = Fetcher::from_config(config)?;
        let robots = RobotsCache::new(
            fetcher.client().clone(),
            config.user_agent.crawler_name.clone(),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                crawler: config.crawler.clone(),
                storage,
                fetcher,
                robots,
                extractor,
                events,
                cancellations: Mutex::new(HashMap::new()),
            }),
        })
    }

    // ===== Source Registry =====

    /// Validates and registers a source
    pub fn create_source(&self, draft: SourceDraft) -> Result<Source> {
        let draft = draft.validate()?;
        let source = self.inner.with_storage(|s| s.create_source(&draft))?;
        info!(source_id = source.id, url = %source.url, "Source registered");
        Ok(source)
    }

    pub fn get_source(&self, source_id: i64) -> Result<Source> {
        self.inner
            .with_storage(|s| s.get_source(source_id))?
            .ok_or(CrawlerError::SourceNotFound(source_id))
    }

    pub fn list_sources(&self) -> Result<Vec<Source>> {
        self.inner.with_storage(|s| s.list_sources())
    }

    pub fn list_active_sources(&self) -> Result<Vec<Source>> {
        self.inner.with_storage(|s| s.list_active_sources())
    }

    pub fn set_source_active(&self, source_id: i64, active: bool) -> Result<Source> {
        let source = self
            .inner
            .with_storage(|s| s.set_source_active(source_id, active))?;
        info!(source_id, active, "Source activation changed");
        Ok(source)
    }

    pub fn update_source_frequency(&self, source_id: i64, frequency: Frequency) -> Result<Source> {
        self.inner
            .with_storage(|s| s.update_source_frequency(source_id, frequency))
    }

    // ===== Jobs =====

    /// Starts a crawl job for an active source
    ///
    /// The job is returned in `running` as soon as it is created; processing
    /// continues on a background task. No job is created for a missing or
    /// inactive source.
    pub async fn start_job(&self, source_id: i64) -> Result<CrawlJob> {
        let source = self.get_source(source_id)?;
        if !source.active {
            return Err(CrawlerError::SourceInactive(source_id));
        }

        let job = self.inner.with_storage(|s| {
            let job = s.create_job(source_id)?;
            s.transition_job(job.id, JobStatus::Running, None)
        })?;

        let cancel = Arc::new(AtomicBool::new(false));
        self.inner
            .cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id, Arc::clone(&cancel));

        info!(job_id = job.id, source_id, url = %source.url, "Crawl job started");
        let _ = self.inner.events.send(JobEvent::Started(job.clone()));

        tokio::spawn(run_job(Arc::clone(&self.inner), job.id, source, cancel));

        Ok(job)
    }

    /// Alias of [`Orchestrator::start_job`]
    pub async fn start_crawl_job(&self, source_id: i64) -> Result<CrawlJob> {
        self.start_job(source_id).await
    }

    /// Current state of a job
    pub fn job_status(&self, job_id: i64) -> Result<CrawlJob> {
        self.inner
            .with_storage(|s| s.get_job(job_id))?
            .ok_or(CrawlerError::JobNotFound(job_id))
    }

    /// Alias of [`Orchestrator::job_status`]
    pub fn get_crawl_job_status(&self, job_id: i64) -> Result<CrawlJob> {
        self.job_status(job_id)
    }

    /// All jobs, most recently created first
    pub fn list_jobs(&self) -> Result<Vec<CrawlJob>> {
        self.inner.with_storage(|s| s.list_jobs())
    }

    /// Alias of [`Orchestrator::list_jobs`]
    pub fn list_crawl_jobs(&self) -> Result<Vec<CrawlJob>> {
        self.list_jobs()
    }

    /// Requests a cooperative stop; the job fails before its next item
    ///
    /// Returns false if the job is not running in this process.
    pub fn cancel_job(&self, job_id: i64) -> Result<bool> {
        let flag = self
            .inner
            .cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job_id)
            .cloned();

        match flag {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                info!(job_id, "Cancellation requested");
                Ok(true)
            }
            None => self.job_status(job_id).map(|_| false),
        }
    }

    /// Receives a [`JobEvent`] for every job start and finish
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Fails jobs left unfinished by an earlier process
    pub fn recover_interrupted_jobs(&self) -> Result<Vec<i64>> {
        let recovered = self
            .inner
            .with_storage(|s| s.recover_interrupted_jobs(INTERRUPTED_MESSAGE))?;
        for job_id in &recovered {
            warn!(job_id, "Marked interrupted crawl job as failed");
        }
        Ok(recovered)
    }
}

impl Inner {
    /// Runs one synchronous storage unit under the lock
    fn with_storage<T>(&self, f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>) -> Result<T> {
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut storage).map_err(storage_error)
    }

    fn is_cancelled(cancel: &AtomicBool, job_id: i64) -> Result<()> {
        if cancel.load(Ordering::SeqCst) {
            Err(CrawlerError::Cancelled(job_id))
        } else {
            Ok(())
        }
    }

    /// Processes every item of a job
    ///
    /// Item failures are recorded as skips; only storage failures, a failed
    /// entry point and cancellation end the job early.
    async fn process_job(&self, job_id: i64, source: &Source, cancel: &AtomicBool) -> Result<()> {
        let entry = normalize_url(&source.url)?;

        if !self.robots.is_allowed(&entry).await {
            return Err(CrawlerError::RobotsDenied {
                url: entry.to_string(),
            });
        }
        Self::is_cancelled(cancel, job_id)?;

        let raw = self.inner_fetch(&entry).await?;
        let items = if raw.is_html() {
            let html = decode_body(&raw.body, raw.charset.as_deref());
            discover_items(&entry, &html, self.crawler.max_items_per_job as usize)
        } else {
            vec![entry.clone()]
        };
        debug!(job_id, items = items.len(), "Discovered items");

        Self::is_cancelled(cancel, job_id)?;
        self.ingest(job_id, source, &entry, raw)?;

        let limit = self.crawler.max_concurrent_items.max(1) as usize;
        stream::iter(items.into_iter().skip(1).map(Ok))
            .try_for_each_concurrent(limit, |url| async move {
                Self::is_cancelled(cancel, job_id)?;
                self.process_item(job_id, source, &url).await
            })
            .await
    }

    async fn inner_fetch(&self, url: &Url) -> Result<RawContent> {
        Ok(self.fetcher.fetch(url.as_str()).await?)
    }

    /// Fetches one discovered item; fetch and robots failures become skips
    async fn process_item(&self, job_id: i64, source: &Source, url: &Url) -> Result<()> {
        if !self.robots.is_allowed(url).await {
            warn!(job_id, source_id = source.id, url = %url, "Item disallowed by robots.txt, skipping");
            self.with_storage(|s| s.commit_item(job_id, None))?;
            return Ok(());
        }

        match self.inner_fetch(url).await {
            Ok(raw) => self.ingest(job_id, source, url, raw),
            Err(e) => {
                warn!(job_id, source_id = source.id, url = %url, error = %e, "Item fetch failed, skipping");
                self.with_storage(|s| s.commit_item(job_id, None))?;
                Ok(())
            }
        }
    }

    /// Normalizes, deduplicates, classifies, extracts and commits one item
    fn ingest(&self, job_id: i64, source: &Source, url: &Url, raw: RawContent) -> Result<()> {
        let normalized = normalize(&raw);
        let fp = fingerprint(&normalized.text);

        let decision = self.with_storage(|s| s.lookup(source.id, url.as_str(), &fp))?;
        if !decision.is_new_content() {
            debug!(job_id, url = %url, fingerprint = fp.short(), "Content unchanged");
            self.with_storage(|s| s.commit_item(job_id, None))?;
            return Ok(());
        }

        let data_points = match self.extractor.extract(&normalized) {
            Ok(points) => points,
            Err(e) => {
                warn!(
                    source_id = source.id,
                    url = %url,
                    fingerprint = fp.short(),
                    error = %e,
                    "Extraction failed, skipping item"
                );
                self.with_storage(|s| s.commit_item(job_id, None))?;
                return Ok(());
            }
        };

        let classified = classify(&normalized, source.kind);
        let document = NewDocument {
            source_id: source.id,
            title: normalized
                .title
                .clone()
                .unwrap_or_else(|| url.to_string()),
            url: url.to_string(),
            themes: tag_themes(&normalized),
            content: normalized.text,
            content_hash: fp,
            classification: classified.classification,
            country: source.country.as_str().to_string(),
            sector: source.sector.as_str().to_string(),
            confidence: classified.confidence,
            published_at: normalized.published_at,
            crawled_at: Utc::now(),
            source_label: source.name.clone(),
            data_points,
        };

        match self.with_storage(|s| s.commit_item(job_id, Some(&document)))? {
            ItemCommit::Inserted {
                document_id,
                decision,
            } => debug!(
                job_id,
                document_id,
                url = %url,
                ?decision,
                classification = %document.classification,
                data_points = document.data_points.len(),
                "Document stored"
            ),
            ItemCommit::Unchanged | ItemCommit::Skipped => {
                debug!(job_id, url = %url, "Content stored concurrently, counted as unchanged")
            }
        }
        Ok(())
    }
}

/// Drives one job to a terminal state
async fn run_job(inner: Arc<Inner>, job_id: i64, source: Source, cancel: Arc<AtomicBool>) {
    let work = inner.process_job(job_id, &source, &cancel);
    let outcome = match inner.crawler.job_deadline_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), work)
            .await
            .unwrap_or(Err(CrawlerError::DeadlineExceeded(secs))),
        None => work.await,
    };

    inner
        .cancellations
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&job_id);

    let finished = match &outcome {
        Ok(()) => inner.with_storage(|s| s.transition_job(job_id, JobStatus::Done, None)),
        Err(e) => {
            error!(job_id, source_id = source.id, error = %e, "Crawl job failed");
            let message = e.to_string();
            inner.with_storage(|s| s.transition_job(job_id, JobStatus::Failed, Some(&message)))
        }
    };

    match finished {
        Ok(job) => {
            info!(
                job_id,
                status = %job.status,
                items_crawled = job.items_crawled,
                items_new = job.items_new,
                "Crawl job finished"
            );
            let _ = inner.events.send(JobEvent::Finished(job));
        }
        Err(e) => error!(job_id, error = %e, "Could not record crawl job outcome"),
    }
}

/// Maps storage lookups that miss onto the public error taxonomy
fn storage_error(err: StorageError) -> CrawlerError {
    match err {
        StorageError::SourceNotFound(id) => CrawlerError::SourceNotFound(id),
        StorageError::JobNotFound(id) => CrawlerError::JobNotFound(id),
        StorageError::DuplicateSource(url) => {
            CrawlerError::Validation(format!("an active source already monitors {}", url))
        }
        StorageError::InvalidTransition { from, to, .. } => {
            CrawlerError::InvalidTransition { from, to }
        }
        other => CrawlerError::Storage(other),
    }
}
