//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{
    clamp_confidence, Classification, CrawlJob, DataPoint, DataValue, Document, Fingerprint,
    Frequency, JobStatus, NewDocument, Source, SourceDraft,
};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{DedupDecision, ItemCommit};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const SOURCE_COLUMNS: &str =
    "id, name, url, country, sector, frequency, kind, active, created_at, updated_at";

const JOB_COLUMNS: &str = "id, source_id, status, started_at, completed_at, items_crawled, \
     items_new, error_message, created_at";

const DOCUMENT_COLUMNS: &str = "id, source_id, title, url, content, content_hash, classification, \
     country, sector, themes, extracted_data, confidence, verified, published_at, crawled_at, \
     created_at, updated_at";

const DATA_POINT_COLUMNS: &str = "id, document_id, key, value_type, value_text, value_number, \
     unit, effective_date, source_label, confidence, provenance, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database file and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Raw connection, for tests that need to break the database on purpose
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn require_source(&self, source_id: i64) -> StorageResult<Source> {
        self.get_source(source_id)?
            .ok_or(StorageError::SourceNotFound(source_id))
    }

    fn require_job(&self, job_id: i64) -> StorageResult<CrawlJob> {
        self.get_job(job_id)?.ok_or(StorageError::JobNotFound(job_id))
    }
}

impl Storage for SqliteStorage {
    // ===== Source Registry =====

    fn create_source(&mut self, draft: &SourceDraft) -> StorageResult<Source> {
        let now = now_ts();
        let result = self.conn.execute(
            "INSERT INTO sources (name, url, country, sector, frequency, kind, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
            params![
                draft.name,
                draft.url,
                draft.country.as_str(),
                draft.sector.as_str(),
                draft.frequency.as_str(),
                draft.kind.as_str(),
                now
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StorageError::DuplicateSource(draft.url.clone()))
            }
            Err(e) => return Err(e.into()),
        }

        self.require_source(self.conn.last_insert_rowid())
    }

    fn get_source(&self, source_id: i64) -> StorageResult<Option<Source>> {
        let source = self
            .conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS),
                params![source_id],
                source_from_row,
            )
            .optional()?;
        Ok(source)
    }

    fn list_sources(&self) -> StorageResult<Vec<Source>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM sources ORDER BY id", SOURCE_COLUMNS))?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn list_active_sources(&self) -> StorageResult<Vec<Source>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sources WHERE active = 1 ORDER BY id",
            SOURCE_COLUMNS
        ))?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn set_source_active(&mut self, source_id: i64, active: bool) -> StorageResult<Source> {
        let source = self.require_source(source_id)?;
        if source.active == active {
            return Ok(source);
        }

        let result = self.conn.execute(
            "UPDATE sources SET active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, now_ts(), source_id],
        );

        match result {
            Ok(_) => self.require_source(source_id),
            Err(e) if is_unique_violation(&e) => Err(StorageError::DuplicateSource(source.url)),
            Err(e) => Err(e.into()),
        }
    }

    fn update_source_frequency(
        &mut self,
        source_id: i64,
        frequency: Frequency,
    ) -> StorageResult<Source> {
        let changed = self.conn.execute(
            "UPDATE sources SET frequency = ?1, updated_at = ?2 WHERE id = ?3",
            params![frequency.as_str(), now_ts(), source_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SourceNotFound(source_id));
        }
        self.require_source(source_id)
    }

    // ===== Job Management =====

    fn create_job(&mut self, source_id: i64) -> StorageResult<CrawlJob> {
        self.require_source(source_id)?;
        self.conn.execute(
            "INSERT INTO crawl_jobs (source_id, status, created_at) VALUES (?1, ?2, ?3)",
            params![source_id, JobStatus::Pending.to_db_string(), now_ts()],
        )?;
        self.require_job(self.conn.last_insert_rowid())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<Option<CrawlJob>> {
        let job = self
            .conn
            .query_row(
                &format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    fn list_jobs(&self) -> StorageResult<Vec<CrawlJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_jobs ORDER BY created_at DESC, id DESC",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    fn transition_job(
        &mut self,
        job_id: i64,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> StorageResult<CrawlJob> {
        let tx = self.conn.transaction()?;
        transition_in(&tx, job_id, to, error_message)?;
        tx.commit()?;
        self.require_job(job_id)
    }

    fn recover_interrupted_jobs(&mut self, message: &str) -> StorageResult<Vec<i64>> {
        let tx = self.conn.transaction()?;

        let stale: Vec<(i64, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, status FROM crawl_jobs WHERE status IN ('pending', 'running') ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        // one transaction for every job: all recovered or none
        let mut recovered = Vec::with_capacity(stale.len());
        for (job_id, status) in stale {
            if parse_job_status(1, status)? == JobStatus::Pending {
                transition_in(&tx, job_id, JobStatus::Running, None)?;
            }
            transition_in(&tx, job_id, JobStatus::Failed, Some(message))?;
            recovered.push(job_id);
        }

        tx.commit()?;
        Ok(recovered)
    }

    // ===== Deduplication & Ingestion =====

    fn lookup(
        &self,
        source_id: i64,
        url: &str,
        fingerprint: &Fingerprint,
    ) -> StorageResult<DedupDecision> {
        lookup_in(&self.conn, source_id, url, fingerprint)
    }

    fn commit_item(
        &mut self,
        job_id: i64,
        document: Option<&NewDocument>,
    ) -> StorageResult<ItemCommit> {
        let tx = self.conn.transaction()?;

        let outcome = match document {
            None => ItemCommit::Skipped,
            Some(doc) => match lookup_in(&tx, doc.source_id, &doc.url, &doc.content_hash)? {
                DedupDecision::Unchanged => ItemCommit::Unchanged,
                decision => insert_document(&tx, doc)?
                    .map(|document_id| ItemCommit::Inserted {
                        document_id,
                        decision,
                    })
                    .unwrap_or(ItemCommit::Unchanged),
            },
        };

        // A job that is no longer running must not gain counters or documents.
        let updated = tx.execute(
            "UPDATE crawl_jobs
             SET items_crawled = items_crawled + 1, items_new = items_new + ?1
             WHERE id = ?2 AND status = 'running'",
            params![i64::from(outcome.is_new()), job_id],
        )?;
        if updated == 0 {
            return Err(StorageError::JobNotRunning(job_id));
        }

        tx.commit()?;
        Ok(outcome)
    }

    // ===== Documents =====

    fn get_document(&self, document_id: i64) -> StorageResult<Option<Document>> {
        let document = self
            .conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![document_id],
                document_from_row,
            )
            .optional()?;
        Ok(document)
    }

    fn list_documents(&self, source_id: i64) -> StorageResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM documents WHERE source_id = ?1 ORDER BY id DESC",
            DOCUMENT_COLUMNS
        ))?;
        let documents = stmt
            .query_map(params![source_id], document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    fn get_data_points(&self, document_id: i64) -> StorageResult<Vec<DataPoint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM data_points WHERE document_id = ?1 ORDER BY id",
            DATA_POINT_COLUMNS
        ))?;
        let points = stmt
            .query_map(params![document_id], data_point_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }

    // ===== Statistics =====

    fn count_jobs_by_status(&self) -> StorageResult<HashMap<JobStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM crawl_jobs GROUP BY status")?;
        let counts = stmt
            .query_map([], |row| {
                let status = parse_job_status(0, row.get(0)?)?;
                let count: i64 = row.get(1)?;
                Ok((status, count as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    fn count_documents_by_classification(&self) -> StorageResult<HashMap<Classification, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT classification, COUNT(*) FROM documents GROUP BY classification")?;
        let counts = stmt
            .query_map([], |row| {
                let classification = parse_classification(0, row.get(0)?)?;
                let count: i64 = row.get(1)?;
                Ok((classification, count as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    fn count_data_points(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM data_points", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn average_data_point_confidence(&self) -> StorageResult<Option<f64>> {
        let avg: Option<f64> =
            self.conn
                .query_row("SELECT AVG(confidence) FROM data_points", [], |row| {
                    row.get(0)
                })?;
        Ok(avg)
    }
}

// ===== Transaction helpers =====

/// Applies one guarded status change inside the caller's transaction
fn transition_in(
    conn: &Connection,
    job_id: i64,
    to: JobStatus,
    error_message: Option<&str>,
) -> StorageResult<()> {
    let current: String = conn
        .query_row(
            "SELECT status FROM crawl_jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(StorageError::JobNotFound(job_id))?;
    let from = parse_job_status(0, current)?;

    if from.transition_to(to).is_err() {
        return Err(StorageError::InvalidTransition { job_id, from, to });
    }

    let message = match to {
        JobStatus::Failed => Some(
            error_message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("Crawl job failed")
                .to_string(),
        ),
        _ => None,
    };

    let changed = conn.execute(
        "UPDATE crawl_jobs
         SET status = ?1,
             started_at = CASE WHEN ?1 = 'running' THEN ?2 ELSE started_at END,
             completed_at = CASE WHEN ?1 IN ('done', 'failed') THEN ?2 ELSE completed_at END,
             error_message = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            to.to_db_string(),
            now_ts(),
            message,
            job_id,
            from.to_db_string()
        ],
    )?;
    if changed == 0 {
        return Err(StorageError::InvalidTransition { job_id, from, to });
    }
    Ok(())
}

fn lookup_in(
    conn: &Connection,
    source_id: i64,
    url: &str,
    fingerprint: &Fingerprint,
) -> StorageResult<DedupDecision> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM documents WHERE source_id = ?1 AND content_hash = ?2",
            params![source_id, fingerprint.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Ok(DedupDecision::Unchanged);
    }

    let previous: Option<i64> = conn
        .query_row(
            "SELECT id FROM documents WHERE source_id = ?1 AND url = ?2 ORDER BY id DESC LIMIT 1",
            params![source_id, url],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match previous {
        Some(previous_id) => DedupDecision::ChangedFrom(previous_id),
        None => DedupDecision::New,
    })
}

/// Inserts the document if its fingerprint is absent for the source
///
/// Returns the new document ID, or `None` when another writer got there first.
fn insert_document(conn: &Connection, doc: &NewDocument) -> StorageResult<Option<i64>> {
    let now = now_ts();
    let themes = serde_json::to_string(&doc.themes)?;
    let extracted = serde_json::to_string(&doc.data_points)?;

    let inserted = conn.execute(
        "INSERT INTO documents (source_id, title, url, content, content_hash, classification,
             country, sector, themes, extracted_data, confidence, verified, published_at,
             crawled_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?13, ?14, ?14)
         ON CONFLICT (source_id, content_hash) DO NOTHING",
        params![
            doc.source_id,
            doc.title,
            doc.url,
            doc.content,
            doc.content_hash.as_str(),
            doc.classification.to_db_string(),
            doc.country,
            doc.sector,
            themes,
            extracted,
            clamp_confidence(doc.confidence),
            doc.published_at.as_ref().map(fmt_ts),
            fmt_ts(&doc.crawled_at),
            now
        ],
    )?;
    if inserted == 0 {
        return Ok(None);
    }

    let document_id = conn.last_insert_rowid();
    let mut stmt = conn.prepare(
        "INSERT INTO data_points (document_id, key, value_type, value_text, value_number, unit,
             effective_date, source_label, confidence, provenance, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for point in &doc.data_points {
        let (value_type, value_text, value_number) = match &point.value {
            DataValue::Number(n) => ("number", None, Some(*n)),
            DataValue::Text(t) => ("text", Some(t.as_str()), None),
        };
        stmt.execute(params![
            document_id,
            point.key,
            value_type,
            value_text,
            value_number,
            point.unit,
            point.effective_date.map(|d| d.to_string()),
            doc.source_label,
            clamp_confidence(point.confidence),
            point.provenance,
            now
        ])?;
    }

    Ok(Some(document_id))
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ===== Row mapping =====

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
struct UnknownValue {
    kind: &'static str,
    value: String,
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn now_ts() -> String {
    fmt_ts(&Utc::now())
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_opt_ts(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(idx, v)).transpose()
}

fn parse_from_str<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn parse_job_status(idx: usize, value: String) -> rusqlite::Result<JobStatus> {
    JobStatus::from_db_string(&value).ok_or_else(|| {
        conversion_error(
            idx,
            UnknownValue {
                kind: "job status",
                value,
            },
        )
    })
}

fn parse_classification(idx: usize, value: String) -> rusqlite::Result<Classification> {
    Classification::from_db_string(&value).ok_or_else(|| {
        conversion_error(
            idx,
            UnknownValue {
                kind: "classification",
                value,
            },
        )
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, value: String) -> rusqlite::Result<T> {
    serde_json::from_str(&value).map_err(|e| conversion_error(idx, e))
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        country: parse_from_str(3, row.get(3)?)?,
        sector: parse_from_str(4, row.get(4)?)?,
        frequency: parse_from_str(5, row.get(5)?)?,
        kind: parse_from_str(6, row.get(6)?)?,
        active: row.get(7)?,
        created_at: parse_ts(8, row.get(8)?)?,
        updated_at: parse_ts(9, row.get(9)?)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlJob> {
    let items_crawled: i64 = row.get(5)?;
    let items_new: i64 = row.get(6)?;
    Ok(CrawlJob {
        id: row.get(0)?,
        source_id: row.get(1)?,
        status: parse_job_status(2, row.get(2)?)?,
        started_at: parse_opt_ts(3, row.get(3)?)?,
        completed_at: parse_opt_ts(4, row.get(4)?)?,
        items_crawled: items_crawled.max(0) as u64,
        items_new: items_new.max(0) as u64,
        error_message: row.get(7)?,
        created_at: parse_ts(8, row.get(8)?)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let content_hash: String = row.get(5)?;
    Ok(Document {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        content: row.get(4)?,
        content_hash: Fingerprint::from_hex(content_hash),
        classification: parse_classification(6, row.get(6)?)?,
        country: row.get(7)?,
        sector: row.get(8)?,
        themes: parse_json(9, row.get(9)?)?,
        extracted_data: parse_json(10, row.get(10)?)?,
        confidence: row.get(11)?,
        verified: row.get(12)?,
        published_at: parse_opt_ts(13, row.get(13)?)?,
        crawled_at: parse_ts(14, row.get(14)?)?,
        created_at: parse_ts(15, row.get(15)?)?,
        updated_at: parse_ts(16, row.get(16)?)?,
    })
}

fn data_point_from_row(row: &Row<'_>) -> rusqlite::Result<DataPoint> {
    let value_type: String = row.get(3)?;
    let value = match value_type.as_str() {
        "number" => {
            let n: Option<f64> = row.get(5)?;
            DataValue::Number(n.ok_or(rusqlite::Error::InvalidColumnType(
                5,
                "value_number".to_string(),
                Type::Null,
            ))?)
        }
        _ => DataValue::Text(row.get::<_, Option<String>>(4)?.unwrap_or_default()),
    };
    let effective_date: Option<String> = row.get(7)?;

    Ok(DataPoint {
        id: row.get(0)?,
        document_id: row.get(1)?,
        key: row.get(2)?,
        value,
        unit: row.get(6)?,
        effective_date: effective_date
            .map(|d| parse_from_str::<NaiveDate>(7, d))
            .transpose()?,
        source_label: row.get(8)?,
        confidence: row.get(9)?,
        provenance: row.get(10)?,
        created_at: parse_ts(11, row.get(11)?)?,
    })
}
