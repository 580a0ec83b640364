//! Ingested documents and the data points extracted from them

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Document classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Policy,
    Regulation,
    News,
    Data,
    Other,
}

impl Classification {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Regulation => "regulation",
            Self::News => "news",
            Self::Data => "data",
            Self::Other => "other",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "policy" => Some(Self::Policy),
            "regulation" => Some(Self::Regulation),
            "news" => Some(Self::News),
            "data" => Some(Self::Data),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.to_db_string())
    }
}

/// SHA-256 digest (lowercase hex) of normalized page text; the dedup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an already computed hex digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of an extracted fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum DataValue {
    Number(f64),
    Text(String),
}

impl DataValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(t) => f.write_str(t),
        }
    }
}

/// A data point as produced by an extractor, before it is bound to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPointDraft {
    pub key: String,
    pub value: DataValue,
    pub unit: Option<String>,
    pub effective_date: Option<NaiveDate>,
    /// Always within `0.0..=1.0`
    pub confidence: f64,
    pub provenance: String,
}

impl DataPointDraft {
    pub fn new(
        key: impl Into<String>,
        value: DataValue,
        confidence: f64,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            unit: None,
            effective_date: None,
            confidence: clamp_confidence(confidence),
            provenance: provenance.into(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_effective_date(mut self, date: Option<NaiveDate>) -> Self {
        self.effective_date = date;
        self
    }
}

/// Clamps a confidence score into `0.0..=1.0`; NaN becomes 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A single structured fact extracted from a stored document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub id: i64,
    pub document_id: i64,
    pub key: String,
    pub value: DataValue,
    pub unit: Option<String>,
    pub effective_date: Option<NaiveDate>,
    /// Label of the source the fact was taken from
    pub source_label: String,
    pub confidence: f64,
    pub provenance: String,
    pub created_at: DateTime<Utc>,
}

/// A distinct version of content observed from a source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub content_hash: Fingerprint,
    pub classification: Classification,
    pub country: String,
    pub sector: String,
    pub themes: BTreeSet<String>,
    pub extracted_data: Vec<DataPointDraft>,
    pub confidence: f64,
    /// Set only by human review, never by the crawler
    pub verified: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub crawled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to persist one ingested item
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub content_hash: Fingerprint,
    pub classification: Classification,
    pub country: String,
    pub sector: String,
    pub themes: BTreeSet<String>,
    pub confidence: f64,
    pub published_at: Option<DateTime<Utc>>,
    pub crawled_at: DateTime<Utc>,
    pub source_label: String,
    pub data_points: Vec<DataPointDraft>,
}
