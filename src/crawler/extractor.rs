//! Structured data point extraction
//!
//! The [`Extractor`] trait is the seam between the pipeline and extraction
//! strategies. [`RuleExtractor`] is the default: numeric table rows and a
//! small set of text patterns.

use crate::crawler::normalizer::{NormalizedText, TableRow};
use crate::model::{DataPointDraft, DataValue};
use regex::Regex;
use thiserror::Error;

/// Confidence of a numeric table row
const TABLE_CONFIDENCE: f64 = 0.95;

/// Largest text the rule extractor will scan
const MAX_TEXT_BYTES: usize = 4 * 1024 * 1024;

/// Errors produced by an extractor
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Content too large to extract: {0} bytes")]
    TooLarge(usize),

    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Extraction failed: {0}")]
    Failed(String),
}

/// Turns normalized content into data point drafts
///
/// Implementations must be deterministic: identical input yields identical
/// output.
pub trait Extractor: Send + Sync {
    fn extract(&self, content: &NormalizedText) -> Result<Vec<DataPointDraft>, ExtractionError>;
}

/// A named text pattern and the confidence of its matches
struct TextPattern {
    name: &'static str,
    regex: Regex,
    confidence: f64,
}

/// Rule-based extractor over tables and text patterns
pub struct RuleExtractor {
    patterns: Vec<TextPattern>,
}

impl RuleExtractor {
    /// Compiles the built-in patterns
    ///
    /// Patterns are tried in order; a later pattern never claims text already
    /// matched by an earlier one.
    pub fn new() -> Result<Self, ExtractionError> {
        let patterns = vec![
            TextPattern {
                name: "label-number",
                regex: Regex::new(
                    r"(?P<label>[A-Za-z][A-Za-z ()/&-]{2,60}?)\s*:\s*(?P<value>-?\d[\d,]*(?:\.\d+)?)\s*(?P<unit>%|[kMG]Wh?|MVA|bps|PHP/kWh|tCO2e?)?",
                )?,
                confidence: 0.75,
            },
            TextPattern {
                name: "currency",
                regex: Regex::new(
                    r"(?P<unit>PHP|SGD|MYR|IDR|THB|USD|₱|S\$|RM|Rp|฿|\$)\s?(?P<value>\d[\d,]*(?:\.\d+)?)(?:\s*(?P<scale>million|billion|thousand|mn|bn)\b)?",
                )?,
                confidence: 0.65,
            },
            TextPattern {
                name: "percentage",
                regex: Regex::new(r"(?P<value>-?\d+(?:\.\d+)?)\s?(?P<unit>%)")?,
                confidence: 0.6,
            },
        ];

        Ok(Self { patterns })
    }

    fn extract_tables(&self, rows: &[TableRow]) -> Vec<DataPointDraft> {
        rows.iter()
            .filter_map(|row| {
                if row.cells.len() < 2 {
                    return None;
                }
                let label = row.cells.first()?.trim();
                let last = row.cells.last()?;
                if label.is_empty() || parse_number(label).is_some() {
                    return None;
                }
                let value = parse_number(last)?;

                let mut draft = DataPointDraft::new(
                    normalize_key(label),
                    DataValue::Number(value),
                    TABLE_CONFIDENCE,
                    format!("table:row={}", row.index),
                );
                if last.trim_end().ends_with('%') {
                    draft = draft.with_unit("%");
                }
                Some(draft)
            })
            .collect()
    }

    fn extract_text(&self, text: &str) -> Vec<DataPointDraft> {
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut drafts = Vec::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let span = (whole.start(), whole.end());
                if claimed.iter().any(|&(s, e)| span.0 < e && s < span.1) {
                    continue;
                }
                let Some(mut value) = caps.name("value").and_then(|v| parse_number(v.as_str()))
                else {
                    continue;
                };
                if let Some(scale) = caps.name("scale") {
                    value *= scale_factor(scale.as_str());
                }

                let key = match caps.name("label") {
                    Some(label) => normalize_key(label.as_str()),
                    None => pattern.name.to_string(),
                };
                let mut draft = DataPointDraft::new(
                    key,
                    DataValue::Number(value),
                    pattern.confidence,
                    format!("text:pattern={}@{}", pattern.name, whole.start()),
                );
                if let Some(unit) = caps.name("unit") {
                    draft = draft.with_unit(currency_code(unit.as_str()));
                }

                claimed.push(span);
                drafts.push(draft);
            }
        }

        // report in reading order
        drafts.sort_by_key(|d| text_offset(&d.provenance));
        drafts
    }
}

impl Extractor for RuleExtractor {
    fn extract(&self, content: &NormalizedText) -> Result<Vec<DataPointDraft>, ExtractionError> {
        if content.text.len() > MAX_TEXT_BYTES {
            return Err(ExtractionError::TooLarge(content.text.len()));
        }

        let mut drafts = self.extract_tables(&content.tables);
        drafts.extend(self.extract_text(&content.text));
        Ok(drafts)
    }
}

/// Parses numbers like `11,640`, `6.50%`, `-0.25`
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalize_key(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn scale_factor(scale: &str) -> f64 {
    match scale.to_ascii_lowercase().as_str() {
        "thousand" => 1e3,
        "million" | "mn" => 1e6,
        "billion" | "bn" => 1e9,
        _ => 1.0,
    }
}

fn currency_code(unit: &str) -> &str {
    match unit {
        "₱" => "PHP",
        "S$" => "SGD",
        "RM" => "MYR",
        "Rp" => "IDR",
        "฿" => "THB",
        "$" => "USD",
        other => other,
    }
}

fn text_offset(provenance: &str) -> usize {
    provenance
        .rsplit_once('@')
        .and_then(|(_, offset)| offset.parse().ok())
        .unwrap_or(0)
}
