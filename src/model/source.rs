//! Monitored sources and their registration drafts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a string does not name a known enum value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Implements `as_str`, `FromStr`, `Display` and `ALL` for a plain string enum
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $(t if t.eq_ignore_ascii_case($text) => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                        expected: concat!($($text, " "),+),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

/// Country a source reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "PH")]
    Philippines,
    #[serde(rename = "SG")]
    Singapore,
    #[serde(rename = "MY")]
    Malaysia,
    #[serde(rename = "ID")]
    Indonesia,
    #[serde(rename = "TH")]
    Thailand,
}

string_enum!(Country, "country", {
    Philippines => "PH",
    Singapore => "SG",
    Malaysia => "MY",
    Indonesia => "ID",
    Thailand => "TH",
});

/// Economic sector a source covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Power,
    Finance,
    /// Renewable energy
    Re,
    Other,
}

string_enum!(Sector, "sector", {
    Power => "power",
    Finance => "finance",
    Re => "re",
    Other => "other",
});

/// Intended crawl cadence. Informational only: jobs are started on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "ad-hoc")]
    AdHoc,
}

string_enum!(Frequency, "frequency", {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
    AdHoc => "ad-hoc",
});

/// What kind of publisher a source is; biases document classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Exchange,
    Gazette,
    Policy,
    Regulator,
    News,
    General,
}

string_enum!(SourceKind, "source kind", {
    Exchange => "exchange",
    Gazette => "gazette",
    Policy => "policy",
    Regulator => "regulator",
    News => "news",
    General => "general",
});

impl Default for SourceKind {
    fn default() -> Self {
        Self::General
    }
}

/// A monitored origin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub country: Country,
    pub sector: Sector,
    pub frequency: Frequency,
    pub kind: SourceKind,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request for a new source
///
/// The URL is normalized and checked for well-formedness by
/// [`SourceDraft::validate`]; uniqueness among active sources is enforced by
/// storage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceDraft {
    pub name: String,
    pub url: String,
    pub country: Country,
    pub sector: Sector,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    #[serde(default)]
    pub kind: SourceKind,
}

fn default_frequency() -> Frequency {
    Frequency::Weekly
}

impl SourceDraft {
    /// Checks the draft and returns it with a trimmed name and normalized URL
    pub fn validate(self) -> crate::Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(crate::CrawlerError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        let url = crate::url::normalize_url(&self.url).map_err(|e| {
            crate::CrawlerError::Validation(format!("invalid source url '{}': {}", self.url, e))
        })?;

        Ok(Self {
            name,
            url: url.to_string(),
            ..self
        })
    }
}
