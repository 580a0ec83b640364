//! Document classification and theme tagging
//!
//! Classification combines a prior from the source kind with keyword
//! signals from the title and body. Themes are independent keyword tags.

use crate::crawler::normalizer::NormalizedText;
use crate::model::{clamp_confidence, Classification, SourceKind};
use std::collections::BTreeSet;

/// Minimum score for a classification to beat `other`
const MIN_SCORE: f64 = 2.0;

/// Confidence reported for `other`
const OTHER_CONFIDENCE: f64 = 0.3;

/// Classes in order of precedence when score and prior both tie
const CLASSES: [Classification; 4] = [
    Classification::Regulation,
    Classification::Policy,
    Classification::Data,
    Classification::News,
];

const POLICY_TERMS: &[&str] = &[
    "policy",
    "policies",
    "circular",
    "memorandum",
    "guideline",
    "framework",
    "roadmap",
    "strategy",
    "consultation",
    "white paper",
];

const REGULATION_TERMS: &[&str] = &[
    "regulation",
    "regulatory",
    "resolution no",
    "order no",
    "decree",
    "act no",
    "republic act",
    "amendment",
    "compliance",
    "penalt",
    "shall",
];

const NEWS_TERMS: &[&str] = &[
    "press release",
    "news",
    "announce",
    "statement",
    "media advisory",
    "launch",
    "speech",
];

const DATA_TERMS: &[&str] = &[
    "statistic",
    "index",
    "closing price",
    "volume",
    "dataset",
    "market data",
    "demand",
    "capacity",
    "report",
];

const THEMES: &[(&str, &[&str])] = &[
    (
        "renewables",
        &["renewable", "solar", "wind", "geothermal", "hydro", "biomass"],
    ),
    ("tariffs", &["tariff", "feed-in", "generation charge", "rate adjustment"]),
    (
        "carbon",
        &["carbon", "emission", "net zero", "net-zero", "climate", "greenhouse"],
    ),
    ("grid", &["grid", "transmission", "distribution", "interconnect"]),
    (
        "interest-rates",
        &["interest rate", "policy rate", "repo rate", "basis point", "overnight rate"],
    ),
    (
        "capital-markets",
        &["stock", "equit", "bond", "ipo", "listing", "securities", "sukuk"],
    ),
    ("banking", &["bank", "lending", "loan", "deposit", "capital adequacy"]),
    (
        "energy-security",
        &["energy security", "power supply", "lng", "fuel reserve", "outage", "blackout"],
    ),
];

/// A classification with its confidence in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classified {
    pub classification: Classification,
    pub confidence: f64,
}

/// Classifies normalized content from a source of the given kind
pub fn classify(content: &NormalizedText, kind: SourceKind) -> Classified {
    let title = content.title.as_deref().unwrap_or("").to_lowercase();
    let body = content.text.to_lowercase();

    let scores: Vec<(Classification, f64)> = CLASSES
        .iter()
        .map(|&class| {
            let terms = terms_for(class);
            let body_hits = terms.iter().filter(|t| contains_term(&body, t)).count();
            let title_hits = terms.iter().filter(|t| contains_term(&title, t)).count();
            let score = prior(kind, class) + body_hits as f64 + title_hits as f64;
            (class, score)
        })
        .collect();

    let total: f64 = scores.iter().map(|(_, s)| s).sum();
    // ties go to the class the source kind favours, then to list order
    let (best_class, best_score) = scores
        .iter()
        .fold((Classification::Other, 0.0), |best, &(class, score)| {
            let wins_tie = score == best.1 && prior(kind, class) > prior(kind, best.0);
            if score > best.1 || wins_tie {
                (class, score)
            } else {
                best
            }
        });

    if best_score < MIN_SCORE {
        return Classified {
            classification: Classification::Other,
            confidence: OTHER_CONFIDENCE,
        };
    }

    Classified {
        classification: best_class,
        confidence: clamp_confidence(best_score / (total + 1.0)),
    }
}

/// Tags content with every theme whose keywords appear in it
pub fn tag_themes(content: &NormalizedText) -> BTreeSet<String> {
    let haystack = format!(
        "{} {}",
        content.title.as_deref().unwrap_or(""),
        content.text
    )
    .to_lowercase();

    THEMES
        .iter()
        .filter(|(_, terms)| terms.iter().any(|t| contains_term(&haystack, t)))
        .map(|(theme, _)| theme.to_string())
        .collect()
}

fn prior(kind: SourceKind, class: Classification) -> f64 {
    match (kind, class) {
        (SourceKind::Exchange, Classification::Data) => 2.0,
        (SourceKind::Gazette, Classification::Regulation) => 2.0,
        (SourceKind::Gazette, Classification::Policy) => 1.0,
        (SourceKind::Policy, Classification::Policy) => 2.0,
        (SourceKind::Policy, Classification::Regulation) => 1.0,
        (SourceKind::Regulator, Classification::Regulation) => 2.0,
        (SourceKind::News, Classification::News) => 2.0,
        _ => 0.0,
    }
}

fn terms_for(class: Classification) -> &'static [&'static str] {
    match class {
        Classification::Policy => POLICY_TERMS,
        Classification::Regulation => REGULATION_TERMS,
        Classification::News => NEWS_TERMS,
        Classification::Data => DATA_TERMS,
        Classification::Other => &[],
    }
}

/// True if `term` occurs at the start of a word in `haystack`
///
/// Terms are stems, so "regulat" matches "regulation" and "regulatory".
fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(i, _)| {
        haystack[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}
