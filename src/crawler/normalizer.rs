//! Content normalization and fingerprinting
//!
//! Turns raw fetched bytes into comparable text: decode, strip page chrome,
//! collapse whitespace. The fingerprint of that text is the dedup key, so
//! anything volatile (headers, fetch time) stays out of it.

use crate::crawler::fetcher::RawContent;
use crate::model::Fingerprint;
use chrono::{DateTime, NaiveDate, Utc};
use encoding_rs::{Encoding, UTF_8};
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};

/// Elements whose text never belongs to the document body
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "template",
];

/// One table row, cells as collapsed text
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// 1-based position among all rows of the page
    pub index: usize,
    pub cells: Vec<String>,
}

/// Text ready for hashing, classification and extraction
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    pub title: Option<String>,
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
    pub tables: Vec<TableRow>,
}

/// Normalizes fetched content
pub fn normalize(raw: &RawContent) -> NormalizedText {
    let decoded = decode_body(&raw.body, raw.charset.as_deref());

    if raw.is_html() {
        normalize_html(&decoded)
    } else {
        NormalizedText {
            title: None,
            text: collapse_whitespace(&decoded),
            published_at: None,
            tables: Vec::new(),
        }
    }
}

/// SHA-256 (lowercase hex) of normalized text
pub fn fingerprint(text: &str) -> Fingerprint {
    Fingerprint::from_hex(hex::encode(Sha256::digest(text.as_bytes())))
}

/// Decodes the body with the declared charset
///
/// The Content-Type charset wins, then a `<meta charset>` declaration near the
/// top of the document, then UTF-8. A byte order mark overrides all of them.
/// Undecodable bytes become U+FFFD.
pub fn decode_body(body: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .or_else(|| sniff_meta_charset(body))
        .unwrap_or(UTF_8);

    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

/// How far into the document a meta charset declaration is looked for
const META_PRESCAN_BYTES: usize = 1024;

/// Finds `charset=` in the first bytes of an HTML document
///
/// Covers both `<meta charset="x">` and the `http-equiv` Content-Type form.
fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_PRESCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    let mut rest = head.as_str();
    while let Some(pos) = rest.find("<meta") {
        rest = &rest[pos + 5..];
        let tag = &rest[..rest.find('>').unwrap_or(rest.len())];
        let Some(at) = tag.find("charset=") else {
            continue;
        };
        let label: String = tag[at + 8..]
            .trim_start_matches(|c| c == '"' || c == '\'' || c == ' ')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
            .collect();
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return Some(encoding);
        }
    }
    None
}

/// Collapses every whitespace run into a single space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_html(html: &str) -> NormalizedText {
    let document = Html::parse_document(html);

    let mut raw_text = String::new();
    match selector("body").and_then(|s| document.select(&s).next()) {
        Some(body) => collect_text(body, &mut raw_text),
        None => collect_text(document.root_element(), &mut raw_text),
    }

    NormalizedText {
        title: extract_title(&document),
        text: collapse_whitespace(&raw_text),
        published_at: extract_published_at(&document),
        tables: extract_tables(&document),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) || name == "head" {
                continue;
            }
            // keep words in adjacent elements apart
            out.push(' ');
            collect_text(child_element, out);
            out.push(' ');
        }
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// `article:published_time` meta, else the first `<time datetime>`
fn extract_published_at(document: &Html) -> Option<DateTime<Utc>> {
    let meta = selector("meta[property='article:published_time'][content]").and_then(|s| {
        document
            .select(&s)
            .filter_map(|el| el.value().attr("content"))
            .find_map(parse_date)
    });

    meta.or_else(|| {
        selector("time[datetime]").and_then(|s| {
            document
                .select(&s)
                .filter_map(|el| el.value().attr("datetime"))
                .find_map(parse_date)
        })
    })
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn extract_tables(document: &Html) -> Vec<TableRow> {
    let (Some(row_selector), Some(cell_selector)) = (selector("tr"), selector("th, td")) else {
        return Vec::new();
    };

    document
        .select(&row_selector)
        .enumerate()
        .filter_map(|(i, row)| {
            let cells: Vec<String> = row
                .select(&cell_selector)
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect();
            if cells.iter().all(|c| c.is_empty()) {
                None
            } else {
                Some(TableRow {
                    index: i + 1,
                    cells,
                })
            }
        })
        .collect()
}
