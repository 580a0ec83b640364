//! HTML parser for discovering the items of a job
//!
//! A job's items are its entry page plus the same-site pages it links to.
//!
//! **Include:**
//! - `<a href="...">` tags
//! - `<link rel="canonical" href="...">`
//!
//! **Exclude:**
//! - `<a href="..." download>`
//! - `javascript:`, `mailto:`, `tel:` links and data URIs
//! - Fragment-only links
//! - Links to other hosts, ports or schemes

use crate::url::{normalize_url, same_site};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts every followable link from a page, resolved against `base_url`
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                links.push(url);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                links.push(url);
            }
        }
    }

    links
}

/// Lists the item URLs of a job in processing order
///
/// The entry URL always comes first. Same-site links follow in document
/// order, normalized and deduplicated, up to `max_items` in total.
pub fn discover_items(entry: &Url, html: &str, max_items: usize) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    seen.insert(entry.as_str().to_string());
    items.push(entry.clone());

    for link in extract_links(html, entry) {
        if items.len() >= max_items {
            break;
        }
        if !same_site(entry, &link) {
            continue;
        }
        let Ok(normalized) = normalize_url(link.as_str()) else {
            continue;
        };
        if seen.insert(normalized.as_str().to_string()) {
            items.push(normalized);
        }
    }

    items
}

/// Resolves a link href to an absolute HTTP(S) URL
///
/// Returns None for special schemes, fragment-only links and anything
/// that fails to resolve.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
}
