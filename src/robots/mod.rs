//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching
//! robots.txt files. Every item of a crawl job is checked before it is fetched.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRules;

use reqwest::Client;
use tracing::debug;
use url::Url;

/// Fetches robots.txt for the host of `url`
///
/// A missing file (4xx) allows everything. Unreachable or failing servers
/// also yield allow-all so that robots.txt outages do not block ingestion.
pub async fn fetch_robots(client: &Client, url: &Url) -> RobotsRules {
    let mut robots_url = url.clone();
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);
    robots_url.set_fragment(None);

    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(url = %robots_url, error = %e, "robots.txt unreachable, allowing all");
            return RobotsRules::allow_all();
        }
    };

    if !response.status().is_success() {
        debug!(url = %robots_url, status = response.status().as_u16(), "No robots.txt");
        return RobotsRules::allow_all();
    }

    match response.text().await {
        Ok(body) => RobotsRules::from_content(&body),
        Err(e) => {
            debug!(url = %robots_url, error = %e, "Unreadable robots.txt, allowing all");
            RobotsRules::allow_all()
        }
    }
}
