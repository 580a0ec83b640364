//! Per-host robots.txt cache
//!
//! Entries expire after 24 hours so that rule changes by the site owner are
//! picked up by long-running processes.

use crate::robots::{fetch_robots, RobotsRules};
use crate::url::extract_host;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use url::Url;

#[derive(Debug, Clone)]
struct CachedRules {
    rules: RobotsRules,
    fetched_at: DateTime<Utc>,
}

impl CachedRules {
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at > Duration::hours(24)
    }
}

/// Fetches robots.txt once per host and answers permission checks
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    entries: Mutex<HashMap<String, CachedRules>>,
}

impl RobotsCache {
    /// `user_agent` is the product token matched against `User-agent` lines
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether the crawler may fetch `url`
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = extract_host(url) else {
            return false;
        };

        let cached = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&host)
            .filter(|entry| !entry.is_stale(Utc::now()))
            .map(|entry| entry.rules.clone());

        let rules = match cached {
            Some(rules) => rules,
            None => {
                let rules = fetch_robots(&self.client, url).await;
                self.insert(host, rules.clone());
                rules
            }
        };

        rules.is_allowed(url.as_str(), &self.user_agent)
    }

    fn insert(&self, host: String, rules: RobotsRules) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                host,
                CachedRules {
                    rules,
                    fetched_at: Utc::now(),
                },
            );
    }

    /// Number of hosts with cached rules
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
