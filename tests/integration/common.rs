//! Shared helpers for integration tests

use policy_crawler::config::{
    Config, CrawlerConfig, FetcherConfig, StorageConfig, UserAgentConfig,
};
use policy_crawler::crawler::SharedStorage;
use policy_crawler::model::{Country, Frequency, Sector, SourceDraft, SourceKind};
use policy_crawler::storage::SqliteStorage;
use policy_crawler::{CrawlJob, Orchestrator};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with short timeouts and fast backoff
pub fn test_config() -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent_items: 4,
            max_items_per_job: 20,
            job_deadline_secs: None,
        },
        fetcher: FetcherConfig {
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            max_retries: 2,
            backoff_base_ms: 10,
            max_backoff_ms: 50,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        storage: StorageConfig {
            database_path: ":memory:".to_string(),
        },
    }
}

pub fn memory_storage() -> SharedStorage {
    Arc::new(Mutex::new(
        SqliteStorage::open_in_memory().expect("in-memory database"),
    ))
}

/// Storage plus an orchestrator over it
pub fn setup(config: &Config) -> (SharedStorage, Orchestrator) {
    let storage = memory_storage();
    let orchestrator =
        Orchestrator::new(config, Arc::clone(&storage)).expect("orchestrator should build");
    (storage, orchestrator)
}

pub fn draft(url: &str, kind: SourceKind) -> SourceDraft {
    SourceDraft {
        name: "Test Regulator".to_string(),
        url: url.to_string(),
        country: Country::Philippines,
        sector: Sector::Power,
        frequency: Frequency::Weekly,
        kind,
    }
}

/// Serves `body` as HTML at `page_path`
pub async fn mount_html(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
        .mount(server)
        .await;
}

/// Polls a job until it reaches a terminal state
pub async fn wait_for_terminal(orchestrator: &Orchestrator, job_id: i64) -> CrawlJob {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        let job = orchestrator.job_status(job_id).expect("job should exist");
        if job.is_terminal() {
            return job;
        }
        assert!(
            Instant::now() < deadline,
            "job {} did not finish, last state: {:?}",
            job_id,
            job
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
