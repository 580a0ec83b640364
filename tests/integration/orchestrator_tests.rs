//! End-to-end crawl job tests

use crate::common::{draft, mount_html, setup, test_config, wait_for_terminal};
use policy_crawler::crawler::{
    ExtractionError, Extractor, JobEvent, NormalizedText, Orchestrator, RuleExtractor,
};
use policy_crawler::model::{Classification, DataPointDraft, SourceKind};
use policy_crawler::storage::Storage;
use policy_crawler::{CrawlerError, JobStatus};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CIRCULAR: &str = r#"<html><head><title>Memorandum Circular No. 12</title></head>
<body>
  <nav>Home | Issuances | Contact</nav>
  <p>This circular sets the policy framework for net metering.</p>
  <p>Feed-in tariff: 5.2 PHP/kWh</p>
  <footer>Copyright</footer>
</body></html>"#;

/// Fails on any page mentioning CORRUPT, otherwise defers to the rule extractor
struct FlakyExtractor {
    inner: RuleExtractor,
}

impl Extractor for FlakyExtractor {
    fn extract(&self, content: &NormalizedText) -> Result<Vec<DataPointDraft>, ExtractionError> {
        if content.text.contains("CORRUPT") {
            return Err(ExtractionError::Failed("unreadable table".to_string()));
        }
        self.inner.extract(content)
    }
}

#[tokio::test]
async fn test_first_crawl_stores_document_and_data_point() {
    let server = MockServer::start().await;
    mount_html(&server, "/", CIRCULAR).await;

    let (storage, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    assert_eq!(started.status, JobStatus::Running);
    assert!(started.started_at.is_some());

    let job = wait_for_terminal(&orchestrator, started.id).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!((job.items_crawled, job.items_new), (1, 1));
    assert!(job.completed_at.is_some());
    assert!(job.error_message.is_none());

    let storage = storage.lock().unwrap();
    let documents = storage.list_documents(source.id).unwrap();
    assert_eq!(documents.len(), 1);
    let document = &documents[0];
    assert_eq!(document.classification, Classification::Policy);
    assert_eq!(document.title, "Memorandum Circular No. 12");
    assert_eq!(document.country, "PH");
    assert!(!document.verified);
    assert!(!document.content.contains("Issuances"));

    let points = storage.get_data_points(document.id).unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].key, "feed-in tariff");
    assert_eq!(points[0].value.as_number(), Some(5.2));
    assert_eq!(points[0].unit.as_deref(), Some("PHP/kWh"));
    assert!(points[0].confidence > 0.0 && points[0].confidence <= 1.0);
    assert_eq!(points[0].source_label, "Test Regulator");
}

#[tokio::test]
async fn test_identical_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    mount_html(&server, "/", CIRCULAR).await;

    let (storage, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let first = orchestrator.start_job(source.id).await.unwrap();
    wait_for_terminal(&orchestrator, first.id).await;

    let second = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, second.id).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!((job.items_crawled, job.items_new), (1, 0));

    let storage = storage.lock().unwrap();
    assert_eq!(storage.list_documents(source.id).unwrap().len(), 1);
    assert_eq!(storage.count_data_points().unwrap(), 1);
}

#[tokio::test]
async fn test_changed_content_creates_new_version() {
    let server = MockServer::start().await;
    mount_html(&server, "/", CIRCULAR).await;

    let (storage, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let first = orchestrator.start_job(source.id).await.unwrap();
    wait_for_terminal(&orchestrator, first.id).await;

    server.reset().await;
    mount_html(&server, "/", &CIRCULAR.replace("5.2", "5.4")).await;

    let second = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, second.id).await;
    assert_eq!((job.items_crawled, job.items_new), (1, 1));

    let storage = storage.lock().unwrap();
    let documents = storage.list_documents(source.id).unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].url, documents[1].url);
    assert_ne!(documents[0].content_hash, documents[1].content_hash);
}

#[tokio::test]
async fn test_entry_point_404_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (storage, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Regulator))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, started.id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.items_crawled, 0);
    assert_eq!(job.items_new, 0);
    let message = job.error_message.unwrap();
    assert!(message.contains("404"), "unexpected message: {}", message);
    assert!(storage
        .lock()
        .unwrap()
        .list_documents(source.id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_extraction_failure_skips_only_that_item() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><body><p>Index of circulars: 2</p>
        <a href="/circulars/1">One</a><a href="/circulars/2">Two</a></body></html>"#,
    )
    .await;
    mount_html(
        &server,
        "/circulars/1",
        "<html><body><p>Reserve margin: 4.5%</p></body></html>",
    )
    .await;
    mount_html(
        &server,
        "/circulars/2",
        "<html><body><p>CORRUPT scan</p></body></html>",
    )
    .await;

    let config = test_config();
    let (storage, _) = setup(&config);
    let orchestrator = Orchestrator::with_extractor(
        &config,
        Arc::clone(&storage),
        Arc::new(FlakyExtractor {
            inner: RuleExtractor::new().unwrap(),
        }),
    )
    .unwrap();
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Regulator))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, started.id).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!((job.items_crawled, job.items_new), (3, 2));

    let storage = storage.lock().unwrap();
    let documents = storage.list_documents(source.id).unwrap();
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|d| !d.url.ends_with("/circulars/2")));
}

#[tokio::test]
async fn test_concurrent_identical_items_dedupe() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><body><p>Mirrors</p>
        <a href="/a">A</a><a href="/b">B</a><a href="/c">C</a></body></html>"#,
    )
    .await;
    for mirror in ["/a", "/b", "/c"] {
        mount_html(
            &server,
            mirror,
            "<html><body><p>Policy rate: 6.50%</p></body></html>",
        )
        .await;
    }

    let (storage, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::General))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, started.id).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!((job.items_crawled, job.items_new), (4, 2));
    assert_eq!(
        storage
            .lock()
            .unwrap()
            .list_documents(source.id)
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_items_capped_per_job() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/a">A</a><a href="/b">B</a><a href="/c">C</a></body></html>"#,
    )
    .await;
    for (page, text) in [("/a", "first"), ("/b", "second"), ("/c", "third")] {
        mount_html(&server, page, &format!("<body>{}</body>", text)).await;
    }

    let mut config = test_config();
    config.crawler.max_items_per_job = 2;
    let (_, orchestrator) = setup(&config);
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::General))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, started.id).await;
    assert_eq!(job.items_crawled, 2);
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_html(&server, "/", CIRCULAR).await;

    let (_, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, started.id).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.items_new, 1);
}

#[tokio::test]
async fn test_robots_disallowed_entry_fails_job() {
    let server = MockServer::start().await;
    mount_html(&server, "/", CIRCULAR).await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .mount(&server)
        .await;

    let (_, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, started.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.items_crawled, 0);
    assert!(job.error_message.unwrap().contains("robots.txt"));
}

#[tokio::test]
async fn test_robots_disallowed_item_is_skipped() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><body><p>Issuances</p><a href="/public/1">1</a><a href="/private/2">2</a></body></html>"#,
    )
    .await;
    mount_html(&server, "/public/1", "<body>Public notice</body>").await;
    Mock::given(method("GET"))
        .and(path("/private/2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("secret", "text/html"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&server)
        .await;

    let (_, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::General))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, started.id).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!((job.items_crawled, job.items_new), (3, 2));
}

#[tokio::test]
async fn test_unknown_and_inactive_sources_create_no_job() {
    let server = MockServer::start().await;
    let (_, orchestrator) = setup(&test_config());

    assert!(matches!(
        orchestrator.start_job(404).await,
        Err(CrawlerError::SourceNotFound(404))
    ));

    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::General))
        .unwrap();
    orchestrator.set_source_active(source.id, false).unwrap();
    assert!(matches!(
        orchestrator.start_job(source.id).await,
        Err(CrawlerError::SourceInactive(id)) if id == source.id
    ));

    assert!(orchestrator.list_jobs().unwrap().is_empty());
    assert!(matches!(
        orchestrator.job_status(1),
        Err(CrawlerError::JobNotFound(1))
    ));
}

#[tokio::test]
async fn test_duplicate_active_source_is_rejected() {
    let (_, orchestrator) = setup(&test_config());
    orchestrator
        .create_source(draft("https://erc.gov.ph/issuances/", SourceKind::Regulator))
        .unwrap();

    let err = orchestrator
        .create_source(draft("https://ERC.gov.ph/issuances/#top", SourceKind::Regulator))
        .unwrap_err();
    assert!(matches!(err, CrawlerError::Validation(_)));
}

#[tokio::test]
async fn test_list_jobs_newest_first() {
    let server = MockServer::start().await;
    mount_html(&server, "/", CIRCULAR).await;

    let (_, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let first = orchestrator.start_job(source.id).await.unwrap();
    wait_for_terminal(&orchestrator, first.id).await;
    let second = orchestrator.start_job(source.id).await.unwrap();
    wait_for_terminal(&orchestrator, second.id).await;

    let ids: Vec<i64> = orchestrator
        .list_crawl_jobs()
        .unwrap()
        .iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_events_report_start_and_finish() {
    let server = MockServer::start().await;
    mount_html(&server, "/", CIRCULAR).await;

    let (_, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let mut events = orchestrator.subscribe();
    let started = orchestrator.start_crawl_job(source.id).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, JobEvent::Started(ref job) if job.id == started.id));

    let second = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .unwrap()
        .unwrap();
    match second {
        JobEvent::Finished(job) => {
            assert_eq!(job.id, started.id);
            assert_eq!(job.status, JobStatus::Done);
            assert_eq!(job.items_new, 1);
        }
        other => panic!("expected finish event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_job_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(CIRCULAR, "text/html")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let (_, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    assert!(orchestrator.cancel_job(started.id).unwrap());

    let job = wait_for_terminal(&orchestrator, started.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.items_crawled, 0);
    assert!(job.error_message.unwrap().contains("cancelled"));

    // finished jobs are no longer cancellable
    assert!(!orchestrator.cancel_job(started.id).unwrap());
}

#[tokio::test]
async fn test_cancel_before_entry_fetch_skips_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nAllow: /")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(CIRCULAR, "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let (_, orchestrator) = setup(&test_config());
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    assert!(orchestrator.cancel_job(started.id).unwrap());

    let job = wait_for_terminal(&orchestrator, started.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.items_crawled, 0);
    assert!(job.error_message.unwrap().contains("cancelled"));
}

#[tokio::test]
async fn test_job_deadline_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(CIRCULAR, "text/html")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.job_deadline_secs = Some(1);
    let (_, orchestrator) = setup(&config);
    let source = orchestrator
        .create_source(draft(&server.uri(), SourceKind::Policy))
        .unwrap();

    let started = orchestrator.start_job(source.id).await.unwrap();
    let job = wait_for_terminal(&orchestrator, started.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("deadline"));
}
