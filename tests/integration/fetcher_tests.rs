//! Fetcher retry behavior against a mock server

use crate::common::test_config;
use policy_crawler::crawler::{FetchError, Fetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> Fetcher {
    Fetcher::from_config(&test_config()).unwrap()
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let server = MockServer::start().await;
    // first attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/flaky", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Http { status: 500, .. }));
}

#[tokio::test]
async fn test_recovers_after_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notice"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notice"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
        .mount(&server)
        .await;

    let raw = fetcher()
        .fetch(&format!("{}/notice", server.uri()))
        .await
        .unwrap();
    assert_eq!(raw.status, 200);
    assert_eq!(raw.body, b"<p>ok</p>");
    assert!(raw.is_html());
}

#[tokio::test]
async fn test_charset_is_captured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"<p>Pe\xf1a</p>".to_vec(), "text/html; charset=ISO-8859-1"),
        )
        .mount(&server)
        .await;

    let raw = fetcher()
        .fetch(&format!("{}/latin", server.uri()))
        .await
        .unwrap();
    assert_eq!(raw.content_type.as_deref(), Some("text/html"));
    assert_eq!(raw.charset.as_deref(), Some("iso-8859-1"));
    assert_eq!(
        policy_crawler::crawler::decode_body(&raw.body, raw.charset.as_deref()),
        "<p>Peña</p>"
    );
}
