//! HTTP client and retry behavior against a mock server

use crate::common::requests_to;
use driftnet::config::HttpConfig;
use driftnet::crawler::{FaultTolerantFetcher, FetchClient, FetchOutcome, FetchRequest, HttpClient};
use driftnet::FetchError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn short_timeout_client(max_content_length: u64) -> HttpClient {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build client");
    HttpClient::with_client(client, max_content_length)
}

#[tokio::test]
async fn test_get_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("hello", "text/plain; charset=UTF-8")
                .insert_header("last-modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(&HttpConfig::default()).unwrap();
    let outcome = client
        .fetch(&FetchRequest::get(format!("{}/doc", server.uri())))
        .await
        .unwrap();

    match outcome {
        FetchOutcome::Document(data) => {
            assert_eq!(data.status_code, 200);
            assert_eq!(data.body, b"hello");
            assert_eq!(data.content_length, 5);
            assert_eq!(data.mime_type.as_deref(), Some("text/plain"));
            assert_eq!(data.charset.as_deref(), Some("utf-8"));
            assert!(data.last_modified.is_some());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_head_has_no_body() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = HttpClient::new(&HttpConfig::default()).unwrap();
    let outcome = client
        .fetch(&FetchRequest::head(format!("{}/doc", server.uri())))
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Document(data) if data.body.is_empty()));
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&HttpConfig::default()).unwrap();
    let outcome = client
        .fetch(&FetchRequest::get(format!("{}/old", server.uri())))
        .await
        .unwrap();

    match outcome {
        FetchOutcome::Document(data) => {
            assert_eq!(data.status_code, 302);
            assert_eq!(data.redirect_location, Some(format!("{}/new", server.uri())));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(requests_to(&server, "/new").await, 0);
}

#[tokio::test]
async fn test_transient_failures_retried_exactly_max_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = FaultTolerantFetcher::new(Arc::new(short_timeout_client(1024)))
        .with_max_retry_count(3)
        .with_retry_interval(Duration::from_millis(10));

    let url = format!("{}/slow", server.uri());
    let err = fetcher.fetch(&FetchRequest::get(&url)).await.unwrap_err();

    match err {
        FetchError::RetriesExhausted {
            url: failed, causes, ..
        } => {
            assert_eq!(failed, url);
            assert_eq!(causes.len(), 3);
            assert!(causes.iter().all(|c| matches!(c, FetchError::Timeout { .. })));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(requests_to(&server, "/slow").await, 3);
}

#[tokio::test]
async fn test_too_large_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'x'; 1000], "text/plain"))
        .mount(&server)
        .await;

    let fetcher = FaultTolerantFetcher::new(Arc::new(short_timeout_client(16)))
        .with_max_retry_count(5)
        .with_retry_interval(Duration::from_millis(10));

    let outcome = fetcher
        .fetch(&FetchRequest::get(format!("{}/big", server.uri())))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        FetchOutcome::TooLarge {
            size: 1000,
            limit: 16,
            ..
        }
    ));
    assert_eq!(requests_to(&server, "/big").await, 1);
}

#[tokio::test]
async fn test_error_status_is_a_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = FaultTolerantFetcher::new(Arc::new(short_timeout_client(1024)))
        .with_max_retry_count(3)
        .with_retry_interval(Duration::ZERO);

    let outcome = fetcher
        .fetch(&FetchRequest::get(format!("{}/broken", server.uri())))
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Document(data) if data.status_code == 500));
    assert_eq!(requests_to(&server, "/broken").await, 1);
}
