//! End-to-end crawls of a single mock site

use crate::common::{mount_page, requests_to, scope_of, TestEnv};
use driftnet::crawler::{Crawler, SessionSpec};
use driftnet::storage::{QueueStore, ResultStatus, ResultStore};
use driftnet::SessionStatus;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run_session(env: &TestEnv, spec: SessionSpec) -> Crawler {
    let crawler = Crawler::from_config(&env.config, env.storage.clone())
        .expect("Failed to create crawler");
    let session_id = crawler.start(spec).expect("Failed to start session");
    crawler
        .await_termination(&session_id)
        .await
        .expect("Session failed");
    crawler
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/page1", "/page2"]).await;
    mount_page(&server, "/page1", &["/", "/page2"]).await;
    mount_page(&server, "/page2", &["/page1", "/missing"]).await;

    let base = server.uri();
    let env = TestEnv::new(&[format!("{}/", base)]);
    let spec = SessionSpec::from_config(&env.config).with_session_id("site");

    let crawler = run_session(&env, spec).await;

    let status = crawler.status("site").unwrap();
    assert_eq!(status.status, SessionStatus::Done);
    assert_eq!(status.access_count, 3);
    assert_eq!(env.storage.count("site").unwrap(), 3);

    // Every page fetched exactly once, the 404 is not stored
    assert_eq!(requests_to(&server, "/").await, 1);
    assert_eq!(requests_to(&server, "/page1").await, 1);
    assert_eq!(requests_to(&server, "/page2").await, 1);
    assert_eq!(requests_to(&server, "/missing").await, 1);
    assert!(!env
        .storage
        .exists("site", &format!("{}/missing", base))
        .unwrap());

    let page1 = env
        .storage
        .get("site", &format!("{}/page1", base))
        .unwrap()
        .expect("page1 stored");
    assert_eq!(page1.depth, 1);
    assert_eq!(page1.http_status_code, 200);
    assert_eq!(page1.mime_type.as_deref(), Some("text/html"));
    assert_eq!(page1.parent_url, Some(format!("{}/", base)));
    assert!(String::from_utf8_lossy(&page1.data).contains("/page2"));

    assert_eq!(env.storage.queue_len("site").unwrap(), 0);
}

#[tokio::test]
async fn test_depth_bound() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/1"]).await;
    mount_page(&server, "/1", &["/2"]).await;
    mount_page(&server, "/2", &["/3"]).await;
    mount_page(&server, "/3", &[]).await;

    let mut env = TestEnv::new(&[format!("{}/", server.uri())]);
    env.config.crawler.max_depth = 1;
    let spec = SessionSpec::from_config(&env.config).with_session_id("depth");

    run_session(&env, spec).await;

    assert_eq!(env.storage.count("depth").unwrap(), 2);
    assert_eq!(requests_to(&server, "/2").await, 0);
    assert_eq!(requests_to(&server, "/3").await, 0);
}

#[tokio::test]
async fn test_access_count_bound() {
    let server = MockServer::start().await;
    let links: Vec<String> = (0..10).map(|i| format!("/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    mount_page(&server, "/", &link_refs).await;
    for link in &links {
        mount_page(&server, link, &[]).await;
    }

    let mut env = TestEnv::new(&[format!("{}/", server.uri())]);
    env.config.crawler.max_access_count = 3;
    let spec = SessionSpec::from_config(&env.config).with_session_id("bounded");

    let crawler = run_session(&env, spec).await;

    assert_eq!(env.storage.count("bounded").unwrap(), 3);
    assert_eq!(crawler.status("bounded").unwrap().access_count, 3);
}

#[tokio::test]
async fn test_scope_filter() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", &["/admin/panel", "/docs/a", "http://elsewhere.invalid/"]).await;
    mount_page(&server, "/admin/panel", &[]).await;
    mount_page(&server, "/docs/a", &[]).await;

    let env = TestEnv::new(&[format!("{}/", base)]);
    let spec = SessionSpec::from_config(&env.config)
        .with_session_id("scoped")
        .with_include(scope_of(&server))
        .with_exclude(format!("{}/admin/.*", regex::escape(&base)));

    run_session(&env, spec).await;

    assert_eq!(env.storage.count("scoped").unwrap(), 2);
    assert_eq!(requests_to(&server, "/admin/panel").await, 0);
    assert!(env
        .storage
        .exists("scoped", &format!("{}/docs/a", base))
        .unwrap());
}

#[tokio::test]
async fn test_redirect_target_is_crawled_as_child() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", &["/old"]).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    mount_page(&server, "/new", &[]).await;

    let env = TestEnv::new(&[format!("{}/", base)]);
    let spec = SessionSpec::from_config(&env.config).with_session_id("redirect");

    run_session(&env, spec).await;

    assert!(!env
        .storage
        .exists("redirect", &format!("{}/old", base))
        .unwrap());
    let new = env
        .storage
        .get("redirect", &format!("{}/new", base))
        .unwrap()
        .expect("redirect target stored");
    assert_eq!(new.depth, 2);
    assert_eq!(new.parent_url, Some(format!("{}/old", base)));
}

#[tokio::test]
async fn test_unchanged_pages_are_not_modified_in_next_session() {
    let server = MockServer::start().await;
    let stamp = "Wed, 21 Oct 2015 07:28:00 GMT";
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>home</body></html>", "text/html")
                .insert_header("last-modified", stamp),
        )
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("last-modified", stamp))
        .mount(&server)
        .await;

    let env = TestEnv::new(&[format!("{}/", server.uri())]);
    run_session(
        &env,
        SessionSpec::from_config(&env.config).with_session_id("first"),
    )
    .await;

    let second = SessionSpec::from_config(&env.config)
        .with_session_id("second")
        .with_previous_session("first");
    run_session(&env, second).await;

    let result = env
        .storage
        .get("second", &format!("{}/", server.uri()))
        .unwrap()
        .expect("result for second session");
    assert_eq!(result.status, ResultStatus::NotModified);
    assert_eq!(result.http_status_code, 304);
    assert!(result.data.is_empty());

    let gets = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.to_string() == "GET" && r.url.path() == "/")
        .count();
    assert_eq!(gets, 1);
}
