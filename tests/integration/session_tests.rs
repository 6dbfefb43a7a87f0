//! Session lifecycle: concurrency, stop and cleanup

use crate::common::{mount_page, requests_to, scope_of, TestEnv};
use driftnet::crawler::{Crawler, SessionSpec};
use driftnet::storage::{FilterKind, FilterStore, QueueStore, ResultStore};
use driftnet::{CrawlError, SessionStatus};
use std::time::Duration;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_concurrent_sessions_do_not_leak() {
    let site_a = MockServer::start().await;
    let site_b = MockServer::start().await;
    let a = site_a.uri();
    let b = site_b.uri();

    mount_page(&site_a, "/", &["/one", &format!("{}/one", b)]).await;
    mount_page(&site_a, "/one", &["/two"]).await;
    mount_page(&site_a, "/two", &[]).await;
    mount_page(&site_b, "/", &["/one", &format!("{}/two", a)]).await;
    mount_page(&site_b, "/one", &[]).await;

    let env = TestEnv::new(&[format!("{}/", a)]);
    let crawler = Crawler::from_config(&env.config, env.storage.clone()).unwrap();

    let spec_a = SessionSpec::new([format!("{}/", a)])
        .with_session_id("a")
        .with_limits(driftnet::CrawlLimits::from(&env.config.crawler))
        .with_include(scope_of(&site_a));
    let spec_b = SessionSpec::new([format!("{}/", b)])
        .with_session_id("b")
        .with_limits(driftnet::CrawlLimits::from(&env.config.crawler))
        .with_include(scope_of(&site_b));

    crawler.start(spec_a).unwrap();
    crawler.start(spec_b).unwrap();
    crawler.await_termination("a").await.unwrap();
    crawler.await_termination("b").await.unwrap();

    assert_eq!(env.storage.count("a").unwrap(), 3);
    assert_eq!(env.storage.count("b").unwrap(), 2);

    let mut urls_a = Vec::new();
    env.storage
        .iterate("a", &mut |result| {
            urls_a.push(result.url.clone());
            Ok(())
        })
        .unwrap();
    assert!(urls_a.iter().all(|url| url.starts_with(&a)));

    let mut urls_b = Vec::new();
    env.storage
        .iterate("b", &mut |result| {
            urls_b.push(result.url.clone());
            Ok(())
        })
        .unwrap();
    assert!(urls_b.iter().all(|url| url.starts_with(&b)));

    // Each site was fetched only by its own session
    assert_eq!(requests_to(&site_a, "/two").await, 1);
    assert_eq!(requests_to(&site_b, "/one").await, 1);
}

#[tokio::test]
async fn test_stop_keeps_unvisited_entries() {
    let server = MockServer::start().await;
    let links: Vec<String> = (0..20).map(|i| format!("/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    mount_page(&server, "/", &link_refs).await;
    Mock::given(method("GET"))
        .and(path_regex("^/p[0-9]+$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html></html>", "text/html")
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let mut env = TestEnv::new(&[format!("{}/", server.uri())]);
    env.config.crawler.thread_count = 1;
    let crawler = Crawler::from_config(&env.config, env.storage.clone()).unwrap();
    let id = crawler
        .start(SessionSpec::from_config(&env.config).with_session_id("stopped"))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(crawler.stop(&id).unwrap());
    crawler.await_termination(&id).await.unwrap();

    let status = crawler.status(&id).unwrap();
    assert_eq!(status.status, SessionStatus::Done);
    assert!(status.access_count < 21);

    let stored = env.storage.count(&id).unwrap();
    let queued = env.storage.queue_len(&id).unwrap();
    assert!(queued > 0);
    assert_eq!(stored + queued, 21);
    assert!(!crawler.stop(&id).unwrap());
}

#[tokio::test]
async fn test_stopped_session_resumes_under_same_id() {
    let server = MockServer::start().await;
    let links: Vec<String> = (0..10).map(|i| format!("/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    mount_page(&server, "/", &link_refs).await;
    for link in &links {
        mount_page(&server, link, &[]).await;
    }

    let mut env = TestEnv::new(&[format!("{}/", server.uri())]);
    env.config.crawler.thread_count = 1;
    env.config.crawler.max_access_count = 4;
    let crawler = Crawler::from_config(&env.config, env.storage.clone()).unwrap();
    crawler
        .start(SessionSpec::from_config(&env.config).with_session_id("resumable"))
        .unwrap();
    crawler.await_termination("resumable").await.unwrap();
    assert_eq!(env.storage.count("resumable").unwrap(), 4);

    // A fresh crawler picks the persisted queue back up
    env.config.crawler.max_access_count = 0;
    let crawler = Crawler::from_config(&env.config, env.storage.clone()).unwrap();
    crawler
        .start(SessionSpec::from_config(&env.config).with_session_id("resumable"))
        .unwrap();
    crawler.await_termination("resumable").await.unwrap();

    assert_eq!(env.storage.count("resumable").unwrap(), 11);
    assert_eq!(env.storage.queue_len("resumable").unwrap(), 0);
    for link in &links {
        assert_eq!(requests_to(&server, link).await, 1, "{}", link);
    }
}

#[tokio::test]
async fn test_cleanup_removes_everything() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a"]).await;
    mount_page(&server, "/a", &[]).await;

    let env = TestEnv::new(&[format!("{}/", server.uri())]);
    let crawler = Crawler::from_config(&env.config, env.storage.clone()).unwrap();
    crawler
        .start(
            SessionSpec::from_config(&env.config)
                .with_session_id("gone")
                .with_include(scope_of(&server)),
        )
        .unwrap();
    crawler.await_termination("gone").await.unwrap();
    assert_eq!(env.storage.count("gone").unwrap(), 2);

    crawler.cleanup("gone").await.unwrap();

    assert_eq!(env.storage.count("gone").unwrap(), 0);
    assert_eq!(env.storage.queue_len("gone").unwrap(), 0);
    assert!(env
        .storage
        .patterns("gone", FilterKind::Include)
        .unwrap()
        .is_empty());
    assert!(matches!(
        crawler.status("gone"),
        Err(CrawlError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_duplicate_session_is_rejected() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &[]).await;

    let env = TestEnv::new(&[format!("{}/", server.uri())]);
    let crawler = Crawler::from_config(&env.config, env.storage.clone()).unwrap();
    let spec = SessionSpec::from_config(&env.config).with_session_id("dup");

    crawler.start(spec.clone()).unwrap();
    assert!(matches!(
        crawler.start(spec),
        Err(CrawlError::SessionExists(_))
    ));
    crawler.await_termination("dup").await.unwrap();
}
