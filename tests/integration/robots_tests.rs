//! robots.txt handling during real crawls

use crate::common::{mount_page, requests_to, TestEnv};
use driftnet::crawler::{Crawler, SessionSpec};
use driftnet::storage::ResultStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/plain"))
        .mount(server)
        .await;
}

async fn crawl(env: &TestEnv, session_id: &str) {
    let crawler = Crawler::from_config(&env.config, env.storage.clone())
        .expect("Failed to create crawler");
    crawler
        .start(SessionSpec::from_config(&env.config).with_session_id(session_id))
        .expect("Failed to start session");
    crawler
        .await_termination(session_id)
        .await
        .expect("Session failed");
}

#[tokio::test]
async fn test_disallowed_paths_are_never_fetched() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private\n").await;
    mount_page(&server, "/", &["/private/a", "/public"]).await;
    mount_page(&server, "/private/a", &[]).await;
    mount_page(&server, "/public", &[]).await;

    let base = server.uri();
    let env = TestEnv::new(&[format!("{}/", base)]);
    crawl(&env, "robots").await;

    assert_eq!(env.storage.count("robots").unwrap(), 2);
    assert!(env
        .storage
        .exists("robots", &format!("{}/public", base))
        .unwrap());
    assert!(!env
        .storage
        .exists("robots", &format!("{}/private/a", base))
        .unwrap());
    assert_eq!(requests_to(&server, "/private/a").await, 0);
    assert_eq!(requests_to(&server, "/robots.txt").await, 1);
}

#[tokio::test]
async fn test_agent_specific_group_applies() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        "User-agent: driftnet-test\nDisallow: /\n\nUser-agent: *\nAllow: /\n",
    )
    .await;
    mount_page(&server, "/", &["/a"]).await;

    let env = TestEnv::new(&[format!("{}/", server.uri())]);
    crawl(&env, "agent").await;

    assert_eq!(env.storage.count("agent").unwrap(), 0);
    assert_eq!(requests_to(&server, "/").await, 0);
}

#[tokio::test]
async fn test_robots_check_can_be_disabled() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /\n").await;
    mount_page(&server, "/", &["/a"]).await;
    mount_page(&server, "/a", &[]).await;

    let mut env = TestEnv::new(&[format!("{}/", server.uri())]);
    env.config.http.robots_txt = false;
    crawl(&env, "ignored").await;

    assert_eq!(env.storage.count("ignored").unwrap(), 2);
    assert_eq!(requests_to(&server, "/robots.txt").await, 0);
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a"]).await;
    mount_page(&server, "/a", &[]).await;

    let env = TestEnv::new(&[format!("{}/", server.uri())]);
    crawl(&env, "open").await;

    assert_eq!(env.storage.count("open").unwrap(), 2);
    assert_eq!(requests_to(&server, "/robots.txt").await, 1);
}
