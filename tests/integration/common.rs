//! Shared fixtures for the integration tests

use driftnet::config::{load_config, Config};
use driftnet::storage::SqliteStorage;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A temporary directory holding the config file and database of a test
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
    pub storage: Arc<SqliteStorage>,
}

impl TestEnv {
    /// Writes a config with fast intervals for the given seeds and loads it
    pub fn new(seeds: &[String]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("driftnet.db");
        let seeds = seeds
            .iter()
            .map(|s| format!("{:?}", s))
            .collect::<Vec<_>>()
            .join(", ");

        let content = format!(
            r#"
seeds = [{seeds}]

[crawler]
thread-count = 4
max-thread-check-count = 3

[retry]
max-retry-count = 2
retry-interval = 10

[interval]
no-url-in-queue = 10
waiting-new-url = 5

[http]
user-agent = "driftnet-test/1.0"
timeout = 5

[storage]
database-path = {db:?}
"#,
            seeds = seeds,
            db = db_path.display().to_string(),
        );

        let config_path = dir.path().join("driftnet.toml");
        std::fs::write(&config_path, content).expect("Failed to write config");
        let config = load_config(&config_path).expect("Failed to load config");
        let storage = Arc::new(SqliteStorage::new(&db_path).expect("Failed to open storage"));

        Self {
            dir,
            config,
            storage,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Serves an HTML page linking to `links`
pub async fn mount_page(server: &MockServer, route: &str, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
        .collect();

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("<html><body>{}</body></html>", anchors),
            "text/html",
        ))
        .mount(server)
        .await;
}

/// Counts the requests the server received for a path, any method
pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}

/// Anchored pattern matching everything under a server
pub fn scope_of(server: &MockServer) -> String {
    format!("{}/.*", regex::escape(&server.uri()))
}
