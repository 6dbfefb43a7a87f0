//! Crawls of local directory trees through `file://` seeds

use crate::common::TestEnv;
use driftnet::crawler::{Crawler, SessionSpec};
use driftnet::storage::ResultStore;
use std::fs;
use std::path::Path;
use url::Url;

fn dir_url(path: &Path) -> String {
    Url::from_directory_path(path).unwrap().to_string()
}

fn file_url(path: &Path) -> String {
    Url::from_file_path(path).unwrap().to_string()
}

#[tokio::test]
async fn test_directory_tree_is_crawled() {
    let tree = tempfile::tempdir().unwrap();
    fs::write(tree.path().join("a.txt"), "alpha").unwrap();
    fs::create_dir(tree.path().join("sub")).unwrap();
    fs::write(tree.path().join("sub").join("b.txt"), "beta").unwrap();
    fs::write(
        tree.path().join("sub").join("index.html"),
        r#"<html><body><a href="../a.txt">up</a></body></html>"#,
    )
    .unwrap();

    let env = TestEnv::new(&[dir_url(tree.path())]);
    let crawler = Crawler::from_config(&env.config, env.storage.clone()).unwrap();
    let id = crawler
        .start(SessionSpec::from_config(&env.config).with_session_id("fs"))
        .unwrap();
    crawler.await_termination(&id).await.unwrap();

    // Directories expand into children but are not stored themselves
    assert_eq!(env.storage.count("fs").unwrap(), 3);
    assert!(!env.storage.exists("fs", &dir_url(tree.path())).unwrap());

    let a = env
        .storage
        .get("fs", &file_url(&tree.path().join("a.txt")))
        .unwrap()
        .expect("a.txt stored");
    assert_eq!(a.data, b"alpha");
    assert_eq!(a.depth, 1);
    assert_eq!(a.mime_type.as_deref(), Some("text/plain"));

    let b = env
        .storage
        .get("fs", &file_url(&tree.path().join("sub").join("b.txt")))
        .unwrap()
        .expect("b.txt stored");
    assert_eq!(b.depth, 2);
    assert_eq!(b.parent_url, Some(dir_url(&tree.path().join("sub"))));
}

#[tokio::test]
async fn test_oversize_files_are_skipped() {
    let tree = tempfile::tempdir().unwrap();
    fs::write(tree.path().join("small.txt"), "ok").unwrap();
    fs::write(tree.path().join("large.bin"), vec![0u8; 4096]).unwrap();

    let mut env = TestEnv::new(&[dir_url(tree.path())]);
    env.config.http.max_content_length = 64;

    let crawler = Crawler::from_config(&env.config, env.storage.clone()).unwrap();
    let id = crawler
        .start(SessionSpec::from_config(&env.config).with_session_id("fs"))
        .unwrap();
    crawler.await_termination(&id).await.unwrap();

    assert_eq!(env.storage.count("fs").unwrap(), 1);
    assert!(env
        .storage
        .exists("fs", &file_url(&tree.path().join("small.txt")))
        .unwrap());
    assert!(!env
        .storage
        .exists("fs", &file_url(&tree.path().join("large.bin")))
        .unwrap());
}
