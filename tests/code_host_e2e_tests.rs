mod common;

use common::{eventually, provider_set, services};
use serde_json::json;
use std::sync::Arc;
use tributary::config::Config;
use tributary::providers::code_host::CodeHostProvider;
use tributary::providers::{Provider, PullOptions};
use tributary_schema::{ContentItem, ProviderKind, SyncStatus};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HEAD_SHA: &str = "c0ffee0000000000000000000000000000000001";

async fn mock_repo(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "default_branch": "main" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/commits/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": HEAD_SHA,
            "commit": { "committer": { "date": "2024-05-01T10:00:00Z" } }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/git/trees/{HEAD_SHA}")))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": HEAD_SHA,
            "truncated": false,
            "tree": [
                { "path": "README.md", "type": "blob", "size": 10 },
                { "path": "src", "type": "tree" },
                { "path": "src/lib.rs", "type": "blob", "size": 18 },
                { "path": "node_modules/left-pad/index.js", "type": "blob", "size": 12 },
                { "path": "assets/logo.png", "type": "blob", "size": 2048 },
                { "path": "debug.log", "type": "blob", "size": 5 }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/.gitignore"))
        .respond_with(ResponseTemplate::new(200).set_body_string("*.log\n"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/README.md"))
        .and(query_param("ref", HEAD_SHA))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Widgets"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/src/lib.rs"))
        .and(query_param("ref", HEAD_SHA))
        .respond_with(ResponseTemplate::new(200).set_body_string("pub fn widget() {}"))
        .mount(server)
        .await;
    // Ignored paths must never be fetched.
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/debug.log"))
        .respond_with(ResponseTemplate::new(200).set_body_string("noise"))
        .expect(0)
        .mount(server)
        .await;
}

fn provider(server: &MockServer) -> CodeHostProvider {
    let mut cfg = Config::default();
    cfg.providers.code_host.api_url = Url::parse(&server.uri()).expect("mock url");
    cfg.providers.code_host.token = Some("ghp_test".to_string());
    CodeHostProvider::new(cfg.code_host()).expect("code-host provider")
}

#[tokio::test]
async fn register_then_first_sync_records_success() {
    let server = MockServer::start().await;
    mock_repo(&server).await;

    let db = common::temp_db("code-host-e2e").await;
    let (services, sink) = services(db, provider_set(vec![Arc::new(provider(&server))]));

    let registration = services
        .plans
        .register_resource(ProviderKind::CodeHost, "acme/widgets", Some("alice"), Some(3600))
        .await
        .expect("register");
    assert_eq!(registration.config.cadence_secs, 3600);
    assert_eq!(registration.plan.resource_id, "acme/widgets");

    // Registration arms an immediate wake.
    let history = eventually("first sync", || {
        let plans = services.plans.clone();
        async move {
            let entries = plans.history_by_resource("acme/widgets", None).await.ok()?;
            (!entries.is_empty()).then_some(entries)
        }
    })
    .await;

    assert_eq!(history.len(), 1);
    let entry = &history[0];
    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.previous_cursor, "");
    assert_eq!(entry.new_cursor, HEAD_SHA);
    assert_eq!(entry.items_processed, 2);
    assert_eq!(entry.sync_plan_id, registration.plan.id);
    let mut paths = entry.updated_paths.0.clone();
    paths.sort();
    assert_eq!(paths, vec!["README.md", "src/lib.rs"]);

    let info = services
        .plans
        .resource_info(ProviderKind::CodeHost, "acme/widgets")
        .await
        .expect("info");
    assert_eq!(info.config.cursor, HEAD_SHA);
    assert!(info.next_wake_at.is_some());

    let uploaded = sink.items().await;
    assert_eq!(uploaded.len(), 2);
    for item in &uploaded {
        assert_eq!(item.category, "code");
        assert_eq!(item.user_id.as_deref(), Some("alice"));
        let (meta, _) = ContentItem::split_header(&item.content).expect("metadata header");
        assert_eq!(meta["source"], "code_host");
        assert_eq!(meta["origin"], "acme/widgets");
        assert_eq!(meta["commit"], HEAD_SHA);
    }

    // Head has not moved: the next sync emits nothing and keeps the cursor.
    let report = services
        .plans
        .sync_resource("acme/widgets", ProviderKind::CodeHost, None)
        .await
        .expect("second sync");
    assert_eq!(report.items_processed, 0);
    assert_eq!(report.new_cursor, HEAD_SHA);
}

#[tokio::test]
async fn incremental_pull_fetches_only_changed_paths() {
    let server = MockServer::start().await;
    mock_repo(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/compare/old-sha...{HEAD_SHA}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                { "filename": "src/lib.rs", "status": "modified" },
                { "filename": "src/old.rs", "status": "removed" },
                { "filename": "debug.log", "status": "added" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider(&server)
        .pull(PullOptions {
            user_id: None,
            resource_id: "acme/widgets".to_string(),
            cursor: "old-sha".to_string(),
        })
        .await
        .expect("pull");

    assert_eq!(result.new_cursor.as_deref(), Some(HEAD_SHA));
    let paths: Vec<&str> = result.items.iter().map(|i| i.path()).collect();
    assert_eq!(paths, vec!["src/lib.rs"]);
    let (_, body) = ContentItem::split_header(&result.items[0].content).expect("header");
    assert_eq!(body, "pub fn widget() {}");
}

#[tokio::test]
async fn failed_file_fetch_holds_the_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/src/lib.rs"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    mock_repo(&server).await;

    let result = provider(&server)
        .pull(PullOptions {
            user_id: None,
            resource_id: "acme/widgets".to_string(),
            cursor: String::new(),
        })
        .await
        .expect("pull");

    let paths: Vec<&str> = result.items.iter().map(|i| i.path()).collect();
    assert_eq!(paths, vec!["README.md"]);
    assert_eq!(result.new_cursor, None);
}
