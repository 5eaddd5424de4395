use serde_json::{Value, json};
use tributary::config::Config;
use tributary::providers::website::{CrawlCursor, WebsiteProvider};
use tributary::providers::{Provider, PullOptions, PullResult};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(title: &str, links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{href}">{href}</a>"#))
        .collect();
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>{title}</title></head><body><p>{title} body</p>{anchors}</body></html>"
        ),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, at: &str, page: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(page)
        .mount(server)
        .await;
}

async fn no_robots(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

async fn pull(server: &MockServer, site: Value, cursor: &str) -> PullResult {
    let provider = WebsiteProvider::new(Config::default().website()).expect("website provider");
    provider
        .pull(PullOptions {
            user_id: Some("alice".to_string()),
            resource_id: site.to_string(),
            cursor: cursor.to_string(),
        })
        .await
        .unwrap_or_else(|e| panic!("pull against {} failed: {e}", server.uri()))
}

fn emitted_paths(result: &PullResult) -> Vec<String> {
    let mut paths: Vec<String> = result
        .items
        .iter()
        .map(|item| item.path().to_string())
        .collect();
    paths.sort();
    paths
}

#[tokio::test]
async fn crawl_stops_at_configured_depth() {
    let server = MockServer::start().await;
    no_robots(&server).await;
    mount_page(&server, "/", html("Home", &["/a"])).await;
    mount_page(&server, "/a", html("A", &["/b"])).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("B", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let root = format!("{}/", server.uri());
    let result = pull(&server, json!({ "url": root, "depth": 1, "delayMs": 0 }), "").await;

    assert_eq!(
        emitted_paths(&result),
        vec![root.clone(), format!("{}/a", server.uri())]
    );
    let cursor = CrawlCursor::parse(result.new_cursor.as_deref().expect("cursor"));
    assert!(cursor.last_crawl.is_some());
    assert_eq!(cursor.crawled_urls.len(), 2);
    assert!(cursor.pending_urls.is_empty());

    let item = result.items.iter().find(|i| i.path() == root).expect("root item");
    assert_eq!(item.category, "webpage");
    assert!(item.content.contains("# Home"));
    assert!(item.content.contains("Home body"));
}

#[tokio::test]
async fn robots_disallow_is_honoured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", html("Home", &["/private/secret", "/public"])).await;
    mount_page(&server, "/public", html("Public", &[])).await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html("Secret", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let root = format!("{}/", server.uri());
    let result = pull(&server, json!({ "url": root, "delayMs": 0 }), "").await;

    assert_eq!(
        emitted_paths(&result),
        vec![root, format!("{}/public", server.uri())]
    );
}

#[tokio::test]
async fn malformed_robots_allows_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<<<not robots>>>\n\u{0}garbage"))
        .mount(&server)
        .await;
    mount_page(&server, "/", html("Home", &["/private/page"])).await;
    mount_page(&server, "/private/page", html("Private", &[])).await;

    let root = format!("{}/", server.uri());
    let result = pull(&server, json!({ "url": root, "delayMs": 0 }), "").await;
    assert_eq!(result.items.len(), 2);
}

#[tokio::test]
async fn stale_pages_are_crawled_but_not_emitted() {
    let server = MockServer::start().await;
    no_robots(&server).await;
    mount_page(
        &server,
        "/",
        html("Home", &["/fresh"]).insert_header("last-modified", "Wed, 01 Jan 2020 00:00:00 GMT"),
    )
    .await;
    mount_page(&server, "/fresh", html("Fresh", &[])).await;

    let previous = json!({
        "lastCrawl": "2024-01-01T00:00:00Z",
        "crawledUrls": [],
        "pendingUrls": []
    });
    let root = format!("{}/", server.uri());
    let result = pull(
        &server,
        json!({ "url": root, "delayMs": 0 }),
        &previous.to_string(),
    )
    .await;

    assert_eq!(emitted_paths(&result), vec![format!("{}/fresh", server.uri())]);
    let cursor = CrawlCursor::parse(result.new_cursor.as_deref().expect("cursor"));
    assert_eq!(cursor.crawled_urls.len(), 2);
}

#[tokio::test]
async fn external_links_are_deferred() {
    let server = MockServer::start().await;
    no_robots(&server).await;
    mount_page(
        &server,
        "/",
        html("Home", &["https://elsewhere.example/page", "/local"]),
    )
    .await;
    mount_page(&server, "/local", html("Local", &[])).await;

    let root = format!("{}/", server.uri());
    let result = pull(&server, json!({ "url": root, "delayMs": 0 }), "").await;

    assert_eq!(result.items.len(), 2);
    let cursor = CrawlCursor::parse(result.new_cursor.as_deref().expect("cursor"));
    assert_eq!(cursor.pending_urls, vec!["https://elsewhere.example/page"]);
}

#[tokio::test]
async fn page_budget_defers_the_rest() {
    let server = MockServer::start().await;
    no_robots(&server).await;
    mount_page(&server, "/", html("Home", &["/one", "/two", "/three"])).await;
    mount_page(&server, "/one", html("One", &[])).await;

    let root = format!("{}/", server.uri());
    let result = pull(
        &server,
        json!({ "url": root, "delayMs": 0, "maxPages": 2 }),
        "",
    )
    .await;

    assert_eq!(result.items.len(), 2);
    let cursor = CrawlCursor::parse(result.new_cursor.as_deref().expect("cursor"));
    assert_eq!(
        cursor.pending_urls,
        vec![
            format!("{}/two", server.uri()),
            format!("{}/three", server.uri())
        ]
    );
}

#[tokio::test]
async fn pending_url_reached_in_the_same_run_is_cleared() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;
    no_robots(&site).await;
    no_robots(&other).await;
    let external = format!("{}/x", other.uri());
    mount_page(&site, "/a", html("A", &[external.as_str()])).await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(html("X", &[]))
        .expect(1)
        .mount(&other)
        .await;

    let previous = json!({
        "lastCrawl": null,
        "crawledUrls": [],
        "pendingUrls": [format!("{}/a", site.uri()), external]
    });
    let root = format!("{}/", site.uri());
    let result = pull(&site, json!({ "url": root, "delayMs": 0 }), &previous.to_string()).await;

    assert_eq!(result.items.len(), 2);
    let cursor = CrawlCursor::parse(result.new_cursor.as_deref().expect("cursor"));
    assert!(cursor.pending_urls.is_empty(), "{:?}", cursor.pending_urls);
}
