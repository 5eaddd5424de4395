mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use tributary::server::router::{TributaryState, tributary_router};
use tributary_schema::ProviderKind;

use common::StaticProvider;

const KEY: &str = "pwd";

async fn app(tag: &str) -> Router {
    let db = common::temp_db(tag).await;
    let provider = Arc::new(StaticProvider::new(ProviderKind::CodeHost, &["README.md"], "sha-1"));
    let (services, _sink) = common::services(db, common::provider_set(vec![provider]));
    tributary_router(TributaryState::new(services.plans.clone(), Arc::from(KEY)))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", KEY)
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {KEY}"))
        .body(Body::empty())
        .expect("failed to build request")
}

async fn json_of(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn requests_without_a_valid_key_are_rejected() {
    let app = app("route-auth").await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/plans?resourceId=acme/widgets")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(resp).await["error"]["code"], "MISSING_KEY");

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/plans?resourceId=acme/widgets")
                .header("x-api-key", "wrong")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = app
        .oneshot(get("/nowhere"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_then_duplicate_reports_the_existing_plan() {
    let app = app("route-register").await;
    let body = r#"{"provider":"code_host","resourceId":"acme/widgets","userId":"alice","cadenceSecs":3600}"#;

    let resp = app
        .clone()
        .oneshot(post_json("/v1/resources", body))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = json_of(resp).await;
    let plan_id = created["plan"]["id"].as_str().expect("plan id").to_string();
    assert_eq!(created["config"]["resourceId"], "acme/widgets");

    let resp = app
        .clone()
        .oneshot(post_json(
            "/v1/resources",
            r#"{"provider":"code_host","resourceId":"acme/widgets","userId":"bob"}"#,
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let conflict = json_of(resp).await;
    assert_eq!(conflict["error"]["code"], "CONFLICT");
    assert_eq!(conflict["error"]["details"]["planId"], plan_id.as_str());

    let resp = app
        .clone()
        .oneshot(get("/v1/plans?resourceId=acme/widgets"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_of(resp).await["userIds"], serde_json::json!(["alice", "bob"]));

    let resp = app
        .clone()
        .oneshot(get("/v1/resources/code_host/info?resourceId=acme/widgets"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_of(resp).await["config"]["cadenceSecs"], 3600);

    let resp = app
        .oneshot(get(&format!("/v1/history/plan/{plan_id}?limit=5")))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(json_of(resp).await.is_array());
}

#[tokio::test]
async fn malformed_requests_map_to_client_errors() {
    let app = app("route-bad").await;

    let resp = app
        .clone()
        .oneshot(post_json("/v1/resources", "not-json"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(post_json(
            "/v1/resources",
            r#"{"provider":"code_host","resourceId":"not a repo"}"#,
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(resp).await["error"]["code"], "INVALID_CONFIGURATION");

    let resp = app
        .clone()
        .oneshot(post_json(
            "/v1/resources/sync",
            r#"{"provider":"code_host","resourceId":"acme/unknown"}"#,
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    let resp = app
        .clone()
        .oneshot(get("/v1/resources/ftp/info?resourceId=acme/widgets"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(get("/v1/plans?resourceId=acme/unknown"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .clone()
        .oneshot(get("/v1/history/resource"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .oneshot(post_json("/v1/plans/missing/users", r#"{"userId":"carol"}"#))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
