//! Router tests against the in-memory store.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use docgate_api::{create_router, ApiConfig, AppState};
use docgate_store::{DocGateClient, StoreConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

// =============================================================================
// Test Helpers
// =============================================================================

async fn app_with(config: ApiConfig) -> (Router, DocGateClient) {
    let store = DocGateClient::open(StoreConfig::memory()).await.unwrap();
    let state = AppState::with_store(config, store.clone());
    (create_router(state, None), store)
}

async fn app() -> (Router, DocGateClient) {
    app_with(ApiConfig::default()).await
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn seed(app: &Router) {
    let (status, body) = send(
        app,
        post(
            "/api/collections/fixtures/upsert",
            json!({
                "key_fields": ["fixture_id", "team_id"],
                "documents": [
                    {"fixture_id": 1, "team_id": 10, "goals": 2},
                    {"fixture_id": 1, "team_id": 11, "goals": 0},
                    {"fixture_id": 2, "team_id": 10, "goals": 3}
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 3);
}

// =============================================================================
// Probes
// =============================================================================

#[tokio::test]
async fn test_health_sets_request_id_and_security_headers() {
    let (app, _) = app().await;
    let response = app.clone().oneshot(get("/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = app().await;
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_ready_reports_pool_and_degrades_after_close() {
    let (app, store) = app().await;

    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["pool"]["max_connections"], 10);

    store.close();
    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["pool"]["closed"], true);
}

// =============================================================================
// Collections
// =============================================================================

#[tokio::test]
async fn test_upsert_then_read() {
    let (app, _) = app().await;
    seed(&app).await;

    let (status, body) = send(
        &app,
        post("/api/collections/fixtures/find", json!({"filter": {"fixture_id": 2}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["document"]["id"], "2:10");

    let (_, body) = send(
        &app,
        post("/api/collections/fixtures/count", json!({"filter": {"team_id": 10}})),
    )
    .await;
    assert_eq!(body["count"], 2);

    let (_, body) = send(
        &app,
        post(
            "/api/collections/fixtures/query",
            json!({"filter": {"goals": {"$gte": 1}}, "limit": 1}),
        ),
    )
    .await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["next_page_token"].is_string());
}

#[tokio::test]
async fn test_find_without_match_is_null() {
    let (app, _) = app().await;
    let (status, body) = send(
        &app,
        post("/api/collections/fixtures/find", json!({"filter": {"fixture_id": 99}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["document"].is_null());
}

#[tokio::test]
async fn test_repeated_upsert_is_unchanged() {
    let (app, _) = app().await;
    seed(&app).await;

    let (_, body) = send(
        &app,
        post(
            "/api/collections/fixtures/upsert",
            json!({
                "key_fields": ["fixture_id", "team_id"],
                "documents": [{"fixture_id": 1, "team_id": 10, "goals": 2}]
            }),
        ),
    )
    .await;
    assert_eq!(body["unchanged"], 1);
    assert_eq!(body["inserted"], 0);
}

#[tokio::test]
async fn test_upsert_missing_key_field_is_bad_request() {
    let (app, _) = app().await;
    let (status, body) = send(
        &app,
        post(
            "/api/collections/fixtures/upsert",
            json!({"key_fields": ["fixture_id"], "documents": [{"team_id": 1}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_delete_requires_opt_in_for_empty_filter() {
    let (app, _) = app().await;
    seed(&app).await;

    let (status, body) = send(&app, post("/api/collections/fixtures/delete", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "empty_filter");

    let (status, body) = send(
        &app,
        post("/api/collections/fixtures/delete", json!({"allow_empty_filter": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 3);
}

#[tokio::test]
async fn test_update_sets_fields_and_guards_keys() {
    let (app, _) = app().await;
    seed(&app).await;

    let (status, body) = send(
        &app,
        post(
            "/api/collections/fixtures/update",
            json!({
                "filter": {"team_id": 10},
                "set": {"goals": 5},
                "key_fields": ["fixture_id", "team_id"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], 2);
    assert_eq!(body["modified"], 2);

    let (status, _) = send(
        &app,
        post(
            "/api/collections/fixtures/update",
            json!({
                "filter": {"fixture_id": 1},
                "set": {"team_id": 12},
                "key_fields": ["fixture_id", "team_id"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_requires_key_fields() {
    let (app, _) = app().await;
    seed(&app).await;

    let (status, body) = send(
        &app,
        post(
            "/api/collections/fixtures/update",
            json!({"filter": {"fixture_id": 1}, "set": {"team_id": 12}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("key_fields"));

    let (_, body) = send(
        &app,
        post("/api/collections/fixtures/count", json!({"filter": {"team_id": 12}})),
    )
    .await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_upsert_without_key_fields_uses_document_id() {
    let (app, _) = app().await;

    let (status, body) = send(
        &app,
        post(
            "/api/collections/things/upsert",
            json!({"documents": [{"_id": "t1", "v": 1}, {"_id": "t2", "v": 2}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 2);

    let (_, body) = send(
        &app,
        post("/api/collections/things/find", json!({"filter": {"_id": "t2"}})),
    )
    .await;
    assert_eq!(body["document"]["id"], "t2");
    assert_eq!(body["document"]["fields"]["v"], 2);
    assert!(body["document"]["fields"].get("_id").is_none());

    let (status, body) = send(
        &app,
        post("/api/collections/things/upsert", json!({"documents": [{"v": 3}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("_id"));
}

#[tokio::test]
async fn test_upsert_keys_containing_separator_stay_distinct() {
    let (app, _) = app().await;
    let (status, body) = send(
        &app,
        post(
            "/api/collections/pairs/upsert",
            json!({
                "key_fields": ["a", "b"],
                "documents": [{"a": "x:y", "b": "z"}, {"a": "x", "b": "y:z"}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 2);

    let (_, body) = send(&app, post("/api/collections/pairs/count", json!({}))).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_query_zero_limit_is_bad_request() {
    let (app, _) = app().await;
    seed(&app).await;

    let (status, _) = send(
        &app,
        post("/api/collections/fixtures/query", json!({"limit": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_filter_is_bad_request() {
    let (app, _) = app().await;
    let (status, _) = send(
        &app,
        post("/api/collections/fixtures/find", json!({"filter": {"goals": {"$near": 1}}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_collection_name_is_bad_request() {
    let (app, _) = app().await;
    let (status, _) = send(&app, post("/api/collections/bad%20name/count", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_closed_store_is_unavailable() {
    let (app, store) = app().await;
    store.close();
    let (status, _) = send(&app, post("/api/collections/fixtures/count", json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let (app, _) = app_with(ApiConfig {
        api_keys: vec!["secret".to_string()],
        ..ApiConfig::default()
    })
    .await;

    let (status, _) = send(&app, post("/api/collections/fixtures/count", json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = post("/api/collections/fixtures/count", json!({}));
    request.headers_mut().insert("x-api-key", "wrong".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = post("/api/collections/fixtures/count", json!({}));
    request.headers_mut().insert("x-api-key", "secret".parse().unwrap());
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    // Probes stay open
    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let (app, _) = app_with(ApiConfig {
        rate_limit_rps: 1,
        ..ApiConfig::default()
    })
    .await;

    let (first, _) = send(&app, post("/api/collections/fixtures/count", json!({}))).await;
    assert_eq!(first, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post("/api/collections/fixtures/count", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "1");
}

#[tokio::test]
async fn test_body_limit() {
    let (app, _) = app_with(ApiConfig {
        max_body_size: 64,
        ..ApiConfig::default()
    })
    .await;

    let documents: Vec<Value> = (0..20).map(|i| json!({"fixture_id": i})).collect();
    let (status, _) = send(
        &app,
        post(
            "/api/collections/fixtures/upsert",
            json!({"key_fields": ["fixture_id"], "documents": documents}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
