//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    count_documents, delete_documents, find_document, health, query_documents, ready,
    update_documents, upsert_documents,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit, request_id, request_logging, require_api_key, security_headers,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let collection_routes = Router::new()
        .route("/collections/:collection/find", post(find_document))
        .route("/collections/:collection/query", post(query_documents))
        .route("/collections/:collection/count", post(count_documents))
        .route("/collections/:collection/upsert", post(upsert_documents))
        .route("/collections/:collection/delete", post(delete_documents))
        .route("/collections/:collection/update", post(update_documents));

    let api_routes = collection_routes
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
