//! Route configuration and setup.
//!
//! Document routes live under [`API_PREFIX`]; health checks in [health](health).

mod health;

use crate::api_doc::get_openapi_spec;
use crate::constants::{API_BASE, API_PREFIX, HTTP_CONCURRENCY_LIMIT, OPENAPI_PATH};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use docket_core::Config;
use docket_infra::request_id_middleware;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    crate::error::set_production_mode(config.is_production());
    let cors = setup_cors(config)?;

    let max_body = config.max_request_body_bytes();
    tracing::info!(max_request_body_bytes = max_body, "Request body limit enabled");

    let app = public_routes(state.clone())
        .merge(document_routes())
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

fn document_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/documents", API_PREFIX),
            post(handlers::document_upload::upload_documents),
        )
        .route(
            &format!("{}/documents/{{id}}", API_PREFIX),
            get(handlers::document_get::get_document)
                .delete(handlers::document_delete::delete_document),
        )
        .route(
            &format!("{}/documents/{{id}}/download", API_PREFIX),
            get(handlers::document_download::download_document),
        )
        .route(
            &format!("{}/version", API_PREFIX),
            get(handlers::version::get_version),
        )
        .route(
            &format!("{}/version", API_BASE),
            get(handlers::version::get_version),
        )
}

fn public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/health",
            get({
                let state = state.clone();
                move || {
                    let state = state.clone();
                    async { health::health_check(state).await }
                }
            }),
        )
        .route(
            "/health/ready",
            get({
                let state = state.clone();
                move || {
                    let state = state.clone();
                    async { health::readiness_check(state).await }
                }
            }),
        )
        .route("/health/live", get(health::liveness_check))
        .route(OPENAPI_PATH, get(|| async { Json(get_openapi_spec()) }))
}
