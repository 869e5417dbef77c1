pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::UploadConfig;
use crate::services::tiered_store::TieredKeyValueStore;
use crate::services::upload_coordinator::UploadCoordinator;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::chunked::start_upload,
        api::handlers::chunked::upload_chunk,
        api::handlers::chunked::complete_upload,
        api::handlers::chunked::session_status,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            services::upload_coordinator::StartUploadRequest,
            services::upload_coordinator::StartUploadResponse,
            services::upload_coordinator::UploadChunkRequest,
            services::upload_coordinator::UploadChunkResponse,
            services::upload_coordinator::CompleteUploadRequest,
            services::upload_coordinator::SessionStatusResponse,
            services::tiers::Tier,
            api::handlers::health::HealthResponse,
            api::handlers::health::TierHealth,
        )
    ),
    tags(
        (name = "chunked", description = "Chunked upload protocol"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<UploadCoordinator>,
    pub store: Arc<TieredKeyValueStore>,
    pub config: UploadConfig,
}

fn cors_layer(config: &UploadConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-request-id")])
        .expose_headers([header::HeaderName::from_static("x-request-id")])
}

pub fn create_app(state: AppState) -> Router {
    // One chunk plus JSON envelope overhead
    let body_limit = state.config.max_chunk_bytes + 64 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/chunked/start", post(api::handlers::chunked::start_upload))
        .route("/chunked/upload", post(api::handlers::chunked::upload_chunk))
        .route(
            "/chunked/complete",
            post(api::handlers::chunked::complete_upload),
        )
        .route(
            "/chunked/status/:session_id",
            get(api::handlers::chunked::session_status),
        )
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
