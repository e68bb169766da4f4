pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::ProcessingConfig;
use crate::services::storage::StorageArea;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::process::process_batch,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            models::Tag,
            models::Quarter,
        )
    ),
    tags(
        (name = "system", description = "Service health"),
        (name = "processing", description = "Batch spreadsheet processing")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageArea>,
    pub config: ProcessingConfig,
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_file_size;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/process", post(api::handlers::process::process_batch))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
