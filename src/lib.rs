pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::relay::RelayService;
use crate::services::shortener::LinkShortener;
use crate::services::staging::StagingService;
use crate::services::storage::ObjectStorage;
use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_file,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadResponse,
            api::handlers::upload::UploadForm,
            api::handlers::health::HealthResponse,
            api::error::ErrorResponse,
        )
    ),
    tags(
        (name = "upload", description = "File relay endpoint"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub staging: Arc<StagingService>,
    pub relay: Arc<RelayService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        shortener: Arc<dyn LinkShortener>,
    ) -> Result<Self, api::error::AppError> {
        let staging = StagingService::new(config.staging_dir.clone(), config.max_file_size);
        let relay = RelayService::new(storage, shortener, &config)?;
        Ok(Self {
            config: Arc::new(config),
            staging: Arc::new(staging),
            relay: Arc::new(relay),
        })
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/health", get(api::handlers::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route(
            "/upload",
            post(api::handlers::upload::upload_file).layer(axum::extract::DefaultBodyLimit::max(
                config.max_file_size.saturating_add(10 * 1024 * 1024), // Add 10MB buffer for multipart overhead
            )),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&config))
        .with_state(state)
}
