//! ExoQuest Platform API
//!
//! Exoplanet candidate classification backend.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     EXOQUEST API (Axum)                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  handlers ──► dyn ModelAdapter ──► ModelService (ml)         │
//! │      │              │                  └─ FallbackPredictor  │
//! │      │              └──────────────► remote model service    │
//! │      └──────► DatasetService / FeedbackService               │
//! │                       │                                      │
//! │                dyn ObjectStore (S3 / MinIO | memory)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod ml;
pub mod models;
pub mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};

use adapter::ModelAdapter;
use config::Config;
use storage::{DatasetService, FeedbackService};

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub adapter: Arc<dyn ModelAdapter>,
    pub datasets: Arc<DatasetService>,
    pub feedback: Arc<FeedbackService>,
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.datasets.max_file_size().saturating_add(MULTIPART_OVERHEAD);

    let routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/health", get(handlers::health::check))

        // Datasets
        .route(
            "/api/datasets/upload",
            post(handlers::datasets::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/datasets", get(handlers::datasets::list))
        .route("/api/datasets/:id/content", get(handlers::datasets::content))

        // Prediction
        .route("/api/features", get(handlers::features::list))
        .route("/api/predict/tabular", post(handlers::predict::tabular))
        .route("/api/predict/curve", post(handlers::predict::curve))
        .route("/api/predict/fuse", post(handlers::predict::fuse))

        // Training
        .route("/api/train", post(handlers::training::start))
        .route("/api/jobs/:job_id/status", get(handlers::training::status))
        .route("/api/models/:model_id/metrics", get(handlers::training::metrics))

        // Feedback
        .route("/api/feedback", post(handlers::feedback::submit));

    routes
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}
