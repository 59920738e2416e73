//! HTTP server: shared state and router assembly

pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::pipeline::SegmentPipeline;

pub use routes::{SegmentErrorResponse, segment_routes};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SegmentPipeline>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<SegmentPipeline>) -> Self {
        Self {
            pipeline,
            started_at: Instant::now(),
        }
    }
}

/// Build the application router with body limit, panic recovery, tracing and CORS
pub fn build_router(state: AppState, max_upload_size: usize) -> Router {
    build_router_with(state, max_upload_size, Router::new())
}

/// Build the application router, serving `extra` routes behind the same layers
pub fn build_router_with(state: AppState, max_upload_size: usize, extra: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    segment_routes(state)
        .merge(extra)
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(CatchPanicLayer::custom(routes::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
