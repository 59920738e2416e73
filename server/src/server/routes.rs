//! HTTP route handlers for the segmentation API

use std::any::Any;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics::counter;
use serde::Serialize;
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use super::AppState;
use crate::discovery::ModelInfo;
use crate::pipeline::{PipelineFailure, SegmentError, SegmentResponse, Stage};

/// Name of the multipart field carrying the image
const FILE_FIELD: &str = "file";

/// Error response for the segmentation API.
///
/// Only the message is serialized; the status travels in the HTTP response.
#[derive(Debug, Serialize)]
pub struct SegmentErrorResponse {
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl From<SegmentError> for SegmentErrorResponse {
    fn from(e: SegmentError) -> Self {
        Self {
            status: e.status_code(),
            error: e.to_string(),
        }
    }
}

impl From<PipelineFailure> for SegmentErrorResponse {
    fn from(failure: PipelineFailure) -> Self {
        Self::from(failure.error)
    }
}

impl IntoResponse for SegmentErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Log and count a failed request, then turn it into a response
fn reject(failure: PipelineFailure) -> SegmentErrorResponse {
    let kind = failure.error.kind();
    counter!("automask_segment_errors_total", "kind" => kind).increment(1);

    if failure.error.is_client_error() {
        warn!(stage = %failure.stage, kind, "Rejected upload: {}", failure.error);
    } else {
        error!(stage = %failure.stage, kind, "Segmentation failed: {}", failure.error);
    }

    SegmentErrorResponse::from(failure)
}

fn multipart_error(e: MultipartError) -> SegmentError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SegmentError::UploadTooLarge(e.body_text())
    } else {
        SegmentError::Multipart(e.body_text())
    }
}

/// Pull the image bytes out of the upload.
///
/// Prefers the `file` field; otherwise the first field that carries a file name.
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, SegmentError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let named_file = field.name() == Some(FILE_FIELD);
        let has_file_name = field.file_name().is_some();

        if named_file || (fallback.is_none() && has_file_name) {
            let data = field.bytes().await.map_err(multipart_error)?;
            if named_file {
                return Ok(data);
            }
            fallback = Some(data);
        }
    }

    fallback.ok_or(SegmentError::MissingFile)
}

/// POST /segment - Resize, segment and overlay an uploaded image
pub async fn segment(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SegmentResponse>, SegmentErrorResponse> {
    let request_id = Uuid::new_v4();
    counter!("automask_segment_requests_total").increment(1);

    async move {
        let mut multipart = multipart.map_err(|e| {
            reject(PipelineFailure::new(
                Stage::Received,
                SegmentError::Multipart(e.body_text()),
            ))
        })?;

        let raw = read_upload(&mut multipart)
            .await
            .map_err(|e| reject(PipelineFailure::new(Stage::Received, e)))?;

        let response = state.pipeline.run(raw).await.map_err(reject)?;
        Ok(Json(response))
    }
    .instrument(info_span!("segment", %request_id))
    .await
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    inference: &'static str,
    model: ModelInfo,
    uptime_seconds: u64,
}

/// GET /health - Server and inference readiness
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let discovery = state.pipeline.discovery();
    let ready = discovery.is_ready().await;

    let (status, inference, http_status) = if ready {
        ("healthy", "ready", StatusCode::OK)
    } else {
        ("degraded", "unavailable", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            inference,
            model: discovery.model_info(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
        }),
    )
}

/// Convert a handler panic into a JSON 500 response
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!("Request handler panicked: {}", detail);
    counter!("automask_segment_errors_total", "kind" => "panic").increment(1);

    SegmentErrorResponse {
        error: "Internal server error".to_string(),
        status: StatusCode::INTERNAL_SERVER_ERROR,
    }
    .into_response()
}

/// Build segmentation API routes
pub fn segment_routes(state: AppState) -> Router {
    Router::new()
        .route("/segment", post(segment))
        .route("/health", get(health))
        .with_state(state)
}
