//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use automask_server::discovery::{
    DiscoveryConfig, DiscoveryError, MaskGenerator, ModelConfig, ModelInfo, RegionDiscovery,
};
use automask_server::pipeline::{DEFAULT_MAX_DIM, MaskRecord, SegmentPipeline};
use automask_server::server::{AppState, build_router, build_router_with};
use axum::{
    Router,
    body::Body,
    http::{Request, header},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Boundary used by every multipart body built here
pub const BOUNDARY: &str = "automask-test-boundary";

/// Default upload limit for test apps
pub const TEST_UPLOAD_LIMIT: usize = 8 * 1024 * 1024;

fn stub_info(backend: &str) -> ModelInfo {
    let model = ModelConfig::default();
    ModelInfo {
        backend: backend.to_string(),
        checkpoint: model.checkpoint.display().to_string(),
        device: model.device,
        settings: model.generator,
    }
}

/// Mock generator returning a canned mask set
pub struct MockMaskGenerator {
    masks: Vec<MaskRecord>,
}

impl MockMaskGenerator {
    pub fn new(masks: Vec<MaskRecord>) -> Self {
        Self { masks }
    }
}

#[async_trait]
impl MaskGenerator for MockMaskGenerator {
    async fn generate(&self, _image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        Ok(self.masks.clone())
    }

    fn describe(&self) -> ModelInfo {
        stub_info("stub")
    }
}

/// Generator whose masks are computed from the image it receives
pub struct FnMaskGenerator<F> {
    f: F,
}

impl<F> FnMaskGenerator<F>
where
    F: Fn(&RgbImage) -> Vec<MaskRecord> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> MaskGenerator for FnMaskGenerator<F>
where
    F: Fn(&RgbImage) -> Vec<MaskRecord> + Send + Sync,
{
    async fn generate(&self, image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        Ok((self.f)(image))
    }

    fn describe(&self) -> ModelInfo {
        stub_info("fn")
    }
}

/// Generator that always fails and reports itself unavailable
pub struct BrokenMaskGenerator;

#[async_trait]
impl MaskGenerator for BrokenMaskGenerator {
    async fn generate(&self, _image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        Err(DiscoveryError::Model("CUDA out of memory".to_string()))
    }

    fn describe(&self) -> ModelInfo {
        stub_info("broken")
    }

    async fn is_ready(&self) -> bool {
        false
    }
}

/// Generator that panics mid-inference
pub struct PanickingMaskGenerator;

#[async_trait]
impl MaskGenerator for PanickingMaskGenerator {
    async fn generate(&self, _image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        panic!("inference crashed");
    }

    fn describe(&self) -> ModelInfo {
        stub_info("panicking")
    }
}

/// Create a test application router around a generator
pub fn create_test_app_with(generator: Arc<dyn MaskGenerator>, upload_limit: usize) -> Router {
    let discovery = Arc::new(RegionDiscovery::new(generator, &DiscoveryConfig::default()));
    let pipeline = Arc::new(SegmentPipeline::new(discovery, DEFAULT_MAX_DIM));
    build_router(AppState::new(pipeline), upload_limit)
}

/// Create a test application router that also serves `extra` routes
pub fn create_test_app_with_extra(extra: Router) -> Router {
    let generator: Arc<dyn MaskGenerator> = Arc::new(MockMaskGenerator::new(Vec::new()));
    let discovery = Arc::new(RegionDiscovery::new(generator, &DiscoveryConfig::default()));
    let pipeline = Arc::new(SegmentPipeline::new(discovery, DEFAULT_MAX_DIM));
    build_router_with(AppState::new(pipeline), TEST_UPLOAD_LIMIT, extra)
}

/// Create a test application router with a canned mask set
pub fn create_test_app(masks: Vec<MaskRecord>) -> Router {
    create_test_app_with(Arc::new(MockMaskGenerator::new(masks)), TEST_UPLOAD_LIMIT)
}

/// Smooth RGB gradient fixture
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// Encode an image into the given container format
pub fn encode_image(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut buf, format)
        .expect("fixture encoding should succeed");
    buf.into_inner()
}

/// Build a multipart/form-data body with a single field
pub fn multipart_body(field: &str, file_name: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    match file_name {
        Some(name) => {
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    field, name
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        }
        None => {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", field).as_bytes(),
            );
        }
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// POST /segment request uploading `data` as the `file` field
pub fn segment_request(data: &[u8]) -> Request<Body> {
    segment_request_with_field("file", Some("upload.png"), data)
}

/// POST /segment request with an arbitrary field
pub fn segment_request_with_field(
    field: &str,
    file_name: Option<&str>,
    data: &[u8],
) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/segment")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, file_name, data)))
        .unwrap()
}

/// Initialize test logging for detailed output
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automask_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
