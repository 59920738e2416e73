//! Segmentation pipeline
//!
//! Turns an uploaded image into the segmentation response:
//! decode → normalize → discover → composite → encode.
//! Each request runs its own pipeline; the only shared piece is the
//! read-only [`RegionDiscovery`] handle.

pub mod composite;
pub mod encode;
pub mod normalize;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::histogram;
use tracing::{debug, info};

use crate::discovery::RegionDiscovery;

pub use composite::{composite, composite_with};
pub use encode::{decode_png_base64, encode_masks, encode_png_base64};
pub use normalize::{DEFAULT_MAX_DIM, normalize};
pub use types::{Mask, MaskRecord, PipelineFailure, SegmentError, SegmentResponse, Stage};

/// Per-request orchestration of the segmentation stages
pub struct SegmentPipeline {
    discovery: Arc<RegionDiscovery>,
    max_dim: u32,
}

impl SegmentPipeline {
    pub fn new(discovery: Arc<RegionDiscovery>, max_dim: u32) -> Self {
        Self { discovery, max_dim }
    }

    pub fn max_dim(&self) -> u32 {
        self.max_dim
    }

    pub fn discovery(&self) -> &Arc<RegionDiscovery> {
        &self.discovery
    }

    /// Run every stage on one upload.
    ///
    /// Any failure ends the run with the stage it happened in; there is no
    /// partial result.
    pub async fn run(&self, raw: Bytes) -> Result<SegmentResponse, PipelineFailure> {
        let start = Instant::now();
        debug!(stage = %Stage::Received, "Received {} bytes", raw.len());

        let decoded = run_blocking(Stage::Decoding, move || normalize::decode_rgb(&raw)).await?;

        let max_dim = self.max_dim;
        let image = Arc::new(
            run_blocking(Stage::Normalizing, move || {
                Ok(normalize::downscale(decoded, max_dim))
            })
            .await?,
        );

        let masks = Arc::new(self.discover(image.clone()).await?);

        let overlay = {
            let image = image.clone();
            let masks = masks.clone();
            run_blocking(Stage::Compositing, move || composite(&image, &masks)).await?
        };

        let response = run_blocking(Stage::Encoding, move || {
            Ok(SegmentResponse {
                original_image: encode_png_base64(&image)?,
                segmented_overlay: encode_png_base64(&overlay)?,
                masks: encode_masks(&masks),
            })
        })
        .await?;

        histogram!("automask_masks_per_request").record(response.masks.len() as f64);
        info!(
            stage = %Stage::Responded,
            "Segmented image into {} regions in {:?}",
            response.masks.len(),
            start.elapsed()
        );

        Ok(response)
    }

    /// Discovery runs on its own task so a panicking generator fails only
    /// this request.
    async fn discover(
        &self,
        image: Arc<image::RgbImage>,
    ) -> Result<Vec<MaskRecord>, PipelineFailure> {
        let start = Instant::now();
        let discovery = self.discovery.clone();
        let joined = tokio::spawn(async move { discovery.discover(&image).await }).await;
        record_phase(Stage::Discovering, start);

        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(SegmentError::Internal(format!(
                "{} task failed: {}",
                Stage::Discovering,
                e
            ))),
        };
        result.map_err(|error| PipelineFailure::new(Stage::Discovering, error))
    }
}

/// Run a CPU-bound stage on the blocking pool, tagging failures with `stage`
async fn run_blocking<T, F>(stage: Stage, f: F) -> Result<T, PipelineFailure>
where
    F: FnOnce() -> Result<T, SegmentError> + Send + 'static,
    T: Send + 'static,
{
    let start = Instant::now();
    let joined = tokio::task::spawn_blocking(f).await;
    record_phase(stage, start);

    let result = match joined {
        Ok(result) => result,
        Err(e) => Err(SegmentError::Internal(format!("{} task failed: {}", stage, e))),
    };
    result.map_err(|error| PipelineFailure::new(stage, error))
}

fn record_phase(stage: Stage, start: Instant) {
    histogram!("automask_pipeline_phase_duration_seconds", "phase" => stage.as_str())
        .record(start.elapsed());
}
