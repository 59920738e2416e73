//! Process-wide region discovery handle
//!
//! Wraps a [`MaskGenerator`] with an admission gate and an optional timeout.
//! Built once at startup and shared read-only by every request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::service::MaskGenerator;
use super::types::ModelInfo;
use crate::pipeline::{MaskRecord, SegmentError};

/// Admission gate and timeout settings for discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum concurrent generator calls; 0 disables the gate
    pub max_concurrency: usize,
    /// Limit on one discovery, including time spent waiting at the gate
    pub timeout: Option<Duration>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            timeout: None,
        }
    }
}

/// Shared handle to the mask generator
pub struct RegionDiscovery {
    generator: Arc<dyn MaskGenerator>,
    gate: Option<Semaphore>,
    timeout: Option<Duration>,
}

impl RegionDiscovery {
    /// Create a handle with the given gate and timeout settings
    pub fn new(generator: Arc<dyn MaskGenerator>, config: &DiscoveryConfig) -> Self {
        let gate = match config.max_concurrency {
            0 => None,
            n => Some(Semaphore::new(n)),
        };
        Self {
            generator,
            gate,
            timeout: config.timeout,
        }
    }

    /// Run the generator on the normalized image.
    ///
    /// The image is passed through untouched; the masks come back in
    /// whatever order the generator produced them.
    pub async fn discover(&self, image: &RgbImage) -> Result<Vec<MaskRecord>, SegmentError> {
        let start = Instant::now();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.discover_gated(image)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Mask generation exceeded {:?}", limit);
                    Err(SegmentError::InferenceTimeout(limit))
                }
            },
            None => self.discover_gated(image).await,
        };

        histogram!("automask_discovery_duration_seconds").record(start.elapsed());
        if result.is_err() {
            counter!("automask_discovery_errors_total").increment(1);
        }
        result
    }

    async fn discover_gated(&self, image: &RgbImage) -> Result<Vec<MaskRecord>, SegmentError> {
        let _permit = match &self.gate {
            Some(gate) => Some(
                gate.acquire()
                    .await
                    .map_err(|_| SegmentError::Internal("inference gate closed".to_string()))?,
            ),
            None => None,
        };

        let masks = self.generator.generate(image).await?;
        debug!(
            "Discovered {} regions in {}x{} image",
            masks.len(),
            image.width(),
            image.height()
        );
        Ok(masks)
    }

    /// Description of the underlying model
    pub fn model_info(&self) -> ModelInfo {
        self.generator.describe()
    }

    /// Whether the underlying generator reports ready
    pub async fn is_ready(&self) -> bool {
        self.generator.is_ready().await
    }

    /// Free admission slots, or None when the gate is disabled
    pub fn available_permits(&self) -> Option<usize> {
        self.gate.as_ref().map(Semaphore::available_permits)
    }
}
