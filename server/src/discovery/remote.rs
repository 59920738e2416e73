//! Mask generator backed by an inference sidecar over HTTP
//!
//! The sidecar hosts the segmentation checkpoint. Each call uploads the
//! normalized image as base64 PNG together with the fixed generator
//! tunables and receives the candidate masks as JSON.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::RgbImage;
use metrics::histogram;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::service::MaskGenerator;
use super::types::{Device, DiscoveryError, GeneratorSettings, ModelConfig, ModelInfo};
use crate::pipeline::{MaskRecord, encode_png_base64};

/// Connect timeout for the sidecar
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for readiness probes
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Request body for POST /generate
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    image: String,
    width: u32,
    height: u32,
    checkpoint: String,
    device: Device,
    #[serde(flatten)]
    settings: &'a GeneratorSettings,
}

/// Response body for POST /generate
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    masks: Vec<MaskRecord>,
}

/// HTTP client for the inference sidecar
pub struct HttpMaskGenerator {
    client: reqwest::Client,
    base_url: String,
    model: ModelConfig,
}

impl HttpMaskGenerator {
    /// Create a client for the sidecar at `base_url`
    pub fn new(base_url: &str, model: ModelConfig) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::Unavailable(format!("failed to build client: {}", e)))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!(
            "Using inference sidecar at {} (checkpoint={:?}, device={})",
            base_url, model.checkpoint, model.device
        );

        Ok(Self {
            client,
            base_url,
            model,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl MaskGenerator for HttpMaskGenerator {
    async fn generate(&self, image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        let (width, height) = image.dimensions();

        let owned = image.clone();
        let encoded = tokio::task::spawn_blocking(move || encode_png_base64(&owned))
            .await
            .map_err(|e| DiscoveryError::InvalidRequest(e.to_string()))?
            .map_err(|e| DiscoveryError::InvalidRequest(e.to_string()))?;

        let body = GenerateRequest {
            image: encoded,
            width,
            height,
            checkpoint: self.model.checkpoint.display().to_string(),
            device: self.model.device,
            settings: &self.model.generator,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint("generate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DiscoveryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Inference sidecar returned {}: {}", status, message);
            return Err(DiscoveryError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))?;
        histogram!("automask_inference_request_duration_seconds").record(start.elapsed());

        debug!(
            "Sidecar returned {} masks for {}x{} image in {:?}",
            parsed.masks.len(),
            width,
            height,
            start.elapsed()
        );

        Ok(parsed.masks)
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            backend: "http".to_string(),
            checkpoint: self.model.checkpoint.display().to_string(),
            device: self.model.device,
            settings: self.model.generator.clone(),
        }
    }

    async fn is_ready(&self) -> bool {
        match self
            .client
            .get(self.endpoint("health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Inference sidecar health check failed: {}", e);
                false
            }
        }
    }
}
