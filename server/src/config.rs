//! Server configuration
//!
//! Configuration is loaded from environment variables. See `.env.example` for documentation.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::discovery::{Device, DiscoveryConfig, GeneratorSettings, ModelConfig};
use crate::pipeline::DEFAULT_MAX_DIM;

/// Invalid configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MAX_DIM must be at least 1")]
    ZeroMaxDim,

    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f32 },

    #[error("POINTS_PER_SIDE must be at least 1")]
    ZeroPointsPerSide,

    #[error("INFERENCE_URL must not be empty")]
    EmptyInferenceUrl,
}

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Maximum upload size in bytes
    pub max_upload_size: usize,

    /// Pipeline configuration
    pub pipeline: PipelineConfig,

    /// Inference sidecar configuration
    pub inference: InferenceConfig,

    /// Model configuration
    pub model: ModelConfig,
}

/// Pipeline-related configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Longest side of the working image
    pub max_dim: u32,
}

/// Inference-related configuration
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the inference sidecar
    pub url: String,
    /// Maximum concurrent generator calls (0 = unlimited)
    pub max_concurrency: usize,
    /// Optional limit on one discovery
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_size: 20 * 1024 * 1024, // 20 MB
            pipeline: PipelineConfig::default(),
            inference: InferenceConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dim: DEFAULT_MAX_DIM,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000".to_string(),
            max_concurrency: 1,
            timeout: None,
        }
    }
}

impl InferenceConfig {
    /// Gate and timeout settings for the discovery handle
    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            max_concurrency: self.max_concurrency,
            timeout: self.timeout,
        }
    }
}

/// Parse an env var, warning and keeping the default when it is malformed
fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

/// Zero seconds means no limit
fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var("PORT") {
            config.port = port;
        }
        if let Some(mb) = parse_var::<usize>("MAX_UPLOAD_MB") {
            config.max_upload_size = mb * 1024 * 1024;
        }

        // Pipeline config
        if let Some(dim) = parse_var("MAX_DIM") {
            config.pipeline.max_dim = dim;
        }

        // Inference config
        if let Ok(url) = env::var("INFERENCE_URL")
            && !url.is_empty()
        {
            config.inference.url = url;
        }
        if let Some(n) = parse_var("INFERENCE_MAX_CONCURRENCY") {
            config.inference.max_concurrency = n;
        }
        if let Some(secs) = parse_var::<u64>("INFERENCE_TIMEOUT_SECS") {
            config.inference.timeout = timeout_from_secs(secs);
        }

        // Model config
        if let Ok(path) = env::var("MODEL_CHECKPOINT")
            && !path.is_empty()
        {
            config.model.checkpoint = PathBuf::from(path);
        }
        if let Ok(val) = env::var("MODEL_DEVICE") {
            match val.parse::<Device>() {
                Ok(device) => config.model.device = device,
                Err(e) => warn!("Ignoring MODEL_DEVICE: {}", e),
            }
        }

        // Generator tunables
        let generator: &mut GeneratorSettings = &mut config.model.generator;
        if let Some(v) = parse_var("POINTS_PER_SIDE") {
            generator.points_per_side = v;
        }
        if let Some(v) = parse_var("PRED_IOU_THRESH") {
            generator.pred_iou_thresh = v;
        }
        if let Some(v) = parse_var("STABILITY_SCORE_THRESH") {
            generator.stability_score_thresh = v;
        }
        if let Some(v) = parse_var("MIN_MASK_REGION_AREA") {
            generator.min_mask_region_area = v;
        }

        config
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_dim == 0 {
            return Err(ConfigError::ZeroMaxDim);
        }
        if self.inference.url.trim().is_empty() {
            return Err(ConfigError::EmptyInferenceUrl);
        }

        let generator = &self.model.generator;
        if generator.points_per_side == 0 {
            return Err(ConfigError::ZeroPointsPerSide);
        }
        for (name, value) in [
            ("PRED_IOU_THRESH", generator.pred_iou_thresh),
            ("STABILITY_SCORE_THRESH", generator.stability_score_thresh),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        Ok(())
    }
}
