//! Discovery-related types and error definitions

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::SegmentError;

/// Errors surfaced by a mask generator
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("Inference service unavailable: {0}")]
    Unavailable(String),

    #[error("Inference service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Malformed inference response: {0}")]
    InvalidResponse(String),

    #[error("Failed to prepare inference request: {0}")]
    InvalidRequest(String),

    #[error("Model failure: {0}")]
    Model(String),
}

impl From<DiscoveryError> for SegmentError {
    fn from(e: DiscoveryError) -> Self {
        SegmentError::Inference(e.to_string())
    }
}

/// Compute device the model runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Accelerator when available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            other => Err(format!("unknown device '{}'", other)),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        };
        f.write_str(name)
    }
}

/// Tunables of the automatic mask generator, fixed at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Sampling density along each image axis
    pub points_per_side: u32,
    /// Minimum predicted mask quality to keep a candidate
    pub pred_iou_thresh: f32,
    /// Minimum stability score to keep a candidate
    pub stability_score_thresh: f32,
    /// Minimum pixel count to keep a candidate
    pub min_mask_region_area: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            points_per_side: 20,
            pred_iou_thresh: 0.75,
            stability_score_thresh: 0.75,
            min_mask_region_area: 1000,
        }
    }
}

/// Model identity and configuration, resolved once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Checkpoint file loaded by the inference host
    pub checkpoint: PathBuf,
    pub device: Device,
    pub generator: GeneratorSettings,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            checkpoint: PathBuf::from("efficientvit_sam_xl1.pt"),
            device: Device::default(),
            generator: GeneratorSettings::default(),
        }
    }
}

/// Description of a generator reported by health checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Generator implementation ("http", "stub", ...)
    pub backend: String,
    pub checkpoint: String,
    pub device: Device,
    pub settings: GeneratorSettings,
}
