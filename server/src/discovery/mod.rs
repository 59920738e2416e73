//! Region discovery module
//!
//! This module provides:
//! - `MaskGenerator` trait for abstracting the segmentation model
//! - `HttpMaskGenerator` for a model hosted by an inference sidecar
//! - `RegionDiscovery`, the shared handle with admission gate and timeout

mod adapter;
mod remote;
mod service;
mod types;

pub use adapter::{DiscoveryConfig, RegionDiscovery};
pub use remote::HttpMaskGenerator;
pub use service::MaskGenerator;
pub use types::{Device, DiscoveryError, GeneratorSettings, ModelConfig, ModelInfo};
