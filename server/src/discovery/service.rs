//! MaskGenerator trait definition

use async_trait::async_trait;
use image::RgbImage;

use super::types::{DiscoveryError, ModelInfo};
use crate::pipeline::MaskRecord;

/// Automatic, prompt-free mask generation over a whole image
#[async_trait]
pub trait MaskGenerator: Send + Sync {
    /// Generate candidate masks for an RGB image.
    ///
    /// Every returned segmentation must have the image's dimensions. The
    /// order of the result carries no meaning.
    async fn generate(&self, image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError>;

    /// Describe the model behind this generator
    fn describe(&self) -> ModelInfo;

    /// Whether the generator can currently serve requests
    async fn is_ready(&self) -> bool {
        true
    }
}
