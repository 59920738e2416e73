//! Response encoding: base64 PNG images and 0/1 mask grids

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbImage};

use super::types::{MaskRecord, SegmentError};

/// Encode an RGB image as PNG bytes
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, SegmentError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| SegmentError::Encoding(format!("PNG encoding failed: {}", e)))?;
    Ok(buffer)
}

/// Encode an RGB image as base64 PNG text
pub fn encode_png_base64(image: &RgbImage) -> Result<String, SegmentError> {
    Ok(STANDARD.encode(encode_png(image)?))
}

/// Decode base64 PNG text back into an RGB image
pub fn decode_png_base64(text: &str) -> Result<RgbImage, SegmentError> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|e| SegmentError::Decode(format!("invalid base64: {}", e)))?;
    let decoded = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
        .map_err(|e| SegmentError::Decode(e.to_string()))?;
    Ok(decoded.into_rgb8())
}

/// Convert every mask into rows of 0/1 integers, keeping the input order
pub fn encode_masks(masks: &[MaskRecord]) -> Vec<Vec<Vec<u8>>> {
    masks.iter().map(|m| m.segmentation.to_rows()).collect()
}
