//! Decoding and downscaling of uploaded images to the working resolution

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use tracing::debug;

use super::types::SegmentError;

/// Default bound on the longest side of the working image
pub const DEFAULT_MAX_DIM: u32 = 1024;

/// Decode raw bytes into an 8-bit RGB image.
///
/// The container format is sniffed from the bytes. An EXIF orientation tag
/// is applied so the pixels come out upright. Grayscale, alpha and 16-bit
/// inputs are converted to RGB8.
pub fn decode_rgb(raw: &[u8]) -> Result<RgbImage, SegmentError> {
    if raw.is_empty() {
        return Err(SegmentError::Decode("upload is empty".to_string()));
    }

    let decode_err = |e: image::ImageError| SegmentError::Decode(e.to_string());

    let mut decoder = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|e| SegmentError::Decode(e.to_string()))?
        .into_decoder()
        .map_err(decode_err)?;
    let orientation = decoder.orientation().map_err(decode_err)?;
    let mut decoded = DynamicImage::from_decoder(decoder).map_err(decode_err)?;

    if orientation != Orientation::NoTransforms {
        debug!("Applying EXIF orientation {:?}", orientation);
        decoded.apply_orientation(orientation);
    }

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(SegmentError::Decode(format!(
            "image has zero extent ({}x{})",
            decoded.width(),
            decoded.height()
        )));
    }

    debug!(
        "Decoded {}x{} image ({:?})",
        decoded.width(),
        decoded.height(),
        decoded.color()
    );

    Ok(decoded.into_rgb8())
}

/// Target dimensions for an image so that its longest side fits `max_dim`.
///
/// Returns the input dimensions when they already fit. The longest side is
/// set to `max_dim` and the other side is scaled by the same factor and
/// truncated, never below one pixel.
pub fn target_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dim || longest == 0 {
        return (width, height);
    }

    let scale_side = |side: u32| -> u32 {
        let scaled = u64::from(side) * u64::from(max_dim) / u64::from(longest);
        (scaled as u32).max(1)
    };

    if width >= height {
        (max_dim, scale_side(height))
    } else {
        (scale_side(width), max_dim)
    }
}

/// Downscale an image to fit the working resolution. Never upsamples.
pub fn downscale(image: RgbImage, max_dim: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (target_w, target_h) = target_dimensions(width, height, max_dim);

    if (target_w, target_h) == (width, height) {
        return image;
    }

    debug!(
        "Resizing {}x{} -> {}x{} (max_dim={})",
        width, height, target_w, target_h, max_dim
    );
    imageops::resize(&image, target_w, target_h, FilterType::Lanczos3)
}

/// Decode and downscale in one step
pub fn normalize(raw: &[u8], max_dim: u32) -> Result<RgbImage, SegmentError> {
    let image = decode_rgb(raw)?;
    Ok(downscale(image, max_dim))
}
