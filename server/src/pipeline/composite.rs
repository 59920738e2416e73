//! Overlay compositing
//!
//! Every mask is painted over the image in a random color at 40% opacity.
//! Masks are applied in the order the generator returned them and each one
//! blends over the result of the previous ones, so on overlaps the most
//! recently applied mask dominates.

use image::{Rgb, RgbImage};
use rand::Rng;

use super::types::{MaskRecord, SegmentError};

/// Weight of the existing pixel in a blend
const IMAGE_WEIGHT: f64 = 0.6;
/// Weight of the mask color in a blend
const COLOR_WEIGHT: f64 = 0.4;

/// Blend one channel value with a mask color channel, truncating to u8
#[inline]
pub fn blend_channel(current: u8, color: u8) -> u8 {
    (IMAGE_WEIGHT * f64::from(current) + COLOR_WEIGHT * f64::from(color)) as u8
}

/// Draw a mask color with three independent uniform channel samples
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> Rgb<u8> {
    Rgb([rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>()])
}

/// Composite masks over an image with fresh, unseeded colors
pub fn composite(image: &RgbImage, masks: &[MaskRecord]) -> Result<RgbImage, SegmentError> {
    composite_with(image, masks, &mut rand::rng())
}

/// Composite masks over an image drawing colors from `rng`
pub fn composite_with<R: Rng + ?Sized>(
    image: &RgbImage,
    masks: &[MaskRecord],
    rng: &mut R,
) -> Result<RgbImage, SegmentError> {
    let (width, height) = image.dimensions();
    let mut overlay = image.clone();

    for record in masks {
        let mask = &record.segmentation;
        if mask.dimensions() != (width, height) {
            return Err(SegmentError::ShapeMismatch {
                mask_width: mask.width(),
                mask_height: mask.height(),
                image_width: width,
                image_height: height,
            });
        }

        let color = random_color(rng);
        apply_mask(&mut overlay, mask.bits(), color);
    }

    Ok(overlay)
}

/// Blend `color` into every pixel whose row-major bit is set
fn apply_mask(overlay: &mut RgbImage, bits: &[bool], color: Rgb<u8>) {
    for (pixel, inside) in overlay.pixels_mut().zip(bits) {
        if *inside {
            for (channel, tint) in pixel.0.iter_mut().zip(color.0) {
                *channel = blend_channel(*channel, tint);
            }
        }
    }
}
