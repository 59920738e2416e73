//! Test Utilities Module
//!
//! Provides fixture images and stub mask generators for unit tests.
//! This module is only compiled when running tests.

#![cfg(test)]

use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::discovery::{DiscoveryError, MaskGenerator, ModelInfo, ModelConfig};
use crate::pipeline::MaskRecord;

// ============================================================================
// Fixture images
// ============================================================================

/// Smooth RGB gradient, distinct at every pixel of small images
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// PNG bytes for an RGB image
pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .expect("PNG encoding should succeed");
    buf.into_inner()
}

fn stub_info(backend: &str) -> ModelInfo {
    let model = ModelConfig::default();
    ModelInfo {
        backend: backend.to_string(),
        checkpoint: model.checkpoint.display().to_string(),
        device: model.device,
        settings: model.generator,
    }
}

// ============================================================================
// Stub generators
// ============================================================================

/// Returns a canned mask set and records what it was called with
pub struct StubGenerator {
    masks: Vec<MaskRecord>,
    pub calls: AtomicUsize,
    last_dimensions: Mutex<Option<(u32, u32)>>,
}

impl StubGenerator {
    pub fn new(masks: Vec<MaskRecord>) -> Self {
        Self {
            masks,
            calls: AtomicUsize::new(0),
            last_dimensions: Mutex::new(None),
        }
    }

    pub fn last_seen_dimensions(&self) -> Option<(u32, u32)> {
        *self.last_dimensions.lock().unwrap()
    }
}

#[async_trait]
impl MaskGenerator for StubGenerator {
    async fn generate(&self, image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_dimensions.lock().unwrap() = Some(image.dimensions());
        Ok(self.masks.clone())
    }

    fn describe(&self) -> ModelInfo {
        stub_info("stub")
    }
}

/// Always fails with the given error
pub struct FailingGenerator {
    error: DiscoveryError,
}

impl FailingGenerator {
    pub fn new(error: DiscoveryError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl MaskGenerator for FailingGenerator {
    async fn generate(&self, _image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        Err(self.error.clone())
    }

    fn describe(&self) -> ModelInfo {
        stub_info("failing")
    }

    async fn is_ready(&self) -> bool {
        false
    }
}

/// Panics inside generate
pub struct PanickingGenerator;

#[async_trait]
impl MaskGenerator for PanickingGenerator {
    async fn generate(&self, _image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        panic!("model state corrupted");
    }

    fn describe(&self) -> ModelInfo {
        stub_info("panicking")
    }
}

/// Sleeps before returning no masks, tracking peak concurrency
pub struct SlowGenerator {
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl SlowGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MaskGenerator for SlowGenerator {
    async fn generate(&self, _image: &RgbImage) -> Result<Vec<MaskRecord>, DiscoveryError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    fn describe(&self) -> ModelInfo {
        stub_info("slow")
    }
}
