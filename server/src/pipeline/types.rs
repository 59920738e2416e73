//! Pipeline types and error definitions

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while turning an upload into a segmentation response
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Invalid image file: {0}")]
    Decode(String),

    #[error(
        "Mask shape {mask_width}x{mask_height} does not match image shape {image_width}x{image_height}"
    )]
    ShapeMismatch {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Mask generation failed: {0}")]
    Inference(String),

    #[error("Mask generation timed out after {0:?}")]
    InferenceTimeout(Duration),

    #[error("Failed to encode response: {0}")]
    Encoding(String),

    #[error("No file field found in upload")]
    MissingFile,

    #[error("Malformed multipart upload: {0}")]
    Multipart(String),

    #[error("Upload too large: {0}")]
    UploadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SegmentError {
    /// Short machine-readable kind, used for logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            SegmentError::Decode(_) => "decode_error",
            SegmentError::ShapeMismatch { .. } => "shape_mismatch",
            SegmentError::Inference(_) => "inference_error",
            SegmentError::InferenceTimeout(_) => "inference_timeout",
            SegmentError::Encoding(_) => "encoding_error",
            SegmentError::MissingFile => "missing_file",
            SegmentError::Multipart(_) => "multipart_error",
            SegmentError::UploadTooLarge(_) => "upload_too_large",
            SegmentError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status reported to the client for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            SegmentError::Decode(_) | SegmentError::MissingFile | SegmentError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            SegmentError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            SegmentError::InferenceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SegmentError::ShapeMismatch { .. }
            | SegmentError::Inference(_)
            | SegmentError::Encoding(_)
            | SegmentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller is at fault (bad upload) rather than the server
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Processing stage of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Decoding,
    Normalizing,
    Discovering,
    Compositing,
    Encoding,
    Responded,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Decoding => "decoding",
            Stage::Normalizing => "normalizing",
            Stage::Discovering => "discovering",
            Stage::Compositing => "compositing",
            Stage::Encoding => "encoding",
            Stage::Responded => "responded",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a request: the stage it reached and what went wrong
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: SegmentError,
}

impl PipelineFailure {
    pub fn new(stage: Stage, error: SegmentError) -> Self {
        Self { stage, error }
    }
}

/// Per-pixel boolean mask, stored row-major.
///
/// On the wire a mask is a list of rows, each a list of 0/1 integers.
/// Booleans are accepted on input as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<MaskCell>>", into = "Vec<Vec<u8>>")]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// Create an all-false mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Value at (x, y); out-of-range coordinates read as false
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            self.bits[y as usize * self.width as usize + x as usize] = value;
        }
    }

    /// Number of pixels inside the mask
    pub fn area(&self) -> u64 {
        self.bits.iter().filter(|b| **b).count() as u64
    }

    /// Row-major bits
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Rows of 0/1 integers, top to bottom, left to right
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        if self.width == 0 {
            return vec![Vec::new(); self.height as usize];
        }
        self.bits
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|b| u8::from(*b)).collect())
            .collect()
    }

    /// Assemble a mask from rows of integers; any non-zero value is inside
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, MaskShapeError> {
        let cells: Vec<Vec<MaskCell>> = rows
            .iter()
            .map(|row| row.iter().map(|v| MaskCell::Bit(*v)).collect())
            .collect();
        Self::try_from(cells)
    }
}

/// Rows of a mask did not form a rectangle
#[derive(Debug, Error)]
#[error("Mask row {row} has {found} columns, expected {expected}")]
pub struct MaskShapeError {
    pub row: usize,
    pub found: usize,
    pub expected: usize,
}

/// One mask cell as received from a generator
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum MaskCell {
    Bit(u8),
    Flag(bool),
}

impl MaskCell {
    fn is_set(self) -> bool {
        match self {
            MaskCell::Bit(v) => v != 0,
            MaskCell::Flag(b) => b,
        }
    }
}

impl TryFrom<Vec<Vec<MaskCell>>> for Mask {
    type Error = MaskShapeError;

    fn try_from(rows: Vec<Vec<MaskCell>>) -> Result<Self, Self::Error> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut bits = Vec::with_capacity(width * rows.len());
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(MaskShapeError {
                    row: row_index,
                    found: row.len(),
                    expected: width,
                });
            }
            bits.extend(row.iter().map(|cell| cell.is_set()));
        }
        Ok(Self {
            width: width as u32,
            height: rows.len() as u32,
            bits,
        })
    }
}

impl From<Mask> for Vec<Vec<u8>> {
    fn from(mask: Mask) -> Self {
        mask.to_rows()
    }
}

/// One discovered region as returned by the mask generator.
///
/// Only `segmentation` is guaranteed; the scores are whatever the generator
/// chose to report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskRecord {
    pub segmentation: Mask,
    #[serde(default, alias = "predicted_quality")]
    pub predicted_iou: Option<f32>,
    #[serde(default)]
    pub stability_score: Option<f32>,
    #[serde(default)]
    pub area: Option<u64>,
    /// Bounding box as [x, y, width, height]
    #[serde(default)]
    pub bbox: Option<[u32; 4]>,
}

impl MaskRecord {
    /// Record carrying only a segmentation
    pub fn from_mask(segmentation: Mask) -> Self {
        Self {
            segmentation,
            predicted_iou: None,
            stability_score: None,
            area: None,
            bbox: None,
        }
    }
}

/// Successful response for POST /segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResponse {
    /// Base64 PNG of the normalized image
    pub original_image: String,
    /// Base64 PNG of the composited overlay
    pub segmented_overlay: String,
    /// One 0/1 grid per discovered region
    pub masks: Vec<Vec<Vec<u8>>>,
}
