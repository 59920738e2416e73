//! Automask Server Library
//!
//! This module exports the server components for use in integration tests
//! and external tooling.

pub mod config;
pub mod discovery;
pub mod pipeline;
pub mod server;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use discovery::{HttpMaskGenerator, MaskGenerator, RegionDiscovery};
pub use pipeline::{Mask, MaskRecord, SegmentError, SegmentPipeline, SegmentResponse};
pub use server::{AppState, build_router, build_router_with};
