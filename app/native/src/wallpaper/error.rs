//! Error types for the layered wallpaper engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while building, caching, or compositing wallpaper layers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine options are unusable (missing image, zero interval, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source image does not exist.
    #[error("Image not found: {}", .0.display())]
    MissingImage(PathBuf),

    /// The source image exists but could not be decoded.
    #[error("Failed to read image {}: {reason}", path.display())]
    ImageRead { path: PathBuf, reason: String },

    /// A layer count below one was requested.
    #[error("Invalid layer count: {0} (must be at least 1)")]
    InvalidLayerCount(usize),

    /// A clock layer index outside `0..count` was requested.
    #[error("Invalid layer index {index}: must be between 0 and {}", count.saturating_sub(1))]
    InvalidLayerIndex { index: usize, count: usize },

    /// Two rasters that must share dimensions do not.
    #[error("Image size mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    ImageSizeMismatch { expected: (u32, u32), actual: (u32, u32) },

    /// The depth estimator failed.
    #[error("Depth estimation failed: {0}")]
    Model(String),

    /// The cutout model failed.
    #[error("Background removal failed: {0}")]
    Cutout(String),

    /// An operation needs layers but `initialize` has not completed.
    #[error("Wallpaper engine not initialized")]
    NotInitialized,

    /// Writing the composited frame failed.
    #[error("Failed to save frame to {}: {reason}", path.display())]
    FrameSave { path: PathBuf, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the on-disk layer cache.
///
/// Loading never surfaces these (a broken cache is a miss); saving returns
/// them so the caller can log and move on.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to create cache directory {}: {source}", path.display())]
    Directory { path: PathBuf, source: std::io::Error },

    #[error("Failed to write layer image {}: {reason}", path.display())]
    LayerWrite { path: PathBuf, reason: String },

    #[error("Failed to write cache record {}: {reason}", path.display())]
    RecordWrite { path: PathBuf, reason: String },
}
