//! Frame output: writing the composited frame and handing it to the desktop.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use tempfile::NamedTempFile;

use super::error::EngineError;

/// JPEG quality used for frames.
pub const JPEG_QUALITY: u8 = 95;

/// Errors that can occur when applying a wallpaper.
#[derive(Debug)]
pub enum SinkError {
    /// The frame file does not exist.
    FileNotFound(String),
    /// The platform call failed.
    SetWallpaperFailed(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound(path) => write!(f, "Wallpaper file not found: {path}"),
            Self::SetWallpaperFailed(msg) => write!(f, "Failed to set wallpaper: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Destination for rendered frames.
pub trait WallpaperSink: Send + Sync {
    /// Applies the frame stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` if the frame cannot be applied. The frame stays
    /// on disk either way.
    fn apply(&self, path: &Path) -> Result<(), SinkError>;
}

/// Sets the desktop wallpaper through the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallpaper;

impl WallpaperSink for SystemWallpaper {
    fn apply(&self, path: &Path) -> Result<(), SinkError> {
        if !path.exists() {
            return Err(SinkError::FileNotFound(path.display().to_string()));
        }

        let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let path_str = absolute.display().to_string();

        wallpaper::set_from_path(&path_str).map_err(|e| SinkError::SetWallpaperFailed(e.to_string()))
    }
}

/// Leaves the frame on disk without touching the desktop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl WallpaperSink for NoopSink {
    fn apply(&self, _path: &Path) -> Result<(), SinkError> { Ok(()) }
}

/// Output encoding chosen from a path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Jpeg,
    Png,
}

impl FrameFormat {
    /// Returns `None` for extensions other than jpg, jpeg and png.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

/// Writes `frame` to `path` atomically.
///
/// The frame is encoded into a temporary file in the destination directory
/// and renamed over `path`, so readers never observe a partial image.
///
/// # Errors
///
/// Returns `EngineError::FrameSave` if the extension is unsupported or any
/// step of the write fails.
pub fn save_frame(frame: &RgbImage, path: &Path) -> Result<(), EngineError> {
    let fail = |reason: String| EngineError::FrameSave {
        path: path.to_path_buf(),
        reason,
    };

    let format = FrameFormat::from_path(path)
        .ok_or_else(|| fail("unsupported extension (use .jpg, .jpeg or .png)".to_string()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;

    let temp = NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        match format {
            FrameFormat::Jpeg => JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
                .encode_image(frame)
                .map_err(|e| fail(e.to_string()))?,
            FrameFormat::Png => frame
                .write_to(&mut writer, ImageFormat::Png)
                .map_err(|e| fail(e.to_string()))?,
        }
        writer.flush().map_err(|e| fail(e.to_string()))?;
    }

    temp.persist(path).map_err(|e| fail(e.error.to_string()))?;
    Ok(())
}
