//! Depth field acquisition.
//!
//! The depth model itself lives outside this crate. It is consumed through
//! the [`DepthEstimator`] trait: either as a precomputed depth map on disk,
//! as an external command that writes one, or as any closure.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, ImageReader, Luma, RgbImage};

use super::error::EngineError;
use crate::platform::command::resolve_binary;

/// Placeholder replaced with the path of the source image in command arguments.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Placeholder replaced with the path the command must write its depth map to.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Per-pixel closeness estimate normalized to `[0, 1]` (0 = far, 1 = near).
#[derive(Debug, Clone, PartialEq)]
pub struct DepthField {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthField {
    /// Creates a field from values that are already normalized.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Model` if `values.len()` is not `width * height`.
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self, EngineError> {
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(EngineError::Model(format!(
                "depth field has {} values, expected {expected} for {width}x{height}",
                values.len()
            )));
        }
        Ok(Self { width, height, values })
    }

    /// Creates a field from raw model output, min/max normalizing it.
    ///
    /// A constant field carries no depth information and normalizes to all
    /// zeros, which puts every pixel in the farthest band.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Model` on a length mismatch or non-finite values.
    pub fn from_raw(width: u32, height: u32, mut values: Vec<f32>) -> Result<Self, EngineError> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::Model("depth output contains non-finite values".to_string()));
        }

        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;

        if range > 0.0 {
            for v in &mut values {
                *v = (*v - min) / range;
            }
        } else {
            values.fill(0.0);
        }

        Self::new(width, height, values)
    }

    /// Normalizes a grayscale depth map (8 or 16 bit) into a field.
    ///
    /// # Errors
    ///
    /// Propagates [`DepthField::from_raw`] errors.
    pub fn from_luma16(map: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Result<Self, EngineError> {
        let values = map.pixels().map(|p| f32::from(p[0])).collect();
        Self::from_raw(map.width(), map.height(), values)
    }

    #[must_use]
    pub const fn width(&self) -> u32 { self.width }

    #[must_use]
    pub const fn height(&self) -> u32 { self.height }

    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) { (self.width, self.height) }

    /// Returns the value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the field.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        assert!(x < self.width && y < self.height, "depth coordinate out of bounds");
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Row-major normalized values.
    #[must_use]
    pub fn values(&self) -> &[f32] { &self.values }

    /// Renders the field as an 8-bit grayscale image (white = near).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([(self.get(x, y) * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// Produces a depth field for a photograph.
///
/// Implementations may be slow and block the calling thread; the engine
/// only calls them during initialization or layer regeneration.
pub trait DepthEstimator: Send + Sync {
    /// Estimates depth for `image`.
    ///
    /// The returned field must have the same dimensions as `image`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Model` when the estimate cannot be produced.
    fn estimate(&self, image: &RgbImage) -> Result<DepthField, EngineError>;
}

impl<F> DepthEstimator for F
where F: Fn(&RgbImage) -> Result<DepthField, EngineError> + Send + Sync
{
    fn estimate(&self, image: &RgbImage) -> Result<DepthField, EngineError> { self(image) }
}

/// Loads a depth map that the external model wrote ahead of time.
#[derive(Debug, Clone)]
pub struct DepthMapFile {
    path: PathBuf,
}

impl DepthMapFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    /// Conventional depth map location for a photo: `<dir>/<stem>.depth.png`.
    #[must_use]
    pub fn beside(image_path: &Path) -> Self {
        let stem = image_path.file_stem().and_then(|s| s.to_str()).unwrap_or("wallpaper");
        Self::new(image_path.with_file_name(format!("{stem}.depth.png")))
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }
}

impl DepthEstimator for DepthMapFile {
    fn estimate(&self, image: &RgbImage) -> Result<DepthField, EngineError> {
        load_depth_map(&self.path, image.dimensions())
    }
}

/// Runs an external depth model executable.
///
/// Arguments may contain [`INPUT_PLACEHOLDER`] and [`OUTPUT_PLACEHOLDER`];
/// the command reads the photo from the former and must write a grayscale
/// depth map to the latter.
#[derive(Debug, Clone)]
pub struct DepthCommand {
    program: String,
    args: Vec<String>,
}

impl DepthCommand {
    /// Builds a command from `[program, args...]`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Result<Self, EngineError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| EngineError::Config("depth command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn substitute(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.display().to_string();
        let output = output.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace(INPUT_PLACEHOLDER, &input).replace(OUTPUT_PLACEHOLDER, &output))
            .collect()
    }
}

impl DepthEstimator for DepthCommand {
    fn estimate(&self, image: &RgbImage) -> Result<DepthField, EngineError> {
        let program = resolve_binary(&self.program).map_err(EngineError::Model)?;
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.png");
        let output = workdir.path().join("depth.png");

        image
            .save(&input)
            .map_err(|e| EngineError::Model(format!("failed to stage model input: {e}")))?;

        tracing::info!(program = %program.display(), "running depth model");
        let status = Command::new(&program)
            .args(self.substitute(&input, &output))
            .status()
            .map_err(|e| EngineError::Model(format!("failed to run {}: {e}", program.display())))?;

        if !status.success() {
            return Err(EngineError::Model(format!(
                "{} exited with {status}",
                program.display()
            )));
        }

        load_depth_map(&output, image.dimensions())
    }
}

/// Decodes a grayscale depth map, resamples it to `size`, and normalizes it.
fn load_depth_map(path: &Path, size: (u32, u32)) -> Result<DepthField, EngineError> {
    let decoded = ImageReader::open(path)
        .map_err(|e| EngineError::Model(format!("depth map {}: {e}", path.display())))?
        .with_guessed_format()
        .map_err(|e| EngineError::Model(format!("depth map {}: {e}", path.display())))?
        .decode()
        .map_err(|e| EngineError::Model(format!("depth map {}: {e}", path.display())))?;

    let mut map = decoded.to_luma16();
    if map.dimensions() != size {
        tracing::debug!(
            from = ?map.dimensions(),
            to = ?size,
            "resampling depth map to source size"
        );
        map = image::imageops::resize(&map, size.0, size.1, FilterType::CatmullRom);
    }

    DepthField::from_luma16(&map)
}
