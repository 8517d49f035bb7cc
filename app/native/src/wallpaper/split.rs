//! Two-layer background/foreground splits.
//!
//! A simpler alternative to N-band partitioning: either a single depth
//! threshold, or a background-removal model whose alpha marks the subject.

use std::path::PathBuf;

use image::imageops::FilterType;
use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};

use super::depth::DepthField;
use super::error::EngineError;
use super::layers::{DepthBand, Layer, LayerSet, layer_name};
use super::partition::{apply_mask, smooth_mask};

/// Default split threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Separates a photo's subject from its background.
pub trait BackgroundRemover: Send + Sync {
    /// Returns the photo with alpha set to the foreground mask.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Cutout` when the model fails.
    fn remove_background(&self, image: &RgbImage) -> Result<RgbaImage, EngineError>;
}

impl<F> BackgroundRemover for F
where F: Fn(&RgbImage) -> Result<RgbaImage, EngineError> + Send + Sync
{
    fn remove_background(&self, image: &RgbImage) -> Result<RgbaImage, EngineError> { self(image) }
}

/// Uses a mask or cutout image produced ahead of time.
///
/// Images with an alpha channel contribute their alpha; grayscale or RGB
/// images contribute their luminance (white = foreground).
#[derive(Debug, Clone)]
pub struct MaskFileCutout {
    path: PathBuf,
}

impl MaskFileCutout {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl BackgroundRemover for MaskFileCutout {
    fn remove_background(&self, image: &RgbImage) -> Result<RgbaImage, EngineError> {
        let decoded = image::open(&self.path)
            .map_err(|e| EngineError::Cutout(format!("{}: {e}", self.path.display())))?;

        let mut mask: GrayImage = if decoded.color().has_alpha() {
            let rgba = decoded.to_rgba8();
            GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| Luma([rgba.get_pixel(x, y)[3]]))
        } else {
            decoded.to_luma8()
        };

        let (width, height) = image.dimensions();
        if mask.dimensions() != (width, height) {
            mask = image::imageops::resize(&mask, width, height, FilterType::Triangle);
        }

        Ok(apply_mask(image, &mask))
    }
}

fn two_layer_set(background: RgbaImage, foreground: RgbaImage, threshold: f32) -> Result<LayerSet, EngineError> {
    let bands = [
        DepthBand {
            index: 0,
            lo: 0.0,
            hi: threshold,
            is_first: true,
            is_last: false,
        },
        DepthBand {
            index: 1,
            lo: threshold,
            hi: 1.0,
            is_first: false,
            is_last: true,
        },
    ];

    let layers = bands
        .into_iter()
        .zip([background, foreground])
        .map(|(band, image)| Layer {
            index: band.index,
            band,
            name: layer_name(band.index, 2),
            image,
        })
        .collect();

    LayerSet::new(layers)
}

/// Splits at one depth threshold.
///
/// The foreground is the smoothed `depth > threshold` mask; the background
/// is its inverse.
///
/// # Errors
///
/// Returns `Config` for a threshold outside `[0, 1]` and
/// `ImageSizeMismatch` when depth and photo disagree in size.
pub fn split_by_threshold(
    depth: &DepthField,
    source: &RgbImage,
    threshold: f32,
    blur_radius: f32,
) -> Result<LayerSet, EngineError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(EngineError::Config(format!("threshold {threshold} must be between 0 and 1")));
    }
    if depth.dimensions() != source.dimensions() {
        return Err(EngineError::ImageSizeMismatch {
            expected: source.dimensions(),
            actual: depth.dimensions(),
        });
    }

    let mask = GrayImage::from_fn(depth.width(), depth.height(), |x, y| {
        Luma([if depth.get(x, y) > threshold { 255 } else { 0 }])
    });
    let mask = smooth_mask(&mask, blur_radius);
    let mut inverted = mask.clone();
    image::imageops::invert(&mut inverted);

    two_layer_set(apply_mask(source, &inverted), apply_mask(source, &mask), threshold)
}

/// Splits with a background-removal model.
///
/// The background is the untouched photo; the foreground is the cutout.
///
/// # Errors
///
/// Propagates the remover's error and returns `ImageSizeMismatch` if the
/// cutout does not match the photo.
pub fn split_with_cutout(source: &RgbImage, remover: &dyn BackgroundRemover) -> Result<LayerSet, EngineError> {
    let cutout = remover.remove_background(source)?;
    if cutout.dimensions() != source.dimensions() {
        return Err(EngineError::ImageSizeMismatch {
            expected: source.dimensions(),
            actual: cutout.dimensions(),
        });
    }

    let background = RgbaImage::from_fn(source.width(), source.height(), |x, y| {
        let [r, g, b] = source.get_pixel(x, y).0;
        Rgba([r, g, b, 255])
    });

    two_layer_set(background, cutout, DEFAULT_THRESHOLD)
}
