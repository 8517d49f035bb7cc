//! Slicing a photo into depth layers.
//!
//! The normalized depth range is cut into `n` equal bands. Each band turns
//! into a binary mask, the mask is softened with a Gaussian blur, and the
//! result becomes the alpha channel of a copy of the photo.

use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use rayon::prelude::*;

use super::depth::DepthField;
use super::error::EngineError;
use super::layers::{DepthBand, Layer, LayerSet, layer_name};

/// Default mask blur, in pixels.
pub const DEFAULT_BLUR_RADIUS: f32 = 2.0;

/// `n + 1` evenly spaced thresholds from 0 to 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn thresholds(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    (0..=n).map(|i| i as f32 / n as f32).collect()
}

/// The `n` contiguous bands covering `[0, 1]`, farthest first.
#[must_use]
pub fn bands(n: usize) -> Vec<DepthBand> {
    let edges = thresholds(n);
    edges
        .windows(2)
        .enumerate()
        .map(|(index, pair)| DepthBand {
            index,
            lo: pair[0],
            hi: pair[1],
            is_first: index == 0,
            is_last: index + 1 == n,
        })
        .collect()
}

/// Index of the band that contains `d` among `n` bands.
///
/// Values outside `[0, 1]` land in the nearest edge band.
#[must_use]
pub fn band_index(d: f32, n: usize) -> usize {
    bands(n)
        .iter()
        .position(|band| band.contains(d))
        .unwrap_or_else(|| n.saturating_sub(1))
}

/// Binary mask (0 or 255) of the pixels inside `band`.
#[must_use]
pub fn band_mask(depth: &DepthField, band: &DepthBand) -> GrayImage {
    GrayImage::from_fn(depth.width(), depth.height(), |x, y| {
        Luma([if band.contains(depth.get(x, y)) { 255 } else { 0 }])
    })
}

/// Softens a mask edge. Uniform masks are returned untouched.
#[must_use]
pub fn smooth_mask(mask: &GrayImage, radius: f32) -> GrayImage {
    let uniform = mask.as_raw().windows(2).all(|w| w[0] == w[1]);
    if radius <= 0.0 || uniform {
        return mask.clone();
    }
    image::imageops::blur(mask, radius)
}

/// Combines the photo's colors with a mask as alpha.
#[must_use]
pub fn apply_mask(source: &RgbImage, mask: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(source.width(), source.height(), |x, y| {
        let [r, g, b] = source.get_pixel(x, y).0;
        Rgba([r, g, b, mask.get_pixel(x, y)[0]])
    })
}

/// Partitions `source` into `num_layers` depth layers.
///
/// # Errors
///
/// Returns `InvalidLayerCount` when `num_layers` is zero and
/// `ImageSizeMismatch` when the depth field and photo disagree in size.
pub fn partition(
    depth: &DepthField,
    source: &RgbImage,
    num_layers: usize,
    blur_radius: f32,
) -> Result<LayerSet, EngineError> {
    if num_layers == 0 {
        return Err(EngineError::InvalidLayerCount(num_layers));
    }
    if depth.dimensions() != source.dimensions() {
        return Err(EngineError::ImageSizeMismatch {
            expected: source.dimensions(),
            actual: depth.dimensions(),
        });
    }

    let layers: Vec<Layer> = bands(num_layers)
        .into_par_iter()
        .map(|band| {
            let mask = smooth_mask(&band_mask(depth, &band), blur_radius);
            Layer {
                index: band.index,
                band,
                name: layer_name(band.index, num_layers),
                image: apply_mask(source, &mask),
            }
        })
        .collect();

    tracing::debug!(
        layers = layers.len(),
        width = source.width(),
        height = source.height(),
        "partitioned image into depth layers"
    );

    LayerSet::new(layers)
}
