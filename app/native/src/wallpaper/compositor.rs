//! Frame assembly.
//!
//! Layers are stacked back to front with straight-alpha "over" and the
//! overlay is slotted in directly above the clock layer.

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use rayon::prelude::*;

use super::error::EngineError;
use super::layers::LayerSet;

/// Blends `src` over `dst` in place (both 4-byte RGBA, straight alpha).
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_into(dst: &mut [u8], src: &[u8]) {
    let sa = src[3];
    if sa == 0 {
        return;
    }
    if sa == 255 {
        dst.copy_from_slice(src);
        return;
    }

    let src_a = f32::from(sa) / 255.0;
    let dst_a = f32::from(dst[3]) / 255.0 * (1.0 - src_a);
    let out_a = src_a + dst_a;

    for c in 0..3 {
        let value = f32::from(src[c]).mul_add(src_a, f32::from(dst[c]) * dst_a) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Blends one pixel over another.
#[inline]
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) { blend_into(&mut dst.0, &src.0); }

/// Blends `top` over `canvas`. Both must have the same dimensions.
fn blend_layer(canvas: &mut RgbaImage, top: &RgbaImage) {
    canvas
        .par_chunks_exact_mut(4)
        .zip(top.par_chunks_exact(4))
        .for_each(|(dst, src)| blend_into(dst, src));
}

/// Composites the layer set with `overlay` above layer `clock_index`.
///
/// # Errors
///
/// Returns `InvalidLayerIndex` when `clock_index` is not a valid layer and
/// `ImageSizeMismatch` when the overlay does not match the layers.
pub fn composite_rgba(
    layers: &LayerSet,
    clock_index: usize,
    overlay: &RgbaImage,
) -> Result<RgbaImage, EngineError> {
    if clock_index >= layers.len() {
        return Err(EngineError::InvalidLayerIndex {
            index: clock_index,
            count: layers.len(),
        });
    }
    let (width, height) = layers.dimensions();
    if overlay.dimensions() != (width, height) {
        return Err(EngineError::ImageSizeMismatch {
            expected: (width, height),
            actual: overlay.dimensions(),
        });
    }

    let mut canvas = RgbaImage::new(width, height);
    for (position, layer) in layers.iter().enumerate() {
        blend_layer(&mut canvas, &layer.image);
        if position == clock_index {
            blend_layer(&mut canvas, overlay);
        }
    }

    Ok(canvas)
}

/// Drops alpha, keeping the composited color channels.
#[must_use]
pub fn flatten(frame: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b, _] = frame.get_pixel(x, y).0;
        Rgb([r, g, b])
    })
}

/// Composites and flattens a frame ready to be written as a wallpaper.
///
/// # Errors
///
/// See [`composite_rgba`].
pub fn composite(layers: &LayerSet, clock_index: usize, overlay: &RgbaImage) -> Result<RgbImage, EngineError> {
    composite_rgba(layers, clock_index, overlay).map(|frame| flatten(&frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallpaper::layers::{DepthBand, Layer, layer_name};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn solid_set(colors: &[Rgba<u8>]) -> LayerSet {
        let n = colors.len();
        let layers = colors
            .iter()
            .enumerate()
            .map(|(index, color)| Layer {
                index,
                band: DepthBand {
                    index,
                    lo: 0.0,
                    hi: 1.0,
                    is_first: index == 0,
                    is_last: index + 1 == n,
                },
                name: layer_name(index, n),
                image: RgbaImage::from_pixel(2, 2, *color),
            })
            .collect();
        LayerSet::new(layers).unwrap()
    }

    #[test]
    fn test_blend_half_alpha_over_opaque() {
        let mut dst = Rgba([0, 0, 0, 255]);
        blend_pixel(&mut dst, Rgba([255, 255, 255, 128]));
        assert_eq!(dst[3], 255);
        assert_eq!(dst[0], 128);
    }

    #[test]
    fn test_blend_onto_transparent_keeps_source() {
        let mut dst = Rgba([0, 0, 0, 0]);
        blend_pixel(&mut dst, Rgba([10, 20, 30, 120]));
        assert_eq!(dst, Rgba([10, 20, 30, 120]));
    }

    #[test]
    fn test_blend_transparent_source_is_noop() {
        let mut dst = Rgba([1, 2, 3, 4]);
        blend_pixel(&mut dst, Rgba([255, 255, 255, 0]));
        assert_eq!(dst, Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn test_overlay_goes_above_clock_layer() {
        let layers = solid_set(&[RED, GREEN, BLUE]);
        let overlay = RgbaImage::from_pixel(2, 2, WHITE);

        let frame = composite(&layers, 0, &overlay).unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgb([0, 0, 255]));

        let frame = composite(&layers, 2, &overlay).unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_transparent_foreground_reveals_overlay() {
        let layers = solid_set(&[RED, Rgba([0, 255, 0, 0])]);
        let overlay = RgbaImage::from_pixel(2, 2, WHITE);
        let frame = composite(&layers, 0, &overlay).unwrap();
        assert_eq!(frame.get_pixel(1, 1), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_empty_overlay_leaves_layers() {
        let layers = solid_set(&[RED, Rgba([0, 0, 0, 0])]);
        let frame = composite(&layers, 1, &RgbaImage::new(2, 2)).unwrap();
        assert_eq!(frame.get_pixel(0, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_composite_is_deterministic() {
        let layers = solid_set(&[RED, Rgba([0, 255, 0, 90]), Rgba([0, 0, 255, 33])]);
        let overlay = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 50, 170]));
        let a = composite(&layers, 1, &overlay).unwrap();
        let b = composite(&layers, 1, &overlay).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_invalid_clock_index() {
        let layers = solid_set(&[RED, GREEN]);
        let result = composite(&layers, 2, &RgbaImage::new(2, 2));
        assert!(matches!(result, Err(EngineError::InvalidLayerIndex { index: 2, count: 2 })));
    }

    #[test]
    fn test_overlay_size_mismatch() {
        let layers = solid_set(&[RED]);
        let result = composite(&layers, 0, &RgbaImage::new(3, 2));
        assert!(matches!(result, Err(EngineError::ImageSizeMismatch { .. })));
    }

    #[test]
    fn test_flatten_drops_alpha() {
        let frame = RgbaImage::from_pixel(1, 1, Rgba([9, 8, 7, 0]));
        assert_eq!(flatten(&frame).get_pixel(0, 0), &Rgb([9, 8, 7]));
    }
}
