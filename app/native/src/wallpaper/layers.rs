//! Depth bands and the layer set they produce.

use std::sync::Arc;

use image::RgbaImage;

use super::error::EngineError;

/// A half-open slice of the normalized depth range.
///
/// The first band also includes its lower edge and the last band its upper
/// edge, so every value in `[0, 1]` belongs to exactly one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBand {
    pub index: usize,
    pub lo: f32,
    pub hi: f32,
    pub is_first: bool,
    pub is_last: bool,
}

impl DepthBand {
    /// Returns `true` if depth `d` falls inside this band.
    #[must_use]
    pub fn contains(&self, d: f32) -> bool {
        (self.is_first || d > self.lo) && (self.is_last || d <= self.hi)
    }

    /// `[lo, hi]` as stored in cache records.
    #[must_use]
    pub const fn range(&self) -> [f32; 2] { [self.lo, self.hi] }
}

/// Display name for layer `index` of `count`.
#[must_use]
pub fn layer_name(index: usize, count: usize) -> String {
    if index == 0 {
        "Background".to_string()
    } else if count >= 2 && index == count - 1 {
        "Foreground".to_string()
    } else {
        format!("Layer {}", index + 1)
    }
}

/// One depth band of the source photo.
///
/// RGB carries the photo; alpha carries the smoothed band mask.
#[derive(Debug, Clone)]
pub struct Layer {
    pub index: usize,
    pub band: DepthBand,
    pub name: String,
    pub image: RgbaImage,
}

/// Layers ordered farthest first. Immutable once built.
#[derive(Debug, Clone)]
pub struct LayerSet {
    layers: Vec<Layer>,
    width: u32,
    height: u32,
}

/// Shared handle to a layer set.
pub type SharedLayers = Arc<LayerSet>;

impl LayerSet {
    /// Builds a set, checking that it is non-empty and every layer has the
    /// same dimensions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLayerCount` for an empty list and `ImageSizeMismatch`
    /// when a layer disagrees with the first one.
    pub fn new(layers: Vec<Layer>) -> Result<Self, EngineError> {
        let Some(first) = layers.first() else {
            return Err(EngineError::InvalidLayerCount(0));
        };
        let expected = first.image.dimensions();

        if let Some(bad) = layers.iter().find(|l| l.image.dimensions() != expected) {
            return Err(EngineError::ImageSizeMismatch {
                expected,
                actual: bad.image.dimensions(),
            });
        }

        Ok(Self {
            width: expected.0,
            height: expected.1,
            layers,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize { self.layers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.layers.is_empty() }

    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) { (self.width, self.height) }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Layer> { self.layers.get(index) }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer> { self.layers.iter() }

    #[must_use]
    pub fn as_slice(&self) -> &[Layer] { &self.layers }
}

impl<'a> IntoIterator for &'a LayerSet {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter { self.layers.iter() }
}
