//! On-disk cache of generated layer sets.
//!
//! A cached set is a JSON record plus one PNG per layer, all named after the
//! source image's file stem:
//!
//! ```text
//! <cache dir>/beach_layers.json
//! <cache dir>/beach_layer_0.png
//! <cache dir>/beach_layer_1.png
//! ```
//!
//! The stem is the only key, so two photos with the same stem in different
//! directories share an entry.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::CacheError;
use super::layers::{DepthBand, Layer, LayerSet};
use crate::cache::{calculate_dir_size, get_cache_subdir};

/// Cache subdirectory name.
pub const LAYER_CACHE_SUBDIR: &str = "layers";

/// JSON record describing a cached layer set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub num_layers: usize,
    pub image_path: String,
    pub layers: Vec<CachedLayer>,
}

/// One layer entry of a [`CacheRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLayer {
    pub path: String,
    pub depth_range: [f32; 2],
    pub name: String,
}

/// Layer cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct LayerCache {
    dir: PathBuf,
}

impl Default for LayerCache {
    fn default() -> Self { Self::new(get_cache_subdir(LAYER_CACHE_SUBDIR)) }
}

impl LayerCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    #[must_use]
    pub fn dir(&self) -> &Path { &self.dir }

    /// Cache key for a source image.
    #[must_use]
    pub fn identity_for(image_path: &Path) -> String {
        image_path
            .file_stem()
            .map_or_else(|| "wallpaper".to_string(), |s| s.to_string_lossy().into_owned())
    }

    #[must_use]
    pub fn record_path(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{identity}_layers.json"))
    }

    #[must_use]
    pub fn layer_path(&self, identity: &str, index: usize) -> PathBuf {
        self.dir.join(format!("{identity}_layer_{index}.png"))
    }

    /// Reads the record for `identity`, if one exists and parses.
    #[must_use]
    pub fn read_record(&self, identity: &str) -> Option<CacheRecord> {
        let path = self.record_path(identity);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::info!(path = %path.display(), error = %err, "ignoring unreadable cache record");
                None
            }
        }
    }

    /// Loads a cached set with exactly `num_layers` layers.
    ///
    /// Any problem with the entry is a miss; nothing is propagated.
    #[must_use]
    pub fn load(&self, identity: &str, num_layers: usize) -> Option<LayerSet> {
        let Some(record) = self.read_record(identity) else {
            tracing::debug!(identity, "no cached layers");
            return None;
        };

        if record.num_layers != num_layers || record.layers.len() != num_layers {
            tracing::info!(
                identity,
                cached = record.num_layers,
                entries = record.layers.len(),
                requested = num_layers,
                "cached layer count differs; regenerating"
            );
            return None;
        }

        let mut layers = Vec::with_capacity(num_layers);
        for (index, entry) in record.layers.iter().enumerate() {
            let path = self.dir.join(&entry.path);
            let image = match image::open(&path) {
                Ok(img) => img.to_rgba8(),
                Err(err) => {
                    tracing::info!(path = %path.display(), error = %err, "cached layer unreadable");
                    return None;
                }
            };

            layers.push(Layer {
                index,
                band: DepthBand {
                    index,
                    lo: entry.depth_range[0],
                    hi: entry.depth_range[1],
                    is_first: index == 0,
                    is_last: index + 1 == num_layers,
                },
                name: entry.name.clone(),
                image,
            });
        }

        match LayerSet::new(layers) {
            Ok(set) => {
                tracing::info!(identity, layers = set.len(), "loaded layers from cache");
                Some(set)
            }
            Err(err) => {
                tracing::info!(identity, error = %err, "cached layers are inconsistent");
                None
            }
        }
    }

    /// Persists a layer set. Layer images are written before the record, so a
    /// record on disk always refers to complete images.
    ///
    /// # Errors
    ///
    /// Returns a `CacheError` if the directory, an image, or the record cannot
    /// be written.
    pub fn save(&self, identity: &str, image_path: &Path, layers: &LayerSet) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Directory {
            path: self.dir.clone(),
            source,
        })?;

        let mut entries = Vec::with_capacity(layers.len());
        for layer in layers {
            let path = self.layer_path(identity, layer.index);
            layer.image.save(&path).map_err(|e| CacheError::LayerWrite {
                path: path.clone(),
                reason: e.to_string(),
            })?;

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            entries.push(CachedLayer {
                path: file_name,
                depth_range: layer.band.range(),
                name: layer.name.clone(),
            });
        }

        self.remove_stale_layers(identity, layers.len());

        let record = CacheRecord {
            num_layers: layers.len(),
            image_path: image_path.display().to_string(),
            layers: entries,
        };
        let record_path = self.record_path(identity);
        let json = serde_json::to_string_pretty(&record).map_err(|e| CacheError::RecordWrite {
            path: record_path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&record_path, json).map_err(|e| CacheError::RecordWrite {
            path: record_path.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(identity, layers = layers.len(), dir = %self.dir.display(), "cached layers");
        Ok(())
    }

    /// Deletes layer images left over from an earlier save with more layers.
    fn remove_stale_layers(&self, identity: &str, keep: usize) {
        let Some(previous) = self.read_record(identity) else {
            return;
        };
        for index in keep..previous.num_layers.max(previous.layers.len()) {
            let path = self.layer_path(identity, index);
            match fs::remove_file(&path) {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                    tracing::debug!(error = %err, path = %path.display(), "failed to remove stale layer");
                }
                _ => {}
            }
        }
    }

    /// Removes every cached entry and returns the number of bytes freed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be measured or removed.
    pub fn clear(&self) -> std::io::Result<u64> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let freed = calculate_dir_size(&self.dir)?;
        fs::remove_dir_all(&self.dir)?;
        Ok(freed)
    }
}
