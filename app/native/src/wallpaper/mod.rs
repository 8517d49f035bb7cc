//! Depth-layered clock wallpapers.
//!
//! A photo is sliced into depth bands once; afterwards each update only
//! draws the clock between two bands and recomposites.

pub mod compositor;
pub mod depth;
pub mod engine;
pub mod error;
pub mod layer_cache;
pub mod layers;
pub mod overlay;
pub mod partition;
pub mod scheduler;
pub mod sink;
pub mod split;

pub use depth::{DepthCommand, DepthEstimator, DepthField, DepthMapFile};
pub use engine::{EngineOptions, EngineSettings, EngineState, InitReport, WallpaperEngine};
pub use error::{CacheError, EngineError};
pub use layer_cache::LayerCache;
pub use layers::{DepthBand, Layer, LayerSet};
pub use overlay::{FontSize, OverlayRenderer, OverlayStyle};
pub use sink::{NoopSink, SinkError, SystemWallpaper, WallpaperSink};
pub use split::{BackgroundRemover, MaskFileCutout};
