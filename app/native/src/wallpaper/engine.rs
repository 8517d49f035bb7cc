//! The layered clock wallpaper engine.
//!
//! `initialize` does the expensive work once: decode the photo, load the
//! layers from cache or estimate depth and partition, resolve the font.
//! Every update afterwards only draws the clock and recomposites.
//!
//! ```text
//! Idle --initialize--> Initialized --start--> Running --stop--> Stopped
//!                                                ^                 |
//!                                                +------start------+
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use image::RgbImage;
use parking_lot::{Mutex, RwLock};

use super::compositor::composite;
use super::depth::{DepthEstimator, DepthField};
use super::error::EngineError;
use super::layer_cache::LayerCache;
use super::layers::LayerSet;
use super::overlay::{OverlayRenderer, OverlayStyle};
use super::partition::{DEFAULT_BLUR_RADIUS, partition};
use super::scheduler::{SchedulerState, Tick, UpdateScheduler};
use super::sink::{WallpaperSink, save_frame};
use crate::cache::get_cache_dir;

/// Default number of depth layers.
pub const DEFAULT_NUM_LAYERS: usize = 5;

/// Default clock layer, clamped to the layer count.
pub const DEFAULT_CLOCK_LAYER: usize = 2;

/// Default seconds between updates.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Default frame location.
#[must_use]
pub fn default_output_path() -> PathBuf { get_cache_dir().join("current_wallpaper.jpg") }

/// Everything needed to build an engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub image_path: PathBuf,
    pub output_path: PathBuf,
    pub num_layers: usize,
    pub clock_layer: usize,
    pub update_interval: Duration,
    pub blur_radius: f32,
    pub style: OverlayStyle,
    /// `None` disables the layer cache.
    pub cache: Option<LayerCache>,
}

impl EngineOptions {
    /// Options with defaults for everything but the photo.
    #[must_use]
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            output_path: default_output_path(),
            num_layers: DEFAULT_NUM_LAYERS,
            clock_layer: DEFAULT_CLOCK_LAYER,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            blur_radius: DEFAULT_BLUR_RADIUS,
            style: OverlayStyle::default(),
            cache: Some(LayerCache::default()),
        }
    }
}

/// Settings that may change while the engine runs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub num_layers: usize,
    pub clock_layer: usize,
    pub update_interval: Duration,
    pub blur_radius: f32,
    pub style: OverlayStyle,
}

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Initialized,
    Running,
    Stopped,
}

/// Outcome of [`WallpaperEngine::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub layers: usize,
    pub from_cache: bool,
    pub font: String,
}

/// State shared with the update worker.
struct EngineShared {
    image_path: PathBuf,
    output_path: PathBuf,
    settings: RwLock<EngineSettings>,
    layers: RwLock<Option<Arc<LayerSet>>>,
    source: RwLock<Option<Arc<RgbImage>>>,
    depth: RwLock<Option<Arc<DepthField>>>,
    overlay: RwLock<OverlayRenderer>,
    estimator: Box<dyn DepthEstimator>,
    cache: Option<LayerCache>,
    sink: Box<dyn WallpaperSink>,
}

impl EngineShared {
    /// Settings and layers read together so a concurrent layer swap is
    /// never observed half-applied.
    fn snapshot(&self) -> (EngineSettings, Option<Arc<LayerSet>>) {
        let settings = self.settings.read();
        let layers = self.layers.read().clone();
        (settings.clone(), layers)
    }

    fn render_frame(&self) -> Result<RgbImage, EngineError> {
        let (settings, layers) = self.snapshot();
        let layers = layers.ok_or(EngineError::NotInitialized)?;

        let now = Local::now().naive_local();
        let overlay = self.overlay.read().render(layers.dimensions(), &now, &settings.style);
        composite(&layers, settings.clock_layer, &overlay)
    }

    fn update_now(&self) -> Result<PathBuf, EngineError> {
        let started = Instant::now();
        let frame = self.render_frame()?;
        save_frame(&frame, &self.output_path)?;

        if let Err(err) = self.sink.apply(&self.output_path) {
            tracing::warn!(error = %err, path = %self.output_path.display(), "failed to apply wallpaper");
        }

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis(),
            path = %self.output_path.display(),
            "wallpaper updated"
        );
        Ok(self.output_path.clone())
    }

    fn identity(&self) -> String { LayerCache::identity_for(&self.image_path) }

    fn estimate(&self, source: &RgbImage) -> Result<DepthField, EngineError> {
        let started = Instant::now();
        let depth = self.estimator.estimate(source)?;
        if depth.dimensions() != source.dimensions() {
            return Err(EngineError::ImageSizeMismatch {
                expected: source.dimensions(),
                actual: depth.dimensions(),
            });
        }
        tracing::info!(elapsed_ms = started.elapsed().as_millis(), "depth estimated");
        Ok(depth)
    }

    fn load_cached(&self, source: &RgbImage, num_layers: usize) -> Option<LayerSet> {
        let cache = self.cache.as_ref()?;
        let identity = self.identity();
        let layers = cache.load(&identity, num_layers)?;

        if layers.dimensions() != source.dimensions() {
            tracing::info!(
                identity,
                cached = ?layers.dimensions(),
                source = ?source.dimensions(),
                "cached layers do not match the image size; regenerating"
            );
            return None;
        }

        if let Some(record) = cache.read_record(&identity)
            && Path::new(&record.image_path) != self.image_path
        {
            tracing::warn!(
                identity,
                cached = %record.image_path,
                requested = %self.image_path.display(),
                "using layers cached for a different image with the same name"
            );
        }

        Some(layers)
    }

    fn store_in_cache(&self, layers: &LayerSet) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(err) = cache.save(&self.identity(), &self.image_path, layers) {
            tracing::warn!(error = %err, "failed to cache layers");
        }
    }

    fn source(&self) -> Result<Arc<RgbImage>, EngineError> {
        self.source.read().clone().ok_or(EngineError::NotInitialized)
    }

    /// Depth field in memory, estimating it if the layers came from cache.
    fn depth_field(&self) -> Result<Arc<DepthField>, EngineError> {
        if let Some(depth) = self.depth.read().clone() {
            return Ok(depth);
        }
        let source = self.source()?;
        let depth = Arc::new(self.estimate(&source)?);
        *self.depth.write() = Some(Arc::clone(&depth));
        Ok(depth)
    }
}

impl Tick for EngineShared {
    fn tick(&self) -> Result<(), EngineError> { self.update_now().map(|_| ()) }

    fn interval(&self) -> Duration { self.settings.read().update_interval }
}

/// Owns the engine state machine and the update scheduler.
pub struct WallpaperEngine {
    shared: Arc<EngineShared>,
    state: Mutex<EngineState>,
    scheduler: UpdateScheduler,
}

impl std::fmt::Debug for WallpaperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallpaperEngine")
            .field("image_path", &self.shared.image_path)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl WallpaperEngine {
    #[must_use]
    pub fn new(
        options: EngineOptions,
        estimator: Box<dyn DepthEstimator>,
        sink: Box<dyn WallpaperSink>,
    ) -> Self {
        let overlay = OverlayRenderer::new(options.style.font_path.as_deref());
        let settings = EngineSettings {
            num_layers: options.num_layers,
            clock_layer: options.clock_layer,
            update_interval: options.update_interval,
            blur_radius: options.blur_radius,
            style: options.style,
        };

        Self {
            shared: Arc::new(EngineShared {
                image_path: options.image_path,
                output_path: options.output_path,
                settings: RwLock::new(settings),
                layers: RwLock::new(None),
                source: RwLock::new(None),
                depth: RwLock::new(None),
                overlay: RwLock::new(overlay),
                estimator,
                cache: options.cache,
                sink,
            }),
            state: Mutex::new(EngineState::Idle),
            scheduler: UpdateScheduler::new(),
        }
    }

    #[must_use]
    pub fn image_path(&self) -> &Path { &self.shared.image_path }

    #[must_use]
    pub fn output_path(&self) -> &Path { &self.shared.output_path }

    /// Builds the layer set, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `MissingImage`, `Config` or `InvalidLayerCount` for unusable
    /// options, `ImageRead` if the photo cannot be decoded and `Model` if
    /// depth estimation fails. On error the engine is left as it was.
    pub fn initialize(&self) -> Result<InitReport, EngineError> {
        if *self.state.lock() == EngineState::Running {
            return Err(EngineError::Config("cannot initialize while running".to_string()));
        }

        let shared = &self.shared;
        let settings = shared.settings.read().clone();

        if !shared.image_path.is_file() {
            return Err(EngineError::MissingImage(shared.image_path.clone()));
        }
        if settings.num_layers == 0 {
            return Err(EngineError::InvalidLayerCount(0));
        }
        if settings.update_interval.is_zero() {
            return Err(EngineError::Config("update interval must be at least 1 second".to_string()));
        }

        let started = Instant::now();
        let source = image::open(&shared.image_path)
            .map_err(|e| EngineError::ImageRead {
                path: shared.image_path.clone(),
                reason: e.to_string(),
            })?
            .to_rgb8();
        tracing::info!(
            path = %shared.image_path.display(),
            width = source.width(),
            height = source.height(),
            "loaded source image"
        );

        let (layers, depth, from_cache) = match shared.load_cached(&source, settings.num_layers) {
            Some(layers) => (layers, None, true),
            None => {
                let depth = shared.estimate(&source)?;
                let layers = partition(&depth, &source, settings.num_layers, settings.blur_radius)?;
                shared.store_in_cache(&layers);
                (layers, Some(Arc::new(depth)), false)
            }
        };

        let report = InitReport {
            layers: layers.len(),
            from_cache,
            font: shared.overlay.read().font_name().to_string(),
        };

        {
            let mut settings = shared.settings.write();
            settings.clock_layer = settings.clock_layer.min(layers.len() - 1);
            *shared.layers.write() = Some(Arc::new(layers));
        }
        *shared.source.write() = Some(Arc::new(source));
        *shared.depth.write() = depth;

        let mut state = self.state.lock();
        if *state == EngineState::Idle {
            *state = EngineState::Initialized;
        }

        tracing::info!(
            layers = report.layers,
            from_cache,
            font = %report.font,
            elapsed_ms = started.elapsed().as_millis(),
            "wallpaper engine initialized"
        );
        Ok(report)
    }

    /// Moves the clock between layers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLayerIndex` if `index` is not a layer; the current
    /// index is kept.
    pub fn set_clock_layer(&self, index: usize) -> Result<(), EngineError> {
        let mut settings = self.shared.settings.write();
        let count = self.shared.layers.read().as_ref().map_or(settings.num_layers, |l| l.len());
        if index >= count {
            return Err(EngineError::InvalidLayerIndex { index, count });
        }
        settings.clock_layer = index;
        tracing::info!(index, "clock layer changed");
        Ok(())
    }

    /// Changes the update cadence; the worker picks it up on its next sleep.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an interval of zero seconds.
    pub fn set_update_interval(&self, seconds: u64) -> Result<(), EngineError> {
        if seconds == 0 {
            return Err(EngineError::Config("update interval must be at least 1 second".to_string()));
        }
        self.shared.settings.write().update_interval = Duration::from_secs(seconds);
        Ok(())
    }

    /// Replaces the overlay style, reloading the font if its path changed.
    pub fn set_overlay_style(&self, style: OverlayStyle) {
        let font_changed = self.shared.overlay.read().font_path() != style.font_path.as_deref();
        if font_changed {
            *self.shared.overlay.write() = OverlayRenderer::new(style.font_path.as_deref());
        }
        self.shared.settings.write().style = style;
    }

    /// Regenerates the layers with a new count.
    ///
    /// Before initialization this only records the count. Afterwards the
    /// in-memory depth field is reused (or re-estimated after a cache hit),
    /// the set is swapped in one step and the clock index is clamped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLayerCount` for zero and `Model` if depth has to be
    /// re-estimated and that fails.
    pub fn set_num_layers(&self, num_layers: usize) -> Result<(), EngineError> {
        if num_layers == 0 {
            return Err(EngineError::InvalidLayerCount(0));
        }
        let blur_radius = self.shared.settings.read().blur_radius;
        self.regenerate(num_layers, blur_radius)
    }

    /// Regenerates the layers with a new edge blur radius.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a negative or non-finite radius and `Model` if
    /// depth has to be re-estimated and that fails.
    pub fn set_blur_radius(&self, blur_radius: f32) -> Result<(), EngineError> {
        if !blur_radius.is_finite() || blur_radius < 0.0 {
            return Err(EngineError::Config(format!("invalid blur radius: {blur_radius}")));
        }
        let num_layers = self.shared.settings.read().num_layers;
        self.regenerate(num_layers, blur_radius)
    }

    fn regenerate(&self, num_layers: usize, blur_radius: f32) -> Result<(), EngineError> {
        let shared = &self.shared;
        if shared.layers.read().is_none() {
            let mut settings = shared.settings.write();
            settings.num_layers = num_layers;
            settings.blur_radius = blur_radius;
            return Ok(());
        }

        let source = shared.source()?;
        let depth = shared.depth_field()?;
        let layers = partition(&depth, &source, num_layers, blur_radius)?;
        shared.store_in_cache(&layers);

        let mut settings = shared.settings.write();
        settings.num_layers = num_layers;
        settings.blur_radius = blur_radius;
        settings.clock_layer = settings.clock_layer.min(num_layers - 1);
        *shared.layers.write() = Some(Arc::new(layers));

        tracing::info!(num_layers, blur_radius, clock_layer = settings.clock_layer, "layers regenerated");
        Ok(())
    }

    /// Composites one frame without writing it.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn render_frame(&self) -> Result<RgbImage, EngineError> { self.shared.render_frame() }

    /// Renders, writes the frame to the output path and applies it.
    ///
    /// A sink failure is logged; the frame stays on disk.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` or `FrameSave`.
    pub fn update_now(&self) -> Result<PathBuf, EngineError> { self.shared.update_now() }

    /// Starts periodic updates after rendering the first frame.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before initialization, or the first frame's
    /// error (the engine is left as it was).
    pub fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        match *state {
            EngineState::Idle => return Err(EngineError::NotInitialized),
            EngineState::Running => {
                tracing::debug!("wallpaper engine already running");
                return Ok(());
            }
            EngineState::Initialized | EngineState::Stopped => {}
        }

        self.scheduler.start(Arc::clone(&self.shared))?;
        *state = EngineState::Running;
        Ok(())
    }

    /// Stops periodic updates. Does nothing unless running.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        self.scheduler.stop();
        if *state == EngineState::Running {
            *state = EngineState::Stopped;
        }
    }

    #[must_use]
    pub fn state(&self) -> EngineState { *self.state.lock() }

    #[must_use]
    pub fn scheduler_state(&self) -> SchedulerState { self.scheduler.state() }

    /// The current layer set, if initialized.
    #[must_use]
    pub fn layers(&self) -> Option<Arc<LayerSet>> { self.shared.layers.read().clone() }

    /// A copy of the current runtime settings.
    #[must_use]
    pub fn settings(&self) -> EngineSettings { self.shared.settings.read().clone() }

    /// Writes every layer (and the depth map, if in memory) to `dir`.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before initialization, or an IO or
    /// `FrameSave` error if a file cannot be written.
    pub fn export_layers(&self, dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let layers = self.layers().ok_or(EngineError::NotInitialized)?;
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(layers.len() + 1);
        for (i, layer) in layers.iter().enumerate() {
            let path = dir.join(format!("layer_{i}_{}.png", layer.name.replace(' ', "_")));
            layer.image.save(&path).map_err(|e| EngineError::FrameSave {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            written.push(path);
        }

        if let Some(depth) = self.shared.depth.read().clone() {
            let path = dir.join("depth_map.png");
            depth.to_luma8().save(&path).map_err(|e| EngineError::FrameSave {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            written.push(path);
        }

        tracing::info!(files = written.len(), dir = %dir.display(), "exported layers");
        Ok(written)
    }
}

impl Drop for WallpaperEngine {
    fn drop(&mut self) { self.scheduler.stop(); }
}
