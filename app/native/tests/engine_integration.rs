//! End-to-end tests for the wallpaper engine.
//!
//! These run the whole pipeline against files in a temp directory: a photo
//! and its depth map on disk, layers cached between engines, frames written
//! to the output path and handed to a recording sink.
//!
//! ```bash
//! cargo test -p strata --test engine_integration
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{GrayImage, Luma, Rgb, RgbImage};
use parking_lot::Mutex;
use strata_lib::wallpaper::split::{MaskFileCutout, split_by_threshold, split_with_cutout};
use strata_lib::wallpaper::{
    DepthEstimator, DepthMapFile, EngineOptions, EngineState, LayerCache, SinkError, WallpaperEngine, WallpaperSink,
};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

const WIDTH: u32 = 40;
const HEIGHT: u32 = 20;

/// Records every frame it is asked to apply.
#[derive(Clone, Default)]
struct RecordingSink {
    applied: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingSink {
    fn count(&self) -> usize { self.applied.lock().len() }
}

impl WallpaperSink for RecordingSink {
    fn apply(&self, path: &Path) -> Result<(), SinkError> {
        if !path.exists() {
            return Err(SinkError::FileNotFound(path.display().to_string()));
        }
        self.applied.lock().push(path.to_path_buf());
        Ok(())
    }
}

struct Workspace {
    temp: TempDir,
    image_path: PathBuf,
}

impl Workspace {
    /// A photo plus `<stem>.depth.png` that gets nearer from left to right.
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let image_path = temp.path().join("street.png");

        RgbImage::from_fn(WIDTH, HEIGHT, |x, y| Rgb([(x * 6) as u8, (y * 12) as u8, 128]))
            .save(&image_path)
            .unwrap();
        GrayImage::from_fn(WIDTH, HEIGHT, |x, _| Luma([(x * 6) as u8]))
            .save(temp.path().join("street.depth.png"))
            .unwrap();

        Self { temp, image_path }
    }

    fn options(&self) -> EngineOptions {
        let mut options = EngineOptions::new(&self.image_path);
        options.output_path = self.temp.path().join("frames").join("current.png");
        options.cache = Some(LayerCache::new(self.temp.path().join("cache")));
        options.num_layers = 4;
        options.blur_radius = 0.0;
        options
    }

    fn engine(&self, sink: RecordingSink) -> WallpaperEngine {
        let estimator: Box<dyn DepthEstimator> = Box::new(DepthMapFile::beside(&self.image_path));
        WallpaperEngine::new(self.options(), estimator, Box::new(sink))
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn layers_partition_every_pixel_exactly_once() {
    let ws = Workspace::new();
    let engine = ws.engine(RecordingSink::default());

    let report = engine.initialize().unwrap();
    assert_eq!(report.layers, 4);
    assert!(!report.from_cache);
    assert_eq!(engine.state(), EngineState::Initialized);

    let layers = engine.layers().unwrap();
    assert_eq!(layers.dimensions(), (WIDTH, HEIGHT));
    let names: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["Background", "Layer 2", "Layer 3", "Foreground"]);

    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let owners: Vec<u8> = layers.iter().map(|l| l.image.get_pixel(x, y).0[3]).filter(|&a| a > 0).collect();
            assert_eq!(owners, [255], "pixel ({x}, {y})");
        }
    }

    // Left columns are far, right columns near.
    assert_eq!(layers.get(0).unwrap().image.get_pixel(0, 0).0[3], 255);
    assert_eq!(layers.get(3).unwrap().image.get_pixel(WIDTH - 1, 0).0[3], 255);
}

#[test]
fn update_writes_frame_and_applies_it() {
    let ws = Workspace::new();
    let sink = RecordingSink::default();
    let engine = ws.engine(sink.clone());
    engine.initialize().unwrap();

    let path = engine.update_now().unwrap();

    assert_eq!(path, ws.options().output_path);
    let frame = image::open(&path).unwrap().to_rgb8();
    assert_eq!(frame.dimensions(), (WIDTH, HEIGHT));
    assert_eq!(sink.count(), 1);
}

#[test]
fn second_engine_loads_layers_from_cache() {
    let ws = Workspace::new();
    let first = ws.engine(RecordingSink::default());
    first.initialize().unwrap();
    let built = first.layers().unwrap();

    // Without the depth map only the cache can produce layers.
    std::fs::remove_file(ws.temp.path().join("street.depth.png")).unwrap();

    let second = ws.engine(RecordingSink::default());
    let report = second.initialize().unwrap();
    assert!(report.from_cache);

    let cached = second.layers().unwrap();
    for (a, b) in built.iter().zip(cached.iter()) {
        assert_eq!(a.band, b.band);
        assert_eq!(a.name, b.name);
        assert_eq!(a.image, b.image);
    }
}

#[test]
fn missing_depth_map_is_a_model_error() {
    let ws = Workspace::new();
    std::fs::remove_file(ws.temp.path().join("street.depth.png")).unwrap();
    let engine = ws.engine(RecordingSink::default());

    assert!(engine.initialize().is_err());
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(engine.layers().is_none());
}

#[test]
fn export_writes_layers_and_depth_map() {
    let ws = Workspace::new();
    let engine = ws.engine(RecordingSink::default());
    engine.initialize().unwrap();

    let out = ws.temp.path().join("export");
    let written = engine.export_layers(&out).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "layer_0_Background.png",
            "layer_1_Layer_2.png",
            "layer_2_Layer_3.png",
            "layer_3_Foreground.png",
            "depth_map.png"
        ]
    );
    assert!(written.iter().all(|p| p.is_file()));
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn running_engine_updates_until_stopped() {
    let ws = Workspace::new();
    let sink = RecordingSink::default();
    let engine = ws.engine(sink.clone());
    engine.initialize().unwrap();

    engine.start().unwrap();
    assert_eq!(engine.state(), EngineState::Running);
    assert!(sink.count() >= 1, "first frame is set before start returns");

    thread::sleep(Duration::from_millis(2300));
    engine.stop();
    assert_eq!(engine.state(), EngineState::Stopped);

    let after_stop = sink.count();
    assert!(after_stop >= 2, "expected periodic updates, got {after_stop}");

    thread::sleep(Duration::from_millis(1200));
    assert_eq!(sink.count(), after_stop);
}

#[test]
fn layer_count_changes_while_running() {
    let ws = Workspace::new();
    let engine = ws.engine(RecordingSink::default());
    engine.initialize().unwrap();
    engine.set_clock_layer(3).unwrap();
    engine.start().unwrap();

    engine.set_num_layers(2).unwrap();

    assert_eq!(engine.layers().unwrap().len(), 2);
    assert_eq!(engine.settings().clock_layer, 1);
    assert!(engine.update_now().is_ok());
    engine.stop();
}

// ============================================================================
// Two-layer split
// ============================================================================

#[test]
fn threshold_split_from_depth_file() {
    let ws = Workspace::new();
    let source = image::open(&ws.image_path).unwrap().to_rgb8();
    let depth = DepthMapFile::beside(&ws.image_path).estimate(&source).unwrap();

    let layers = split_by_threshold(&depth, &source, 0.5, 0.0).unwrap();

    let background = &layers.get(0).unwrap().image;
    let foreground = &layers.get(1).unwrap().image;
    assert_eq!(background.get_pixel(0, 5).0[3], 255);
    assert_eq!(foreground.get_pixel(0, 5).0[3], 0);
    assert_eq!(background.get_pixel(WIDTH - 1, 5).0[3], 0);
    assert_eq!(foreground.get_pixel(WIDTH - 1, 5).0[3], 255);
}

#[test]
fn cutout_split_from_mask_file() {
    let ws = Workspace::new();
    let mask_path = ws.temp.path().join("mask.png");
    GrayImage::from_fn(WIDTH, HEIGHT, |_, y| Luma([if y < HEIGHT / 2 { 0 } else { 255 }]))
        .save(&mask_path)
        .unwrap();
    let source = image::open(&ws.image_path).unwrap().to_rgb8();

    let layers = split_with_cutout(&source, &MaskFileCutout::new(&mask_path)).unwrap();

    assert_eq!(layers.len(), 2);
    assert_eq!(layers.get(0).unwrap().image.get_pixel(3, 0).0[3], 255);
    assert_eq!(layers.get(1).unwrap().image.get_pixel(3, 0).0[3], 0);
    assert_eq!(layers.get(1).unwrap().image.get_pixel(3, HEIGHT - 1).0[3], 255);
}
