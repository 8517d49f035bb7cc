//! Wallpaper CLI commands.
//!
//! `run`, `render`, `layers` and `export` all build a [`WallpaperEngine`]
//! from the loaded configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::cli::output;
use crate::config::{self, ConfigWatcher, LoadedConfig, StrataConfig};
use crate::error::StrataError;
use crate::wallpaper::compositor::composite;
use crate::wallpaper::sink::save_frame;
use crate::wallpaper::split::{split_by_threshold, split_with_cutout};
use crate::wallpaper::{
    EngineError, Layer, MaskFileCutout, NoopSink, OverlayRenderer, SystemWallpaper, WallpaperEngine, WallpaperSink,
};

/// Arguments for `strata render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Split into background and foreground at this depth instead of using
    /// the configured layers.
    #[arg(long, short, value_name = "DEPTH", conflicts_with = "cutout")]
    pub threshold: Option<f32>,

    /// Use a foreground cutout image (alpha or grayscale mask) instead of
    /// depth; the clock is drawn behind the cutout.
    #[arg(long, value_name = "PATH")]
    pub cutout: Option<String>,

    /// Write the frame here instead of the configured output path.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<String>,
}

/// Arguments for `strata layers`.
#[derive(Args, Debug)]
pub struct LayersArgs {
    /// Output in JSON format instead of a table.
    #[arg(long, short = 'j')]
    pub json: bool,
}

/// Arguments for `strata export`.
#[derive(Args, Debug)]
#[command(after_long_help = r#"Examples:
  strata export ./layers   # layer_0_Background.png, ..., depth_map.png"#)]
pub struct ExportArgs {
    /// Directory to write the PNG files to.
    #[arg(value_name = "DIR")]
    pub dir: String,
}

/// Loads the configuration and checks it.
fn load_config() -> Result<LoadedConfig, StrataError> {
    let loaded = config::load()?;
    loaded.config.validate()?;
    Ok(loaded)
}

fn sink_for(config: &StrataConfig) -> Box<dyn WallpaperSink> {
    if config.set_wallpaper {
        Box::new(SystemWallpaper)
    } else {
        Box::new(NoopSink)
    }
}

/// Builds an engine from the configuration.
fn build_engine(
    loaded: &LoadedConfig,
    output: Option<PathBuf>,
    sink: Box<dyn WallpaperSink>,
) -> Result<WallpaperEngine, StrataError> {
    let base_dir = loaded.base_dir();
    let mut options = loaded.config.engine_options(&base_dir)?;
    if let Some(output) = output {
        options.output_path = output;
    }
    let estimator = loaded.config.depth_estimator(&base_dir)?;
    Ok(WallpaperEngine::new(options, estimator, sink))
}

/// Builds and initializes an engine that never touches the desktop.
fn initialized_engine(loaded: &LoadedConfig) -> Result<WallpaperEngine, StrataError> {
    let engine = build_engine(loaded, None, Box::new(NoopSink))?;
    engine.initialize()?;
    Ok(engine)
}

// ============================================================================
// run
// ============================================================================

/// Execute `strata run`. Returns only on error.
///
/// # Errors
///
/// Returns an error if the configuration is unusable or the engine cannot
/// be initialized or started.
pub fn execute_run() -> Result<(), StrataError> {
    let loaded = load_config()?;
    let engine = Arc::new(build_engine(&loaded, None, sink_for(&loaded.config))?);

    let report = engine.initialize()?;
    let source = if report.from_cache { "cache" } else { "depth" };
    println!(
        "{} {} layers from {source}, font: {}",
        "Strata".bold(),
        report.layers,
        report.font
    );

    engine.start()?;
    println!("Updating {} every {}s", engine.output_path().display(), loaded.config.update_interval);

    let _watcher = loaded.path.as_deref().and_then(|path| {
        let engine = Arc::clone(&engine);
        let base_dir = loaded.base_dir();
        let image_path = engine.image_path().to_path_buf();
        ConfigWatcher::spawn(path, move |changed| {
            apply_config_change(&engine, changed, &base_dir, &image_path);
        })
        .inspect_err(|err| tracing::warn!(error = %err, "config hot-reload disabled"))
        .ok()
    });

    // The worker thread does the rest; the process ends on a signal.
    loop {
        std::thread::park();
    }
}

/// Applies a changed configuration to a running engine.
///
/// Style, interval and clock layer apply live; a new layer count
/// regenerates the layers. A new image needs a restart.
pub fn apply_config_change(engine: &WallpaperEngine, path: &Path, base_dir: &Path, image_path: &Path) {
    let config = match config::reload(path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring configuration change");
            return;
        }
    };

    if config.image_path(base_dir).ok().as_deref() != Some(image_path) {
        tracing::warn!("imagePath changed; restart strata to use the new image");
    }

    match config.overlay_style(base_dir) {
        Ok(style) => engine.set_overlay_style(style),
        Err(err) => tracing::warn!(error = %err, "keeping previous overlay style"),
    }
    if let Err(err) = engine.set_update_interval(config.update_interval) {
        tracing::warn!(error = %err, "keeping previous update interval");
    }
    if config.num_layers != engine.settings().num_layers
        && let Err(err) = engine.set_num_layers(config.num_layers)
    {
        tracing::warn!(error = %err, "failed to regenerate layers");
    }
    if config.blur_radius.to_bits() != engine.settings().blur_radius.to_bits()
        && let Err(err) = engine.set_blur_radius(config.blur_radius)
    {
        tracing::warn!(error = %err, "failed to regenerate layers with the new blur radius");
    }
    if let Err(err) = engine.set_clock_layer(config.clock_layer) {
        tracing::warn!(error = %err, "keeping previous clock layer");
    }

    if let Err(err) = engine.update_now() {
        tracing::warn!(error = %err, "failed to refresh wallpaper after configuration change");
    }
    tracing::info!("configuration applied");
}

// ============================================================================
// render
// ============================================================================

/// Execute `strata render`.
///
/// # Errors
///
/// Returns an error if the frame cannot be produced or written.
pub fn execute_render(args: &RenderArgs) -> Result<(), StrataError> {
    let loaded = load_config()?;
    let output = args.output.as_deref().map(config::types::resolve_cli_path);

    let path = if args.threshold.is_some() || args.cutout.is_some() {
        render_split(&loaded, args, output)?
    } else {
        let engine = build_engine(&loaded, output, sink_for(&loaded.config))?;
        engine.initialize()?;
        engine.update_now()?
    };

    println!("Frame written to {}", path.display());
    Ok(())
}

/// Two-layer render: the clock sits between background and foreground.
fn render_split(loaded: &LoadedConfig, args: &RenderArgs, output: Option<PathBuf>) -> Result<PathBuf, StrataError> {
    let config = &loaded.config;
    let base_dir = loaded.base_dir();
    let image_path = config.image_path(&base_dir)?;
    let output = output.unwrap_or_else(|| config.output_path(&base_dir));

    if !image_path.is_file() {
        return Err(EngineError::MissingImage(image_path).into());
    }
    let source = image::open(&image_path)
        .map_err(|e| EngineError::ImageRead {
            path: image_path.clone(),
            reason: e.to_string(),
        })?
        .to_rgb8();

    let layers = match (args.threshold, args.cutout.as_deref()) {
        (Some(threshold), _) => {
            let depth = config.depth_estimator(&base_dir)?.estimate(&source)?;
            split_by_threshold(&depth, &source, threshold, config.blur_radius)?
        }
        (None, Some(cutout)) => {
            split_with_cutout(&source, &MaskFileCutout::new(config::types::resolve_cli_path(cutout)))?
        }
        (None, None) => return Err(StrataError::InvalidArguments("--threshold or --cutout is required".into())),
    };

    let style = config.overlay_style(&base_dir)?;
    let overlay =
        OverlayRenderer::new(style.font_path.as_deref()).render(layers.dimensions(), &Local::now().naive_local(), &style);
    let frame = composite(&layers, 0, &overlay)?;
    save_frame(&frame, &output)?;

    if let Err(err) = sink_for(config).apply(&output) {
        tracing::warn!(error = %err, path = %output.display(), "failed to apply wallpaper");
    }
    Ok(output)
}

// ============================================================================
// layers
// ============================================================================

/// One row of `strata layers`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub index: usize,
    pub name: String,
    pub depth_range: [f32; 2],
    /// Fraction of pixels at least half opaque.
    pub coverage: f64,
    pub clock: bool,
}

impl LayerSummary {
    #[allow(clippy::cast_precision_loss)]
    fn new(layer: &Layer, clock_layer: usize) -> Self {
        let total = u64::from(layer.image.width()) * u64::from(layer.image.height());
        let visible = layer.image.pixels().filter(|p| p.0[3] >= 128).count() as u64;

        Self {
            index: layer.index,
            name: layer.name.clone(),
            depth_range: layer.band.range(),
            coverage: if total == 0 { 0.0 } else { visible as f64 / total as f64 },
            clock: layer.index == clock_layer,
        }
    }
}

/// Execute `strata layers`.
///
/// # Errors
///
/// Returns an error if the layers cannot be built.
pub fn execute_layers(args: &LayersArgs) -> Result<(), StrataError> {
    #[derive(Tabled)]
    struct LayerRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Depth")]
        depth: String,
        #[tabled(rename = "Coverage")]
        coverage: String,
        #[tabled(rename = "Clock")]
        clock: String,
    }

    let loaded = load_config()?;
    let engine = initialized_engine(&loaded)?;
    let layers = engine.layers().ok_or(EngineError::NotInitialized)?;
    let clock_layer = engine.settings().clock_layer;
    let summaries: Vec<LayerSummary> = layers.iter().map(|layer| LayerSummary::new(layer, clock_layer)).collect();

    if args.json {
        output::print_highlighted_json(&serde_json::to_value(&summaries)?);
        return Ok(());
    }

    let rows: Vec<LayerRow> = summaries
        .iter()
        .map(|s| LayerRow {
            index: s.index,
            name: s.name.clone(),
            depth: output::format_range(s.depth_range),
            coverage: output::format_percent(s.coverage),
            clock: output::format_bool(s.clock),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()))
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .with(Modify::new(Columns::last()).with(Alignment::center()))
        .to_string();

    let (width, height) = layers.dimensions();
    println!("{}", format!("Layers ({}) {width}x{height}", layers.len()).bold());
    println!("{table}");
    Ok(())
}

// ============================================================================
// export
// ============================================================================

/// Execute `strata export DIR`.
///
/// # Errors
///
/// Returns an error if the layers cannot be built or written.
pub fn execute_export(args: &ExportArgs) -> Result<(), StrataError> {
    let loaded = load_config()?;
    let engine = initialized_engine(&loaded)?;
    let written = engine.export_layers(&config::types::resolve_cli_path(&args.dir))?;

    for path in &written {
        println!("  {}", path.display());
    }
    println!("{}", format!("Exported {} files.", written.len()).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::wallpaper::layers::{DepthBand, layer_name};
    use crate::wallpaper::partition::bands;

    #[derive(Parser)]
    struct TestRender {
        #[command(flatten)]
        args: RenderArgs,
    }

    fn half_opaque_layer() -> Layer {
        let band: DepthBand = bands(2)[1];
        let image = RgbaImage::from_fn(4, 2, |_, y| Rgba([10, 20, 30, if y == 0 { 255 } else { 0 }]));
        Layer {
            index: 1,
            band,
            name: layer_name(1, 2),
            image,
        }
    }

    #[test]
    fn test_render_args_cutout_parse() {
        let cli = TestRender::try_parse_from(["test", "--cutout", "~/mask.png"]).unwrap();
        assert_eq!(cli.args.cutout, Some("~/mask.png".to_string()));
        assert!(cli.args.threshold.is_none());
    }

    #[test]
    fn test_layer_summary() {
        let summary = LayerSummary::new(&half_opaque_layer(), 1);

        assert_eq!(summary.name, "Foreground");
        assert_eq!(summary.depth_range, [0.5, 1.0]);
        assert!((summary.coverage - 0.5).abs() < f64::EPSILON);
        assert!(summary.clock);
    }

    #[test]
    fn test_layer_summary_json_uses_camel_case() {
        let value = serde_json::to_value(LayerSummary::new(&half_opaque_layer(), 0)).unwrap();
        assert_eq!(value["depthRange"], serde_json::json!([0.5, 1.0]));
        assert_eq!(value["clock"], serde_json::json!(false));
    }

    #[test]
    fn test_sink_follows_config() {
        let config = StrataConfig {
            set_wallpaper: false,
            ..Default::default()
        };
        let sink = sink_for(&config);
        assert!(sink.apply(Path::new("/nonexistent/frame.jpg")).is_ok());
    }

    fn write_config(path: &Path, image: &Path, output: &Path, num_layers: usize, blur_radius: f32) {
        let json = serde_json::json!({
            "imagePath": image.display().to_string(),
            "outputPath": output.display().to_string(),
            "numLayers": num_layers,
            "clockLayer": 0,
            "blurRadius": blur_radius,
            "setWallpaper": false,
            "cache": false,
        });
        std::fs::write(path, json.to_string()).unwrap();
    }

    #[test]
    fn test_config_change_applies_layers_and_blur() {
        let temp = tempfile::tempdir().unwrap();
        let image = temp.path().join("photo.png");
        image::RgbImage::from_fn(24, 12, |x, _| image::Rgb([x as u8 * 10, 40, 90]))
            .save(&image)
            .unwrap();
        image::GrayImage::from_fn(24, 12, |x, _| image::Luma([x as u8 * 10]))
            .save(temp.path().join("photo.depth.png"))
            .unwrap();
        let output = temp.path().join("frame.png");
        let path = temp.path().join("config.json");
        write_config(&path, &image, &output, 4, 0.0);

        let (config, path) = crate::config::load_config_from_path(&path).unwrap();
        let loaded = LoadedConfig { config, path: Some(path.clone()) };
        let base_dir = loaded.base_dir();
        let image_path = loaded.config.image_path(&base_dir).unwrap();
        let engine = build_engine(&loaded, None, Box::new(NoopSink)).unwrap();
        engine.initialize().unwrap();

        write_config(&path, &image, &output, 3, 1.5);
        apply_config_change(&engine, &path, &base_dir, &image_path);

        let settings = engine.settings();
        assert_eq!(settings.num_layers, 3);
        assert!((settings.blur_radius - 1.5).abs() < f32::EPSILON);
        assert_eq!(engine.layers().unwrap().len(), 3);
        assert!(output.is_file());
    }
}
