//! Configuration types for Strata.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{Rgb, Rgba};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::APP_ID;
use crate::platform::path::{expand_and_resolve, resolve_optional};
use crate::wallpaper::engine::default_output_path;
use crate::wallpaper::overlay::{DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT, is_valid_format};
use crate::wallpaper::{
    DepthCommand, DepthEstimator, DepthMapFile, EngineOptions, FontSize, LayerCache, OverlayStyle,
};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct StrataConfig {
    /// Photo to turn into a layered wallpaper.
    /// Relative paths are resolved against the config file's directory.
    pub image_path: String,

    /// TrueType/OpenType font for the clock. Empty picks a system font,
    /// falling back to a built-in bitmap font.
    pub font_path: String,

    /// Grayscale depth map for the photo (white = near). Empty looks for
    /// `<image>.depth.png` next to the photo.
    pub depth_map: String,

    /// External depth model: program and arguments. `{input}` and `{output}`
    /// are replaced with the photo and the depth map to write.
    /// Takes precedence over `depthMap` when set.
    pub depth_command: Vec<String>,

    /// Where each frame is written (`.jpg`, `.jpeg` or `.png`).
    /// Empty uses `<cache dir>/strata/current_wallpaper.jpg`.
    pub output_path: String,

    /// Seconds between clock updates.
    /// Default: 1
    pub update_interval: u64,

    /// Number of depth layers.
    /// Default: 5
    pub num_layers: usize,

    /// Layer the clock is drawn above (0 = farthest).
    /// Default: 2
    pub clock_layer: usize,

    /// Blur applied to layer edges, in pixels.
    /// Default: 2
    pub blur_radius: f32,

    /// Draw the date above the time.
    pub show_date: bool,

    /// strftime format for the time.
    pub clock_format: String,

    /// strftime format for the date.
    pub date_format: String,

    /// Time size in pixels. Unset scales with the image (15% of its height).
    pub font_size: Option<u32>,

    /// Date size in pixels. Unset scales with the image (3% of its height).
    pub date_font_size: Option<u32>,

    /// Text color as `#RRGGBB` or `#RRGGBBAA`.
    pub font_color: String,

    /// Shadow color as `#RRGGBB`.
    pub shadow_color: String,

    /// Shadow opacity, 0-255.
    /// Default: 120
    pub shadow_opacity: u8,

    /// Shadow offset in pixels, applied to both axes.
    /// Default: 4
    pub shadow_offset: i32,

    /// Horizontal center of the clock, in percent of the width.
    /// Default: 50
    pub clock_position_x: f32,

    /// Top of the clock, in percent of the height.
    /// Default: 25
    pub clock_position_y: f32,

    /// Apply each frame as the desktop wallpaper. When false, frames are
    /// only written to `outputPath`.
    pub set_wallpaper: bool,

    /// Cache generated layers between runs.
    pub cache: bool,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            image_path: String::new(),
            font_path: String::new(),
            depth_map: String::new(),
            depth_command: Vec::new(),
            output_path: String::new(),
            update_interval: 1,
            num_layers: 5,
            clock_layer: 2,
            blur_radius: 2.0,
            show_date: true,
            clock_format: DEFAULT_TIME_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            font_size: None,
            date_font_size: None,
            font_color: "#FFFFFF".to_string(),
            shadow_color: "#000000".to_string(),
            shadow_opacity: 120,
            shadow_offset: 4,
            clock_position_x: 50.0,
            clock_position_y: 25.0,
            set_wallpaper: true,
            cache: true,
        }
    }
}

/// Parses `#RRGGBB` or `#RRGGBBAA` (the `#` is optional).
///
/// # Errors
///
/// Returns a description of the problem for malformed input.
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>, String> {
    let hex = value.trim().trim_start_matches('#');
    if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid color '{value}': expected #RRGGBB or #RRGGBBAA"));
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("invalid color '{value}': {e}"));
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

impl StrataConfig {
    /// Checks values that cannot be fixed up at runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.update_interval == 0 {
            return invalid("updateInterval must be at least 1 second".to_string());
        }
        if self.num_layers == 0 {
            return invalid("numLayers must be at least 1".to_string());
        }
        if self.clock_layer >= self.num_layers {
            return invalid(format!(
                "clockLayer {} must be between 0 and {}",
                self.clock_layer,
                self.num_layers - 1
            ));
        }
        if !self.blur_radius.is_finite() || self.blur_radius < 0.0 {
            return invalid("blurRadius must be zero or positive".to_string());
        }
        for (key, value) in [("clockPositionX", self.clock_position_x), ("clockPositionY", self.clock_position_y)] {
            if !(0.0..=100.0).contains(&value) {
                return invalid(format!("{key} must be between 0 and 100"));
            }
        }
        if self.font_size == Some(0) || self.date_font_size == Some(0) {
            return invalid("font sizes must be positive".to_string());
        }
        parse_hex_color(&self.font_color).map_err(|e| ConfigError::Invalid(format!("fontColor: {e}")))?;
        parse_hex_color(&self.shadow_color).map_err(|e| ConfigError::Invalid(format!("shadowColor: {e}")))?;

        for (key, format) in [("clockFormat", &self.clock_format), ("dateFormat", &self.date_format)] {
            if !is_valid_format(format) {
                tracing::warn!(key, format = %format, "invalid strftime format; the default will be used");
            }
        }

        Ok(())
    }

    /// Overlay style described by this config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for malformed colors.
    #[allow(clippy::cast_precision_loss)]
    pub fn overlay_style(&self, base_dir: &Path) -> Result<OverlayStyle, ConfigError> {
        let text_color =
            parse_hex_color(&self.font_color).map_err(|e| ConfigError::Invalid(format!("fontColor: {e}")))?;
        let [sr, sg, sb, _] = parse_hex_color(&self.shadow_color)
            .map_err(|e| ConfigError::Invalid(format!("shadowColor: {e}")))?
            .0;
        let size = |px: Option<u32>| px.map_or(FontSize::Auto, |px| FontSize::Pixels(px as f32));

        Ok(OverlayStyle {
            font_path: resolve_optional(Some(&self.font_path), base_dir),
            time_size: size(self.font_size),
            date_size: size(self.date_font_size),
            text_color,
            shadow_color: Rgb([sr, sg, sb]),
            shadow_opacity: self.shadow_opacity,
            shadow_offset: self.shadow_offset,
            position: (self.clock_position_x, self.clock_position_y),
            time_format: self.clock_format.clone(),
            date_format: self.date_format.clone(),
            show_date: self.show_date,
        })
    }

    /// Resolved photo path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `imagePath` is not set.
    pub fn image_path(&self, base_dir: &Path) -> Result<PathBuf, ConfigError> {
        resolve_optional(Some(&self.image_path), base_dir)
            .ok_or_else(|| ConfigError::Invalid("imagePath is not set".to_string()))
    }

    /// Resolved frame output path.
    #[must_use]
    pub fn output_path(&self, base_dir: &Path) -> PathBuf {
        resolve_optional(Some(&self.output_path), base_dir).unwrap_or_else(default_output_path)
    }

    /// Engine options described by this config.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if validation fails or `imagePath` is unset.
    pub fn engine_options(&self, base_dir: &Path) -> Result<EngineOptions, ConfigError> {
        self.validate()?;

        Ok(EngineOptions {
            image_path: self.image_path(base_dir)?,
            output_path: self.output_path(base_dir),
            num_layers: self.num_layers,
            clock_layer: self.clock_layer,
            update_interval: Duration::from_secs(self.update_interval),
            blur_radius: self.blur_radius,
            style: self.overlay_style(base_dir)?,
            cache: self.cache.then(LayerCache::default),
        })
    }

    /// Depth provider described by this config.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `imagePath` is unset and no depth map is
    /// given, or if the depth command is malformed.
    pub fn depth_estimator(&self, base_dir: &Path) -> Result<Box<dyn DepthEstimator>, ConfigError> {
        if !self.depth_command.is_empty() {
            let command =
                DepthCommand::from_argv(&self.depth_command).map_err(|e| ConfigError::Invalid(e.to_string()))?;
            return Ok(Box::new(command));
        }

        match resolve_optional(Some(&self.depth_map), base_dir) {
            Some(path) => Ok(Box::new(DepthMapFile::new(path))),
            None => Ok(Box::new(DepthMapFile::beside(&self.image_path(base_dir)?))),
        }
    }
}

/// Errors that can occur when loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    NotFound,
    /// The configuration file exists but could not be read.
    IoError(std::io::Error),
    /// The configuration file contains invalid JSON.
    ParseError(serde_json::Error),
    /// A value is out of range or malformed.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(
                f,
                "No configuration file found. Expected at ~/.config/{APP_ID}/config.jsonc \
                or ~/.{APP_ID}.jsonc"
            ),
            Self::IoError(err) => write!(f, "Failed to read configuration file: {err}"),
            Self::ParseError(err) => write!(f, "Failed to parse configuration file: {err}"),
            Self::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::ParseError(err) => Some(err),
            Self::NotFound | Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err) }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self { Self::ParseError(err) }
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Returns the possible configuration file paths in priority order.
///
/// 1. `$XDG_CONFIG_HOME/strata/config.jsonc` or `config.json`, if set
/// 2. `~/.config/strata/config.jsonc` or `config.json`
/// 3. The platform config directory (`~/Library/Application Support` on
///    macOS, `%APPDATA%` on Windows)
/// 4. `~/.strata.jsonc` or `~/.strata.json`
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    fn push_dir(dir: &Path, paths: &mut Vec<PathBuf>) {
        for filename in CONFIG_FILE_NAMES {
            let path = dir.join(filename);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    let mut paths: Vec<PathBuf> = Vec::new();

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        push_dir(&PathBuf::from(xdg_config).join(APP_ID), &mut paths);
    }

    if let Some(home) = dirs::home_dir() {
        push_dir(&home.join(".config").join(APP_ID), &mut paths);
    }

    if let Some(config_dir) = dirs::config_dir() {
        push_dir(&config_dir.join(APP_ID), &mut paths);
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{APP_ID}.jsonc")));
        paths.push(home.join(format!(".{APP_ID}.json")));
    }

    paths
}

/// Parses JSONC text into a configuration.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` for invalid JSON.
pub fn parse_config(content: &str) -> Result<StrataConfig, ConfigError> {
    let reader = json_comments::StripComments::new(content.as_bytes());
    Ok(serde_json::from_reader(reader)?)
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist, otherwise IO
/// or parse errors.
pub fn load_config_from_path(path: &Path) -> Result<(StrataConfig, PathBuf), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound);
    }
    let file = fs::File::open(path)?;
    let reader = json_comments::StripComments::new(file);
    let config: StrataConfig = serde_json::from_reader(reader)?;
    Ok((config, path.to_path_buf()))
}

/// Loads the configuration from the first available config file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if no file exists in any of the
/// [`config_paths`], otherwise IO or parse errors.
pub fn load_config() -> Result<(StrataConfig, PathBuf), ConfigError> {
    config_paths()
        .into_iter()
        .find(|path| path.exists())
        .map_or(Err(ConfigError::NotFound), |path| load_config_from_path(&path))
}

/// Resolves a relative path from the command line against the working
/// directory.
#[must_use]
pub fn resolve_cli_path(path: &str) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_default();
    expand_and_resolve(path, &cwd)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Parsing
    // ========================================================================

    #[test]
    fn test_default_config() {
        let config = StrataConfig::default();
        assert_eq!(config.num_layers, 5);
        assert_eq!(config.clock_layer, 2);
        assert_eq!(config.update_interval, 1);
        assert!(config.show_date);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_jsonc_with_comments() {
        let json = r##"{
            // the photo
            "imagePath": "~/Pictures/beach.jpg",
            /* fewer, thicker layers */
            "numLayers": 3,
            "clockLayer": 1,
            "fontSize": 120,
            "fontColor": "#FFEECC80"
        }"##;

        let config = parse_config(json).unwrap();
        assert_eq!(config.image_path, "~/Pictures/beach.jpg");
        assert_eq!(config.num_layers, 3);
        assert_eq!(config.clock_layer, 1);
        assert_eq!(config.font_size, Some(120));
        assert_eq!(config.shadow_opacity, 120);
    }

    #[test]
    fn test_parse_empty_object_uses_defaults() {
        assert_eq!(parse_config("{}").unwrap(), StrataConfig::default());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(parse_config("{ \"numLayers\": }"), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_from_missing_path() {
        let result = load_config_from_path(Path::new("/nonexistent/strata/config.jsonc"));
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_config_paths_use_app_id() {
        let paths = config_paths();
        assert!(paths.iter().all(|p| p.to_string_lossy().contains(APP_ID)));
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let cases = [
            StrataConfig { update_interval: 0, ..Default::default() },
            StrataConfig { num_layers: 0, ..Default::default() },
            StrataConfig { clock_layer: 5, ..Default::default() },
            StrataConfig { blur_radius: -1.0, ..Default::default() },
            StrataConfig { clock_position_x: 101.0, ..Default::default() },
            StrataConfig { font_size: Some(0), ..Default::default() },
            StrataConfig { font_color: "white".to_string(), ..Default::default() },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{config:?}");
        }
    }

    #[test]
    fn test_invalid_format_is_not_fatal() {
        let config = StrataConfig {
            clock_format: "%Q".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    // ========================================================================
    // Colors
    // ========================================================================

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("102030").unwrap(), Rgba([16, 32, 48, 255]));
        assert_eq!(parse_hex_color("#00000080").unwrap(), Rgba([0, 0, 0, 128]));
    }

    #[test]
    fn test_parse_hex_color_rejects_malformed() {
        assert!(parse_hex_color("#FFF").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
        assert!(parse_hex_color("").is_err());
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    #[test]
    fn test_overlay_style_conversion() {
        let config = StrataConfig {
            font_path: "fonts/clock.ttf".to_string(),
            font_size: Some(96),
            shadow_color: "#112233".to_string(),
            clock_position_y: 40.0,
            ..Default::default()
        };
        let style = config.overlay_style(Path::new("/cfg")).unwrap();

        assert_eq!(style.font_path, Some(PathBuf::from("/cfg/fonts/clock.ttf")));
        assert_eq!(style.time_size, FontSize::Pixels(96.0));
        assert_eq!(style.date_size, FontSize::Auto);
        assert_eq!(style.shadow_color, Rgb([0x11, 0x22, 0x33]));
        assert!((style.position.1 - 40.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_engine_options_require_image() {
        let result = StrataConfig::default().engine_options(Path::new("/cfg"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_engine_options_resolve_paths() {
        let config = StrataConfig {
            image_path: "beach.jpg".to_string(),
            output_path: "/tmp/out/frame.png".to_string(),
            update_interval: 30,
            cache: false,
            ..Default::default()
        };
        let options = config.engine_options(Path::new("/cfg")).unwrap();

        assert_eq!(options.image_path, PathBuf::from("/cfg/beach.jpg"));
        assert_eq!(options.output_path, PathBuf::from("/tmp/out/frame.png"));
        assert_eq!(options.update_interval, Duration::from_secs(30));
        assert!(options.cache.is_none());
    }

    #[test]
    fn test_empty_output_uses_default() {
        assert_eq!(StrataConfig::default().output_path(Path::new("/cfg")), default_output_path());
    }

    #[test]
    fn test_empty_depth_command_is_ignored() {
        let config = StrataConfig {
            image_path: "/photos/beach.jpg".to_string(),
            ..Default::default()
        };
        assert!(config.depth_estimator(Path::new("/cfg")).is_ok());
    }
}
