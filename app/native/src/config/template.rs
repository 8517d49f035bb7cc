//! Configuration template generation.
//!
//! Generates a commented configuration template with all available options.

use std::fs;
use std::path::Path;

/// Generates a configuration template.
///
/// Only `imagePath` is active; every other option is commented out and
/// shows its default value.
#[must_use]
pub fn generate_config_template() -> String {
    r##"// Strata Configuration File
// ==========================
// This file uses JSONC format (JSON with comments).
// Options that are commented out show their default values.
// Relative paths are resolved against the directory of this file.
// Changes are picked up while `strata run` is active.

{
  // ============================================================================
  // Source
  // ============================================================================
  // Photo to turn into a layered wallpaper
  "imagePath": ""

  // Grayscale depth map for the photo (white = near).
  // Empty looks for "<image>.depth.png" next to the photo.
  // , "depthMap": ""

  // External depth model. "{input}" and "{output}" are replaced with the
  // photo and the PNG depth map to write. Takes precedence over depthMap.
  // , "depthCommand": ["depth-anything", "{input}", "{output}"]

  // ============================================================================
  // Layers
  // ============================================================================
  // Number of depth layers
  // , "numLayers": 5

  // Layer the clock is drawn above (0 = farthest)
  // , "clockLayer": 2

  // Blur applied to layer edges, in pixels (0 = hard edges)
  // , "blurRadius": 2

  // Cache generated layers between runs
  // , "cache": true

  // ============================================================================
  // Clock
  // ============================================================================
  // Seconds between updates
  // , "updateInterval": 1

  // strftime formats for the time and the date
  // , "clockFormat": "%H:%M"
  // , "dateFormat": "%a %b %d"
  // , "showDate": true

  // Font file. Empty picks a system font, then a built-in bitmap font.
  // , "fontPath": ""

  // Sizes in pixels. Unset scales with the image height (15% and 3%).
  // , "fontSize": 160
  // , "dateFontSize": 32

  // Colors as "#RRGGBB" or "#RRGGBBAA"
  // , "fontColor": "#FFFFFF"
  // , "shadowColor": "#000000"
  // , "shadowOpacity": 120
  // , "shadowOffset": 4

  // Horizontal center and top of the clock, in percent of the image
  // , "clockPositionX": 50
  // , "clockPositionY": 25

  // ============================================================================
  // Output
  // ============================================================================
  // Frame file (.jpg, .jpeg or .png). Empty writes to the cache directory.
  // , "outputPath": ""

  // Apply each frame as the desktop wallpaper
  // , "setWallpaper": true
}
"##
    .to_string()
}

/// Creates a configuration file with the template at the specified path.
///
/// Creates parent directories if they don't exist.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn create_config_file(path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, generate_config_template())
}
