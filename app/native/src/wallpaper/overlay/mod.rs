//! Clock and date overlay rendering.
//!
//! Produces a transparent, canvas-sized RGBA layer with the current time
//! (plus an optional date line above it) that the compositor slots between
//! two depth layers.

pub mod builtin;
pub mod font;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use image::{Rgb, Rgba, RgbaImage};

use self::font::{GlyphRenderer, resolve_font};
use super::compositor::blend_pixel;

/// Time format used when none is configured or the configured one is invalid.
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";

/// Date format used when none is configured or the configured one is invalid.
pub const DEFAULT_DATE_FORMAT: &str = "%a %b %d";

/// Automatic time size as a fraction of the canvas height.
const AUTO_TIME_RATIO: f32 = 0.15;

/// Automatic date size as a fraction of the canvas height.
const AUTO_DATE_RATIO: f32 = 0.03;

/// Gap between the date's top and the time's top, as a fraction of height.
const DATE_GAP_RATIO: f32 = 0.05;

/// Date alpha relative to the time's alpha, out of 255.
const DATE_ALPHA: u16 = 200;

/// Text size in pixels, or proportional to the canvas height.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FontSize {
    #[default]
    Auto,
    Pixels(f32),
}

impl FontSize {
    #[allow(clippy::cast_precision_loss)]
    fn resolve(self, canvas_height: u32, auto_ratio: f32) -> f32 {
        match self {
            Self::Auto => (canvas_height as f32 * auto_ratio).max(1.0),
            Self::Pixels(px) => px.max(1.0),
        }
    }
}

/// Visual settings for the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub font_path: Option<PathBuf>,
    pub time_size: FontSize,
    pub date_size: FontSize,
    pub text_color: Rgba<u8>,
    pub shadow_color: Rgb<u8>,
    pub shadow_opacity: u8,
    pub shadow_offset: i32,
    /// Horizontal center and top of the time, in percent of the canvas.
    pub position: (f32, f32),
    pub time_format: String,
    pub date_format: String,
    pub show_date: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_path: None,
            time_size: FontSize::Auto,
            date_size: FontSize::Auto,
            text_color: Rgba([255, 255, 255, 255]),
            shadow_color: Rgb([0, 0, 0]),
            shadow_opacity: 120,
            shadow_offset: 4,
            position: (50.0, 25.0),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            show_date: true,
        }
    }
}

/// Returns `true` if `format` is a valid strftime pattern.
#[must_use]
pub fn is_valid_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// Formats `now` with `format`, falling back to `default` if the pattern is
/// invalid or cannot be applied to a zone-less timestamp.
#[must_use]
pub fn format_or_default(now: &NaiveDateTime, format: &str, default: &str) -> String {
    if is_valid_format(format) {
        let mut out = String::new();
        if write!(out, "{}", now.format(format)).is_ok() {
            return out;
        }
    }

    tracing::warn!(format, fallback = default, "unusable time format; using default");
    now.format(default).to_string()
}

/// Draws overlays with a font resolved once up front.
#[derive(Clone)]
pub struct OverlayRenderer {
    font: Arc<dyn GlyphRenderer>,
    font_path: Option<PathBuf>,
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("font", &self.font.name())
            .field("font_path", &self.font_path)
            .finish()
    }
}

impl OverlayRenderer {
    /// Resolves the font for `font_path` through the fallback chain.
    #[must_use]
    pub fn new(font_path: Option<&Path>) -> Self {
        Self {
            font: resolve_font(font_path),
            font_path: font_path.map(Path::to_path_buf),
        }
    }

    /// Uses a specific glyph renderer.
    #[must_use]
    pub fn with_font(font: Arc<dyn GlyphRenderer>) -> Self { Self { font, font_path: None } }

    /// Name of the resolved font.
    #[must_use]
    pub fn font_name(&self) -> &str { self.font.name() }

    /// The font path this renderer was resolved for.
    #[must_use]
    pub fn font_path(&self) -> Option<&Path> { self.font_path.as_deref() }

    /// Renders the overlay for `now` onto a transparent `canvas`-sized layer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn render(&self, canvas: (u32, u32), now: &NaiveDateTime, style: &OverlayStyle) -> RgbaImage {
        let (width, height) = canvas;
        let mut layer = RgbaImage::new(width, height);
        if width == 0 || height == 0 {
            return layer;
        }

        let anchor_x = width as f32 * style.position.0 / 100.0;
        let time_text = format_or_default(now, &style.time_format, DEFAULT_TIME_FORMAT);
        let time_px = style.time_size.resolve(height, AUTO_TIME_RATIO);
        let (time_width, _) = self.font.measure(&time_text, time_px);
        let time_x = (anchor_x - time_width as f32 / 2.0).round() as i32;
        let time_y = (height as f32 * style.position.1 / 100.0).floor() as i32;

        let [sr, sg, sb] = style.shadow_color.0;
        let shadow = Rgba([sr, sg, sb, style.shadow_opacity]);
        let offset = style.shadow_offset;
        self.draw_text(&mut layer, &time_text, time_px, (time_x + offset, time_y + offset), shadow);
        self.draw_text(&mut layer, &time_text, time_px, (time_x, time_y), style.text_color);

        if style.show_date {
            let date_text = format_or_default(now, &style.date_format, DEFAULT_DATE_FORMAT);
            let date_px = style.date_size.resolve(height, AUTO_DATE_RATIO);
            let (date_width, _) = self.font.measure(&date_text, date_px);
            let date_x = (anchor_x - date_width as f32 / 2.0).round() as i32;
            let date_y = time_y - (height as f32 * DATE_GAP_RATIO).floor() as i32;

            let [r, g, b, a] = style.text_color.0;
            let date_alpha = u8::try_from(u16::from(a) * DATE_ALPHA / 255).unwrap_or(u8::MAX);
            self.draw_text(&mut layer, &date_text, date_px, (date_x, date_y), Rgba([r, g, b, date_alpha]));
        }

        layer
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn draw_text(&self, layer: &mut RgbaImage, text: &str, px: f32, origin: (i32, i32), color: Rgba<u8>) {
        if color[3] == 0 || text.is_empty() {
            return;
        }
        let (width, height) = layer.dimensions();
        let [r, g, b, a] = color.0;

        self.font.draw(text, px, &mut |x, y, coverage| {
            let (px_x, px_y) = (origin.0 + x, origin.1 + y);
            if px_x < 0 || px_y < 0 || px_x as u32 >= width || px_y as u32 >= height {
                return;
            }
            let alpha = (f32::from(a) * coverage.clamp(0.0, 1.0)).round() as u8;
            if alpha > 0 {
                blend_pixel(layer.get_pixel_mut(px_x as u32, px_y as u32), Rgba([r, g, b, alpha]));
            }
        });
    }
}
