//! Font loading and the glyph-rendering seam.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont, point};

use super::builtin::BuiltinFont;

/// Fonts tried, in order, when no explicit font is configured or it fails
/// to load.
pub const FALLBACK_FONTS: &[&str] = &[
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\calibrib.ttf",
    "C:\\Windows\\Fonts\\segoeuib.ttf",
];

/// Measures and rasterizes a line of text.
///
/// Coordinates passed to `plot` are relative to the top-left of the text's
/// bounding box; coverage is in `[0, 1]`.
pub trait GlyphRenderer: Send + Sync {
    /// Human-readable font description for logs.
    fn name(&self) -> &str;

    /// Returns the `(width, height)` of `text` at `px` pixels.
    fn measure(&self, text: &str, px: f32) -> (u32, u32);

    /// Rasterizes `text` at `px` pixels.
    fn draw(&self, text: &str, px: f32, plot: &mut dyn FnMut(i32, i32, f32));
}

/// A TrueType/OpenType font rasterized with `ab_glyph`.
pub struct TrueTypeFont {
    font: FontVec,
    name: String,
}

impl std::fmt::Debug for TrueTypeFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrueTypeFont").field("name", &self.name).finish_non_exhaustive()
    }
}

impl TrueTypeFont {
    /// Loads a font file.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(Self {
            font,
            name: path.display().to_string(),
        })
    }

    /// Lays out `text` on one line, returning glyph ids with their pen x.
    fn layout(&self, text: &str, px: f32) -> (Vec<(GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut caret = 0.0f32;
        let mut previous: Option<GlyphId> = None;
        let mut glyphs = Vec::with_capacity(text.len());

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push((id, caret));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        (glyphs, caret)
    }
}

impl GlyphRenderer for TrueTypeFont {
    fn name(&self) -> &str { &self.name }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn measure(&self, text: &str, px: f32) -> (u32, u32) {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let (_, width) = self.layout(text, px);
        let height = scaled.ascent() - scaled.descent();
        (width.ceil().max(0.0) as u32, height.ceil().max(0.0) as u32)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw(&self, text: &str, px: f32, plot: &mut dyn FnMut(i32, i32, f32)) {
        let scale = PxScale::from(px);
        let ascent = self.font.as_scaled(scale).ascent();
        let (glyphs, _) = self.layout(text, px);

        for (id, x) in glyphs {
            let glyph = id.with_scale_and_position(scale, point(x, ascent));
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            let (left, top) = (bounds.min.x.floor() as i32, bounds.min.y.floor() as i32);
            outlined.draw(|gx, gy, coverage| {
                plot(left + gx as i32, top + gy as i32, coverage);
            });
        }
    }
}

/// Resolves the font used for the overlay.
///
/// Tries `explicit`, then each of `candidates` that exists, and finally the
/// built-in bitmap font. Load failures are logged and never returned.
#[must_use]
pub fn resolve_font_from(explicit: Option<&Path>, candidates: &[PathBuf]) -> Arc<dyn GlyphRenderer> {
    if let Some(path) = explicit {
        match TrueTypeFont::load(path) {
            Ok(font) => {
                tracing::debug!(font = %path.display(), "loaded configured font");
                return Arc::new(font);
            }
            Err(err) => tracing::warn!(error = %err, "failed to load configured font; trying fallbacks"),
        }
    }

    for candidate in candidates.iter().filter(|p| p.exists()) {
        match TrueTypeFont::load(candidate) {
            Ok(font) => {
                tracing::debug!(font = %candidate.display(), "loaded fallback font");
                return Arc::new(font);
            }
            Err(err) => tracing::debug!(error = %err, "fallback font unusable"),
        }
    }

    tracing::info!("no TrueType font available; using the built-in bitmap font");
    Arc::new(BuiltinFont)
}

/// [`resolve_font_from`] with the platform [`FALLBACK_FONTS`].
#[must_use]
pub fn resolve_font(explicit: Option<&Path>) -> Arc<dyn GlyphRenderer> {
    let candidates: Vec<PathBuf> = FALLBACK_FONTS.iter().map(PathBuf::from).collect();
    resolve_font_from(explicit, &candidates)
}
