//! Per-texel annotation overlay
//!
//! Decides, per visible texel, whether a textual decoration fits on
//! screen, and renders it centered on the texel when it does. A texel is
//! annotated only when its on-screen footprint is at least as large as
//! the text block, so the overlay disappears cleanly as the view zooms
//! out.

use egui::{Align2, Color32, FontId, Painter, Pos2, Vec2};
use serde::{Deserialize, Serialize};

use crate::curves::TransferCurve;
use crate::transform::TexelTransform;

/// Text format for a texel decoration. The four variants are
/// independently selectable; selection is fixed for the annotation's
/// lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueFormat {
    /// Single line `#RRGGBBAA`.
    #[default]
    HexString,
    /// One hex byte per channel, four lines.
    HexChannels,
    /// One decimal byte per channel, four lines.
    DecChannels,
    /// One float per channel with 3 decimals, four lines, untouched by
    /// the byte mapping.
    FloatChannels,
}

impl ValueFormat {
    /// Display name for UI labels.
    pub fn name(&self) -> &'static str {
        match self {
            ValueFormat::HexString => "Hex",
            ValueFormat::HexChannels => "Hex/channel",
            ValueFormat::DecChannels => "Bytes",
            ValueFormat::FloatChannels => "Floats",
        }
    }

    /// Text block extent as (columns, rows) of fixed-width font cells.
    pub fn grid(&self) -> (u32, u32) {
        match self {
            ValueFormat::HexString => (9, 1),
            ValueFormat::HexChannels => (5, 4),
            ValueFormat::DecChannels => (6, 4),
            ValueFormat::FloatChannels => (8, 4),
        }
    }

    /// All variants, for UI pickers.
    pub fn all() -> &'static [ValueFormat] {
        &[
            ValueFormat::HexString,
            ValueFormat::HexChannels,
            ValueFormat::DecChannels,
            ValueFormat::FloatChannels,
        ]
    }
}

/// Map a [0, 1] channel value to a byte by clamping then rounding.
fn byte_value(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Stateless per-texel decorator.
///
/// Owns nothing beyond its immutable formatting configuration: the format
/// variant, the fixed-width font cell metrics used for the visibility
/// rule, and an optional value-display curve applied to RGB (never alpha)
/// before formatting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexelAnnotation {
    format: ValueFormat,
    font_width: f32,
    font_height: f32,
    curve: TransferCurve,
}

impl TexelAnnotation {
    /// A decorator with the given format and font cell size, displaying
    /// raw (linear) values.
    pub fn new(format: ValueFormat, font_width: f32, font_height: f32) -> Self {
        Self {
            format,
            font_width,
            font_height,
            curve: TransferCurve::Linear,
        }
    }

    /// Display channel values through a transfer curve.
    pub fn with_curve(mut self, curve: TransferCurve) -> Self {
        self.curve = curve;
        self
    }

    /// The configured format variant.
    pub fn format(&self) -> ValueFormat {
        self.format
    }

    /// Whether the text block fits inside one texel's on-screen
    /// footprint. Skipped entirely when `columns * font_width` exceeds
    /// `|scale.x|` or `rows * font_height` exceeds `|scale.y|`.
    pub fn fits(&self, scale: Vec2) -> bool {
        let (columns, rows) = self.format.grid();
        columns as f32 * self.font_width <= scale.x.abs()
            && rows as f32 * self.font_height <= scale.y.abs()
    }

    /// Format one texel's RGBA value in [0, 1] as the decoration text.
    pub fn format_texel(&self, rgba: [f32; 4]) -> String {
        let v: Vec<f64> = rgba
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                // Alpha is never curved.
                if i < 3 {
                    self.curve.apply(c as f64)
                } else {
                    c as f64
                }
            })
            .collect();

        match self.format {
            ValueFormat::HexString => format!(
                "#{:02X}{:02X}{:02X}{:02X}",
                byte_value(v[0]),
                byte_value(v[1]),
                byte_value(v[2]),
                byte_value(v[3])
            ),
            ValueFormat::HexChannels => format!(
                "R: {:02X}\nG: {:02X}\nB: {:02X}\nA: {:02X}",
                byte_value(v[0]),
                byte_value(v[1]),
                byte_value(v[2]),
                byte_value(v[3])
            ),
            ValueFormat::DecChannels => format!(
                "R: {:>3}\nG: {:>3}\nB: {:>3}\nA: {:>3}",
                byte_value(v[0]),
                byte_value(v[1]),
                byte_value(v[2]),
                byte_value(v[3])
            ),
            ValueFormat::FloatChannels => format!(
                "R: {:.3}\nG: {:.3}\nB: {:.3}\nA: {:.3}",
                v[0], v[1], v[2], v[3]
            ),
        }
    }

    /// Pick the text color contrasting with the texel underneath.
    ///
    /// Deliberately coarse: brightness is `(R+G+B) * A / 3`, above 0.5
    /// selects opaque black, otherwise opaque white.
    pub fn text_color(rgba: [f32; 4]) -> Color32 {
        let brightness = (rgba[0] + rgba[1] + rgba[2]) * rgba[3] / 3.0;
        if brightness > 0.5 {
            Color32::BLACK
        } else {
            Color32::WHITE
        }
    }

    /// Draw one texel's decoration, centered on the texel, if it fits at
    /// the current zoom.
    pub fn draw(
        &self,
        painter: &Painter,
        transform: &TexelTransform,
        texel: (i32, i32),
        rgba: [f32; 4],
    ) {
        if !self.fits(transform.scale) {
            return;
        }
        let center = transform.texel_center(texel.0, texel.1);
        self.draw_at(painter, center, rgba);
    }

    /// Draw at an explicit screen position; `draw` resolves the position
    /// through the transform first.
    pub fn draw_at(&self, painter: &Painter, center: Pos2, rgba: [f32; 4]) {
        painter.text(
            center,
            Align2::CENTER_CENTER,
            self.format_texel(rgba),
            FontId::monospace(self.font_height),
            Self::text_color(rgba),
        );
    }
}
