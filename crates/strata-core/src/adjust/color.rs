//! Per-pixel color adjustments (HSL, color balance, vibrance, split toning).

use palette::{FromColor, Hsl, Srgb};

use crate::adjust::luminance;
use crate::layers::params::{ColorBalanceParams, HslParams, SplitToningParams, VibranceParams};

/// Normalized channel shift at a color balance slider value of ±100.
pub const COLOR_BALANCE_SCALE: f32 = 0.2;

/// Luminance thresholds separating shadows, midtones, and highlights.
pub const SHADOW_LIMIT: f32 = 0.33;
pub const MIDTONE_LIMIT: f32 = 0.67;

fn to_hsl(rgb: [f32; 3]) -> Hsl {
    Hsl::from_color(Srgb::new(rgb[0], rgb[1], rgb[2]))
}

fn from_hsl(hue_degrees: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let hsl: Hsl = Hsl::new(hue_degrees, saturation, lightness);
    let rgb: Srgb = Srgb::from_color(hsl);
    [rgb.red, rgb.green, rgb.blue]
}

/// Fully saturated color at mid lightness for a hue in degrees.
pub fn hue_color(hue_degrees: f32) -> [f32; 3] {
    from_hsl(hue_degrees, 1.0, 0.5)
}

/// HSL saturation of a normalized RGB color.
pub fn saturation(rgb: [f32; 3]) -> f32 {
    to_hsl(rgb).saturation
}

/// Hue shift, clamped saturation and lightness offsets.
///
/// ```text
/// h = fract(h + hue / 360)
/// s = clamp(s + saturation / 100, 0, 1)
/// l = clamp(l + lightness / 100, 0, 1)
/// ```
pub fn hsl(rgb: [f32; 3], p: &HslParams) -> [f32; 3] {
    if p.hue.abs() < 1e-7 && p.saturation.abs() < 1e-7 && p.lightness.abs() < 1e-7 {
        return rgb;
    }
    let hsl = to_hsl(rgb);
    let hue = (hsl.hue.into_positive_degrees() / 360.0 + p.hue / 360.0).rem_euclid(1.0);
    let s = (hsl.saturation + p.saturation / 100.0).clamp(0.0, 1.0);
    let l = (hsl.lightness + p.lightness / 100.0).clamp(0.0, 1.0);
    from_hsl(hue * 360.0, s, l)
}

/// Cyan-red, magenta-green, yellow-blue shifts for the pixel's tonal range.
pub fn color_balance(rgb: [f32; 3], p: &ColorBalanceParams) -> [f32; 3] {
    let luma = luminance(rgb);
    let shift = if luma < SHADOW_LIMIT {
        p.shadows
    } else if luma < MIDTONE_LIMIT {
        p.midtones
    } else {
        p.highlights
    };

    let mut out = [
        rgb[0] + shift[0] / 100.0 * COLOR_BALANCE_SCALE,
        rgb[1] + shift[1] / 100.0 * COLOR_BALANCE_SCALE,
        rgb[2] + shift[2] / 100.0 * COLOR_BALANCE_SCALE,
    ];
    if p.preserve_luminosity {
        let delta = luma - luminance(out);
        out = out.map(|v| v + delta);
    }
    out
}

/// Saturation boost that favors muted colors.
///
/// ```text
/// amount = vibrance / 100 × (1 − s) + saturation / 100
/// out = luma + (in − luma) × (1 + amount)
/// ```
pub fn vibrance(rgb: [f32; 3], p: &VibranceParams) -> [f32; 3] {
    if p.vibrance.abs() < 1e-7 && p.saturation.abs() < 1e-7 {
        return rgb;
    }
    let s = saturation(rgb);
    let amount = p.vibrance / 100.0 * (1.0 - s) + p.saturation / 100.0;
    let luma = luminance(rgb);
    rgb.map(|v| luma + (v - luma) * (1.0 + amount))
}

/// Tint colors and per-pixel weights for split toning, resolved once per
/// adjustment and shared by the CPU and GPU paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitTone {
    pub highlight: [f32; 3],
    pub shadow: [f32; 3],
    /// Highlight strength after saturation and balance.
    pub highlight_strength: f32,
    /// Shadow strength after saturation and balance.
    pub shadow_strength: f32,
}

impl SplitTone {
    pub fn new(p: &SplitToningParams) -> Self {
        let balance = (p.balance / 100.0).clamp(-1.0, 1.0);
        Self {
            highlight: hue_color(p.highlight_hue),
            shadow: hue_color(p.shadow_hue),
            highlight_strength: p.highlight_saturation / 100.0 * (1.0 + balance).min(1.0),
            shadow_strength: p.shadow_saturation / 100.0 * (1.0 - balance).min(1.0),
        }
    }

    /// Blend toward the highlight tint above mid luminance and toward the
    /// shadow tint below it.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let luma = luminance(rgb);
        let hw = ((luma - 0.5) * 2.0).clamp(0.0, 1.0) * self.highlight_strength * 0.5;
        let sw = ((0.5 - luma) * 2.0).clamp(0.0, 1.0) * self.shadow_strength * 0.5;
        std::array::from_fn(|c| {
            rgb[c] + (self.highlight[c] - rgb[c]) * hw + (self.shadow[c] - rgb[c]) * sw
        })
    }
}
