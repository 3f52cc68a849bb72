//! Per-pixel tonal adjustments (brightness/contrast, levels, exposure,
//! temperature/tint, shadows/highlights).
//!
//! All functions take and return normalized RGB. Results are not clamped
//! here; the caller clamps once per adjustment.

use crate::layers::params::{
    BrightnessContrastParams, ExposureParams, LevelsParams, ShadowsHighlightsParams,
    TemperatureTintParams,
};

/// Channel offset in 8-bit levels per unit of normalized temperature or tint.
pub const WHITE_BALANCE_SCALE: f32 = 25.0;

/// Mid-gray contrast pivot (level 128).
pub const CONTRAST_PIVOT: f32 = 128.0 / 255.0;

/// Brightness and contrast.
///
/// ```text
/// contrast = (param + 100) / 100
/// out = in × contrast + 128 × (1 − contrast) + brightness × 2.55      (8-bit levels)
/// ```
pub fn brightness_contrast(rgb: [f32; 3], p: &BrightnessContrastParams) -> [f32; 3] {
    let contrast = (p.contrast + 100.0) / 100.0;
    // brightness × 2.55 levels is brightness / 100 normalized
    let brightness = p.brightness / 100.0;
    rgb.map(|v| v * contrast + CONTRAST_PIVOT * (1.0 - contrast) + brightness)
}

/// Input/output levels with midtone gamma.
///
/// ```text
/// v = clamp((in − in_black) / (in_white − in_black), 0, 1)
/// v = v ^ (1 / gamma)
/// out = v × (out_white − out_black) + out_black
/// ```
pub fn levels(rgb: [f32; 3], p: &LevelsParams) -> [f32; 3] {
    let in_black = p.input_black / 255.0;
    let in_range = ((p.input_white - p.input_black) / 255.0).max(1.0 / 255.0);
    let out_black = p.output_black / 255.0;
    let out_range = (p.output_white - p.output_black) / 255.0;
    let inv_gamma = 1.0 / p.gamma.max(0.01);

    rgb.map(|v| {
        let t = ((v - in_black) / in_range).clamp(0.0, 1.0);
        t.powf(inv_gamma) * out_range + out_black
    })
}

/// Exposure in stops with offset and gamma.
///
/// ```text
/// v = in × 2^exposure + offset
/// out = v ^ (1 / gamma)
/// ```
pub fn exposure(rgb: [f32; 3], p: &ExposureParams) -> [f32; 3] {
    let gain = p.exposure.exp2();
    let inv_gamma = 1.0 / p.gamma.max(0.01);
    rgb.map(|v| (v * gain + p.offset).max(0.0).powf(inv_gamma))
}

/// Additive white balance shift.
///
/// Positive temperature warms (red up, blue down); positive tint moves
/// toward magenta (green down).
pub fn temperature_tint(rgb: [f32; 3], p: &TemperatureTintParams) -> [f32; 3] {
    let temp = p.temperature / 100.0 * WHITE_BALANCE_SCALE / 255.0;
    let tint = p.tint / 100.0 * WHITE_BALANCE_SCALE / 255.0;
    [rgb[0] + temp, rgb[1] - tint, rgb[2] - temp]
}

/// Shadow lift and highlight compression.
///
/// Uses a soft-knee isolation around mid-gray:
///
/// ```text
/// s = smoothstep(0, 1, in)
/// out = in + shadows × (1 − s) × 0.5 − highlights × s × 0.5
/// ```
///
/// Both at 0 produce no change.
pub fn shadows_highlights(rgb: [f32; 3], p: &ShadowsHighlightsParams) -> [f32; 3] {
    let shadows = p.shadows / 100.0;
    let highlights = p.highlights / 100.0;
    if shadows.abs() < 1e-7 && highlights.abs() < 1e-7 {
        return rgb;
    }

    rgb.map(|v| {
        let t = v.clamp(0.0, 1.0);
        // Smoothstep: 3t² − 2t³
        let s = t * t * (3.0 - 2.0 * t);
        v + shadows * (1.0 - s) * 0.5 - highlights * s * 0.5
    })
}
