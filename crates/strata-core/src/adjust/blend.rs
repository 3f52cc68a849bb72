//! Blend-mode compositing of two rasters.
//!
//! Separable modes use the usual per-channel formulas on normalized values.
//! Hue, saturation, color, and luminosity work on the whole RGB triple via
//! the set-luminosity / set-saturation construction.

use crate::adjust::luminance;
use crate::error::CompositeError;
use crate::image::RasterImage;
use crate::layers::model::BlendMode;

/// Blend one channel for the separable modes.
///
/// `b` is the base, `s` the overlay (source) value.
#[inline]
fn blend_channel(b: f32, s: f32, mode: BlendMode) -> f32 {
    match mode {
        BlendMode::Multiply => b * s,
        BlendMode::Screen => screen(b, s),
        BlendMode::Overlay => hard_light(s, b),
        BlendMode::HardLight => hard_light(b, s),
        BlendMode::SoftLight => soft_light(b, s),
        BlendMode::ColorDodge => {
            if b <= 0.0 {
                0.0
            } else if s >= 1.0 {
                1.0
            } else {
                (b / (1.0 - s)).min(1.0)
            }
        }
        BlendMode::ColorBurn => {
            if b >= 1.0 {
                1.0
            } else if s <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - b) / s).min(1.0)
            }
        }
        BlendMode::Darken => b.min(s),
        BlendMode::Lighten => b.max(s),
        BlendMode::Difference => (b - s).abs(),
        BlendMode::Exclusion => b + s - 2.0 * b * s,
        // Normal and the non-separable modes never reach here.
        _ => s,
    }
}

#[inline]
fn screen(b: f32, s: f32) -> f32 {
    b + s - b * s
}

#[inline]
fn hard_light(b: f32, s: f32) -> f32 {
    if s <= 0.5 {
        2.0 * b * s
    } else {
        screen(b, 2.0 * s - 1.0)
    }
}

#[inline]
fn soft_light(b: f32, s: f32) -> f32 {
    if s <= 0.5 {
        b - (1.0 - 2.0 * s) * b * (1.0 - b)
    } else {
        let d = if b <= 0.25 {
            ((16.0 * b - 12.0) * b + 4.0) * b
        } else {
            b.sqrt()
        };
        b + (2.0 * s - 1.0) * (d - b)
    }
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = luminance(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 && l - n > 1e-7 {
        out = out.map(|v| l + (v - l) * l / (l - n));
    }
    if x > 1.0 && x - l > 1e-7 {
        out = out.map(|v| l + (v - l) * (1.0 - l) / (x - l));
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - luminance(c);
    clip_color(c.map(|v| v + d))
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let mut idx = [0usize, 1, 2];
    idx.sort_by(|&a, &b| c[a].total_cmp(&c[b]));
    let [lo, mid, hi] = idx;

    let mut out = [0.0; 3];
    let range = c[hi] - c[lo];
    if range > 1e-7 {
        out[mid] = (c[mid] - c[lo]) * s / range;
        out[hi] = s;
    }
    out
}

/// Blend formula result before opacity.
fn blend_rgb(base: [f32; 3], over: [f32; 3], mode: BlendMode) -> [f32; 3] {
    match mode {
        BlendMode::Normal => over,
        BlendMode::Hue => set_lum(set_sat(over, sat(base)), luminance(base)),
        BlendMode::Saturation => set_lum(set_sat(base, sat(over)), luminance(base)),
        BlendMode::Color => set_lum(over, luminance(base)),
        BlendMode::Luminosity => set_lum(base, luminance(over)),
        _ => std::array::from_fn(|c| blend_channel(base[c], over[c], mode)),
    }
}

/// Blend one pixel and mix back toward the base by `weight` (`0..=1`).
///
/// The blended alpha is the overlay's. Weights at or beyond the ends return
/// the blended pixel or the base pixel unchanged.
#[inline]
pub fn blend_pixel(base: [f32; 4], over: [f32; 4], mode: BlendMode, weight: f32) -> [f32; 4] {
    if weight <= 0.0 {
        return base;
    }
    let rgb = blend_rgb([base[0], base[1], base[2]], [over[0], over[1], over[2]], mode);
    let blended = [rgb[0], rgb[1], rgb[2], over[3]];
    if weight >= 1.0 {
        return blended;
    }
    std::array::from_fn(|c| base[c] + (blended[c] - base[c]) * weight)
}

/// Combine `overlay` onto `base` with a blend mode and `0..=100` opacity.
pub fn apply_blend_mode(
    base: &RasterImage,
    overlay: &RasterImage,
    mode: BlendMode,
    opacity: f32,
) -> Result<RasterImage, CompositeError> {
    if (base.width, base.height) != (overlay.width, overlay.height) {
        return Err(CompositeError::DimensionMismatch {
            base: (base.width, base.height),
            overlay: (overlay.width, overlay.height),
        });
    }
    base.check_len()?;
    overlay.check_len()?;

    let weight = opacity / 100.0;
    let pixels = base
        .pixels
        .iter()
        .zip(&overlay.pixels)
        .map(|(b, o)| blend_pixel(*b, *o, mode, weight))
        .collect();
    Ok(RasterImage {
        width: base.width,
        height: base.height,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn px(r: f32, g: f32, b: f32) -> [f32; 4] {
        [r, g, b, 1.0]
    }

    fn assert_px_eq(a: [f32; 4], b: [f32; 4]) {
        for c in 0..4 {
            assert!(
                (a[c] - b[c]).abs() < EPSILON,
                "channel {c}: {:.6} vs {:.6}",
                a[c],
                b[c]
            );
        }
    }

    #[test]
    fn test_multiply_and_screen() {
        let b = px(0.5, 0.2, 1.0);
        let s = px(0.5, 0.5, 0.0);
        assert_px_eq(blend_pixel(b, s, BlendMode::Multiply, 1.0), px(0.25, 0.1, 0.0));
        assert_px_eq(blend_pixel(b, s, BlendMode::Screen, 1.0), px(0.75, 0.6, 1.0));
    }

    #[test]
    fn test_overlay_is_hard_light_with_layers_swapped() {
        let b = px(0.3, 0.7, 0.5);
        let s = px(0.8, 0.1, 0.6);
        let overlay = blend_pixel(b, s, BlendMode::Overlay, 1.0);
        let hard = blend_pixel(s, b, BlendMode::HardLight, 1.0);
        assert_px_eq(overlay, hard);
    }

    #[test]
    fn test_soft_light_neutral_gray_keeps_base() {
        let b = px(0.2, 0.6, 0.9);
        assert_px_eq(blend_pixel(b, px(0.5, 0.5, 0.5), BlendMode::SoftLight, 1.0), b);
    }

    #[test]
    fn test_dodge_and_burn_edges() {
        assert_eq!(blend_channel(0.0, 1.0, BlendMode::ColorDodge), 0.0);
        assert_eq!(blend_channel(0.4, 1.0, BlendMode::ColorDodge), 1.0);
        assert!((blend_channel(0.4, 0.5, BlendMode::ColorDodge) - 0.8).abs() < EPSILON);
        assert_eq!(blend_channel(1.0, 0.0, BlendMode::ColorBurn), 1.0);
        assert_eq!(blend_channel(0.4, 0.0, BlendMode::ColorBurn), 0.0);
        assert!((blend_channel(0.8, 0.5, BlendMode::ColorBurn) - 0.6).abs() < EPSILON);
    }

    #[test]
    fn test_difference_and_exclusion() {
        let b = px(0.9, 0.2, 0.5);
        let s = px(0.4, 0.6, 0.5);
        assert_px_eq(blend_pixel(b, s, BlendMode::Difference, 1.0), px(0.5, 0.4, 0.0));
        assert_px_eq(blend_pixel(b, s, BlendMode::Exclusion, 1.0), px(0.58, 0.56, 0.5));
    }

    #[test]
    fn test_luminosity_takes_overlay_lightness() {
        let b = px(0.8, 0.2, 0.2);
        let s = px(0.5, 0.5, 0.5);
        let out = blend_pixel(b, s, BlendMode::Luminosity, 1.0);
        let rgb = [out[0], out[1], out[2]];
        assert!((luminance(rgb) - 0.5).abs() < 1e-4);
        assert!(rgb[0] > rgb[1], "hue of base should survive: {rgb:?}");
    }

    #[test]
    fn test_color_on_gray_base_keeps_gray_luma() {
        let b = px(0.5, 0.5, 0.5);
        let s = px(1.0, 0.0, 0.0);
        let out = blend_pixel(b, s, BlendMode::Color, 1.0);
        assert!((luminance([out[0], out[1], out[2]]) - 0.5).abs() < 1e-4);
        assert!(out[0] > out[1]);
    }

    #[test]
    fn test_normal_full_opacity_returns_overlay_exactly() {
        let base = RasterImage::filled(3, 2, [0.1, 0.2, 0.3, 1.0]);
        let overlay = RasterImage::filled(3, 2, [0.7, 0.6, 0.5, 0.4]);
        let out = apply_blend_mode(&base, &overlay, BlendMode::Normal, 100.0).unwrap();
        assert_eq!(out, overlay);
    }

    #[test]
    fn test_zero_opacity_returns_base_for_every_mode() {
        let base = RasterImage::filled(2, 2, [0.1, 0.2, 0.3, 1.0]);
        let overlay = RasterImage::filled(2, 2, [0.9, 0.8, 0.7, 0.5]);
        for &mode in BlendMode::all() {
            let out = apply_blend_mode(&base, &overlay, mode, 0.0).unwrap();
            assert_eq!(out, base, "{mode:?}");
        }
    }

    #[test]
    fn test_half_opacity_interpolates() {
        let base = RasterImage::filled(1, 1, [0.0, 0.0, 0.0, 1.0]);
        let overlay = RasterImage::filled(1, 1, [1.0, 0.5, 0.2, 1.0]);
        let out = apply_blend_mode(&base, &overlay, BlendMode::Normal, 50.0).unwrap();
        assert_px_eq(out.pixels[0], [0.5, 0.25, 0.1, 1.0]);
    }

    #[test]
    fn test_mismatched_sizes_fail() {
        let base = RasterImage::filled(2, 2, [0.0; 4]);
        let overlay = RasterImage::filled(3, 2, [0.0; 4]);
        let err = apply_blend_mode(&base, &overlay, BlendMode::Multiply, 100.0).unwrap_err();
        assert!(matches!(err, CompositeError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_short_pixel_buffer_fails() {
        let base = RasterImage::filled(2, 2, [0.0; 4]);
        let mut overlay = RasterImage::filled(2, 2, [1.0; 4]);
        overlay.pixels.truncate(3);
        let err = apply_blend_mode(&base, &overlay, BlendMode::Screen, 100.0).unwrap_err();
        assert!(matches!(
            err,
            CompositeError::InvalidBuffer {
                expected: 16,
                actual: 12
            }
        ));

        let mut long = RasterImage::filled(2, 2, [0.0; 4]);
        long.pixels.push([0.0; 4]);
        let err = apply_blend_mode(&long, &overlay, BlendMode::Normal, 50.0).unwrap_err();
        assert!(matches!(
            err,
            CompositeError::InvalidBuffer {
                expected: 16,
                actual: 20
            }
        ));
    }
}
