//! CPU reference implementation of every adjustment kind.
//!
//! [`apply_cpu`] is the fallback path of the compositor and the ground
//! truth the GPU programs are tested against. Each adjustment produces a
//! new raster, clamped to `0..=1`, with alpha passed through.

pub mod blend;
pub mod color;
pub mod lut;
pub mod spatial;
pub mod tone;

pub use blend::{apply_blend_mode, blend_pixel};
pub use lut::{CurvesLut, GradientLut, ToneLut};

use crate::image::RasterImage;
use crate::layers::params::AdjustmentParams;

/// Rec. 601 luma weights.
pub const LUMA_REC601: [f32; 3] = [0.299, 0.587, 0.114];

/// Luminance of a normalized RGB triple.
#[inline]
pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_REC601[0] + rgb[1] * LUMA_REC601[1] + rgb[2] * LUMA_REC601[2]
}

/// Apply a per-pixel RGB function, keeping alpha.
fn map_pixels(image: &RasterImage, f: impl Fn([f32; 3]) -> [f32; 3]) -> RasterImage {
    let pixels = image
        .pixels
        .iter()
        .map(|p| {
            let rgb = f([p[0], p[1], p[2]]);
            [rgb[0], rgb[1], rgb[2], p[3]]
        })
        .collect();
    RasterImage {
        width: image.width,
        height: image.height,
        pixels,
    }
}

fn clamp_rgb(mut image: RasterImage) -> RasterImage {
    for p in &mut image.pixels {
        for v in &mut p[..3] {
            *v = v.clamp(0.0, 1.0);
        }
    }
    image
}

/// Apply one adjustment on the CPU.
pub fn apply_cpu(image: &RasterImage, params: &AdjustmentParams) -> RasterImage {
    let out = match params {
        AdjustmentParams::BrightnessContrast(p) => {
            map_pixels(image, |rgb| tone::brightness_contrast(rgb, p))
        }
        AdjustmentParams::Levels(p) => map_pixels(image, |rgb| tone::levels(rgb, p)),
        AdjustmentParams::Curves(p) => {
            let lut = CurvesLut::new(p);
            map_pixels(image, |rgb| lut.apply(rgb))
        }
        AdjustmentParams::Hsl(p) => map_pixels(image, |rgb| color::hsl(rgb, p)),
        AdjustmentParams::ColorBalance(p) => {
            map_pixels(image, |rgb| color::color_balance(rgb, p))
        }
        AdjustmentParams::Vibrance(p) => map_pixels(image, |rgb| color::vibrance(rgb, p)),
        AdjustmentParams::Exposure(p) => map_pixels(image, |rgb| tone::exposure(rgb, p)),
        AdjustmentParams::TemperatureTint(p) => {
            map_pixels(image, |rgb| tone::temperature_tint(rgb, p))
        }
        AdjustmentParams::ShadowsHighlights(p) => {
            map_pixels(image, |rgb| tone::shadows_highlights(rgb, p))
        }
        AdjustmentParams::Sharpen(p) => spatial::sharpen(image, p),
        AdjustmentParams::Vignette(p) => spatial::vignette(image, p),
        AdjustmentParams::Grain(p) => spatial::grain(image, p),
        AdjustmentParams::ChromaticAberration(p) => spatial::chromatic_aberration(image, p),
        AdjustmentParams::SplitToning(p) => {
            let tone = color::SplitTone::new(p);
            map_pixels(image, |rgb| tone.apply(rgb))
        }
        AdjustmentParams::GradientMap(p) => {
            let lut = GradientLut::new(&p.stops);
            map_pixels(image, |rgb| lut.lookup(luminance(rgb)))
        }
        // Hook point for external lookup tables.
        AdjustmentParams::ColorLookup(_) => image.clone(),
    };
    clamp_rgb(out)
}

/// Apply adjustments in list order on the CPU.
pub fn apply_chain_cpu(image: &RasterImage, chain: &[AdjustmentParams]) -> RasterImage {
    chain
        .iter()
        .fold(image.clone(), |img, params| apply_cpu(&img, params))
}
