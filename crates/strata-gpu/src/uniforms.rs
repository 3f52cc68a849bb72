//! Packing of adjustment parameters into the uniform block and lookup
//! table read by the compute programs.
//!
//! Derived quantities (gains, reciprocal gammas, tint colors, baked curves)
//! are computed here with the same code as the CPU path, so the programs
//! only evaluate the per-pixel part of each formula.

use bytemuck::{Pod, Zeroable};
use strata_core::adjust::color::{COLOR_BALANCE_SCALE, MIDTONE_LIMIT, SHADOW_LIMIT, SplitTone};
use strata_core::adjust::spatial::{GRAIN_SCALE, aberration_offset};
use strata_core::adjust::tone::{CONTRAST_PIVOT, WHITE_BALANCE_SCALE};
use strata_core::adjust::{CurvesLut, GradientLut};
use strata_core::AdjustmentParams;

/// Uniform block shared by every program. Must match `Uniforms` in
/// `shaders/common.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AdjustmentUniforms {
    /// `[width, height, aux0, aux1]`.
    pub dims: [u32; 4],
    pub values: [[f32; 4]; 8],
}

impl AdjustmentUniforms {
    fn new(width: u32, height: u32) -> Self {
        Self {
            dims: [width, height, 0, 0],
            values: [[0.0; 4]; 8],
        }
    }
}

/// Everything one dispatch needs besides the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedAdjustment {
    pub uniforms: AdjustmentUniforms,
    /// Lookup table contents; a single zero when the program reads none.
    pub table: Vec<f32>,
}

/// Pack `params` for a `width`×`height` image.
///
/// Returns `None` for kinds that have no compute program.
pub fn pack(params: &AdjustmentParams, width: u32, height: u32) -> Option<PackedAdjustment> {
    let mut u = AdjustmentUniforms::new(width, height);
    let mut table = vec![0.0];

    match params {
        AdjustmentParams::BrightnessContrast(p) => {
            let contrast = (p.contrast + 100.0) / 100.0;
            u.values[0] = [contrast, p.brightness / 100.0, CONTRAST_PIVOT, 0.0];
        }
        AdjustmentParams::Levels(p) => {
            let in_black = p.input_black / 255.0;
            let in_range = ((p.input_white - p.input_black) / 255.0).max(1.0 / 255.0);
            let inv_gamma = 1.0 / p.gamma.max(0.01);
            u.values[0] = [in_black, in_range, inv_gamma, 0.0];
            u.values[1] = [
                p.output_black / 255.0,
                (p.output_white - p.output_black) / 255.0,
                0.0,
                0.0,
            ];
        }
        AdjustmentParams::Curves(p) => {
            table = CurvesLut::new(p).to_table();
        }
        AdjustmentParams::Hsl(p) => {
            let identity =
                p.hue.abs() < 1e-7 && p.saturation.abs() < 1e-7 && p.lightness.abs() < 1e-7;
            u.values[0] = [
                p.hue / 360.0,
                p.saturation / 100.0,
                p.lightness / 100.0,
                if identity { 1.0 } else { 0.0 },
            ];
        }
        AdjustmentParams::ColorBalance(p) => {
            let scale = |s: [f32; 3]| {
                [
                    s[0] / 100.0 * COLOR_BALANCE_SCALE,
                    s[1] / 100.0 * COLOR_BALANCE_SCALE,
                    s[2] / 100.0 * COLOR_BALANCE_SCALE,
                    0.0,
                ]
            };
            u.values[0] = scale(p.shadows);
            u.values[1] = scale(p.midtones);
            u.values[2] = scale(p.highlights);
            u.values[3] = [
                SHADOW_LIMIT,
                MIDTONE_LIMIT,
                if p.preserve_luminosity { 1.0 } else { 0.0 },
                0.0,
            ];
        }
        AdjustmentParams::Vibrance(p) => {
            let identity = p.vibrance.abs() < 1e-7 && p.saturation.abs() < 1e-7;
            u.values[0] = [
                p.vibrance / 100.0,
                p.saturation / 100.0,
                if identity { 1.0 } else { 0.0 },
                0.0,
            ];
        }
        AdjustmentParams::Exposure(p) => {
            u.values[0] = [p.exposure.exp2(), p.offset, 1.0 / p.gamma.max(0.01), 0.0];
        }
        AdjustmentParams::TemperatureTint(p) => {
            u.values[0] = [
                p.temperature / 100.0 * WHITE_BALANCE_SCALE / 255.0,
                p.tint / 100.0 * WHITE_BALANCE_SCALE / 255.0,
                0.0,
                0.0,
            ];
        }
        AdjustmentParams::ShadowsHighlights(p) => {
            u.values[0] = [p.shadows / 100.0, p.highlights / 100.0, 0.0, 0.0];
        }
        AdjustmentParams::Sharpen(p) => {
            u.values[0] = [p.amount / 100.0, 0.0, 0.0, 0.0];
        }
        AdjustmentParams::Vignette(p) => {
            u.values[0] = [
                1.0 + p.roundness / 200.0,
                p.midpoint / 100.0,
                p.feather / 100.0 * 0.5,
                p.amount / 100.0,
            ];
        }
        AdjustmentParams::Grain(p) => {
            u.dims[2] = p.seed;
            u.dims[3] = u32::from(p.monochromatic);
            u.values[0] = [p.amount / 100.0 * GRAIN_SCALE, 0.0, 0.0, 0.0];
        }
        AdjustmentParams::ChromaticAberration(p) => {
            u.values[0] = [aberration_offset(p, width) as f32, 0.0, 0.0, 0.0];
        }
        AdjustmentParams::SplitToning(p) => {
            let tone = SplitTone::new(p);
            let [hr, hg, hb] = tone.highlight;
            let [sr, sg, sb] = tone.shadow;
            u.values[0] = [hr, hg, hb, tone.highlight_strength];
            u.values[1] = [sr, sg, sb, tone.shadow_strength];
        }
        AdjustmentParams::GradientMap(p) => {
            table = GradientLut::new(&p.stops).to_table();
        }
        AdjustmentParams::ColorLookup(_) => return None,
    }

    Some(PackedAdjustment { uniforms: u, table })
}
