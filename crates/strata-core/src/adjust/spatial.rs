//! Adjustments that read neighboring pixels or pixel position (sharpen,
//! vignette, grain, chromatic aberration). Alpha always passes through.

use crate::image::RasterImage;
use crate::layers::params::{ChromaticAberrationParams, GrainParams, SharpenParams, VignetteParams};

/// Peak grain offset (normalized) at amount 100.
pub const GRAIN_SCALE: f32 = 0.5;

/// 3×3 unsharp kernel, row-major.
pub const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Hermite ramp between two edges. Degenerates to a step when the edges meet.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Convolve with [`SHARPEN_KERNEL`] and blend with the original by
/// `amount / 100`. Edges sample the nearest pixel.
pub fn sharpen(image: &RasterImage, p: &SharpenParams) -> RasterImage {
    let amount = p.amount / 100.0;
    if amount.abs() < 1e-7 {
        return image.clone();
    }

    let mut out = image.clone();
    for y in 0..image.height {
        for x in 0..image.width {
            let (xi, yi) = (i64::from(x), i64::from(y));
            let mut acc = [0.0_f32; 3];
            for ky in 0..3_i64 {
                for kx in 0..3_i64 {
                    let weight = SHARPEN_KERNEL[(ky * 3 + kx) as usize];
                    if weight == 0.0 {
                        continue;
                    }
                    let px = image.sample_clamped(xi + kx - 1, yi + ky - 1);
                    for c in 0..3 {
                        acc[c] += px[c] * weight;
                    }
                }
            }
            let idx = image.index(x, y);
            let orig = image.pixels[idx];
            for c in 0..3 {
                out.pixels[idx][c] = orig[c] + (acc[c] - orig[c]) * amount;
            }
        }
    }
    out
}

/// Multiplicative darkening factor of the vignette at a pixel.
///
/// Distance is measured from the image center in half-extent units, with
/// the horizontal axis stretched by roundness.
#[inline]
pub fn vignette_factor(x: u32, y: u32, width: u32, height: u32, p: &VignetteParams) -> f32 {
    let cx = width as f32 * 0.5;
    let cy = height as f32 * 0.5;
    let stretch = 1.0 + p.roundness / 200.0;
    let dx = (x as f32 + 0.5 - cx) / cx * stretch;
    let dy = (y as f32 + 0.5 - cy) / cy;
    let dist = (dx * dx + dy * dy).sqrt();

    let mid = p.midpoint / 100.0;
    let half_feather = p.feather / 100.0 * 0.5;
    let t = smoothstep(mid - half_feather, mid + half_feather, dist);
    1.0 - p.amount / 100.0 * t
}

/// Radial vignette.
pub fn vignette(image: &RasterImage, p: &VignetteParams) -> RasterImage {
    if p.amount.abs() < 1e-7 {
        return image.clone();
    }
    let mut out = image.clone();
    for y in 0..image.height {
        for x in 0..image.width {
            let factor = vignette_factor(x, y, image.width, image.height, p);
            let px = &mut out.pixels[image.index(x, y)];
            for c in 0..3 {
                px[c] *= factor;
            }
        }
    }
    out
}

/// Integer avalanche hash (lowbias32). The GPU program uses the same
/// constants, so both paths draw identical noise.
#[inline]
pub fn grain_hash(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// Uniform noise in `[-0.5, 0.5)` for one pixel channel.
#[inline]
pub fn grain_noise(seed: u32, pixel: u32, channel: u32) -> f32 {
    let h = grain_hash(seed ^ grain_hash(pixel.wrapping_mul(4).wrapping_add(channel)));
    (h >> 8) as f32 / 16_777_216.0 - 0.5
}

/// Additive uniform noise, shared across channels when monochromatic.
pub fn grain(image: &RasterImage, p: &GrainParams) -> RasterImage {
    let strength = p.amount / 100.0 * GRAIN_SCALE;
    if strength.abs() < 1e-7 {
        return image.clone();
    }
    let mut out = image.clone();
    for (i, px) in out.pixels.iter_mut().enumerate() {
        let pixel = i as u32;
        for c in 0..3 {
            let channel = if p.monochromatic { 0 } else { c as u32 };
            px[c] += grain_noise(p.seed, pixel, channel) * strength;
        }
    }
    out
}

/// Lateral channel offset in whole pixels, limited to the image width.
/// Any larger shift samples the edge column just the same.
#[inline]
pub fn aberration_offset(p: &ChromaticAberrationParams, width: u32) -> i64 {
    let limit = i64::from(width);
    (p.amount.round() as i64).clamp(-limit, limit)
}

/// Red is sampled `offset` pixels to the left (image moves right), blue
/// `offset` pixels to the right. Green and alpha stay put.
pub fn chromatic_aberration(image: &RasterImage, p: &ChromaticAberrationParams) -> RasterImage {
    let offset = aberration_offset(p, image.width);
    if offset == 0 {
        return image.clone();
    }
    let mut out = image.clone();
    for y in 0..image.height {
        for x in 0..image.width {
            let (xi, yi) = (i64::from(x), i64::from(y));
            let idx = image.index(x, y);
            out.pixels[idx][0] = image.sample_clamped(xi - offset, yi)[0];
            out.pixels[idx][2] = image.sample_clamped(xi + offset, yi)[2];
        }
    }
    out
}
