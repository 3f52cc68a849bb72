//! Magic wand region growing.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::image::{RasterImage, quantize};
use crate::selection::mask::SelectionMask;

/// Magic wand settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WandOptions {
    /// Largest Euclidean RGB distance (8-bit levels) still admitted.
    pub tolerance: f32,
    /// Grow from the seed through 4-connected neighbors instead of scanning
    /// the whole image.
    pub contiguous: bool,
}

impl Default for WandOptions {
    fn default() -> Self {
        Self {
            tolerance: 32.0,
            contiguous: true,
        }
    }
}

/// Selected pixels and their binary mask.
#[derive(Debug, Clone, PartialEq)]
pub struct WandRegion {
    pub pixels: Vec<(u32, u32)>,
    pub mask: SelectionMask,
}

fn levels(px: [f32; 4]) -> [i32; 3] {
    [
        i32::from(quantize(px[0])),
        i32::from(quantize(px[1])),
        i32::from(quantize(px[2])),
    ]
}

#[inline]
fn within(a: [i32; 3], b: [i32; 3], tolerance_sq: f32) -> bool {
    let d: i32 = (0..3).map(|c| (a[c] - b[c]).pow(2)).sum();
    d as f32 <= tolerance_sq
}

/// Select pixels whose color is within `tolerance` of the seed pixel.
///
/// The seed must lie inside the image.
pub fn magic_wand(image: &RasterImage, seed: (u32, u32), options: &WandOptions) -> WandRegion {
    let (w, h) = (image.width, image.height);
    let mut mask = SelectionMask::empty(w, h);
    let mut pixels = Vec::new();
    let Some(seed_px) = image.get(seed.0, seed.1) else {
        return WandRegion { pixels, mask };
    };

    let target = levels(seed_px);
    let tolerance = options.tolerance.max(0.0);
    let tolerance_sq = tolerance * tolerance;
    let matches = |x: u32, y: u32| within(levels(image.pixels[image.index(x, y)]), target, tolerance_sq);

    if !options.contiguous {
        for y in 0..h {
            for x in 0..w {
                if matches(x, y) {
                    mask.set(x, y, 255);
                    pixels.push((x, y));
                }
            }
        }
        return WandRegion { pixels, mask };
    }

    let mut visited = vec![false; w as usize * h as usize];
    let mut queue = VecDeque::new();
    visited[image.index(seed.0, seed.1)] = true;
    queue.push_back(seed);

    while let Some((x, y)) = queue.pop_front() {
        mask.set(x, y, 255);
        pixels.push((x, y));

        let neighbors = [
            (x.checked_sub(1), Some(y)),
            (x.checked_add(1), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), y.checked_add(1)),
        ];
        for (nx, ny) in neighbors {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            if nx >= w || ny >= h {
                continue;
            }
            let vi = image.index(nx, ny);
            if visited[vi] {
                continue;
            }
            visited[vi] = true;
            if matches(nx, ny) {
                queue.push_back((nx, ny));
            }
        }
    }

    WandRegion { pixels, mask }
}
