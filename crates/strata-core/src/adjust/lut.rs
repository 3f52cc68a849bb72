//! 256-entry lookup tables for curves and gradient maps.
//!
//! Tables are indexed by 8-bit level. Both the CPU path and the GPU
//! programs read the same baked tables, so the two paths agree exactly
//! on table-driven adjustments.
//!
//! # Complexity
//! - Bake: O(log N) segment search per entry, 256 entries
//! - Lookup: O(1)

use crate::layers::params::{CurvePoint, CurvesParams, GradientStop};

/// Entries per table.
pub const LUT_SIZE: usize = 256;

/// 8-bit level of a normalized value, used as the table index.
#[inline]
pub fn lut_index(v: f32) -> usize {
    ((v.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as usize).min(LUT_SIZE - 1)
}

/// One tone table. Entries are normalized output values.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneLut(pub [f32; LUT_SIZE]);

impl ToneLut {
    /// Maps every level to itself.
    pub fn identity() -> Self {
        Self(std::array::from_fn(|i| i as f32 / 255.0))
    }

    /// Bake a curve by linear interpolation between control points.
    ///
    /// Points are sorted by `x` first. Levels left of the first point take
    /// its `y`, levels right of the last point take the last `y`. Fewer
    /// than two points produce the identity table.
    pub fn from_points(points: &[CurvePoint]) -> Self {
        if points.len() < 2 {
            return Self::identity();
        }
        let mut pts = points.to_vec();
        pts.sort_by(|a, b| a.x.total_cmp(&b.x));

        Self(std::array::from_fn(|i| {
            evaluate_linear(&pts, i as f32).clamp(0.0, 255.0) / 255.0
        }))
    }

    /// Look up a normalized value.
    #[inline]
    pub fn lookup(&self, v: f32) -> f32 {
        self.0[lut_index(v)]
    }
}

/// Piecewise-linear evaluation over points sorted by `x`.
fn evaluate_linear(pts: &[CurvePoint], x: f32) -> f32 {
    let first = pts[0];
    let last = pts[pts.len() - 1];
    if x <= first.x {
        return first.y;
    }
    if x >= last.x {
        return last.y;
    }

    // Binary search for the segment containing x
    let mut lo = 0;
    let mut hi = pts.len() - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if pts[mid].x <= x {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let p1 = pts[lo];
    let p2 = pts[hi];
    let span = p2.x - p1.x;
    if span.abs() < 1e-6 {
        return p2.y;
    }
    p1.y + (p2.y - p1.y) * (x - p1.x) / span
}

/// Master curve plus one curve per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvesLut {
    pub master: ToneLut,
    pub red: ToneLut,
    pub green: ToneLut,
    pub blue: ToneLut,
}

impl CurvesLut {
    /// Bake all four curves.
    pub fn new(params: &CurvesParams) -> Self {
        Self {
            master: ToneLut::from_points(&params.rgb),
            red: ToneLut::from_points(&params.red),
            green: ToneLut::from_points(&params.green),
            blue: ToneLut::from_points(&params.blue),
        }
    }

    /// `channel = channel_lut[master_lut[in]]`.
    #[inline]
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        [
            self.red.lookup(self.master.lookup(rgb[0])),
            self.green.lookup(self.master.lookup(rgb[1])),
            self.blue.lookup(self.master.lookup(rgb[2])),
        ]
    }

    /// Flat table in `[master, red, green, blue]` order for GPU upload.
    pub fn to_table(&self) -> Vec<f32> {
        [&self.master, &self.red, &self.green, &self.blue]
            .iter()
            .flat_map(|lut| lut.0)
            .collect()
    }
}

/// Luminance-indexed color table.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientLut(pub [[f32; 3]; LUT_SIZE]);

impl GradientLut {
    /// Bake a gradient by linear color interpolation between sorted stops.
    ///
    /// No stops produce a black-to-white ramp; one stop is a flat color.
    pub fn new(stops: &[GradientStop]) -> Self {
        let mut sorted = stops.to_vec();
        sorted.sort_by(|a, b| a.position.total_cmp(&b.position));

        Self(std::array::from_fn(|i| {
            let t = i as f32 / 255.0;
            gradient_color(&sorted, t)
        }))
    }

    /// Color for a normalized luminance.
    #[inline]
    pub fn lookup(&self, luma: f32) -> [f32; 3] {
        self.0[lut_index(luma)]
    }

    /// Flat RGBA-strided table for GPU upload.
    pub fn to_table(&self) -> Vec<f32> {
        self.0
            .iter()
            .flat_map(|c| [c[0], c[1], c[2], 0.0])
            .collect()
    }
}

fn gradient_color(stops: &[GradientStop], t: f32) -> [f32; 3] {
    let Some(first) = stops.first() else {
        return [t, t, t];
    };
    let last = stops[stops.len() - 1];
    if t <= first.position {
        return first.color;
    }
    if t >= last.position {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t >= a.position && t <= b.position {
            let span = b.position - a.position;
            if span.abs() < 1e-6 {
                return b.color;
            }
            let f = (t - a.position) / span;
            return [
                a.color[0] + (b.color[0] - a.color[0]) * f,
                a.color[1] + (b.color[1] - a.color[1]) * f,
                a.color[2] + (b.color[2] - a.color[2]) * f,
            ];
        }
    }
    last.color
}
