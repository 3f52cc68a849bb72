//! Selection geometry: bounding boxes, vector paths, and hit-testing.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::SelectionError;
use crate::selection::mask::SelectionMask;

/// Axis-aligned rectangle in image pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corners, in any order.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// Extent of a point set. Empty input gives the zero box.
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (min, max) = points
            .iter()
            .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Self::from_corners(min, max)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn union(&self, other: &Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Overlap of two boxes, or `None` when they do not overlap.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        (r > x && b > y).then(|| Self::new(x, y, r - x, b - y))
    }

    /// Grow by `amount` on every side; negative shrinks, never below zero
    /// size.
    pub fn expand(&self, amount: f32) -> Self {
        let width = (self.width + 2.0 * amount).max(0.0);
        let height = (self.height + 2.0 * amount).max(0.0);
        let c = self.center();
        Self::new(c.x - width * 0.5, c.y - height * 0.5, width, height)
    }
}

/// Geometry of one selection path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum PathShape {
    Rect,
    /// Sampled as a polygon for rendering; hit-tested analytically.
    Ellipse,
    Polygon,
    /// Pixel region produced by the magic wand.
    Raster { mask: SelectionMask },
}

/// One path of a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionPath {
    pub shape: PathShape,
    /// Outline vertices. Rectangles list their four corners; raster
    /// paths list the corners of their bounds.
    pub points: Vec<Vec2>,
    pub bounds: BoundingBox,
    /// Removes area from the selection instead of adding it.
    #[serde(default)]
    pub subtractive: bool,
}

impl SelectionPath {
    /// Rectangle between two corners.
    pub fn rect(a: Vec2, b: Vec2) -> Self {
        let bounds = BoundingBox::from_corners(a, b);
        Self {
            shape: PathShape::Rect,
            points: corners(&bounds),
            bounds,
            subtractive: false,
        }
    }

    /// Ellipse inscribed in the rectangle between two corners, sampled
    /// with `samples` vertices.
    pub fn ellipse(a: Vec2, b: Vec2, samples: usize) -> Self {
        let bounds = BoundingBox::from_corners(a, b);
        let c = bounds.center();
        let (rx, ry) = (bounds.width * 0.5, bounds.height * 0.5);
        let n = samples.max(3);
        let points = (0..n)
            .map(|i| {
                let t = i as f32 / n as f32 * std::f32::consts::TAU;
                Vec2::new(c.x + rx * t.cos(), c.y + ry * t.sin())
            })
            .collect();
        Self {
            shape: PathShape::Ellipse,
            points,
            bounds,
            subtractive: false,
        }
    }

    /// Closed polygon through `points`.
    pub fn polygon(points: Vec<Vec2>) -> Result<Self, SelectionError> {
        if points.len() < 3 {
            return Err(SelectionError::InsufficientPoints(points.len()));
        }
        Ok(Self {
            shape: PathShape::Polygon,
            bounds: BoundingBox::from_points(&points),
            points,
            subtractive: false,
        })
    }

    /// Pixel region. `None` when the mask selects nothing.
    pub fn raster(mask: SelectionMask) -> Option<Self> {
        let bounds = mask.bounds()?;
        Some(Self {
            shape: PathShape::Raster { mask },
            points: corners(&bounds),
            bounds,
            subtractive: false,
        })
    }

    /// Whether `p` lies inside this path's own geometry, ignoring the
    /// subtractive flag.
    pub fn contains(&self, p: Vec2) -> bool {
        if !self.bounds.contains(p) {
            return false;
        }
        match &self.shape {
            PathShape::Rect => true,
            PathShape::Ellipse => point_in_ellipse(p, &self.bounds),
            PathShape::Polygon => point_in_polygon(p, &self.points),
            PathShape::Raster { mask } => {
                p.x >= 0.0 && p.y >= 0.0 && mask.get(p.x as u32, p.y as u32) >= 128
            }
        }
    }
}

fn corners(b: &BoundingBox) -> Vec<Vec2> {
    vec![
        Vec2::new(b.x, b.y),
        Vec2::new(b.right(), b.y),
        Vec2::new(b.right(), b.bottom()),
        Vec2::new(b.x, b.bottom()),
    ]
}

/// Normalized quadratic form `((x−cx)/rx)² + ((y−cy)/ry)² ≤ 1`.
pub fn point_in_ellipse(p: Vec2, bounds: &BoundingBox) -> bool {
    let rx = bounds.width * 0.5;
    let ry = bounds.height * 0.5;
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    let c = bounds.center();
    let dx = (p.x - c.x) / rx;
    let dy = (p.y - c.y) / ry;
    dx * dx + dy * dy <= 1.0
}

/// Even-odd ray casting.
pub fn point_in_polygon(p: Vec2, points: &[Vec2]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (points[i], points[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}
