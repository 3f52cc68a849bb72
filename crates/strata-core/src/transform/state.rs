//! Affine transform state, crop rectangle, and matrix composition.
//!
//! Angles are degrees. Coordinates are image pixels with +y down, so a
//! positive rotation turns +x toward +y.

use glam::{Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Decomposed affine transform of the working image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    /// Clamped to the configured skew limit.
    pub skew_x: f32,
    /// Clamped to the configured skew limit.
    pub skew_y: f32,
    /// Pivot as a fraction of the image width, `0..=1`.
    pub origin_x: f32,
    /// Pivot as a fraction of the image height, `0..=1`.
    pub origin_y: f32,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            origin_x: 0.5,
            origin_y: 0.5,
        }
    }
}

impl TransformState {
    /// Whether this is the identity transform (pivot ignored).
    pub fn is_identity(&self) -> bool {
        self.translate_x == 0.0
            && self.translate_y == 0.0
            && self.scale_x == 1.0
            && self.scale_y == 1.0
            && self.rotation == 0.0
            && self.skew_x == 0.0
            && self.skew_y == 0.0
    }

    /// Pivot in image pixels.
    pub fn pivot(&self, bounds: &ImageBounds) -> Vec2 {
        Vec2::new(
            bounds.x + self.origin_x * bounds.width,
            bounds.y + self.origin_y * bounds.height,
        )
    }

    /// Compose the transform matrix.
    ///
    /// ```text
    /// M = T(translate) · T(pivot) · R(rotation) · SkewX · SkewY · S(scale) · T(−pivot)
    /// ```
    pub fn matrix(&self, bounds: &ImageBounds) -> Mat3 {
        let pivot = self.pivot(bounds);
        let translate = Mat3::from_translation(Vec2::new(self.translate_x, self.translate_y));
        let rotate = Mat3::from_angle(self.rotation.to_radians());
        let skew_x = Mat3::from_cols(
            Vec3::X,
            Vec3::new(self.skew_x.to_radians().tan(), 1.0, 0.0),
            Vec3::Z,
        );
        let skew_y = Mat3::from_cols(
            Vec3::new(1.0, self.skew_y.to_radians().tan(), 0.0),
            Vec3::Y,
            Vec3::Z,
        );
        let scale = Mat3::from_scale(Vec2::new(self.scale_x, self.scale_y));

        translate
            * Mat3::from_translation(pivot)
            * rotate
            * skew_x
            * skew_y
            * scale
            * Mat3::from_translation(-pivot)
    }
}

/// Extent of the working image, in pixels of the original image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ImageBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Corners clockwise from the top left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.x, self.y),
            Vec2::new(self.right(), self.y),
            Vec2::new(self.right(), self.bottom()),
            Vec2::new(self.x, self.bottom()),
        ]
    }
}

/// Crop rectangle with optional fixed aspect ratio (width / height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f32>,
}

impl CropRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            aspect_ratio: None,
        }
    }

    /// Covers the whole of `bounds`.
    pub fn full(bounds: &ImageBounds) -> Self {
        Self::new(bounds.x, bounds.y, bounds.width, bounds.height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Fit inside `bounds`.
    ///
    /// Size is held at or above `min_size` (or the bounds, if smaller) and
    /// the aspect ratio, when set, recomputes height from width. The
    /// minimum size takes precedence over the ratio. Position
    /// is then shifted so the rect lies entirely within the bounds.
    pub fn clamped(&self, bounds: &ImageBounds, min_size: f32) -> Self {
        let min_w = min_size.min(bounds.width);
        let min_h = min_size.min(bounds.height);
        let mut width = self.width.abs().clamp(min_w, bounds.width);
        let mut height = self.height.abs().clamp(min_h, bounds.height);

        if let Some(ratio) = self.aspect_ratio.filter(|r| *r > 0.0) {
            height = width / ratio;
            if height > bounds.height {
                height = bounds.height;
                width = height * ratio;
            }
            // Minimum size wins over the ratio when both cannot hold.
            if height < min_h {
                height = min_h;
                width = height * ratio;
            }
            if width < min_w {
                width = min_w;
                height = width / ratio;
            }
            width = width.clamp(min_w, bounds.width);
            height = height.clamp(min_h, bounds.height);
        }

        let x = self.x.clamp(bounds.x, (bounds.right() - width).max(bounds.x));
        let y = self.y.clamp(bounds.y, (bounds.bottom() - height).max(bounds.y));
        Self {
            x,
            y,
            width,
            height,
            aspect_ratio: self.aspect_ratio,
        }
    }

    /// Whether the rect lies within `bounds`, allowing float slack.
    pub fn is_within(&self, bounds: &ImageBounds) -> bool {
        const SLACK: f32 = 1e-3;
        self.x >= bounds.x - SLACK
            && self.y >= bounds.y - SLACK
            && self.right() <= bounds.right() + SLACK
            && self.bottom() <= bounds.bottom() + SLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn assert_vec_eq(a: Vec2, b: Vec2) {
        assert!((a - b).length() < EPSILON, "{a:?} vs {b:?}");
    }

    #[test]
    fn test_identity_matrix() {
        let bounds = ImageBounds::new(100.0, 50.0);
        let m = TransformState::default().matrix(&bounds);
        assert_vec_eq(m.transform_point2(Vec2::new(12.0, 34.0)), Vec2::new(12.0, 34.0));
    }

    #[test]
    fn test_rotation_applies_after_scale_about_pivot() {
        let bounds = ImageBounds::new(100.0, 100.0);
        let state = TransformState {
            rotation: 90.0,
            scale_x: 2.0,
            scale_y: 1.0,
            ..TransformState::default()
        };
        let m = state.matrix(&bounds);
        // (60, 50) is 10px right of the pivot: scaled to 20px, then turned
        // onto +y.
        assert_vec_eq(m.transform_point2(Vec2::new(60.0, 50.0)), Vec2::new(50.0, 70.0));
        // Pivot is fixed.
        assert_vec_eq(m.transform_point2(Vec2::new(50.0, 50.0)), Vec2::new(50.0, 50.0));
    }

    #[test]
    fn test_translation_is_outermost() {
        let bounds = ImageBounds::new(10.0, 10.0);
        let state = TransformState {
            translate_x: 5.0,
            translate_y: -3.0,
            scale_x: 3.0,
            ..TransformState::default()
        };
        let m = state.matrix(&bounds);
        assert_vec_eq(m.transform_point2(Vec2::new(5.0, 5.0)), Vec2::new(10.0, 2.0));
    }

    #[test]
    fn test_skew_x_shears_horizontally() {
        let bounds = ImageBounds::new(10.0, 10.0);
        let state = TransformState {
            skew_x: 45.0,
            origin_x: 0.0,
            origin_y: 0.0,
            ..TransformState::default()
        };
        let m = state.matrix(&bounds);
        assert_vec_eq(m.transform_point2(Vec2::new(0.0, 4.0)), Vec2::new(4.0, 4.0));
    }

    #[test]
    fn test_crop_clamps_oversized_and_outside_rects() {
        let bounds = ImageBounds::new(200.0, 100.0);
        let big = CropRect::new(-50.0, -50.0, 1000.0, 1000.0).clamped(&bounds, 10.0);
        assert_eq!(big, CropRect::new(0.0, 0.0, 200.0, 100.0));

        let outside = CropRect::new(500.0, 300.0, 50.0, 20.0).clamped(&bounds, 10.0);
        assert!(outside.is_within(&bounds), "{outside:?}");
        assert_eq!((outside.width, outside.height), (50.0, 20.0));

        let tiny = CropRect::new(10.0, 10.0, 2.0, 2.0).clamped(&bounds, 10.0);
        assert_eq!((tiny.width, tiny.height), (10.0, 10.0));
    }

    #[test]
    fn test_crop_keeps_aspect_ratio() {
        let bounds = ImageBounds::new(200.0, 100.0);
        let rect = CropRect {
            aspect_ratio: Some(2.0),
            ..CropRect::new(0.0, 0.0, 80.0, 10.0)
        };
        let c = rect.clamped(&bounds, 10.0);
        assert_eq!((c.width, c.height), (80.0, 40.0));

        let wide = CropRect {
            aspect_ratio: Some(1.0),
            ..CropRect::new(0.0, 0.0, 180.0, 10.0)
        }
        .clamped(&bounds, 10.0);
        assert_eq!((wide.width, wide.height), (100.0, 100.0));
        assert!(wide.is_within(&bounds));
    }

    #[test]
    fn test_crop_with_ratio_keeps_minimum_size() {
        let bounds = ImageBounds::new(200.0, 100.0);
        let flat = CropRect {
            aspect_ratio: Some(8.0),
            ..CropRect::new(0.0, 0.0, 40.0, 40.0)
        }
        .clamped(&bounds, 10.0);
        assert_eq!((flat.width, flat.height), (80.0, 10.0));

        // Ratio cannot hold inside the bounds at the minimum height.
        let extreme = CropRect {
            aspect_ratio: Some(100.0),
            ..CropRect::new(0.0, 0.0, 100.0, 100.0)
        }
        .clamped(&bounds, 10.0);
        assert_eq!((extreme.width, extreme.height), (200.0, 10.0));
        assert!(extreme.is_within(&bounds));
    }
}
