//! Raster selection masks.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::selection::path::BoundingBox;

/// 8-bit coverage mask, row-major. 255 is fully selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMask {
    pub width: u32,
    pub height: u32,
    pub alpha: Vec<u8>,
}

impl SelectionMask {
    /// Nothing selected.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alpha: vec![0; width as usize * height as usize],
        }
    }

    /// Everything selected.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alpha: vec![255; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Alpha at `(x, y)`; zero outside the mask.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x < self.width && y < self.height {
            self.alpha[self.index(x, y)]
        } else {
            0
        }
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.alpha[i] = value;
        }
    }

    /// Coverage of the pixel at a row-major index, `0..=1`.
    #[inline]
    pub fn coverage(&self, index: usize) -> f32 {
        self.alpha.get(index).map_or(0.0, |&a| f32::from(a) / 255.0)
    }

    /// Number of pixels with any coverage.
    pub fn selected_count(&self) -> usize {
        self.alpha.iter().filter(|&&a| a > 0).count()
    }

    /// Extent of the covered pixels, or `None` when nothing is selected.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.alpha[self.index(x, y)] > 0 {
                    x0 = x0.min(x);
                    y0 = y0.min(y);
                    x1 = x1.max(x);
                    y1 = y1.max(y);
                }
            }
        }
        (x0 != u32::MAX).then(|| BoundingBox {
            x: x0 as f32,
            y: y0 as f32,
            width: (x1 - x0 + 1) as f32,
            height: (y1 - y0 + 1) as f32,
        })
    }

    /// Complement of the mask.
    pub fn inverted(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            alpha: self.alpha.iter().map(|a| 255 - a).collect(),
        }
    }

    /// Soften the mask edge with repeated separable box blurs.
    ///
    /// A radius below half a pixel returns the mask unchanged.
    pub fn feathered(&self, radius: f32) -> Self {
        if radius < 0.5 || self.alpha.is_empty() {
            return self.clone();
        }
        let (w, h) = (self.width as usize, self.height as usize);
        let r = radius.round().max(1.0) as usize;
        let passes = ((radius / 2.0) as u32).max(1);
        let mut data = self.alpha.clone();

        for _ in 0..passes {
            let mut tmp = data.clone();
            for y in 0..h {
                let row = y * w;
                for x in 0..w {
                    let x0 = x.saturating_sub(r);
                    let x1 = (x + r).min(w - 1);
                    let sum: u32 = data[row + x0..=row + x1].iter().map(|&a| u32::from(a)).sum();
                    tmp[row + x] = (sum / (x1 - x0 + 1) as u32) as u8;
                }
            }
            let mut out = tmp.clone();
            for x in 0..w {
                for y in 0..h {
                    let y0 = y.saturating_sub(r);
                    let y1 = (y + r).min(h - 1);
                    let sum: u32 = (y0..=y1).map(|yi| u32::from(tmp[yi * w + x])).sum();
                    out[y * w + x] = (sum / (y1 - y0 + 1) as u32) as u8;
                }
            }
            data = out;
        }

        Self {
            width: self.width,
            height: self.height,
            alpha: data,
        }
    }

    /// Copy into an `image` grayscale buffer.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_raw(self.width, self.height, self.alpha.clone())
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_and_coverage() {
        let mut mask = SelectionMask::empty(2, 2);
        mask.set(1, 0, 255);
        assert_eq!(mask.coverage(1), 1.0);
        assert_eq!(mask.selected_count(), 1);
        let inv = mask.inverted();
        assert_eq!(inv.get(1, 0), 0);
        assert_eq!(inv.get(0, 0), 255);
        assert_eq!(inv.selected_count(), 3);
    }

    #[test]
    fn test_bounds_cover_selected_pixels() {
        let mut mask = SelectionMask::empty(10, 10);
        assert!(mask.bounds().is_none());
        mask.set(2, 3, 255);
        mask.set(5, 7, 10);
        let b = mask.bounds().unwrap();
        assert_eq!((b.x, b.y, b.width, b.height), (2.0, 3.0, 4.0, 5.0));
    }

    #[test]
    fn test_feather_softens_edges_and_keeps_flat_areas() {
        let mut mask = SelectionMask::empty(20, 1);
        for x in 10..20 {
            mask.set(x, 0, 255);
        }
        let soft = mask.feathered(2.0);
        assert_eq!(soft.get(0, 0), 0);
        assert_eq!(soft.get(19, 0), 255);
        let edge = soft.get(10, 0);
        assert!(edge > 0 && edge < 255, "edge {edge}");
        assert_eq!(mask.feathered(0.0), mask);
    }

    #[test]
    fn test_gray_image_conversion() {
        let mask = SelectionMask::full(3, 2);
        let img = mask.to_gray_image();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0[0], 255);
    }
}
