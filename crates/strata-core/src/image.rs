//! Raster representation for the compositing pipeline.

use image::{DynamicImage, RgbaImage};

use crate::error::CompositeError;

/// Working raster. Always stored as RGBA `f32`, display-referred, `0..=1`.
///
/// Adjustment formulas are written against 8-bit levels (`0..=255`); they
/// are evaluated on normalized values and every step clamps back into
/// `0..=1`, so a chain behaves like the same chain on an 8-bit canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major pixels.
    pub pixels: Vec<[f32; 4]>,
}

impl RasterImage {
    /// A raster filled with one color.
    pub fn filled(width: u32, height: u32, color: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Fails when `pixels` does not hold exactly `width * height` entries.
    pub fn check_len(&self) -> Result<(), CompositeError> {
        let expected = self.width as usize * self.height as usize;
        if self.pixels.len() != expected {
            return Err(CompositeError::InvalidBuffer {
                expected: expected * 4,
                actual: self.pixels.len() * 4,
            });
        }
        Ok(())
    }

    /// Build from tightly packed RGBA8 bytes.
    pub fn from_rgba8(width: u32, height: u32, data: &[u8]) -> Result<Self, CompositeError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(CompositeError::InvalidBuffer {
                expected,
                actual: data.len(),
            });
        }
        let pixels = data
            .chunks_exact(4)
            .map(|p| {
                [
                    f32::from(p[0]) / 255.0,
                    f32::from(p[1]) / 255.0,
                    f32::from(p[2]) / 255.0,
                    f32::from(p[3]) / 255.0,
                ]
            })
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Convert a decoded image. Higher bit depths keep their precision.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| [p.0[0], p.0[1], p.0[2], p.0[3]])
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Quantize to an 8-bit RGBA image.
    pub fn to_rgba8(&self) -> RgbaImage {
        let bytes: Vec<u8> = self
            .pixels
            .iter()
            .flat_map(|p| p.map(quantize))
            .collect();
        RgbaImage::from_raw(self.width, self.height, bytes)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Row-major index of `(x, y)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Pixel at `(x, y)`, or `None` outside the raster.
    pub fn get(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        (x < self.width && y < self.height).then(|| self.pixels[self.index(x, y)])
    }

    /// Pixel with coordinates clamped to the nearest edge.
    #[inline]
    pub fn sample_clamped(&self, x: i64, y: i64) -> [f32; 4] {
        let cx = x.clamp(0, i64::from(self.width) - 1) as u32;
        let cy = y.clamp(0, i64::from(self.height) - 1) as u32;
        self.pixels[self.index(cx, cy)]
    }

    /// Raw bytes of the pixel buffer, for GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Map a normalized channel to its 8-bit level.
#[inline]
pub fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as u8
}

/// Anything the compositor can read pixels from.
#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    /// An image decoded by the `image` crate.
    Decoded(&'a DynamicImage),
    /// Tightly packed RGBA8 bytes, as read back from a canvas.
    Rgba8 {
        width: u32,
        height: u32,
        data: &'a [u8],
    },
    /// An existing working raster.
    Raster(&'a RasterImage),
}

impl ImageSource<'_> {
    /// Width and height of the source.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Decoded(img) => (img.width(), img.height()),
            Self::Rgba8 { width, height, .. } => (*width, *height),
            Self::Raster(r) => (r.width, r.height),
        }
    }

    /// Convert to a working raster.
    ///
    /// A zero-area source has no drawable surface and fails with
    /// [`CompositeError::ContextUnavailable`].
    pub fn to_raster(&self) -> Result<RasterImage, CompositeError> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return Err(CompositeError::ContextUnavailable { width, height });
        }
        match self {
            Self::Decoded(img) => Ok(RasterImage::from_dynamic(img)),
            Self::Rgba8 {
                width,
                height,
                data,
            } => RasterImage::from_rgba8(*width, *height, data),
            Self::Raster(r) => {
                r.check_len()?;
                Ok((*r).clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_roundtrip_is_exact() {
        let data: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2, 255]).collect();
        let raster = RasterImage::from_rgba8(16, 16, &data).unwrap();
        assert_eq!(raster.to_rgba8().into_raw(), data);
    }

    #[test]
    fn test_rgba8_length_mismatch_is_rejected() {
        let err = RasterImage::from_rgba8(2, 2, &[0; 15]).unwrap_err();
        assert!(matches!(
            err,
            CompositeError::InvalidBuffer {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn test_zero_area_source_has_no_context() {
        let empty = RasterImage::filled(0, 4, [0.0; 4]);
        let err = ImageSource::Raster(&empty).to_raster().unwrap_err();
        assert!(matches!(err, CompositeError::ContextUnavailable { .. }));
    }

    #[test]
    fn test_sample_clamped_stays_on_edge() {
        let mut img = RasterImage::filled(3, 1, [0.0, 0.0, 0.0, 1.0]);
        img.pixels[0] = [1.0, 0.0, 0.0, 1.0];
        img.pixels[2] = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(img.sample_clamped(-5, 0), img.pixels[0]);
        assert_eq!(img.sample_clamped(10, 3), img.pixels[2]);
    }
}
