//! Sequential adjustment compositing.
//!
//! The compositor turns an [`ImageSource`] into a working raster once and
//! then applies adjustments strictly in list order, each producing a new
//! raster. A [`ShaderBackend`] is tried first for every adjustment; when it
//! has no program for that kind (absent, or failed to compile) the CPU
//! reference path in [`crate::adjust`] runs the same formula instead.

use std::time::{Duration, Instant};

use crate::adjust::{self, blend_pixel};
use crate::error::CompositeError;
use crate::image::{ImageSource, RasterImage};
use crate::layers::model::{AdjustmentLayer, BlendMode};
use crate::layers::params::{AdjustmentKind, AdjustmentParams};
use crate::selection::SelectionMask;

/// A shader-accelerated implementation of the adjustment formulas.
///
/// Implementations must agree with [`adjust::apply_cpu`] within rounding
/// tolerance and must be safe to share across threads; program caches are
/// populated once per kind and only read afterwards.
pub trait ShaderBackend: Send + Sync {
    /// Kinds for which a working program exists.
    fn supported_kinds(&self) -> Vec<AdjustmentKind>;

    /// Run one adjustment. `None` means the backend cannot run this kind
    /// and the caller should fall back to the CPU path.
    fn apply(&self, image: &RasterImage, params: &AdjustmentParams) -> Option<RasterImage>;
}

/// Result of a compositing call.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub image: RasterImage,
    /// Wall time spent converting and processing.
    pub elapsed: Duration,
    /// Adjustments executed by the shader backend.
    pub gpu_passes: usize,
    /// Adjustments executed on the CPU.
    pub cpu_passes: usize,
}

/// Stateless compositor with an optional shader backend.
pub struct Compositor {
    backend: Option<Box<dyn ShaderBackend>>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::cpu_only()
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

impl Compositor {
    /// A compositor that always uses the CPU path.
    pub fn cpu_only() -> Self {
        Self { backend: None }
    }

    /// A compositor that tries `backend` first for every adjustment.
    pub fn with_backend(backend: impl ShaderBackend + 'static) -> Self {
        Self {
            backend: Some(Box::new(backend)),
        }
    }

    /// Whether a shader backend is attached.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Kinds that currently run on the shader backend. Everything else
    /// runs on the CPU.
    pub fn gpu_supported_kinds(&self) -> Vec<AdjustmentKind> {
        let mut kinds = self
            .backend
            .as_ref()
            .map(|b| b.supported_kinds())
            .unwrap_or_default();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Apply one adjustment. Returns the result and whether the backend ran it.
    fn run(&self, image: &RasterImage, params: &AdjustmentParams) -> (RasterImage, bool) {
        if let Some(backend) = &self.backend
            && let Some(out) = backend.apply(image, params)
        {
            return (out, true);
        }
        (adjust::apply_cpu(image, params), false)
    }

    /// Apply a single adjustment to a raster.
    pub fn apply_adjustment(&self, image: &RasterImage, params: &AdjustmentParams) -> RasterImage {
        self.run(image, params).0
    }

    /// Apply adjustments to `source` sequentially, in list order.
    pub fn process_image(
        &self,
        source: ImageSource<'_>,
        adjustments: &[AdjustmentParams],
    ) -> Result<ProcessOutput, CompositeError> {
        let start = Instant::now();
        let mut image = source.to_raster()?;
        let (mut gpu_passes, mut cpu_passes) = (0, 0);

        for params in adjustments {
            let (next, on_gpu) = self.run(&image, params);
            if on_gpu {
                gpu_passes += 1;
            } else {
                cpu_passes += 1;
            }
            tracing::trace!(kind = ?params.kind(), on_gpu, "adjustment pass");
            image = next;
        }

        let elapsed = start.elapsed();
        tracing::debug!(
            width = image.width,
            height = image.height,
            gpu_passes,
            cpu_passes,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "processed image"
        );
        Ok(ProcessOutput {
            image,
            elapsed,
            gpu_passes,
            cpu_passes,
        })
    }

    /// Composite layers over `source`.
    ///
    /// Active layers run in ascending `order`. Each layer's adjustment is
    /// applied to the running image and the result is blended back over it
    /// with the layer's blend mode and opacity. A layer with an enabled mask
    /// is further weighted by `selection` (inverted and feathered per the
    /// layer mask); without a selection the mask is ignored.
    pub fn composite_layers(
        &self,
        source: ImageSource<'_>,
        layers: &[AdjustmentLayer],
        selection: Option<&SelectionMask>,
    ) -> Result<ProcessOutput, CompositeError> {
        let start = Instant::now();
        let mut image = source.to_raster()?;
        if let Some(mask) = selection
            && (mask.width, mask.height) != (image.width, image.height)
        {
            return Err(CompositeError::DimensionMismatch {
                base: (image.width, image.height),
                overlay: (mask.width, mask.height),
            });
        }

        let mut active: Vec<&AdjustmentLayer> = layers.iter().filter(|l| l.is_active()).collect();
        active.sort_by_key(|l| l.order);

        let (mut gpu_passes, mut cpu_passes) = (0, 0);
        for layer in active {
            let (adjusted, on_gpu) = self.run(&image, &layer.params);
            if on_gpu {
                gpu_passes += 1;
            } else {
                cpu_passes += 1;
            }

            let opacity = (layer.opacity / 100.0).clamp(0.0, 1.0);
            let layer_mask = match (layer.mask, selection) {
                (Some(m), Some(sel)) if m.enabled => {
                    let mut mask = sel.feathered(m.feather);
                    if m.inverted {
                        mask = mask.inverted();
                    }
                    Some(mask)
                }
                _ => None,
            };

            image = match layer_mask {
                None if layer.blend_mode == BlendMode::Normal && opacity >= 1.0 => adjusted,
                None => blend_weighted(&image, &adjusted, layer.blend_mode, |_| opacity),
                Some(mask) => blend_weighted(&image, &adjusted, layer.blend_mode, |i| {
                    opacity * mask.coverage(i)
                }),
            };
        }

        Ok(ProcessOutput {
            image,
            elapsed: start.elapsed(),
            gpu_passes,
            cpu_passes,
        })
    }

    /// Combine two rasters under a blend mode and `0..=100` opacity.
    pub fn apply_blend_mode(
        &self,
        base: &RasterImage,
        overlay: &RasterImage,
        mode: BlendMode,
        opacity: f32,
    ) -> Result<RasterImage, CompositeError> {
        adjust::apply_blend_mode(base, overlay, mode, opacity)
    }
}

fn blend_weighted(
    base: &RasterImage,
    overlay: &RasterImage,
    mode: BlendMode,
    weight: impl Fn(usize) -> f32,
) -> RasterImage {
    let pixels = base
        .pixels
        .iter()
        .zip(&overlay.pixels)
        .enumerate()
        .map(|(i, (b, o))| blend_pixel(*b, *o, mode, weight(i)))
        .collect();
    RasterImage {
        width: base.width,
        height: base.height,
        pixels,
    }
}
