//! GPU buffer management for the adjustment programs.

use strata_core::RasterImage;
use wgpu::util::DeviceExt;

use crate::uniforms::AdjustmentUniforms;

/// Bytes per pixel (4 × f32).
const PIXEL_BYTES: u64 = 16;

/// Handle to a GPU image stored as a storage buffer of `vec4<f32>`.
pub struct GpuImageHandle {
    pub buffer: wgpu::Buffer,
    pub width: u32,
    pub height: u32,
}

impl GpuImageHandle {
    /// Upload a [`RasterImage`] to the GPU as a storage buffer.
    pub fn upload(device: &wgpu::Device, image: &RasterImage) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("strata_image_upload"),
            contents: image.as_bytes(),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            buffer,
            width: image.width,
            height: image.height,
        }
    }

    /// Create an uninitialized GPU image buffer for output.
    pub fn create_output(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("strata_image_output"),
            size: u64::from(width) * u64::from(height) * PIXEL_BYTES,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            width,
            height,
        }
    }

    /// Pixel count.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Buffer size in bytes.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * PIXEL_BYTES
    }
}

/// Per-dispatch parameter buffers.
pub struct AdjustmentBuffers {
    pub uniforms: wgpu::Buffer,
    pub table: wgpu::Buffer,
}

impl AdjustmentBuffers {
    pub fn new(device: &wgpu::Device, uniforms: &AdjustmentUniforms, table: &[f32]) -> Self {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("strata_adjustment_uniforms"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let table = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("strata_adjustment_table"),
            contents: bytemuck::cast_slice(table),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        Self { uniforms, table }
    }
}
