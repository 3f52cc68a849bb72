//! GPU-to-CPU image download.

use strata_core::RasterImage;
use tokio::sync::oneshot;

use crate::GpuError;
use crate::buffers::GpuImageHandle;

/// A submitted copy into a mappable staging buffer.
///
/// The map callback signals a oneshot channel; [`PendingReadback::wait`]
/// drives the device until it fires.
pub struct PendingReadback {
    staging: wgpu::Buffer,
    size: u64,
    width: u32,
    height: u32,
    mapped: oneshot::Receiver<Result<(), wgpu::BufferAsyncError>>,
}

impl PendingReadback {
    /// Record and submit the copy, then request the map.
    pub fn submit(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        handle: &GpuImageHandle,
        staging_cache: &mut Option<wgpu::Buffer>,
    ) -> Self {
        let size = handle.byte_size();
        let staging = match staging_cache.as_ref() {
            Some(buf) if buf.size() >= size => buf.clone(),
            _ => {
                let buf = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("strata_image_staging"),
                    size,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                });
                *staging_cache = Some(buf.clone());
                buf
            }
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("strata_image_download_encoder"),
        });
        encoder.copy_buffer_to_buffer(&handle.buffer, 0, &staging, 0, size);
        queue.submit(std::iter::once(encoder.finish()));

        let (tx, mapped) = oneshot::channel();
        staging
            .slice(..size)
            .map_async(wgpu::MapMode::Read, move |result| {
                // Receiver dropped means nobody wants the pixels any more.
                let _ = tx.send(result);
            });

        Self {
            staging,
            size,
            width: handle.width,
            height: handle.height,
            mapped,
        }
    }

    /// Block until the copy lands and return the pixels.
    pub fn wait(self, device: &wgpu::Device) -> Result<RasterImage, GpuError> {
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GpuError::Readback(e.to_string()))?;
        pollster::block_on(self.resolve())
    }

    /// Await the map callback and copy the pixels out.
    ///
    /// Someone must poll the device for the callback to fire.
    pub async fn resolve(self) -> Result<RasterImage, GpuError> {
        self.mapped
            .await
            .map_err(|_| GpuError::Readback("map callback dropped".into()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let slice = self.staging.slice(..self.size);
        let pixels = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, [f32; 4]>(&data).to_vec()
        };
        self.staging.unmap();

        Ok(RasterImage {
            width: self.width,
            height: self.height,
            pixels,
        })
    }
}
