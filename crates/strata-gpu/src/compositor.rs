//! wgpu implementation of the compositor's shader backend.

use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::{AdjustmentKind, AdjustmentParams, RasterImage, ShaderBackend};

use crate::GpuError;
use crate::buffers::{AdjustmentBuffers, GpuImageHandle};
use crate::programs::{ProgramCache, WORKGROUP_SIZE};
use crate::readback::PendingReadback;
use crate::uniforms::{self, PackedAdjustment};

/// Runs adjustments as compute passes on a wgpu device.
///
/// Dispatches are serialized; each uploads the source, runs one program,
/// and reads the result back before returning.
pub struct GpuCompositor {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    programs: ProgramCache,
    /// Reused download buffer. Locked for the whole dispatch.
    staging: Mutex<Option<wgpu::Buffer>>,
}

impl GpuCompositor {
    /// Wrap an existing device and queue.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let programs = ProgramCache::new(device.clone());
        Self {
            device,
            queue,
            programs,
            staging: Mutex::new(None),
        }
    }

    /// Create a device on the default adapter.
    pub async fn request() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;
        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "using GPU adapter");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("strata_device"),
                required_features: crate::required_features(),
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await
            .map_err(|e| GpuError::RequestDevice(e.to_string()))?;

        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    /// Blocking form of [`GpuCompositor::request`].
    pub fn request_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::request())
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Run one adjustment on the GPU.
    pub fn run(
        &self,
        image: &RasterImage,
        params: &AdjustmentParams,
    ) -> Result<RasterImage, GpuError> {
        let kind = params.kind();
        let packed = uniforms::pack(params, image.width, image.height)
            .ok_or(GpuError::ProgramUnavailable(kind))?;
        let pipeline = self
            .programs
            .get(kind)
            .ok_or(GpuError::ProgramUnavailable(kind))?;
        self.dispatch(image, &pipeline, &packed)
    }

    fn dispatch(
        &self,
        image: &RasterImage,
        pipeline: &wgpu::ComputePipeline,
        packed: &PackedAdjustment,
    ) -> Result<RasterImage, GpuError> {
        let mut staging = self.staging.lock();

        let source = GpuImageHandle::upload(&self.device, image);
        let output = GpuImageHandle::create_output(&self.device, image.width, image.height);
        let params = AdjustmentBuffers::new(&self.device, &packed.uniforms, &packed.table);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("strata_adjustment_bind_group"),
            layout: self.programs.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: source.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.table.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strata_adjustment_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("strata_adjustment_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                image.width.div_ceil(WORKGROUP_SIZE),
                image.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        PendingReadback::submit(&self.device, &self.queue, &output, &mut staging)
            .wait(&self.device)
    }
}

impl ShaderBackend for GpuCompositor {
    fn supported_kinds(&self) -> Vec<AdjustmentKind> {
        self.programs.available_kinds()
    }

    fn apply(&self, image: &RasterImage, params: &AdjustmentParams) -> Option<RasterImage> {
        if image.pixels.is_empty() {
            return None;
        }
        match self.run(image, params) {
            Ok(out) => Some(out),
            Err(GpuError::ProgramUnavailable(_)) => None,
            Err(e) => {
                tracing::warn!(kind = ?params.kind(), error = %e, "GPU pass failed; using CPU path");
                None
            }
        }
    }
}
