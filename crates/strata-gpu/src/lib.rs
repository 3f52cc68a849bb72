//! Strata GPU: wgpu compute backend for the adjustment compositor.
//!
//! This crate owns all GPU resources. It implements
//! [`strata_core::ShaderBackend`] with one compute program per adjustment
//! kind; kinds without a working program fall back to the core crate's CPU
//! path.

pub mod buffers;
pub mod compositor;
pub mod programs;
pub mod readback;
pub mod uniforms;

pub use compositor::GpuCompositor;

use strata_core::AdjustmentKind;

/// Device features the compute programs rely on.
pub fn required_features() -> wgpu::Features {
    wgpu::Features::empty()
}

/// Errors from GPU setup and execution.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("failed to create GPU device: {0}")]
    RequestDevice(String),

    #[error("no compute program available for {0:?}")]
    ProgramUnavailable(AdjustmentKind),

    #[error("GPU readback failed: {0}")]
    Readback(String),
}
