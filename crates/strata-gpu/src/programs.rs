//! Lazily compiled compute programs, one per adjustment kind.
//!
//! Each kind is compiled at most once. A program that fails validation is
//! remembered as unavailable so the compositor stops asking for it and the
//! kind stays on the CPU path.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use parking_lot::RwLock;
use strata_core::AdjustmentKind;

use crate::uniforms::AdjustmentUniforms;

/// Workgroup edge length used by every program.
pub const WORKGROUP_SIZE: u32 = 8;

const COMMON: &str = include_str!("../shaders/common.wgsl");

/// Kind-specific WGSL, appended to the shared prelude.
fn program_source(kind: AdjustmentKind) -> Option<&'static str> {
    Some(match kind {
        AdjustmentKind::BrightnessContrast => include_str!("../shaders/brightness_contrast.wgsl"),
        AdjustmentKind::Levels => include_str!("../shaders/levels.wgsl"),
        AdjustmentKind::Curves => include_str!("../shaders/curves.wgsl"),
        AdjustmentKind::Hsl => include_str!("../shaders/hsl.wgsl"),
        AdjustmentKind::ColorBalance => include_str!("../shaders/color_balance.wgsl"),
        AdjustmentKind::Vibrance => include_str!("../shaders/vibrance.wgsl"),
        AdjustmentKind::Exposure => include_str!("../shaders/exposure.wgsl"),
        AdjustmentKind::TemperatureTint => include_str!("../shaders/temperature_tint.wgsl"),
        AdjustmentKind::ShadowsHighlights => include_str!("../shaders/shadows_highlights.wgsl"),
        AdjustmentKind::Sharpen => include_str!("../shaders/sharpen.wgsl"),
        AdjustmentKind::Vignette => include_str!("../shaders/vignette.wgsl"),
        AdjustmentKind::Grain => include_str!("../shaders/grain.wgsl"),
        AdjustmentKind::ChromaticAberration => {
            include_str!("../shaders/chromatic_aberration.wgsl")
        }
        AdjustmentKind::SplitToning => include_str!("../shaders/split_toning.wgsl"),
        AdjustmentKind::GradientMap => include_str!("../shaders/gradient_map.wgsl"),
        AdjustmentKind::ColorLookup => return None,
    })
}

fn storage_entry(binding: u32, read_only: bool, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(min_size),
        },
        count: None,
    }
}

/// Compiled programs plus the bind group layout they share.
pub struct ProgramCache {
    device: Arc<wgpu::Device>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    programs: RwLock<HashMap<AdjustmentKind, Option<wgpu::ComputePipeline>>>,
}

impl ProgramCache {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("strata_adjustment_layout"),
            entries: &[
                // binding 0: source pixels
                storage_entry(0, true, 16),
                // binding 1: output pixels
                storage_entry(1, false, 16),
                // binding 2: parameters
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<AdjustmentUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                // binding 3: lookup table
                storage_entry(3, true, 4),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("strata_adjustment_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            device,
            bind_group_layout,
            pipeline_layout,
            programs: RwLock::new(HashMap::new()),
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// The program for `kind`, compiling it on first use.
    pub fn get(&self, kind: AdjustmentKind) -> Option<wgpu::ComputePipeline> {
        if let Some(cached) = self.programs.read().get(&kind) {
            return cached.clone();
        }
        let mut programs = self.programs.write();
        programs
            .entry(kind)
            .or_insert_with(|| self.compile(kind))
            .clone()
    }

    /// Compile every program not yet attempted and list the kinds that
    /// have a working one.
    pub fn available_kinds(&self) -> Vec<AdjustmentKind> {
        AdjustmentKind::all()
            .iter()
            .copied()
            .filter(|kind| self.get(*kind).is_some())
            .collect()
    }

    fn compile(&self, kind: AdjustmentKind) -> Option<wgpu::ComputePipeline> {
        let body = program_source(kind)?;
        let source = format!("{COMMON}\n{body}");
        let label = format!("strata_{}", kind.label());

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&label),
                layout: Some(&self.pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            tracing::warn!(?kind, %error, "compute program failed validation; using CPU path");
            return None;
        }
        tracing::info!(?kind, "compiled compute program");
        Some(pipeline)
    }
}
