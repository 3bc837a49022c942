use crate::compile::{AdaptedProgram, ProgramError};
use crate::uniforms::{resolve_uniforms, SamplerSlot};

use super::geometry::{quad_attributes, QUAD_STRIDE};

pub(crate) fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("uniform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Linked program: both modules plus the render pipeline built from them.
pub(crate) struct ShaderPipeline {
    pub pipeline: wgpu::RenderPipeline,
    /// Whether the vertex stage reads positions from the quad buffer.
    pub uses_quad_buffer: bool,
    /// Set index of the palette bind group, if the program samples `colors`.
    pub palette_group: Option<u32>,
}

/// Layouts in set order. The palette set only exists when the program
/// declared the palette sampler.
fn bind_group_layouts<'a, L>(
    uniform: &'a L,
    palette: &'a L,
    sampler: Option<SamplerSlot>,
) -> Vec<&'a L> {
    let mut layouts = vec![uniform];
    if sampler.is_some() {
        layouts.push(palette);
    }
    layouts
}

impl ShaderPipeline {
    /// Builds modules and pipeline inside a validation scope so a rejected
    /// program surfaces as [`ProgramError::Link`] instead of a device error.
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        program: &AdaptedProgram,
        uniform_layout: &wgpu::BindGroupLayout,
        palette_layout: &wgpu::BindGroupLayout,
    ) -> Result<Self, ProgramError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = program.vertex.create_module(device);
        let fragment_module = program.fragment.create_module(device);

        let sampler = resolve_uniforms(program).palette_sampler;
        let layouts = bind_group_layouts(uniform_layout, palette_layout, sampler);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("huefield pipeline layout"),
            bind_group_layouts: &layouts,
            push_constant_ranges: &[],
        });

        let attributes = program.position_location.map(quad_attributes);
        let buffers = match attributes.as_ref() {
            Some(attributes) => vec![wgpu::VertexBufferLayout {
                array_stride: QUAD_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            }],
            None => Vec::new(),
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("huefield pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ProgramError::Link(error.to_string()));
        }

        tracing::debug!(
            uses_quad_buffer = attributes.is_some(),
            samples_palette = sampler.is_some(),
            "linked shader program"
        );
        Ok(Self {
            pipeline,
            uses_quad_buffer: attributes.is_some(),
            palette_group: sampler.map(|slot| slot.group),
        })
    }
}
