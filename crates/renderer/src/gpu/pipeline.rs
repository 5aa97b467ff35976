use bytemuck::{Pod, Zeroable};
use catalog::{EffectKind, UniformLayout};
use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;

use crate::backend::{ProgramSource, ShaderDiagnostics};
use crate::compile::compile_glsl;

use super::target::CANVAS_FORMAT;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    value: [f32; 2],
}

/// Triangle strip covering clip space. The top-left corner maps to texture
/// coordinate (0, 0), the first uploaded row.
const QUAD_POSITIONS: [QuadVertex; 4] = [
    QuadVertex { value: [-1.0, 1.0] },
    QuadVertex { value: [-1.0, -1.0] },
    QuadVertex { value: [1.0, 1.0] },
    QuadVertex { value: [1.0, -1.0] },
];

const QUAD_TEX_COORDS: [QuadVertex; 4] = [
    QuadVertex { value: [0.0, 0.0] },
    QuadVertex { value: [0.0, 1.0] },
    QuadVertex { value: [1.0, 0.0] },
    QuadVertex { value: [1.0, 1.0] },
];

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const TEX_COORD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];

/// Resources shared by every effect program.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub image_layout: wgpu::BindGroupLayout,
    pub lut_image_layout: wgpu::BindGroupLayout,
    pub vertex_module: Option<wgpu::ShaderModule>,
    pub positions: wgpu::Buffer,
    pub tex_coords: wgpu::Buffer,
    pub sampler: wgpu::Sampler,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("effect uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let image_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("effect image layout"),
            entries: &texture_layout_entries(1),
        });
        let lut_image_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("effect image + lut layout"),
            entries: &texture_layout_entries(2),
        });

        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad positions"),
            contents: bytemuck::cast_slice(&QUAD_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let tex_coords = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad texture coordinates"),
            contents: bytemuck::cast_slice(&QUAD_TEX_COORDS),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("effect sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            uniform_layout,
            image_layout,
            lut_image_layout,
            vertex_module: None,
            positions,
            tex_coords,
            sampler,
        }
    }

    /// The shared vertex module, compiled on first use.
    fn vertex_module(
        &mut self,
        device: &wgpu::Device,
        source: &str,
    ) -> Result<wgpu::ShaderModule, ShaderDiagnostics> {
        if let Some(module) = &self.vertex_module {
            return Ok(module.clone());
        }
        let module = compile_glsl(device, "effect vertex", source, ShaderStage::Vertex)?;
        self.vertex_module = Some(module.clone());
        Ok(module)
    }

    pub fn texture_layout(&self, kind: EffectKind) -> &wgpu::BindGroupLayout {
        if kind.samples_lut() {
            &self.lut_image_layout
        } else {
            &self.image_layout
        }
    }
}

fn texture_layout_entries(textures: u32) -> Vec<wgpu::BindGroupLayoutEntry> {
    (0..textures)
        .flat_map(|index| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: index * 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: index * 2 + 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect()
}

/// One linked catalog program with its uniform block.
pub(crate) struct EffectPipeline {
    pub kind: EffectKind,
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_bind_group: wgpu::BindGroup,
}

impl EffectPipeline {
    pub fn new(
        device: &wgpu::Device,
        layouts: &mut PipelineLayouts,
        source: &ProgramSource<'_>,
    ) -> Result<Self, ShaderDiagnostics> {
        let vertex_module = layouts.vertex_module(device, source.vertex)?;
        let fragment_label = format!("{} fragment", source.kind);
        let fragment_module =
            compile_glsl(device, &fragment_label, source.fragment, ShaderStage::Fragment)?;

        let layout = UniformLayout::for_kind(source.kind);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("effect uniforms"),
            size: layout.size() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("effect uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("effect pipeline layout"),
            bind_group_layouts: &[&layouts.uniform_layout, layouts.texture_layout(source.kind)],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} pipeline", source.kind)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &POSITION_ATTRIBUTES,
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &TEX_COORD_ATTRIBUTES,
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
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
                    format: CANVAS_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderDiagnostics::new("link", err.to_string()));
        }

        Ok(Self {
            kind: source.kind,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
        })
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, words: &[f32]) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(words));
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, layouts: &PipelineLayouts, images: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, images, &[]);
        pass.set_vertex_buffer(0, layouts.positions.slice(..));
        pass.set_vertex_buffer(1, layouts.tex_coords.slice(..));
        pass.draw(0..4, 0..1);
    }
}
