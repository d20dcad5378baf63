use wgpu::util::DeviceExt;

use super::target::Blend;
use super::tessellate::FillVertex;

/// Maximum number of fill vertices the vertex buffer can hold.
pub const MAX_FILL_VERTICES: usize = 32_768;

/// Screen uniform: surface size and the scene origin (px).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    pub screen_size: [f32; 2],
    pub origin: [f32; 2],
}

/// GPU resources for gradient path fills, one pipeline per blend mode.
pub struct FillPipeline {
    pub normal: wgpu::RenderPipeline,
    pub additive: wgpu::RenderPipeline,
    pub vertex_buffer: wgpu::Buffer,
    pub scene_uniform_buffer: wgpu::Buffer,
    pub scene_bind_group: wgpu::BindGroup,
    pub num_vertices: u32,
    uniform: SceneUniform,
}

impl FillPipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fill_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/fill.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fill_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let normal = create_fill_pipeline(device, &pipeline_layout, &shader, format, Blend::Normal);
        let additive = create_fill_pipeline(device, &pipeline_layout, &shader, format, Blend::Additive);

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fill_vertex_buffer"),
            size: (MAX_FILL_VERTICES * std::mem::size_of::<FillVertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Initialized to 1x1, updated on resize
        let uniform = SceneUniform {
            screen_size: [1.0, 1.0],
            origin: [0.0, 0.0],
        };
        let scene_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene_uniform_buffer"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            normal,
            additive,
            vertex_buffer,
            scene_uniform_buffer,
            scene_bind_group,
            num_vertices: 0,
            uniform,
        }
    }

    pub fn pipeline(&self, blend: Blend) -> &wgpu::RenderPipeline {
        match blend {
            Blend::Normal => &self.normal,
            Blend::Additive => &self.additive,
        }
    }

    /// Upload this frame's triangles. Overflow is dropped whole triangles at a time.
    pub fn update_vertices(&mut self, queue: &wgpu::Queue, vertices: &[FillVertex]) {
        let mut count = vertices.len().min(MAX_FILL_VERTICES);
        count -= count % 3;
        if count < vertices.len() {
            log::warn!("fill buffer full: dropping {} vertices", vertices.len() - count);
        }
        self.num_vertices = count as u32;
        if count > 0 {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices[..count]));
        }
    }

    pub fn update_screen_size(&mut self, queue: &wgpu::Queue, width: f32, height: f32) {
        self.uniform.screen_size = [width, height];
        self.write_uniform(queue);
    }

    /// Where scene-local (0, 0) lands on the surface.
    pub fn update_origin(&mut self, queue: &wgpu::Queue, x: f32, y: f32) {
        self.uniform.origin = [x, y];
        self.write_uniform(queue);
    }

    fn write_uniform(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.scene_uniform_buffer, 0, bytemuck::bytes_of(&self.uniform));
    }
}

fn blend_state(blend: Blend) -> wgpu::BlendState {
    // Premultiplied source in both modes.
    let dst_factor = match blend {
        Blend::Normal => wgpu::BlendFactor::OneMinusSrcAlpha,
        Blend::Additive => wgpu::BlendFactor::One,
    };
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

fn create_fill_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: Blend,
) -> wgpu::RenderPipeline {
    let label = match blend {
        Blend::Normal => "fill_pipeline_normal",
        Blend::Additive => "fill_pipeline_additive",
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[FillVertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend_state(blend)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None, // mirrored transforms flip winding
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
