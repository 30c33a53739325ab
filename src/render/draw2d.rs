//! Batched 2D drawing of a [`DrawList`] on top of the finished frame.

use crate::render::font::{FontAtlas, GlyphSheet};
use crate::render::gpu::GpuContext;
use crate::ui::{Color, DrawCommand, DrawList};

/// Vertex for 2D quads and text.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex2d {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex2d {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex2d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            // color
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Draw2dUniforms {
    resolution: [f32; 2],
    _padding: [f32; 2],
}

const MAX_VERTICES: usize = 16384;

/// A contiguous vertex range drawn with one pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Batch {
    Colored { start: u32, count: u32 },
    Text { start: u32, count: u32 },
}

/// Triangulate a draw list in command order, merging neighbours that share
/// a pipeline. Text is skipped when no glyph sheet is loaded.
pub fn tessellate(
    list: &DrawList,
    glyphs: Option<&GlyphSheet>,
    out: &mut Vec<Vertex2d>,
) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();
    for command in list.commands() {
        let start = out.len();
        let textured = match command {
            DrawCommand::Rect { rect, color } => {
                push_quad(out, [rect.x, rect.y, rect.width, rect.height], [0.0; 4], *color);
                false
            }
            DrawCommand::Text {
                position,
                text,
                color,
            } => {
                let Some(sheet) = glyphs else {
                    continue;
                };
                let mut cursor_x = position.x;
                let baseline_y = position.y + sheet.size;
                for ch in text.chars() {
                    let Some(glyph) = sheet.glyph(ch) else {
                        cursor_x += sheet.size * 0.5;
                        continue;
                    };
                    if glyph.width > 0 && glyph.height > 0 {
                        let gx = cursor_x + glyph.offset_x;
                        // ymin is measured up from the baseline to the glyph bottom
                        let gy = baseline_y - glyph.offset_y - glyph.height as f32;
                        push_quad(
                            out,
                            [gx, gy, glyph.width as f32, glyph.height as f32],
                            glyph.uv,
                            *color,
                        );
                    }
                    cursor_x += glyph.advance;
                }
                true
            }
        };

        if out.len() > MAX_VERTICES {
            out.truncate(start);
            log::warn!("overlay exceeds {MAX_VERTICES} vertices; dropping the rest");
            break;
        }
        let count = (out.len() - start) as u32;
        if count == 0 {
            continue;
        }
        let merged = match batches.last_mut() {
            Some(Batch::Colored { count: c, .. }) if !textured => {
                *c += count;
                true
            }
            Some(Batch::Text { count: c, .. }) if textured => {
                *c += count;
                true
            }
            _ => false,
        };
        if !merged {
            let start = start as u32;
            batches.push(if textured {
                Batch::Text { start, count }
            } else {
                Batch::Colored { start, count }
            });
        }
    }
    batches
}

fn push_quad(
    out: &mut Vec<Vertex2d>,
    [x, y, w, h]: [f32; 4],
    [u0, v0, uw, vh]: [f32; 4],
    color: Color,
) {
    let c = color.to_array();
    let (u1, v1) = (u0 + uw, v0 + vh);
    let vertex = |px, py, u, v| Vertex2d {
        position: [px, py],
        uv: [u, v],
        color: c,
    };
    out.extend_from_slice(&[
        vertex(x, y, u0, v0),
        vertex(x + w, y, u1, v0),
        vertex(x, y + h, u0, v1),
        vertex(x + w, y, u1, v0),
        vertex(x + w, y + h, u1, v1),
        vertex(x, y + h, u0, v1),
    ]);
}

/// GPU side of the overlay.
pub struct Draw2d {
    colored_pipeline: wgpu::RenderPipeline,
    textured_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    font: Option<(FontAtlas, wgpu::BindGroup)>,
    vertices: Vec<Vertex2d>,
}

impl Draw2d {
    pub const PIPELINES: usize = 2;

    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Draw2d Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/draw2d.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw2d Uniforms"),
            size: std::mem::size_of::<Draw2dUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw2d Uniform Layout"),
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

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw2d Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw2d Texture Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let colored_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Draw2d Colored Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let textured_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Draw2d Textured Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
                push_constant_ranges: &[],
            });

        let blend_state = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = |label, layout, entry_point| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[Vertex2d::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.config.format,
                        blend: Some(blend_state),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let colored_pipeline = pipeline(
            "Draw2d Colored Pipeline",
            &colored_pipeline_layout,
            "fs_colored",
        );
        let textured_pipeline =
            pipeline("Draw2d Textured Pipeline", &textured_pipeline_layout, "fs_textured");

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw2d Vertex Buffer"),
            size: (MAX_VERTICES * std::mem::size_of::<Vertex2d>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            colored_pipeline,
            textured_pipeline,
            vertex_buffer,
            uniform_buffer,
            uniform_bind_group,
            texture_bind_group_layout,
            font: None,
            vertices: Vec::with_capacity(1024),
        }
    }

    /// Install the font used for overlay text.
    pub fn set_font(&mut self, gpu: &GpuContext, atlas: FontAtlas) {
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Font Bind Group"),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&atlas.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&atlas.sampler),
                },
            ],
        });
        self.font = Some((atlas, bind_group));
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `list` over `target`, keeping its contents. Overlay draws are not
    /// counted in the render statistics.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        list: &DrawList,
    ) {
        self.vertices.clear();
        let glyphs = self.font.as_ref().map(|(atlas, _)| &atlas.sheet);
        let batches = tessellate(list, glyphs, &mut self.vertices);
        if batches.is_empty() {
            return;
        }

        let uniforms = Draw2dUniforms {
            resolution: [gpu.width() as f32, gpu.height() as f32],
            _padding: [0.0, 0.0],
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        gpu.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));

        for batch in batches {
            match batch {
                Batch::Colored { start, count } => {
                    pass.set_pipeline(&self.colored_pipeline);
                    pass.draw(start..start + count, 0..1);
                }
                Batch::Text { start, count } => {
                    let Some((_, font_bind_group)) = &self.font else {
                        continue;
                    };
                    pass.set_pipeline(&self.textured_pipeline);
                    pass.set_bind_group(1, font_bind_group, &[]);
                    pass.draw(start..start + count, 0..1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::Rect;

    #[test]
    fn adjacent_rects_share_one_batch() {
        let mut list = DrawList::new();
        list.rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        list.rect(Rect::new(10.0, 0.0, 10.0, 10.0), Color::BLACK);
        let mut vertices = Vec::new();
        let batches = tessellate(&list, None, &mut vertices);
        assert_eq!(batches, vec![Batch::Colored { start: 0, count: 12 }]);
        assert_eq!(vertices[4].position, [10.0, 10.0]);
    }

    #[test]
    fn text_without_font_is_skipped() {
        let mut list = DrawList::new();
        list.rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        list.text(2.0, 2.0, "fps", Color::WHITE);
        list.rect(Rect::new(0.0, 20.0, 10.0, 10.0), Color::WHITE);
        let mut vertices = Vec::new();
        let batches = tessellate(&list, None, &mut vertices);
        assert_eq!(batches, vec![Batch::Colored { start: 0, count: 12 }]);
    }
}
