//! Shadow map, environment background and lit meshes.
//!
//! # Architecture
//!
//! The scene pass uses three bind groups:
//! - **Group 0**: Frame uniforms (camera, light, tone mapping) with the shadow
//!   map and the environment textures
//! - **Group 1**: Model uniforms, one dynamic-offset slot per draw
//! - **Group 2**: Material textures (base color, metallic-roughness,
//!   emissive) and their sampler; empty slots bind a white texture
//!
//! The shadow map is drawn first from the light's orthographic frustum with
//! its own group 0 holding only the light matrix, so the depth texture is
//! never bound while it is being written.

use std::collections::HashMap;

use glam::{Mat4, UVec2, Vec4};

use crate::camera::PerspectiveCamera;
use crate::geometry::Vertex3d;
use crate::render::gpu::GpuContext;
use crate::render::mesh::GpuMesh;
use crate::render::target::{RenderTarget, DEPTH_FORMAT, HDR_FORMAT};
use crate::render::texture::{EnvironmentTextures, Texture};
use crate::renderer::{RenderInfo, RendererSettings, ShadowMapKind, ToneMapping};
use crate::scene::{
    GeometryId, LightDraw, MaterialTextures, MeshDraw, SceneGraph, TextureId,
};
use crate::viewer::light_direction;

const SCENE_COMMON: &str = include_str!("shaders/scene_common.wgsl");

/// Per-frame uniforms, mirrored by `FrameUniforms` in `scene_common.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub light_dir: [f32; 4],
    pub light_color: [f32; 4],
    pub shadow: [f32; 4],
    pub options: [f32; 4],
}

/// Per-draw uniforms.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub emissive: [f32; 4],
    pub material: [f32; 4],
}

impl ModelUniforms {
    pub fn new(draw: &MeshDraw) -> Self {
        let material = &draw.material;
        Self {
            model: draw.world.to_cols_array_2d(),
            normal_matrix: draw.world.inverse().transpose().to_cols_array_2d(),
            base_color: material.base_color.to_array(),
            emissive: material.emissive.extend(0.0).to_array(),
            material: [
                material.metallic,
                material.roughness,
                material.env_map_intensity,
                if draw.shadows.receive { 1.0 } else { 0.0 },
            ],
        }
    }
}

impl FrameUniforms {
    pub fn new(
        camera: &PerspectiveCamera,
        settings: &RendererSettings,
        light: Option<&LightDraw>,
        shadow_size: Option<UVec2>,
        environment: Option<&EnvironmentTextures>,
    ) -> Self {
        let view_proj = camera.view_projection();
        let tone_mapping = match settings.tone_mapping {
            ToneMapping::None => 0.0,
            ToneMapping::Linear => 1.0,
            ToneMapping::AcesFilmic => 2.0,
        };
        let filter = match settings.shadow_map.kind {
            ShadowMapKind::Basic => 0.0,
            ShadowMapKind::Pcf => 1.0,
            ShadowMapKind::PcfSoft => 2.0,
        };

        let (light_dir, light_color, light_view_proj, bias) = match light {
            Some(l) => {
                let toward_light = -light_direction(l.position, l.light.target);
                let shadow = l.light.shadow.filter(|_| shadow_size.is_some());
                (
                    toward_light.extend(l.light.intensity),
                    l.light.color.extend(if shadow.is_some() { 1.0 } else { 0.0 }),
                    shadow
                        .map(|s| s.view_projection(l.position, l.light.target))
                        .unwrap_or(Mat4::IDENTITY),
                    shadow.map(|s| s.bias).unwrap_or(0.0),
                )
            }
            None => (Vec4::Y, Vec4::ZERO, Mat4::IDENTITY, 0.0),
        };
        let texel = shadow_size.map(|s| 1.0 / s.x.max(1) as f32).unwrap_or(0.0);

        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            camera_pos: camera.position.extend(settings.tone_mapping_exposure).to_array(),
            light_dir: light_dir.to_array(),
            light_color: light_color.to_array(),
            shadow: [bias, texel, filter, environment.map(|e| e.max_lod).unwrap_or(0.0)],
            options: [
                tone_mapping,
                if environment.is_some() { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ],
        }
    }
}

/// Uniform buffer holding one [`ModelUniforms`] per draw at aligned offsets.
struct ModelSlots {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: usize,
}

impl ModelSlots {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, capacity: usize) -> Self {
        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let size = std::mem::size_of::<ModelUniforms>() as u64;
        let stride = size.div_ceil(align) * align;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Uniforms"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(size),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            stride,
            capacity,
        }
    }

    fn offset(&self, index: usize) -> u32 {
        (self.stride * index as u64) as u32
    }
}

/// Renders the 3D scene into an HDR target.
pub struct ScenePass {
    mesh_pipeline: wgpu::RenderPipeline,
    double_sided_pipeline: wgpu::RenderPipeline,
    skybox_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,

    frame_layout: wgpu::BindGroupLayout,
    model_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,

    frame_buffer: wgpu::Buffer,
    shadow_buffer: wgpu::Buffer,
    shadow_bind_group: wgpu::BindGroup,
    model_slots: ModelSlots,

    shadow_sampler: wgpu::Sampler,
    env_sampler: wgpu::Sampler,
    material_sampler: wgpu::Sampler,

    /// Light-space depth. Recreated when the light's map size changes.
    shadow_map: RenderTarget,
    depth: RenderTarget,
    white: Texture,
    material_groups: HashMap<MaterialTextures, wgpu::BindGroup>,
}

impl ScenePass {
    pub const PIPELINES: usize = 4;

    pub fn new(gpu: &GpuContext, size: UVec2) -> Self {
        let device = &gpu.device;

        let uniform_entry = |binding, dynamic: Option<u64>| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic.is_some(),
                min_binding_size: dynamic.and_then(wgpu::BufferSize::new),
            },
            count: None,
        };
        let texture_entry = |binding, sample_type| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(ty),
            count: None,
        };
        let filterable = wgpu::TextureSampleType::Float { filterable: true };

        // Group 0
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                uniform_entry(0, None),
                texture_entry(1, wgpu::TextureSampleType::Depth),
                sampler_entry(2, wgpu::SamplerBindingType::Comparison),
                texture_entry(3, filterable),
                texture_entry(4, filterable),
                sampler_entry(5, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Bind Group Layout"),
            entries: &[uniform_entry(0, None)],
        });

        // Group 1
        let model_size = std::mem::size_of::<ModelUniforms>() as u64;
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[uniform_entry(0, Some(model_size))],
        });

        // Group 2
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                texture_entry(0, filterable),
                sampler_entry(1, wgpu::SamplerBindingType::Filtering),
                texture_entry(2, filterable),
                texture_entry(3, filterable),
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Uniforms"),
            size: std::mem::size_of::<[[f32; 4]; 4]>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Bind Group"),
            layout: &shadow_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: shadow_buffer.as_entire_binding(),
            }],
        });

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{SCENE_COMMON}\n{}", include_str!("shaders/mesh.wgsl")).into(),
            ),
        });
        let skybox_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{SCENE_COMMON}\n{}", include_str!("shaders/skybox.wgsl")).into(),
            ),
        });
        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
        });

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let skybox_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });
        let shadow_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&shadow_layout, &model_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = |label, cull_mode| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&mesh_layout),
                vertex: wgpu::VertexState {
                    module: &mesh_shader,
                    entry_point: Some("vs"),
                    buffers: &[Vertex3d::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &mesh_shader,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: HDR_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode,
                    front_face: wgpu::FrontFace::Ccw,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let single_sided = mesh_pipeline("Mesh Pipeline", Some(wgpu::Face::Back));
        let double_sided = mesh_pipeline("Double-Sided Mesh Pipeline", None);

        let skybox_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skybox Pipeline"),
            layout: Some(&skybox_layout),
            vertex: wgpu::VertexState {
                module: &skybox_shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &skybox_shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&shadow_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shadow_shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        // Wraps around the equirectangular seam, clamps at the poles.
        let env_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let model_slots = ModelSlots::new(device, &model_layout, 64);

        Self {
            mesh_pipeline: single_sided,
            double_sided_pipeline: double_sided,
            skybox_pipeline,
            shadow_pipeline,
            frame_layout,
            model_layout,
            material_layout,
            frame_buffer,
            shadow_buffer,
            shadow_bind_group,
            model_slots,
            shadow_sampler,
            env_sampler,
            material_sampler,
            shadow_map: RenderTarget::new(device, "Shadow Map", UVec2::ONE, DEPTH_FORMAT),
            depth: RenderTarget::new(device, "Scene Depth", size, DEPTH_FORMAT),
            white: Texture::white(gpu),
            material_groups: HashMap::new(),
        }
    }

    /// Keep the depth buffer the size of the color target.
    pub fn ensure_depth_size(&mut self, device: &wgpu::Device, size: UVec2) {
        self.depth.ensure_size(device, size);
    }

    /// Bind group for a set of material slots, keyed by the slots that
    /// resolve to an uploaded texture.
    fn ensure_material_group(
        &mut self,
        device: &wgpu::Device,
        slots: MaterialTextures,
        textures: &[Texture],
    ) -> MaterialTextures {
        let key = slots.within(textures.len());
        let white = &self.white.view;
        let view = |slot: Option<TextureId>| {
            slot.and_then(|id| textures.get(id.0)).map_or(white, |t| &t.view)
        };
        self.material_groups.entry(key).or_insert_with(|| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Material Bind Group"),
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view(key.base_color)),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.material_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(view(
                            key.metallic_roughness,
                        )),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(view(key.emissive)),
                    },
                ],
            })
        });
        key
    }

    /// Draw shadows, background and meshes into `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        scene: &SceneGraph,
        camera: &PerspectiveCamera,
        settings: &RendererSettings,
        meshes: &HashMap<GeometryId, GpuMesh>,
        textures: &[Texture],
        environment: &EnvironmentTextures,
        info: &mut RenderInfo,
    ) {
        let device = &gpu.device;
        self.ensure_depth_size(device, target.size());

        let draws: Vec<MeshDraw> = scene
            .mesh_draws()
            .into_iter()
            .filter(|d| meshes.contains_key(&d.geometry))
            .collect();
        if draws.len() > self.model_slots.capacity {
            let capacity = draws.len().next_power_of_two();
            self.model_slots = ModelSlots::new(device, &self.model_layout, capacity);
        }
        for (i, draw) in draws.iter().enumerate() {
            gpu.queue.write_buffer(
                &self.model_slots.buffer,
                self.model_slots.offset(i) as u64,
                bytemuck::bytes_of(&ModelUniforms::new(draw)),
            );
        }

        let light = scene.directional_light();
        let shadow = light
            .as_ref()
            .and_then(|l| l.light.shadow.map(|s| (l, s)))
            .filter(|_| settings.shadow_map.enabled);
        let shadow_size = shadow.map(|(_, s)| s.map_size);
        let environment_bound = scene.environment.is_some().then_some(environment);

        let uniforms = FrameUniforms::new(
            camera,
            settings,
            light.as_ref(),
            shadow_size,
            environment_bound,
        );
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));

        if let Some((light, shadow)) = shadow {
            self.shadow_map.ensure_size(device, shadow.map_size);
            let matrix = shadow.view_projection(light.position, light.light.target);
            gpu.queue.write_buffer(
                &self.shadow_buffer,
                0,
                bytemuck::bytes_of(&matrix.to_cols_array_2d()),
            );
            self.render_shadow_map(encoder, &draws, meshes, info);
        }

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&environment.radiance.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&environment.irradiance.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.env_sampler),
                },
            ],
        });

        let material_keys: Vec<MaterialTextures> = draws
            .iter()
            .map(|draw| self.ensure_material_group(device, draw.material.textures, textures))
            .collect();

        let clear = settings.clear_color;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear.x as f64,
                        g: clear.y as f64,
                        b: clear.z as f64,
                        a: clear.w as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &frame_bind_group, &[]);

        if scene.background.is_some() {
            pass.set_pipeline(&self.skybox_pipeline);
            pass.draw(0..3, 0..1);
            info.record_draw(1);
        }

        for (i, draw) in draws.iter().enumerate() {
            let Some(mesh) = meshes.get(&draw.geometry) else {
                continue;
            };
            let Some(material_group) = self.material_groups.get(&material_keys[i]) else {
                continue;
            };
            pass.set_pipeline(if draw.material.double_sided {
                &self.double_sided_pipeline
            } else {
                &self.mesh_pipeline
            });
            pass.set_bind_group(1, &self.model_slots.bind_group, &[self.model_slots.offset(i)]);
            pass.set_bind_group(2, material_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            info.record_draw(mesh.triangle_count());
        }
    }

    fn render_shadow_map(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        draws: &[MeshDraw],
        meshes: &HashMap<GeometryId, GpuMesh>,
        info: &mut RenderInfo,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow_map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.shadow_pipeline);
        pass.set_bind_group(0, &self.shadow_bind_group, &[]);

        for (i, draw) in draws.iter().enumerate() {
            if !draw.shadows.cast {
                continue;
            }
            let Some(mesh) = meshes.get(&draw.geometry) else {
                continue;
            };
            pass.set_bind_group(1, &self.model_slots.bind_group, &[self.model_slots.offset(i)]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            info.record_draw(mesh.triangle_count());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use crate::renderer::ShadowMapSettings;
    use crate::scene::{DirectionalLight, DirectionalShadow, Material, Shadows};

    fn light() -> LightDraw {
        LightDraw {
            position: Vec3::new(-150.0, 500.0, 300.0),
            light: DirectionalLight {
                color: Vec3::ONE,
                intensity: 0.5,
                target: Vec3::ZERO,
                shadow: Some(DirectionalShadow {
                    left: -300.0,
                    right: 300.0,
                    top: 300.0,
                    bottom: -300.0,
                    near: 1.0,
                    far: 1000.0,
                    map_size: UVec2::splat(1024),
                    bias: -0.002,
                }),
            },
        }
    }

    #[test]
    fn uniform_blocks_match_wgsl_sizes() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 272);
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 176);
    }

    #[test]
    fn frame_uniforms_encode_light_and_settings() {
        let camera = PerspectiveCamera::default();
        let settings = RendererSettings {
            tone_mapping: ToneMapping::AcesFilmic,
            tone_mapping_exposure: 2.0,
            shadow_map: ShadowMapSettings {
                enabled: true,
                kind: ShadowMapKind::PcfSoft,
            },
            ..Default::default()
        };
        let light = light();
        let u = FrameUniforms::new(
            &camera,
            &settings,
            Some(&light),
            Some(UVec2::splat(1024)),
            None,
        );

        assert_eq!(u.camera_pos[3], 2.0);
        assert_eq!(u.options, [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(u.light_color[3], 1.0);
        assert_eq!(u.light_dir[3], 0.5);
        assert_eq!(u.shadow[0], -0.002);
        assert_eq!(u.shadow[2], 2.0);
        let toward = Vec3::from_slice(&u.light_dir[..3]);
        assert!((toward - light.position.normalize()).length() < 1e-5);
    }

    #[test]
    fn no_shadow_map_disables_shadow_lookups() {
        let camera = PerspectiveCamera::default();
        let settings = RendererSettings::default();
        let u = FrameUniforms::new(&camera, &settings, Some(&light()), None, None);
        assert_eq!(u.light_color[3], 0.0);
        assert_eq!(u.shadow[1], 0.0);
    }

    #[test]
    fn model_uniforms_carry_material_and_shadow_flags() {
        let draw = MeshDraw {
            entity: hecs::World::new().spawn(()),
            geometry: GeometryId(0),
            material: Material {
                metallic: 0.25,
                roughness: 0.75,
                env_map_intensity: 3.0,
                ..Default::default()
            },
            world: Mat4::from_translation(Vec3::X),
            shadows: Shadows {
                cast: true,
                receive: true,
            },
        };
        let u = ModelUniforms::new(&draw);
        assert_eq!(u.material, [0.25, 0.75, 3.0, 1.0]);
        assert_eq!(u.model[3], [1.0, 0.0, 0.0, 1.0]);
    }
}
