use std::collections::HashMap;

use glam::UVec2;

use crate::environment::EnvironmentMap;
use crate::render::composer::PostComposer;
use crate::render::draw2d::Draw2d;
use crate::render::font::FontAtlas;
use crate::render::gpu::GpuContext;
use crate::render::mesh::GpuMesh;
use crate::render::scene_pass::ScenePass;
use crate::render::texture::{EnvironmentTextures, Texture};
use crate::renderer::{
    FrameView, MemoryInfo, RenderError, RenderInfo, Renderer, RendererSettings,
};
use crate::scene::{GeometryId, SceneGraph};

/// [`Renderer`] backed by wgpu.
///
/// Scene geometry and textures are uploaded the first time a frame sees them
/// and kept for the lifetime of the renderer, mirroring the append-only
/// arenas of [`SceneGraph`].
pub struct WgpuRenderer {
    gpu: GpuContext,
    settings: RendererSettings,
    info: RenderInfo,
    scene_pass: ScenePass,
    composer: PostComposer,
    draw2d: Draw2d,
    meshes: HashMap<GeometryId, GpuMesh>,
    textures: Vec<Texture>,
    environment: EnvironmentTextures,
}

impl WgpuRenderer {
    pub fn new(gpu: GpuContext) -> Self {
        let size = UVec2::new(gpu.width(), gpu.height());
        let scene_pass = ScenePass::new(&gpu, size);
        let composer = PostComposer::new(&gpu.device, gpu.format(), size);
        let draw2d = Draw2d::new(&gpu);
        let environment = EnvironmentTextures::placeholder(&gpu);

        let info = RenderInfo {
            programs: ScenePass::PIPELINES + PostComposer::PIPELINES + Draw2d::PIPELINES,
            ..Default::default()
        };
        log::info!(
            "renderer ready: {}x{} {:?}, {} pipelines",
            size.x,
            size.y,
            gpu.format(),
            info.programs
        );

        Self {
            gpu,
            settings: RendererSettings::default(),
            info,
            scene_pass,
            composer,
            draw2d,
            meshes: HashMap::new(),
            textures: Vec::new(),
            environment,
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Rasterize a TTF/OTF font for overlay text.
    pub fn load_font(&mut self, data: &[u8], size: f32) -> Result<(), &'static str> {
        let atlas = FontAtlas::new(&self.gpu, data, size)?;
        self.draw2d.set_font(&self.gpu, atlas);
        Ok(())
    }

    /// Upload scene geometry and textures the GPU has not seen yet.
    fn sync_scene(&mut self, scene: &SceneGraph) {
        for (i, geometry) in scene.geometries().iter().enumerate() {
            let id = GeometryId(i);
            if !self.meshes.contains_key(&id) && !geometry.indices.is_empty() {
                let mesh = GpuMesh::new(&self.gpu.device, geometry, &format!("Geometry {i}"));
                self.meshes.insert(id, mesh);
            }
        }
        for image in scene.textures().iter().skip(self.textures.len()) {
            self.textures.push(Texture::from_image(&self.gpu, image));
        }
        if let Some(environment) = &scene.environment {
            if environment.id() != self.environment.id {
                self.prepare_environment(environment);
            }
        }
        self.info.memory = MemoryInfo {
            geometries: self.meshes.len(),
            textures: self.textures.len() + 2,
        };
    }
}

impl Renderer for WgpuRenderer {
    fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    fn size(&self) -> UVec2 {
        UVec2::new(self.gpu.width(), self.gpu.height())
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        let size = UVec2::new(width, height);
        self.scene_pass.ensure_depth_size(&self.gpu.device, size);
        self.composer.set_size(&self.gpu.device, size);
    }

    fn info(&self) -> &RenderInfo {
        &self.info
    }

    fn reset_info(&mut self) {
        self.info.reset();
    }

    fn prepare_environment(&mut self, environment: &EnvironmentMap) {
        if environment.id() == self.environment.id {
            return;
        }
        self.environment = EnvironmentTextures::upload(&self.gpu, environment);
    }

    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), RenderError> {
        if self.settings.auto_reset_info {
            self.info.reset();
        }
        self.sync_scene(frame.scene);

        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return Err(RenderError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::Timeout) => return Err(RenderError::Timeout),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(e) => return Err(RenderError::Other(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.composer.set_size(&self.gpu.device, frame.pipeline.size());
        self.scene_pass.render(
            &self.gpu,
            &mut encoder,
            self.composer.scene_target(),
            frame.scene,
            frame.camera,
            &self.settings,
            &self.meshes,
            &self.textures,
            &self.environment,
            &mut self.info,
        );
        self.composer.render(
            &self.gpu.device,
            &self.gpu.queue,
            &mut encoder,
            frame.pipeline,
            self.settings.output_encoding,
            &view,
            &mut self.info,
        );
        self.draw2d
            .render(&self.gpu, &mut encoder, &view, frame.overlay);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
