//! Runs a [`PostProcessPipeline`] on the GPU.
//!
//! The scene is drawn into an HDR target; bloom and anti-aliasing ping-pong
//! between two more targets of the same size, and the color grade writes
//! the result to the surface. Targets follow the pipeline's size.

use glam::UVec2;

use crate::postprocess::{Pass, PostProcessPipeline};
use crate::render::antialias::AntialiasRenderer;
use crate::render::bloom::BloomRenderer;
use crate::render::grade::GradeRenderer;
use crate::render::target::{RenderTarget, HDR_FORMAT};
use crate::renderer::{OutputEncoding, RenderInfo};

pub struct PostComposer {
    scene_target: RenderTarget,
    ping: RenderTarget,
    pong: RenderTarget,
    bloom: BloomRenderer,
    antialias: AntialiasRenderer,
    grade: GradeRenderer,
    size: UVec2,
}

impl PostComposer {
    pub const PIPELINES: usize = BloomRenderer::PIPELINES + 2;

    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, size: UVec2) -> Self {
        Self {
            scene_target: RenderTarget::new(device, "Scene Color", size, HDR_FORMAT),
            ping: RenderTarget::new(device, "Post Ping", size, HDR_FORMAT),
            pong: RenderTarget::new(device, "Post Pong", size, HDR_FORMAT),
            bloom: BloomRenderer::new(device, size),
            antialias: AntialiasRenderer::new(device),
            grade: GradeRenderer::new(device, surface_format),
            size,
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn set_size(&mut self, device: &wgpu::Device, size: UVec2) {
        if self.size == size {
            return;
        }
        self.scene_target.ensure_size(device, size);
        self.ping.ensure_size(device, size);
        self.pong.ensure_size(device, size);
        self.bloom.ensure_size(device, size);
        self.size = size;
        log::debug!("post targets resized to {}x{}", size.x, size.y);
    }

    /// Where the scene pass draws.
    pub fn scene_target(&self) -> &RenderTarget {
        &self.scene_target
    }

    /// Run every pass after the scene and write the graded frame to `surface`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &PostProcessPipeline,
        encoding: OutputEncoding,
        surface: &wgpu::TextureView,
        info: &mut RenderInfo,
    ) {
        self.set_size(device, pipeline.size());

        let Self {
            scene_target,
            ping,
            pong,
            bloom,
            antialias,
            grade,
            ..
        } = self;
        let targets = [&*scene_target, &*ping, &*pong];
        let mut current = 0;
        let next = |current: usize| if current == 1 { 2 } else { 1 };

        for pass in pipeline.passes() {
            match pass {
                Pass::Scene { .. } | Pass::ColorGrade { .. } => {}
                Pass::Bloom(settings) => {
                    let out = next(current);
                    bloom.render(
                        device,
                        queue,
                        encoder,
                        settings,
                        targets[current],
                        targets[out],
                        info,
                    );
                    current = out;
                }
                Pass::Antialias { resolution } => {
                    let out = next(current);
                    antialias.render(
                        device,
                        queue,
                        encoder,
                        *resolution,
                        targets[current],
                        targets[out],
                        info,
                    );
                    current = out;
                }
            }
        }

        grade.render(
            device,
            queue,
            encoder,
            pipeline.color_grade(),
            encoding,
            targets[current],
            surface,
            info,
        );
    }
}
