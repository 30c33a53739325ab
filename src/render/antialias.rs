use glam::{UVec2, Vec2};

use crate::render::fullscreen::FullscreenPass;
use crate::render::target::{RenderTarget, HDR_FORMAT};
use crate::renderer::RenderInfo;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct AntialiasUniforms {
    texel_size: [f32; 2],
    _padding: [f32; 2],
}

/// Luma-edge anti-aliasing over the whole frame.
pub struct AntialiasRenderer {
    pass: FullscreenPass,
    uniforms: wgpu::Buffer,
}

impl AntialiasRenderer {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            pass: FullscreenPass::new(
                device,
                "Antialias",
                include_str!("shaders/antialias.wgsl"),
                "fs",
                1,
                HDR_FORMAT,
                None,
            ),
            uniforms: FullscreenPass::uniform_buffer::<AntialiasUniforms>(
                device,
                "Antialias Uniforms",
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        resolution: UVec2,
        input: &RenderTarget,
        output: &RenderTarget,
        info: &mut RenderInfo,
    ) {
        let texel = Vec2::ONE / resolution.max(UVec2::ONE).as_vec2();
        queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&AntialiasUniforms {
                texel_size: texel.to_array(),
                _padding: [0.0; 2],
            }),
        );
        let group = self.pass.bind_group(device, &self.uniforms, &[&input.view]);
        self.pass.draw(encoder, &output.view, &group, true, info);
    }
}
