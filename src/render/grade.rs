//! The color-grade node graph, evaluated on the GPU as the output stage.

use crate::color_grade::{ColorGradeGraph, ColorGradeUniforms};
use crate::params::ColorGradeParameters;
use crate::render::fullscreen::FullscreenPass;
use crate::render::target::RenderTarget;
use crate::renderer::{OutputEncoding, RenderInfo};

/// Mirrors `GradeUniforms` in `color_grade.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct OutputUniforms {
    grade: ColorGradeUniforms,
    encoding: [f32; 4],
}

/// Shader-side encode step so the stored bytes match `encoding` whatever
/// the surface format does on write.
fn encode_mode(encoding: OutputEncoding, surface_is_srgb: bool) -> f32 {
    match (encoding, surface_is_srgb) {
        (OutputEncoding::Srgb, false) => 1.0,
        (OutputEncoding::Linear, true) => -1.0,
        _ => 0.0,
    }
}

pub struct GradeRenderer {
    pass: FullscreenPass,
    uniforms: wgpu::Buffer,
    surface_is_srgb: bool,
    neutral: ColorGradeUniforms,
}

impl GradeRenderer {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        Self {
            pass: FullscreenPass::new(
                device,
                "Color Grade",
                include_str!("shaders/color_grade.wgsl"),
                "fs",
                1,
                surface_format,
                None,
            ),
            uniforms: FullscreenPass::uniform_buffer::<OutputUniforms>(
                device,
                "Color Grade Uniforms",
            ),
            surface_is_srgb: surface_format.is_srgb(),
            neutral: ColorGradeGraph::new(&ColorGradeParameters::NEUTRAL).uniforms(),
        }
    }

    /// Grade `input` into the surface. Without a graph the colors pass
    /// through unchanged apart from output encoding.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        graph: Option<&ColorGradeGraph>,
        encoding: OutputEncoding,
        input: &RenderTarget,
        output: &wgpu::TextureView,
        info: &mut RenderInfo,
    ) {
        let uniforms = OutputUniforms {
            grade: graph.map(|g| g.uniforms()).unwrap_or(self.neutral),
            encoding: [encode_mode(encoding, self.surface_is_srgb), 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
        let group = self.pass.bind_group(device, &self.uniforms, &[&input.view]);
        self.pass.draw(encoder, output, &group, true, info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<OutputUniforms>(), 48);
    }

    #[test]
    fn encoding_only_compensates_mismatches() {
        assert_eq!(encode_mode(OutputEncoding::Srgb, true), 0.0);
        assert_eq!(encode_mode(OutputEncoding::Srgb, false), 1.0);
        assert_eq!(encode_mode(OutputEncoding::Linear, true), -1.0);
        assert_eq!(encode_mode(OutputEncoding::Linear, false), 0.0);
    }
}
