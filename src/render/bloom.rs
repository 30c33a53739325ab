//! GPU side of [`BloomPass`]: high-pass, mip blur chain, composite, apply.

use glam::{UVec2, Vec2};

use crate::postprocess::{BloomPass, BLOOM_MIPS};
use crate::render::fullscreen::FullscreenPass;
use crate::render::target::{RenderTarget, HDR_FORMAT};
use crate::renderer::RenderInfo;

/// Gaussian kernel radius of each blur level.
pub const KERNEL_RADII: [u32; BLOOM_MIPS] = [3, 5, 7, 9, 11];

const SMOOTH_WIDTH: f32 = 0.01;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct HighPassUniforms {
    threshold: f32,
    smooth_width: f32,
    _padding: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurUniforms {
    direction: [f32; 2],
    texel_size: [f32; 2],
    sigma: f32,
    kernel_radius: f32,
    _padding: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniforms {
    factors: [f32; 4],
    last_factor: f32,
    strength: f32,
    _padding: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct ApplyUniforms {
    scale: f32,
    _padding: [f32; 3],
}

fn composite_uniforms(bloom: &BloomPass) -> CompositeUniforms {
    let f = bloom.factors();
    CompositeUniforms {
        factors: [f[0], f[1], f[2], f[3]],
        last_factor: f[4],
        strength: bloom.strength,
        _padding: [0.0; 2],
    }
}

/// Uniforms of the horizontal and vertical blur at one level.
fn blur_uniforms(level: usize, size: UVec2) -> [BlurUniforms; 2] {
    let radius = KERNEL_RADII[level] as f32;
    let texel = (Vec2::ONE / size.max(UVec2::ONE).as_vec2()).to_array();
    [[1.0, 0.0], [0.0, 1.0]].map(|direction| BlurUniforms {
        direction,
        texel_size: texel,
        sigma: radius,
        kernel_radius: radius,
        _padding: [0.0; 2],
    })
}

struct BlurLevel {
    horizontal: RenderTarget,
    vertical: RenderTarget,
    uniforms: [wgpu::Buffer; 2],
}

pub struct BloomRenderer {
    high_pass: FullscreenPass,
    blur: FullscreenPass,
    composite: FullscreenPass,
    apply: FullscreenPass,

    high_pass_uniforms: wgpu::Buffer,
    composite_uniforms: wgpu::Buffer,
    apply_uniforms: wgpu::Buffer,

    bright: RenderTarget,
    levels: Vec<BlurLevel>,
    combined: RenderTarget,
    resolution: UVec2,
}

impl BloomRenderer {
    pub const PIPELINES: usize = 4;

    pub fn new(device: &wgpu::Device, resolution: UVec2) -> Self {
        let pass = |label, body, textures| {
            FullscreenPass::new(device, label, body, "fs", textures, HDR_FORMAT, None)
        };
        let high_pass = pass("Bloom High Pass", include_str!("shaders/bloom_high_pass.wgsl"), 1);
        let blur = pass("Bloom Blur", include_str!("shaders/bloom_blur.wgsl"), 1);
        let composite = pass(
            "Bloom Composite",
            include_str!("shaders/bloom_composite.wgsl"),
            BLOOM_MIPS as u32,
        );
        let apply = pass("Bloom Apply", include_str!("shaders/bloom_apply.wgsl"), 2);

        let sizes = BloomPass::new(resolution, 0.0, 0.0, 0.0).mip_sizes();
        let levels = sizes
            .iter()
            .map(|&size| BlurLevel {
                horizontal: RenderTarget::new(device, "Bloom Blur H", size, HDR_FORMAT),
                vertical: RenderTarget::new(device, "Bloom Blur V", size, HDR_FORMAT),
                uniforms: [
                    FullscreenPass::uniform_buffer::<BlurUniforms>(device, "Bloom Blur H Uniforms"),
                    FullscreenPass::uniform_buffer::<BlurUniforms>(device, "Bloom Blur V Uniforms"),
                ],
            })
            .collect();

        Self {
            high_pass,
            blur,
            composite,
            apply,
            high_pass_uniforms: FullscreenPass::uniform_buffer::<HighPassUniforms>(
                device,
                "Bloom High Pass Uniforms",
            ),
            composite_uniforms: FullscreenPass::uniform_buffer::<CompositeUniforms>(
                device,
                "Bloom Composite Uniforms",
            ),
            apply_uniforms: FullscreenPass::uniform_buffer::<ApplyUniforms>(
                device,
                "Bloom Apply Uniforms",
            ),
            bright: RenderTarget::new(device, "Bloom Bright", sizes[0], HDR_FORMAT),
            levels,
            combined: RenderTarget::new(device, "Bloom Combined", sizes[0], HDR_FORMAT),
            resolution,
        }
    }

    /// Reallocate the blur chain for a new pass resolution.
    pub fn ensure_size(&mut self, device: &wgpu::Device, resolution: UVec2) {
        if self.resolution == resolution {
            return;
        }
        let sizes = BloomPass::new(resolution, 0.0, 0.0, 0.0).mip_sizes();
        self.bright.ensure_size(device, sizes[0]);
        self.combined.ensure_size(device, sizes[0]);
        for (level, size) in self.levels.iter_mut().zip(sizes) {
            level.horizontal.ensure_size(device, size);
            level.vertical.ensure_size(device, size);
        }
        self.resolution = resolution;
    }

    /// Write `input` plus its glow into `output`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        bloom: &BloomPass,
        input: &RenderTarget,
        output: &RenderTarget,
        info: &mut RenderInfo,
    ) {
        self.ensure_size(device, bloom.resolution);

        queue.write_buffer(
            &self.high_pass_uniforms,
            0,
            bytemuck::bytes_of(&HighPassUniforms {
                threshold: bloom.threshold,
                smooth_width: SMOOTH_WIDTH,
                _padding: [0.0; 2],
            }),
        );
        queue.write_buffer(
            &self.composite_uniforms,
            0,
            bytemuck::bytes_of(&composite_uniforms(bloom)),
        );
        queue.write_buffer(
            &self.apply_uniforms,
            0,
            bytemuck::bytes_of(&ApplyUniforms {
                scale: 1.0,
                _padding: [0.0; 3],
            }),
        );

        let group = self
            .high_pass
            .bind_group(device, &self.high_pass_uniforms, &[&input.view]);
        self.high_pass.draw(encoder, &self.bright.view, &group, true, info);

        for (i, level) in self.levels.iter().enumerate() {
            let uniforms = blur_uniforms(i, level.horizontal.size());
            for (buffer, uniforms) in level.uniforms.iter().zip(uniforms) {
                queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
            }
            let source = if i == 0 {
                &self.bright.view
            } else {
                &self.levels[i - 1].vertical.view
            };
            let group = self.blur.bind_group(device, &level.uniforms[0], &[source]);
            self.blur.draw(encoder, &level.horizontal.view, &group, true, info);
            let group = self
                .blur
                .bind_group(device, &level.uniforms[1], &[&level.horizontal.view]);
            self.blur.draw(encoder, &level.vertical.view, &group, true, info);
        }

        let blurred: Vec<&wgpu::TextureView> =
            self.levels.iter().map(|l| &l.vertical.view).collect();
        let group = self
            .composite
            .bind_group(device, &self.composite_uniforms, &blurred);
        self.composite.draw(encoder, &self.combined.view, &group, true, info);

        let group = self.apply.bind_group(
            device,
            &self.apply_uniforms,
            &[&input.view, &self.combined.view],
        );
        self.apply.draw(encoder, &output.view, &group, true, info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_weights_follow_radius() {
        let bloom = BloomPass::new(UVec2::new(800, 600), 1.5, 0.4, 0.85);
        let u = composite_uniforms(&bloom);
        let expected = bloom.factors();
        assert_eq!(u.factors, [expected[0], expected[1], expected[2], expected[3]]);
        assert_eq!(u.last_factor, expected[4]);
        assert_eq!(u.strength, 1.5);
    }

    #[test]
    fn blur_uniforms_step_one_texel_of_their_level() {
        let [h, v] = blur_uniforms(2, UVec2::new(100, 50));
        assert_eq!(h.direction, [1.0, 0.0]);
        assert_eq!(v.direction, [0.0, 1.0]);
        assert_eq!(h.texel_size, [0.01, 0.02]);
        assert_eq!(h.kernel_radius, 7.0);
    }

    #[test]
    fn uniform_blocks_are_sixteen_byte_multiples() {
        for size in [
            std::mem::size_of::<HighPassUniforms>(),
            std::mem::size_of::<BlurUniforms>(),
            std::mem::size_of::<CompositeUniforms>(),
            std::mem::size_of::<ApplyUniforms>(),
        ] {
            assert_eq!(size % 16, 0);
        }
    }
}
