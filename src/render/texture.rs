//! GPU textures for materials and the environment.

use wgpu::util::DeviceExt;

use crate::environment::{EnvironmentLevel, EnvironmentMap};
use crate::render::gpu::GpuContext;
use crate::scene::TextureImage;

/// A GPU texture that can be bound to shaders.
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from raw RGBA data.
    pub fn from_rgba(
        gpu: &GpuContext,
        data: &[u8],
        width: u32,
        height: u32,
        srgb: bool,
        label: &str,
    ) -> Self {
        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn from_image(gpu: &GpuContext, image: &TextureImage) -> Self {
        Self::from_rgba(gpu, &image.rgba, image.width, image.height, image.srgb, &image.label)
    }

    /// 1x1 white, bound when a material has no base color texture.
    pub fn white(gpu: &GpuContext) -> Self {
        Self::from_rgba(gpu, &[255; 4], 1, 1, true, "White Texture")
    }
}

/// Radiance mip chain and irradiance map of one [`EnvironmentMap`].
pub struct EnvironmentTextures {
    pub id: u64,
    pub radiance: Texture,
    pub irradiance: Texture,
    pub max_lod: f32,
}

impl EnvironmentTextures {
    pub fn upload(gpu: &GpuContext, environment: &EnvironmentMap) -> Self {
        log::debug!(
            "uploading environment {} ({} radiance levels)",
            environment.id(),
            environment.radiance.len()
        );
        Self {
            id: environment.id(),
            radiance: upload_levels(gpu, &environment.radiance, "Environment Radiance"),
            irradiance: upload_levels(
                gpu,
                std::slice::from_ref(&environment.irradiance),
                "Environment Irradiance",
            ),
            max_lod: environment.max_lod(),
        }
    }

    /// Neutral grey environment, bound until a real one is prepared.
    pub fn placeholder(gpu: &GpuContext) -> Self {
        let level = EnvironmentLevel {
            width: 1,
            height: 1,
            texels: vec![[0.5, 0.5, 0.5]],
        };
        Self {
            id: 0,
            radiance: upload_levels(gpu, std::slice::from_ref(&level), "Placeholder Radiance"),
            irradiance: upload_levels(gpu, std::slice::from_ref(&level), "Placeholder Irradiance"),
            max_lod: 0.0,
        }
    }
}

/// Upload levels as one `Rgb9e5Ufloat` texture, level `i` as mip `i`.
fn upload_levels(gpu: &GpuContext, levels: &[EnvironmentLevel], label: &str) -> Texture {
    let base = &levels[0];
    let data: Vec<u32> = levels.iter().flat_map(|l| l.to_rgb9e5()).collect();
    let texture = gpu.device.create_texture_with_data(
        &gpu.queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: base.width,
                height: base.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgb9e5Ufloat,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        bytemuck::cast_slice(&data),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Texture {
        texture,
        view,
        width: base.width,
        height: base.height,
    }
}
