//! Off-screen render targets for intermediate pass results.

use glam::UVec2;

/// HDR color format used between passes.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A texture that one pass renders into and the next samples from.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    label: String,
    format: wgpu::TextureFormat,
    size: UVec2,
}

impl RenderTarget {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Self {
        let size = size.max(UVec2::ONE);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            label: label.to_string(),
            format,
            size,
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// Reallocate if the size changed. Returns true if it did.
    pub fn ensure_size(&mut self, device: &wgpu::Device, size: UVec2) -> bool {
        if self.size == size.max(UVec2::ONE) {
            return false;
        }
        *self = Self::new(device, &self.label, size, self.format);
        true
    }
}
