//! Rasterized glyph atlas for overlay text.

use std::collections::HashMap;

use fontdue::{Font, FontSettings};

use crate::render::gpu::GpuContext;

/// Information about a single glyph in the font atlas.
#[derive(Clone, Copy, Debug)]
pub struct GlyphInfo {
    /// UV coordinates in the atlas (x, y, width, height) normalized to [0, 1].
    pub uv: [f32; 4],
    pub width: u32,
    pub height: u32,
    /// Offset from the cursor position to where the glyph should be drawn.
    pub offset_x: f32,
    pub offset_y: f32,
    pub advance: f32,
}

/// CPU side of the atlas: packed coverage bitmap plus glyph metrics.
pub struct GlyphSheet {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
    pub glyphs: HashMap<char, GlyphInfo>,
    pub size: f32,
    pub line_height: f32,
}

impl GlyphSheet {
    /// Rasterize printable ASCII at `size` pixels and row-pack it.
    pub fn rasterize(font_data: &[u8], size: f32) -> Result<Self, &'static str> {
        let font = Font::from_bytes(font_data, FontSettings::default())?;

        let rasterized: Vec<(char, fontdue::Metrics, Vec<u8>)> = (32u8..=126u8)
            .map(|b| {
                let c = b as char;
                let (metrics, bitmap) = font.rasterize(c, size);
                (c, metrics, bitmap)
            })
            .collect();

        let padding = 1u32;
        let (mut width, mut height) = (256u32, 256u32);
        while !fits(&rasterized, width, height, padding) {
            if width <= height {
                width *= 2;
            } else {
                height *= 2;
            }
        }

        let mut coverage = vec![0u8; (width * height) as usize];
        let mut glyphs = HashMap::new();
        let (mut x, mut y, mut row_height) = (padding, padding, 0u32);

        for (c, metrics, bitmap) in &rasterized {
            let glyph_w = metrics.width as u32;
            let glyph_h = metrics.height as u32;
            if x + glyph_w + padding > width {
                x = padding;
                y += row_height + padding;
                row_height = 0;
            }

            for gy in 0..glyph_h {
                let src = (gy * glyph_w) as usize;
                let dst = ((y + gy) * width + x) as usize;
                coverage[dst..dst + glyph_w as usize]
                    .copy_from_slice(&bitmap[src..src + glyph_w as usize]);
            }

            glyphs.insert(
                *c,
                GlyphInfo {
                    uv: [
                        x as f32 / width as f32,
                        y as f32 / height as f32,
                        glyph_w as f32 / width as f32,
                        glyph_h as f32 / height as f32,
                    ],
                    width: glyph_w,
                    height: glyph_h,
                    offset_x: metrics.xmin as f32,
                    offset_y: metrics.ymin as f32,
                    advance: metrics.advance_width,
                },
            );

            x += glyph_w + padding;
            row_height = row_height.max(glyph_h);
        }

        let line_height = font
            .horizontal_line_metrics(size)
            .map(|m| m.new_line_size)
            .unwrap_or(size * 1.2);

        Ok(Self {
            width,
            height,
            coverage,
            glyphs,
            size,
            line_height,
        })
    }

    pub fn glyph(&self, c: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&c)
    }

    /// Width of a string in pixels.
    pub fn measure(&self, text: &str) -> f32 {
        text.chars()
            .filter_map(|c| self.glyphs.get(&c))
            .map(|g| g.advance)
            .sum()
    }
}

fn fits(
    rasterized: &[(char, fontdue::Metrics, Vec<u8>)],
    width: u32,
    height: u32,
    padding: u32,
) -> bool {
    let (mut x, mut y, mut row_height) = (padding, padding, 0u32);
    for (_, metrics, _) in rasterized {
        let glyph_w = metrics.width as u32;
        let glyph_h = metrics.height as u32;
        if x + glyph_w + padding > width {
            x = padding;
            y += row_height + padding;
            row_height = 0;
        }
        if y + glyph_h + padding > height {
            return false;
        }
        x += glyph_w + padding;
        row_height = row_height.max(glyph_h);
    }
    true
}

/// A glyph sheet uploaded as an `R8Unorm` texture.
pub struct FontAtlas {
    pub sheet: GlyphSheet,
    #[allow(dead_code)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl FontAtlas {
    pub fn new(gpu: &GpuContext, font_data: &[u8], size: f32) -> Result<Self, &'static str> {
        let sheet = GlyphSheet::rasterize(font_data, size)?;
        let extent = wgpu::Extent3d {
            width: sheet.width,
            height: sheet.height,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Font Atlas"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &sheet.coverage,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(sheet.width),
                rows_per_image: Some(sheet.height),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Font Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            sheet,
            texture,
            view,
            sampler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(GlyphSheet::rasterize(b"not a font", 13.0).is_err());
    }
}
