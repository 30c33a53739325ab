//! Equirectangular HDR environments and their prefiltered lighting maps.
//!
//! An [`HdrImage`] is the decoded Radiance file. [`EnvironmentBaker`] turns it
//! into an [`EnvironmentMap`]: a radiance mip chain whose levels are blurred
//! progressively (level `i` serves roughness `i / (levels - 1)`), plus a small
//! cosine-convolved irradiance map for diffuse lighting. The level-0 radiance
//! doubles as the scene background.
//!
//! Direction convention shared with `scene.wgsl`:
//! `u = 0.5 + atan2(z, x) / 2π`, `v = acos(y) / π` (v = 0 at the zenith).

use std::f32::consts::{PI, TAU};
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Vec2, Vec3};

static NEXT_ENVIRONMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Map a unit direction to equirectangular texture coordinates.
pub fn direction_to_uv(direction: Vec3) -> Vec2 {
    let d = direction.normalize_or(Vec3::Y);
    Vec2::new(0.5 + d.z.atan2(d.x) / TAU, d.y.clamp(-1.0, 1.0).acos() / PI)
}

/// Inverse of [`direction_to_uv`].
pub fn uv_to_direction(uv: Vec2) -> Vec3 {
    let phi = (uv.x - 0.5) * TAU;
    let theta = uv.y * PI;
    Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin())
}

/// Decoded linear RGB image, rows top to bottom.
#[derive(Clone, Debug, PartialEq)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 3]>,
}

impl HdrImage {
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 3]>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A uniformly lit environment.
    pub fn solid(width: u32, height: u32, color: [f32; 3]) -> Self {
        Self::new(width, height, vec![color; (width * height) as usize])
    }

    /// Decode a Radiance `.hdr` file.
    pub fn from_hdr_bytes(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)?;
        let rgb = decoded.into_rgb32f();
        let (width, height) = rgb.dimensions();
        let pixels = rgb.pixels().map(|p| p.0).collect();
        Ok(Self::new(width, height, pixels))
    }

    /// True when the image has no texels to sample.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn texel(&self, x: u32, y: u32) -> Vec3 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        Vec3::from(self.pixels[(y * self.width + x) as usize])
    }

    /// Area-average resample. Upsampling degenerates to nearest. An empty
    /// source resamples to black.
    pub fn resample(&self, width: u32, height: u32) -> HdrImage {
        if self.is_empty() {
            return HdrImage::solid(width, height, [0.0; 3]);
        }
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let (y0, y1) = footprint(y, height, self.height);
            for x in 0..width {
                let (x0, x1) = footprint(x, width, self.width);
                let mut sum = Vec3::ZERO;
                for sy in y0..y1 {
                    for sx in x0..x1 {
                        sum += self.texel(sx, sy);
                    }
                }
                let count = ((y1 - y0) * (x1 - x0)) as f32;
                pixels.push((sum / count).into());
            }
        }
        HdrImage::new(width, height, pixels)
    }
}

/// Source texel range covered by destination texel `i`.
fn footprint(i: u32, dst: u32, src: u32) -> (u32, u32) {
    let start = ((i as u64 * src as u64 / dst as u64) as u32).min(src - 1);
    let end = ((i as u64 + 1) * src as u64).div_ceil(dst as u64) as u32;
    (start, end.min(src).max(start + 1))
}

/// One level of an environment texture.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentLevel {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[f32; 3]>,
}

impl EnvironmentLevel {
    fn from_image(image: HdrImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            texels: image.pixels,
        }
    }

    fn texel(&self, x: i64, y: i64) -> Vec3 {
        let x = x.rem_euclid(self.width as i64) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        Vec3::from(self.texels[(y * self.width + x) as usize])
    }

    /// Nearest-texel lookup in a direction.
    pub fn sample(&self, direction: Vec3) -> Vec3 {
        let uv = direction_to_uv(direction);
        let x = (uv.x * self.width as f32).floor() as i64;
        let y = (uv.y * self.height as f32).floor() as i64;
        self.texel(x, y)
    }

    /// Texels packed as `Rgb9e5Ufloat`, ready for upload.
    pub fn to_rgb9e5(&self) -> Vec<u32> {
        self.texels.iter().map(|&t| pack_rgb9e5(t)).collect()
    }
}

/// Prefiltered lighting derived from one equirectangular image.
#[derive(Debug)]
pub struct EnvironmentMap {
    id: u64,
    /// Mip chain, sharp to rough. Each level is half the size of the previous.
    pub radiance: Vec<EnvironmentLevel>,
    /// Cosine-weighted hemisphere integral of the radiance, divided by π.
    pub irradiance: EnvironmentLevel,
}

impl EnvironmentMap {
    /// Unique per bake, so renderers can tell when to re-upload.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn max_lod(&self) -> f32 {
        self.radiance.len().saturating_sub(1) as f32
    }

    pub fn sample_irradiance(&self, normal: Vec3) -> Vec3 {
        self.irradiance.sample(normal)
    }

    /// Blurred radiance for a roughness in `[0, 1]`, nearest level.
    pub fn sample_radiance(&self, direction: Vec3, roughness: f32) -> Vec3 {
        let level = (roughness.clamp(0.0, 1.0) * self.max_lod()).round() as usize;
        self.radiance[level.min(self.radiance.len() - 1)].sample(direction)
    }
}

/// Converts equirectangular images into [`EnvironmentMap`]s.
///
/// Owns scratch buffers reused between bakes; drop it once baking is done.
pub struct EnvironmentBaker {
    pub base_width: u32,
    pub levels: u32,
    pub irradiance_width: u32,
    /// Resolution of the radiance copy integrated for irradiance.
    pub irradiance_source_width: u32,
    scratch: Vec<Vec3>,
}

impl Default for EnvironmentBaker {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentBaker {
    pub fn new() -> Self {
        Self {
            base_width: 512,
            levels: 6,
            irradiance_width: 32,
            irradiance_source_width: 64,
            scratch: Vec::new(),
        }
    }

    /// Bake the radiance chain and irradiance map for `image`.
    pub fn bake_equirectangular(&mut self, image: &HdrImage) -> EnvironmentMap {
        let base_width = self.base_width.max(1 << self.levels.max(1));
        let base = image.resample(base_width, base_width / 2);

        let mut radiance = Vec::with_capacity(self.levels as usize);
        radiance.push(EnvironmentLevel::from_image(base));
        for level in 1..self.levels {
            let previous = &radiance[level as usize - 1];
            let mut next = downsample(previous);
            for _ in 0..level {
                self.blur(&mut next);
            }
            radiance.push(next);
        }

        let irradiance = self.convolve_irradiance(image);

        log::debug!(
            "baked environment: {} radiance levels from {}x{}, irradiance {}x{}",
            radiance.len(),
            image.width,
            image.height,
            irradiance.width,
            irradiance.height
        );

        EnvironmentMap {
            id: NEXT_ENVIRONMENT_ID.fetch_add(1, Ordering::Relaxed),
            radiance,
            irradiance,
        }
    }

    /// Separable [1 2 1] blur, wrapping horizontally.
    fn blur(&mut self, level: &mut EnvironmentLevel) {
        let (w, h) = (level.width as i64, level.height as i64);
        self.scratch.clear();
        for y in 0..h {
            for x in 0..w {
                let sum = level.texel(x - 1, y) + level.texel(x, y) * 2.0 + level.texel(x + 1, y);
                self.scratch.push(sum * 0.25);
            }
        }
        for y in 0..h {
            for x in 0..w {
                let at = |yy: i64| self.scratch[(yy.clamp(0, h - 1) * w + x) as usize];
                let sum = at(y - 1) + at(y) * 2.0 + at(y + 1);
                level.texels[(y * w + x) as usize] = (sum * 0.25).into();
            }
        }
    }

    fn convolve_irradiance(&mut self, image: &HdrImage) -> EnvironmentLevel {
        let sw = self.irradiance_source_width.max(4);
        let source = image.resample(sw, sw / 2);
        let (sw, sh) = (source.width, source.height);

        // Directions weighted by texel solid angle.
        self.scratch.clear();
        let mut weights = Vec::with_capacity((sw * sh) as usize);
        for y in 0..sh {
            let v = (y as f32 + 0.5) / sh as f32;
            let solid_angle = (TAU / sw as f32) * (PI / sh as f32) * (v * PI).sin();
            for x in 0..sw {
                let u = (x as f32 + 0.5) / sw as f32;
                self.scratch.push(uv_to_direction(Vec2::new(u, v)));
                weights.push(solid_angle);
            }
        }

        let w = self.irradiance_width.max(2);
        let h = w / 2;
        let mut texels = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let uv = Vec2::new((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32);
                let normal = uv_to_direction(uv);
                let mut sum = Vec3::ZERO;
                for (i, direction) in self.scratch.iter().enumerate() {
                    let cos = normal.dot(*direction);
                    if cos > 0.0 {
                        sum += Vec3::from(source.pixels[i]) * cos * weights[i];
                    }
                }
                texels.push((sum / PI).into());
            }
        }

        EnvironmentLevel {
            width: w,
            height: h,
            texels,
        }
    }
}

fn downsample(level: &EnvironmentLevel) -> EnvironmentLevel {
    let width = (level.width / 2).max(1);
    let height = (level.height / 2).max(1);
    let mut texels = Vec::with_capacity((width * height) as usize);
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let sum = level.texel(2 * x, 2 * y)
                + level.texel(2 * x + 1, 2 * y)
                + level.texel(2 * x, 2 * y + 1)
                + level.texel(2 * x + 1, 2 * y + 1);
            texels.push((sum * 0.25).into());
        }
    }
    EnvironmentLevel {
        width,
        height,
        texels,
    }
}

const RGB9E5_MANTISSA_BITS: i32 = 9;
const RGB9E5_EXP_BIAS: i32 = 15;
const RGB9E5_MAX: f32 = 65408.0;

/// Pack linear RGB into the shared-exponent `Rgb9e5Ufloat` format.
pub fn pack_rgb9e5(rgb: [f32; 3]) -> u32 {
    let clamp = |c: f32| if c.is_nan() { 0.0 } else { c.clamp(0.0, RGB9E5_MAX) };
    let [r, g, b] = rgb.map(clamp);
    let max = r.max(g).max(b);

    let mut exponent = (max.log2().floor() as i32).max(-RGB9E5_EXP_BIAS - 1) + 1 + RGB9E5_EXP_BIAS;
    let mut scale = 2f32.powi(exponent - RGB9E5_EXP_BIAS - RGB9E5_MANTISSA_BITS);
    if (max / scale + 0.5).floor() as i32 == 1 << RGB9E5_MANTISSA_BITS {
        scale *= 2.0;
        exponent += 1;
    }

    let mantissa = |c: f32| ((c / scale + 0.5).floor() as u32).min(511);
    mantissa(r) | mantissa(g) << 9 | mantissa(b) << 18 | (exponent as u32) << 27
}

/// Inverse of [`pack_rgb9e5`].
pub fn unpack_rgb9e5(packed: u32) -> [f32; 3] {
    let exponent = (packed >> 27) as i32;
    let scale = 2f32.powi(exponent - RGB9E5_EXP_BIAS - RGB9E5_MANTISSA_BITS);
    [
        (packed & 0x1ff) as f32 * scale,
        ((packed >> 9) & 0x1ff) as f32 * scale,
        ((packed >> 18) & 0x1ff) as f32 * scale,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uv_and_direction_round_trip() {
        for dir in [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Z,
            Vec3::new(0.3, 0.4, -0.866).normalize(),
        ] {
            let back = uv_to_direction(direction_to_uv(dir));
            assert!((back - dir).length() < 1e-4, "{dir} -> {back}");
        }
        assert!(direction_to_uv(Vec3::Y).y.abs() < 1e-6);
        assert!((direction_to_uv(Vec3::NEG_Y).y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn resample_preserves_average() {
        let image = HdrImage::new(4, 2, vec![
            [1.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
            [5.0, 0.0, 0.0],
            [7.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
            [5.0, 0.0, 0.0],
            [7.0, 0.0, 0.0],
        ]);
        let half = image.resample(2, 1);
        assert_eq!(half.pixels, vec![[2.0, 0.0, 0.0], [6.0, 0.0, 0.0]]);

        let up = image.resample(8, 4);
        assert_eq!(up.pixels[0], [1.0, 0.0, 0.0]);
        assert_eq!(up.pixels[7], [7.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_image_bakes_to_black() {
        let empty = HdrImage::new(0, 0, Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.resample(2, 1).pixels, vec![[0.0; 3]; 2]);

        let map = EnvironmentBaker::new().bake_equirectangular(&empty);
        assert!(map.radiance[0].texels.iter().all(|t| *t == [0.0; 3]));
    }

    #[test]
    fn two_by_one_stub_bakes() {
        let image = HdrImage::new(2, 1, vec![[0.5, 0.5, 0.5], [2.0, 2.0, 2.0]]);
        let mut baker = EnvironmentBaker::new();
        let env = baker.bake_equirectangular(&image);
        assert_eq!(env.radiance.len(), 6);
        assert_eq!(env.radiance[0].width, 512);
        assert_eq!(env.radiance[0].height, 256);
        assert_eq!(env.radiance[5].width, 16);
        assert_eq!(env.irradiance.width, 32);
        assert_eq!(env.irradiance.height, 16);
    }

    #[test]
    fn constant_environment_irradiance_is_the_constant() {
        let image = HdrImage::solid(64, 32, [0.8, 0.4, 0.2]);
        let env = EnvironmentBaker::new().bake_equirectangular(&image);
        for normal in [Vec3::Y, Vec3::NEG_Y, Vec3::X, Vec3::new(1.0, 1.0, 0.0).normalize()] {
            let e = env.sample_irradiance(normal);
            assert!((e.x - 0.8).abs() < 0.04, "{normal}: {e}");
            assert!((e.y - 0.4).abs() < 0.02, "{normal}: {e}");
            assert!((e.z - 0.2).abs() < 0.01, "{normal}: {e}");
        }
        let r = env.sample_radiance(Vec3::Z, 1.0);
        assert!((r - Vec3::new(0.8, 0.4, 0.2)).length() < 1e-4);
    }

    #[test]
    fn bright_sky_lights_upward_normals_more() {
        let mut pixels = Vec::new();
        for y in 0..32 {
            let value = if y < 16 { 4.0 } else { 0.0 };
            pixels.extend(std::iter::repeat_n([value; 3], 64));
        }
        let env = EnvironmentBaker::new().bake_equirectangular(&HdrImage::new(64, 32, pixels));
        let up = env.sample_irradiance(Vec3::Y).x;
        let down = env.sample_irradiance(Vec3::NEG_Y).x;
        assert!(up > 3.0 * down.max(0.01));
    }

    #[test]
    fn every_bake_gets_a_new_id() {
        let image = HdrImage::solid(2, 1, [1.0; 3]);
        let mut baker = EnvironmentBaker::new();
        let a = baker.bake_equirectangular(&image);
        let b = baker.bake_equirectangular(&image);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn rgb9e5_round_trip_is_close() {
        for rgb in [[0.0, 0.0, 0.0], [1.0, 0.5, 0.25], [100.0, 3.0, 0.01], [0.001, 0.002, 0.0]] {
            let back = unpack_rgb9e5(pack_rgb9e5(rgb));
            let max = rgb.iter().cloned().fold(0.0f32, f32::max);
            for c in 0..3 {
                assert!((back[c] - rgb[c]).abs() <= max / 256.0 + 1e-7, "{rgb:?} -> {back:?}");
            }
        }
        assert_eq!(unpack_rgb9e5(pack_rgb9e5([-1.0, f32::NAN, 0.0])), [0.0; 3]);
    }
}
