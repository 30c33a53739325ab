//! Runtime-tunable parameter bags and the per-frame render statistics snapshot.

use std::f32::consts::TAU;

use crate::renderer::RenderInfo;

/// Tone-mapping exposure derived from the user-facing exposure value.
///
/// The curve is `exposure^4`, not linear.
pub fn tone_mapping_exposure(exposure: f32) -> f32 {
    exposure.powi(4)
}

/// Hue rotation in radians for a hue value in `[0, 1]`.
pub fn hue_angle(hue: f32) -> f32 {
    hue * TAU
}

/// Exposure and bloom pass inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomParameters {
    pub exposure: f32,
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

impl Default for BloomParameters {
    fn default() -> Self {
        Self {
            exposure: 0.88,
            threshold: 0.51,
            strength: 0.94,
            radius: 0.41,
        }
    }
}

impl BloomParameters {
    pub fn tone_mapping_exposure(&self) -> f32 {
        tone_mapping_exposure(self.exposure)
    }
}

/// Light intensities. Both live in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightingParameters {
    /// Broadcast to the material of every loaded mesh.
    pub environment_intensity: f32,
    /// Intensity of the single directional light.
    pub directional_intensity: f32,
}

impl Default for LightingParameters {
    fn default() -> Self {
        Self {
            environment_intensity: 1.0,
            directional_intensity: 1.0,
        }
    }
}

/// Inputs of the color-grade chain, applied in field order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorGradeParameters {
    pub hue: f32,
    pub saturation: f32,
    pub vibrance: f32,
    pub brightness: f32,
    pub contrast: f32,
}

impl Default for ColorGradeParameters {
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: 0.6,
            vibrance: 0.29,
            brightness: 0.0,
            contrast: 1.0,
        }
    }
}

impl ColorGradeParameters {
    /// Settings that leave every color unchanged.
    pub const NEUTRAL: Self = Self {
        hue: 0.0,
        saturation: 1.0,
        vibrance: 0.0,
        brightness: 0.0,
        contrast: 1.0,
    };

    pub fn hue_angle(&self) -> f32 {
        hue_angle(self.hue)
    }
}

/// Snapshot of the renderer counters, taken once per frame for display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub programs: u64,
    pub geometries: u64,
    pub textures: u64,
    pub draw_calls: u64,
    pub lines: u64,
    pub points: u64,
    pub triangles: u64,
}

impl From<&RenderInfo> for RenderStats {
    fn from(info: &RenderInfo) -> Self {
        Self {
            programs: info.programs as u64,
            geometries: info.memory.geometries as u64,
            textures: info.memory.textures as u64,
            draw_calls: info.render.calls,
            lines: info.render.lines,
            points: info.render.points,
            triangles: info.render.triangles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{MemoryInfo, RenderCounters};

    #[test]
    fn exposure_curve_is_fourth_power() {
        for i in 0..=19 {
            let e = 0.1 + i as f32 * 0.1;
            let expected = e * e * e * e;
            assert!((tone_mapping_exposure(e) - expected).abs() <= expected * 1e-6);
        }
        assert_eq!(tone_mapping_exposure(1.0), 1.0);
    }

    #[test]
    fn hue_maps_to_full_turn() {
        assert_eq!(hue_angle(0.0), 0.0);
        assert!((hue_angle(0.5) - std::f32::consts::PI).abs() < 1e-6);
        assert!((hue_angle(1.0) - TAU).abs() < 1e-6);
    }

    #[test]
    fn defaults_match_viewer_presets() {
        let bloom = BloomParameters::default();
        assert_eq!(
            (bloom.exposure, bloom.threshold, bloom.strength, bloom.radius),
            (0.88, 0.51, 0.94, 0.41)
        );
        let color = ColorGradeParameters::default();
        assert_eq!(color.saturation, 0.6);
        assert_eq!(color.vibrance, 0.29);
        assert_eq!(color.contrast, 1.0);
    }

    #[test]
    fn stats_copy_every_counter() {
        let info = RenderInfo {
            programs: 7,
            memory: MemoryInfo {
                geometries: 3,
                textures: 5,
            },
            render: RenderCounters {
                frame: 10,
                calls: 12,
                triangles: 3400,
                points: 1,
                lines: 2,
            },
        };
        let stats = RenderStats::from(&info);
        assert_eq!(
            stats,
            RenderStats {
                programs: 7,
                geometries: 3,
                textures: 5,
                draw_calls: 12,
                lines: 2,
                points: 1,
                triangles: 3400,
            }
        );
    }
}
