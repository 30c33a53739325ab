//! Description of the post-processing chain.
//!
//! The pipeline only holds pass parameters and sizes. The GPU composer in
//! `render::composer` reads it every frame and keeps its targets the same
//! size as the pipeline.

use glam::UVec2;

use crate::color_grade::ColorGradeGraph;
use crate::params::{BloomParameters, ColorGradeParameters};

/// Mip levels in the bloom blur chain.
pub const BLOOM_MIPS: usize = 5;

/// Per-level weights before the radius adjustment.
pub const BLOOM_FACTORS: [f32; BLOOM_MIPS] = [1.0, 0.8, 0.6, 0.4, 0.2];

/// Luminosity high-pass, mip blur and additive composite.
#[derive(Clone, Debug, PartialEq)]
pub struct BloomPass {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
    pub resolution: UVec2,
}

impl BloomPass {
    pub fn new(resolution: UVec2, strength: f32, radius: f32, threshold: f32) -> Self {
        Self {
            strength,
            radius,
            threshold,
            resolution,
        }
    }

    /// Weight of each blur level in the composite.
    pub fn factors(&self) -> [f32; BLOOM_MIPS] {
        BLOOM_FACTORS.map(|f| lerp(f, 1.2 - f, self.radius))
    }

    /// Resolution of every blur level, halving from the pass resolution.
    pub fn mip_sizes(&self) -> [UVec2; BLOOM_MIPS] {
        let mut size = (self.resolution / 2).max(UVec2::ONE);
        std::array::from_fn(|_| {
            let current = size;
            size = (size / 2).max(UVec2::ONE);
            current
        })
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[derive(Debug)]
pub enum Pass {
    /// Shadows, background and lit meshes into the HDR target.
    Scene { resolution: UVec2 },
    Bloom(BloomPass),
    /// Luma edge detection and edge-directed blending.
    Antialias { resolution: UVec2 },
    ColorGrade {
        resolution: UVec2,
        graph: ColorGradeGraph,
    },
}

impl Pass {
    pub fn name(&self) -> &'static str {
        match self {
            Pass::Scene { .. } => "scene",
            Pass::Bloom(_) => "bloom",
            Pass::Antialias { .. } => "antialias",
            Pass::ColorGrade { .. } => "color grade",
        }
    }

    pub fn resolution(&self) -> UVec2 {
        match self {
            Pass::Scene { resolution }
            | Pass::Antialias { resolution }
            | Pass::ColorGrade { resolution, .. } => *resolution,
            Pass::Bloom(bloom) => bloom.resolution,
        }
    }

    fn set_resolution(&mut self, size: UVec2) {
        match self {
            Pass::Scene { resolution }
            | Pass::Antialias { resolution }
            | Pass::ColorGrade { resolution, .. } => *resolution = size,
            Pass::Bloom(bloom) => bloom.resolution = size,
        }
    }
}

/// scene → bloom → anti-alias → color grade.
#[derive(Debug)]
pub struct PostProcessPipeline {
    passes: Vec<Pass>,
    size: UVec2,
}

impl PostProcessPipeline {
    /// Build the fixed chain for a viewport.
    ///
    /// The bloom pass starts from its stock settings and then takes the
    /// configured parameters.
    pub fn new(size: UVec2, bloom: &BloomParameters, color: &ColorGradeParameters) -> Self {
        let mut bloom_pass = BloomPass::new(size, 1.5, 0.4, 0.85);
        bloom_pass.threshold = bloom.threshold;
        bloom_pass.strength = bloom.strength;
        bloom_pass.radius = bloom.radius;

        let passes = vec![
            Pass::Scene { resolution: size },
            Pass::Bloom(bloom_pass),
            Pass::Antialias { resolution: size },
            Pass::ColorGrade {
                resolution: size,
                graph: ColorGradeGraph::new(color),
            },
        ];
        log::info!(
            "post-process pipeline: {}",
            passes.iter().map(Pass::name).collect::<Vec<_>>().join(" -> ")
        );
        Self { passes, size }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// Resize every pass.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = UVec2::new(width, height);
        for pass in &mut self.passes {
            pass.set_resolution(self.size);
        }
    }

    pub fn bloom(&self) -> Option<&BloomPass> {
        self.passes.iter().find_map(|pass| match pass {
            Pass::Bloom(bloom) => Some(bloom),
            _ => None,
        })
    }

    pub fn bloom_mut(&mut self) -> Option<&mut BloomPass> {
        self.passes.iter_mut().find_map(|pass| match pass {
            Pass::Bloom(bloom) => Some(bloom),
            _ => None,
        })
    }

    pub fn color_grade(&self) -> Option<&ColorGradeGraph> {
        self.passes.iter().find_map(|pass| match pass {
            Pass::ColorGrade { graph, .. } => Some(graph),
            _ => None,
        })
    }

    pub fn color_grade_mut(&mut self) -> Option<&mut ColorGradeGraph> {
        self.passes.iter_mut().find_map(|pass| match pass {
            Pass::ColorGrade { graph, .. } => Some(graph),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> PostProcessPipeline {
        PostProcessPipeline::new(
            UVec2::new(1280, 720),
            &BloomParameters::default(),
            &ColorGradeParameters::default(),
        )
    }

    #[test]
    fn passes_run_in_fixed_order() {
        let names: Vec<_> = pipeline().passes().iter().map(Pass::name).collect();
        assert_eq!(names, ["scene", "bloom", "antialias", "color grade"]);
    }

    #[test]
    fn bloom_takes_configured_parameters() {
        let p = pipeline();
        let bloom = p.bloom().unwrap();
        assert_eq!(bloom.threshold, 0.51);
        assert_eq!(bloom.strength, 0.94);
        assert_eq!(bloom.radius, 0.41);
        assert_eq!(bloom.resolution, UVec2::new(1280, 720));
    }

    #[test]
    fn set_size_resizes_every_pass() {
        let mut p = pipeline();
        p.set_size(640, 480);
        assert_eq!(p.size(), UVec2::new(640, 480));
        assert!(p.passes().iter().all(|pass| pass.resolution() == UVec2::new(640, 480)));
    }

    #[test]
    fn bloom_factors_follow_radius() {
        let mut bloom = BloomPass::new(UVec2::new(64, 64), 1.0, 0.0, 0.5);
        assert_eq!(bloom.factors(), BLOOM_FACTORS);
        bloom.radius = 1.0;
        let f = bloom.factors();
        assert!((f[0] - 0.2).abs() < 1e-6);
        assert!((f[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mip_sizes_halve_and_stay_positive() {
        let bloom = BloomPass::new(UVec2::new(20, 8), 1.0, 0.0, 0.5);
        assert_eq!(
            bloom.mip_sizes(),
            [
                UVec2::new(10, 4),
                UVec2::new(5, 2),
                UVec2::new(2, 1),
                UVec2::new(1, 1),
                UVec2::new(1, 1),
            ]
        );
    }
}
