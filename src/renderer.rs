//! The renderer contract the viewer drives.
//!
//! [`crate::render::WgpuRenderer`] is the real implementation; tests use
//! fakes that only track settings and counters.

use glam::{UVec2, Vec4};
use thiserror::Error;

use crate::camera::PerspectiveCamera;
use crate::environment::EnvironmentMap;
use crate::postprocess::PostProcessPipeline;
use crate::scene::SceneGraph;
use crate::ui::DrawList;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToneMapping {
    #[default]
    None,
    Linear,
    AcesFilmic,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    #[default]
    Linear,
    Srgb,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShadowMapKind {
    /// Single depth comparison.
    Basic,
    #[default]
    Pcf,
    /// 3x3 filtered comparisons.
    PcfSoft,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowMapSettings {
    pub enabled: bool,
    pub kind: ShadowMapKind,
}

/// Global renderer state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererSettings {
    pub tone_mapping: ToneMapping,
    pub tone_mapping_exposure: f32,
    pub output_encoding: OutputEncoding,
    pub shadow_map: ShadowMapSettings,
    /// Reset [`RenderInfo::render`] automatically at the start of each frame.
    pub auto_reset_info: bool,
    pub clear_color: Vec4,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            tone_mapping: ToneMapping::None,
            tone_mapping_exposure: 1.0,
            output_encoding: OutputEncoding::Linear,
            shadow_map: ShadowMapSettings::default(),
            auto_reset_info: true,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }
}

/// GPU resources currently alive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    pub geometries: usize,
    pub textures: usize,
}

/// Work submitted since the last reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderCounters {
    pub frame: u64,
    pub calls: u64,
    pub triangles: u64,
    pub points: u64,
    pub lines: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Compiled render pipelines.
    pub programs: usize,
    pub memory: MemoryInfo,
    pub render: RenderCounters,
}

impl RenderInfo {
    /// Zero the draw counters and start a new frame. Memory and program
    /// totals are untouched.
    pub fn reset(&mut self) {
        self.render = RenderCounters {
            frame: self.render.frame + 1,
            ..RenderCounters::default()
        };
    }

    /// Count one indexed triangle draw.
    pub fn record_draw(&mut self, triangles: u64) {
        self.render.calls += 1;
        self.render.triangles += triangles;
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    /// The surface must be reconfigured; the frame is skipped.
    #[error("surface lost or outdated")]
    SurfaceLost,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("render failed: {0}")]
    Other(String),
}

/// Everything needed to draw one frame.
pub struct FrameView<'a> {
    pub scene: &'a SceneGraph,
    pub camera: &'a PerspectiveCamera,
    pub pipeline: &'a PostProcessPipeline,
    /// Panel and stats overlay, drawn on top after post-processing.
    pub overlay: &'a DrawList,
}

pub trait Renderer {
    fn settings(&self) -> &RendererSettings;

    fn settings_mut(&mut self) -> &mut RendererSettings;

    /// Drawing surface size in physical pixels.
    fn size(&self) -> UVec2;

    fn set_size(&mut self, width: u32, height: u32);

    fn info(&self) -> &RenderInfo;

    /// Zero the per-frame counters of [`Renderer::info`].
    fn reset_info(&mut self);

    /// Upload an environment ahead of its first use.
    fn prepare_environment(&mut self, environment: &EnvironmentMap);

    /// Draw the scene through the pipeline, then the overlay.
    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_only_clears_draw_counters() {
        let mut info = RenderInfo {
            programs: 7,
            memory: MemoryInfo {
                geometries: 3,
                textures: 5,
            },
            render: RenderCounters::default(),
        };
        info.record_draw(12);
        info.record_draw(1);
        info.render.lines = 4;
        assert_eq!(info.render.calls, 2);
        assert_eq!(info.render.triangles, 13);

        info.reset();
        assert_eq!(info.render.calls, 0);
        assert_eq!(info.render.triangles, 0);
        assert_eq!(info.render.lines, 0);
        assert_eq!(info.render.points, 0);
        assert_eq!(info.render.frame, 1);
        assert_eq!(info.programs, 7);
        assert_eq!(info.memory.textures, 5);
    }
}
