//! The color-grade node graph evaluated by the last post pass.
//!
//! The graph is a fixed chain of [`ColorAdjustment`] stages fed by shared
//! [`ScalarNode`] cells. Editing a cell never rebuilds anything; the new value
//! reaches the GPU the next time the graph is updated through a [`NodeFrame`].

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec3;

use crate::params::{ColorGradeParameters, hue_angle};

/// Luma weights used by the saturation stage.
pub const SATURATION_LUMA: Vec3 = Vec3::new(0.2125, 0.7154, 0.0721);

/// A shared, live scalar input.
///
/// Clones share the same cell, so a handle kept by the viewer and the one
/// held by the graph always agree.
#[derive(Clone, Debug, Default)]
pub struct ScalarNode(Rc<Cell<f32>>);

impl ScalarNode {
    pub fn new(value: f32) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    pub fn get(&self) -> f32 {
        self.0.get()
    }

    pub fn set(&self, value: f32) {
        self.0.set(value);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdjustmentKind {
    /// Rotation of the YIQ chroma plane, in radians.
    Hue,
    Saturation,
    Vibrance,
    Brightness,
    Contrast,
}

/// One stage of the chain.
#[derive(Clone, Debug)]
pub struct ColorAdjustment {
    pub kind: AdjustmentKind,
    pub amount: ScalarNode,
}

impl ColorAdjustment {
    pub fn new(kind: AdjustmentKind, amount: ScalarNode) -> Self {
        Self { kind, amount }
    }

    /// Apply this stage to a linear color with an explicit amount.
    pub fn apply_with(kind: AdjustmentKind, rgb: Vec3, amount: f32) -> Vec3 {
        match kind {
            AdjustmentKind::Hue => rotate_hue(rgb, amount),
            AdjustmentKind::Saturation => {
                let luma = Vec3::splat(rgb.dot(SATURATION_LUMA));
                luma.lerp(rgb, amount)
            }
            AdjustmentKind::Vibrance => {
                let average = (rgb.x + rgb.y + rgb.z) / 3.0;
                let max = rgb.max_element();
                let mix = (max - average) * (-3.0 * amount);
                rgb.lerp(Vec3::splat(max), mix)
            }
            AdjustmentKind::Brightness => rgb + Vec3::splat(amount),
            AdjustmentKind::Contrast => (rgb - Vec3::splat(0.5)) * amount + Vec3::splat(0.5),
        }
    }
}

/// Rotate the IQ chroma plane. Rows are the NTSC RGB→YIQ and YIQ→RGB
/// matrices, so a gray input has zero chroma and comes back unchanged.
fn rotate_hue(rgb: Vec3, angle: f32) -> Vec3 {
    let y = rgb.dot(Vec3::new(0.299, 0.587, 0.114));
    let i = rgb.dot(Vec3::new(0.595716, -0.274453, -0.321263));
    let q = rgb.dot(Vec3::new(0.211456, -0.522591, 0.311135));

    let hue = q.atan2(i) + angle;
    let chroma = (i * i + q * q).sqrt();
    let (i, q) = (chroma * hue.cos(), chroma * hue.sin());

    Vec3::new(
        y + 0.9563 * i + 0.6210 * q,
        y - 0.2721 * i - 0.6474 * q,
        y - 1.1070 * i + 1.7046 * q,
    )
}

/// Per-frame timing for node updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeFrame {
    pub time: f64,
    pub delta: f64,
    pub frame_id: u64,
}

impl NodeFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next frame.
    pub fn update(&mut self, delta: f64) -> &mut Self {
        self.delta = delta;
        self.time += delta;
        self.frame_id += 1;
        self
    }

    /// Update `graph` for this frame. A second call in the same frame is a no-op.
    pub fn update_node(&mut self, graph: &mut ColorGradeGraph) {
        if graph.frame_id != Some(self.frame_id) {
            graph.refresh(self);
        }
    }
}

/// Uniform block consumed by `color_grade.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorGradeUniforms {
    pub hue: f32,
    pub saturation: f32,
    pub vibrance: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub _padding: [f32; 3],
}

/// screen → hue → saturation → vibrance → brightness → contrast.
#[derive(Debug)]
pub struct ColorGradeGraph {
    stages: [ColorAdjustment; 5],
    uniforms: ColorGradeUniforms,
    frame_id: Option<u64>,
    time: f64,
}

impl ColorGradeGraph {
    /// Build the chain. The hue cell holds the angle in radians.
    pub fn new(params: &ColorGradeParameters) -> Self {
        let stage = |kind, value| ColorAdjustment::new(kind, ScalarNode::new(value));
        let stages = [
            stage(AdjustmentKind::Hue, hue_angle(params.hue)),
            stage(AdjustmentKind::Saturation, params.saturation),
            stage(AdjustmentKind::Vibrance, params.vibrance),
            stage(AdjustmentKind::Brightness, params.brightness),
            stage(AdjustmentKind::Contrast, params.contrast),
        ];
        let mut graph = Self {
            stages,
            uniforms: ColorGradeUniforms::default(),
            frame_id: None,
            time: 0.0,
        };
        graph.uniforms = graph.snapshot();
        graph
    }

    /// Live cell for one stage.
    pub fn scalar(&self, kind: AdjustmentKind) -> &ScalarNode {
        let index = match kind {
            AdjustmentKind::Hue => 0,
            AdjustmentKind::Saturation => 1,
            AdjustmentKind::Vibrance => 2,
            AdjustmentKind::Brightness => 3,
            AdjustmentKind::Contrast => 4,
        };
        &self.stages[index].amount
    }

    /// Uniforms as of the last update.
    pub fn uniforms(&self) -> ColorGradeUniforms {
        self.uniforms
    }

    /// Frame the graph was last updated in.
    pub fn last_frame(&self) -> Option<u64> {
        self.frame_id
    }

    /// Seconds of node time seen by the last update.
    pub fn time(&self) -> f64 {
        self.time
    }

    fn snapshot(&self) -> ColorGradeUniforms {
        ColorGradeUniforms {
            hue: self.scalar(AdjustmentKind::Hue).get(),
            saturation: self.scalar(AdjustmentKind::Saturation).get(),
            vibrance: self.scalar(AdjustmentKind::Vibrance).get(),
            brightness: self.scalar(AdjustmentKind::Brightness).get(),
            contrast: self.scalar(AdjustmentKind::Contrast).get(),
            _padding: [0.0; 3],
        }
    }

    fn refresh(&mut self, frame: &NodeFrame) {
        self.uniforms = self.snapshot();
        self.frame_id = Some(frame.frame_id);
        self.time = frame.time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run a color through the chain the way `color_grade.wgsl` does.
    fn evaluate(graph: &ColorGradeGraph, rgb: Vec3) -> Vec3 {
        let u = graph.uniforms();
        [
            (AdjustmentKind::Hue, u.hue),
            (AdjustmentKind::Saturation, u.saturation),
            (AdjustmentKind::Vibrance, u.vibrance),
            (AdjustmentKind::Brightness, u.brightness),
            (AdjustmentKind::Contrast, u.contrast),
        ]
        .into_iter()
        .fold(rgb, |color, (kind, amount)| {
            ColorAdjustment::apply_with(kind, color, amount)
        })
    }

    fn close(a: Vec3, b: Vec3, eps: f32) -> bool {
        (a - b).abs().max_element() < eps
    }

    #[test]
    fn neutral_settings_reproduce_the_input() {
        let graph = ColorGradeGraph::new(&ColorGradeParameters::NEUTRAL);
        for rgb in [Vec3::new(0.2, 0.5, 0.8), Vec3::splat(0.5), Vec3::new(1.0, 0.0, 0.3)] {
            assert!(close(evaluate(&graph, rgb), rgb, 1e-2), "{rgb}");
        }
    }

    #[test]
    fn hue_cell_holds_radians() {
        let graph = ColorGradeGraph::new(&ColorGradeParameters {
            hue: 0.25,
            ..ColorGradeParameters::NEUTRAL
        });
        let angle = graph.scalar(AdjustmentKind::Hue).get();
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn full_hue_turn_is_identity() {
        let rgb = Vec3::new(0.7, 0.2, 0.1);
        let rotated = ColorAdjustment::apply_with(AdjustmentKind::Hue, rgb, std::f32::consts::TAU);
        assert!(close(rotated, rgb, 1e-2));
        let half = ColorAdjustment::apply_with(AdjustmentKind::Hue, rgb, std::f32::consts::PI);
        assert!(!close(half, rgb, 0.1));
    }

    #[test]
    fn hue_rotation_keeps_grays_and_luma() {
        for angle in [0.5, 1.0, std::f32::consts::PI] {
            let gray = Vec3::splat(0.6);
            let out = ColorAdjustment::apply_with(AdjustmentKind::Hue, gray, angle);
            assert!(close(out, gray, 1e-3), "{angle}: {out}");

            let rgb = Vec3::new(0.7, 0.2, 0.1);
            let luma = Vec3::new(0.299, 0.587, 0.114);
            let rotated = ColorAdjustment::apply_with(AdjustmentKind::Hue, rgb, angle);
            assert!((rotated.dot(luma) - rgb.dot(luma)).abs() < 1e-3, "{angle}");
        }
    }

    #[test]
    fn zero_saturation_is_gray() {
        let red = Vec3::new(1.0, 0.0, 0.0);
        let out = ColorAdjustment::apply_with(AdjustmentKind::Saturation, red, 0.0);
        assert!(close(out, Vec3::splat(0.2125), 1e-6));
    }

    #[test]
    fn brightness_and_contrast() {
        let rgb = Vec3::new(0.25, 0.5, 0.75);
        let bright = ColorAdjustment::apply_with(AdjustmentKind::Brightness, rgb, 0.1);
        assert!(close(bright, Vec3::new(0.35, 0.6, 0.85), 1e-6));
        let flat = ColorAdjustment::apply_with(AdjustmentKind::Contrast, rgb, 0.0);
        assert!(close(flat, Vec3::splat(0.5), 1e-6));
        let steep = ColorAdjustment::apply_with(AdjustmentKind::Contrast, rgb, 2.0);
        assert!(close(steep, Vec3::new(0.0, 0.5, 1.0), 1e-6));
    }

    #[test]
    fn vibrance_on_gray_is_noop() {
        let gray = Vec3::splat(0.4);
        let out = ColorAdjustment::apply_with(AdjustmentKind::Vibrance, gray, 1.0);
        assert!(close(out, gray, 1e-6));
    }

    #[test]
    fn edits_apply_only_after_an_update() {
        let mut graph = ColorGradeGraph::new(&ColorGradeParameters::default());
        let mut frame = NodeFrame::new();
        let handle = graph.scalar(AdjustmentKind::Brightness).clone();

        handle.set(0.3);
        assert_eq!(graph.uniforms().brightness, 0.0);

        frame.update(1.0 / 60.0).update_node(&mut graph);
        assert_eq!(graph.uniforms().brightness, 0.3);
        assert_eq!(graph.last_frame(), Some(1));

        // Same frame: no refresh.
        handle.set(0.4);
        frame.update_node(&mut graph);
        assert_eq!(graph.uniforms().brightness, 0.3);

        frame.update(1.0 / 60.0).update_node(&mut graph);
        assert_eq!(graph.uniforms().brightness, 0.4);
        assert!((graph.time() - 2.0 / 60.0).abs() < 1e-9);
    }
}
