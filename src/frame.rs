//! The per-frame work list.
//!
//! Each tick runs the steps of a [`FrameLoop`] in order against the viewer.
//! The default order is controls, stats overlay, render-stat capture, node
//! graph, composite.

use crate::input::Input;
use crate::params::RenderStats;
use crate::renderer::{FrameView, RenderError, Renderer};
use crate::viewer::Viewer;

/// Inputs of one tick.
pub struct FrameContext<'a> {
    /// Seconds since the previous tick.
    pub dt: f64,
    pub input: &'a Input,
}

pub trait FrameStep<R: Renderer> {
    fn name(&self) -> &'static str;

    fn run(&mut self, viewer: &mut Viewer<R>, frame: &FrameContext<'_>) -> Result<(), RenderError>;
}

/// Ordered list of frame steps.
pub struct FrameLoop<R: Renderer> {
    steps: Vec<Box<dyn FrameStep<R>>>,
}

impl<R: Renderer> Default for FrameLoop<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Renderer> FrameLoop<R> {
    /// The standard viewer frame.
    pub fn new() -> Self {
        Self::empty()
            .with(UpdateControls)
            .with(UpdateStatsOverlay)
            .with(CaptureRenderStats)
            .with(AdvanceNodeGraph)
            .with(Composite)
    }

    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn with(mut self, step: impl FrameStep<R> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order, stopping at the first error.
    pub fn run(
        &mut self,
        viewer: &mut Viewer<R>,
        frame: &FrameContext<'_>,
    ) -> Result<(), RenderError> {
        for step in &mut self.steps {
            step.run(viewer, frame)?;
        }
        Ok(())
    }
}

/// Route pointer input to the panel and stats overlay, then to the orbit
/// controller unless the panel owns the pointer.
pub struct UpdateControls;

impl<R: Renderer> FrameStep<R> for UpdateControls {
    fn name(&self) -> &'static str {
        "update controls"
    }

    fn run(&mut self, viewer: &mut Viewer<R>, frame: &FrameContext<'_>) -> Result<(), RenderError> {
        let input = frame.input;
        let panel_owned = viewer.panel.wants_pointer(input);
        for change in viewer.panel.handle_input(input) {
            viewer.apply(change);
        }
        let stats_clicked = viewer.stats_overlay.handle_input(input);

        viewer.controls.enabled = !panel_owned && !stats_clicked;
        let height = viewer.renderer.size().y as f32;
        viewer.controls.update(&mut viewer.camera, input, height);
        Ok(())
    }
}

pub struct UpdateStatsOverlay;

impl<R: Renderer> FrameStep<R> for UpdateStatsOverlay {
    fn name(&self) -> &'static str {
        "update stats overlay"
    }

    fn run(&mut self, viewer: &mut Viewer<R>, frame: &FrameContext<'_>) -> Result<(), RenderError> {
        viewer.stats_overlay.update(frame.dt);
        Ok(())
    }
}

/// Copy the renderer counters, then reset them, then show the copy.
pub struct CaptureRenderStats;

impl<R: Renderer> FrameStep<R> for CaptureRenderStats {
    fn name(&self) -> &'static str {
        "capture render stats"
    }

    fn run(
        &mut self,
        viewer: &mut Viewer<R>,
        _frame: &FrameContext<'_>,
    ) -> Result<(), RenderError> {
        viewer.render_stats = RenderStats::from(viewer.renderer.info());
        viewer.renderer.reset_info();
        viewer.panel.listen(&viewer.render_stats);
        Ok(())
    }
}

pub struct AdvanceNodeGraph;

impl<R: Renderer> FrameStep<R> for AdvanceNodeGraph {
    fn name(&self) -> &'static str {
        "advance node graph"
    }

    fn run(&mut self, viewer: &mut Viewer<R>, frame: &FrameContext<'_>) -> Result<(), RenderError> {
        if let Some(graph) = viewer.pipeline.color_grade_mut() {
            viewer.node_frame.update(frame.dt).update_node(graph);
        }
        Ok(())
    }
}

/// Draw the frame through the pipeline with the overlay on top.
pub struct Composite;

impl<R: Renderer> FrameStep<R> for Composite {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn run(
        &mut self,
        viewer: &mut Viewer<R>,
        _frame: &FrameContext<'_>,
    ) -> Result<(), RenderError> {
        viewer.overlay.clear();
        viewer.panel.draw(&mut viewer.overlay);
        viewer.stats_overlay.draw(&mut viewer.overlay);

        let view = FrameView {
            scene: &viewer.scene,
            camera: &viewer.camera,
            pipeline: &viewer.pipeline,
            overlay: &viewer.overlay,
        };
        viewer.renderer.render(&view)
    }
}
