//! The parameter panel: folders of sliders plus a read-only performance folder.
//!
//! The panel owns only its displayed values. Edits come back as
//! [`ParamChange`] events that the viewer applies to the live consumers.

use glam::Vec2;
use winit::event::MouseButton;

use crate::input::Input;
use crate::params::{BloomParameters, ColorGradeParameters, LightingParameters, RenderStats};
use crate::ui::{Color, DrawList, Rect};

pub const PANEL_WIDTH: f32 = 280.0;
pub const ROW_HEIGHT: f32 = 22.0;
const LABEL_WIDTH: f32 = 120.0;
const VALUE_WIDTH: f32 = 52.0;
const PADDING: f32 = 6.0;

/// Every editable parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamId {
    Exposure,
    BloomThreshold,
    BloomStrength,
    BloomRadius,
    Hue,
    Saturation,
    Vibrance,
    Brightness,
    Contrast,
    EnvIntensity,
    DirectionalIntensity,
}

impl ParamId {
    pub fn label(self) -> &'static str {
        match self {
            ParamId::Exposure => "exposure",
            ParamId::BloomThreshold => "bloomThreshold",
            ParamId::BloomStrength => "bloomStrength",
            ParamId::BloomRadius => "bloomRadius",
            ParamId::Hue => "hue",
            ParamId::Saturation => "saturation",
            ParamId::Vibrance => "vibrance",
            ParamId::Brightness => "brightness",
            ParamId::Contrast => "contrast",
            ParamId::EnvIntensity => "envIntensity",
            ParamId::DirectionalIntensity => "directionalIntensity",
        }
    }
}

/// Counters shown in the performance folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatId {
    Programs,
    Geometries,
    Textures,
    DrawCalls,
    Lines,
    Points,
    Triangles,
}

impl StatId {
    pub const ALL: [StatId; 7] = [
        StatId::Programs,
        StatId::Geometries,
        StatId::Textures,
        StatId::DrawCalls,
        StatId::Lines,
        StatId::Points,
        StatId::Triangles,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatId::Programs => "programs",
            StatId::Geometries => "geometries",
            StatId::Textures => "textures",
            StatId::DrawCalls => "drawcalls",
            StatId::Lines => "lines",
            StatId::Points => "points",
            StatId::Triangles => "triangles",
        }
    }

    fn read(self, stats: &RenderStats) -> u64 {
        match self {
            StatId::Programs => stats.programs,
            StatId::Geometries => stats.geometries,
            StatId::Textures => stats.textures,
            StatId::DrawCalls => stats.draw_calls,
            StatId::Lines => stats.lines,
            StatId::Points => stats.points,
            StatId::Triangles => stats.triangles,
        }
    }
}

/// An accepted edit, already clamped and quantized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamChange {
    pub id: ParamId,
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Slider {
    pub id: ParamId,
    pub min: f32,
    pub max: f32,
    pub step: Option<f32>,
    pub value: f32,
}

impl Slider {
    pub fn new(id: ParamId, min: f32, max: f32, value: f32) -> Self {
        Self {
            id,
            min,
            max,
            step: None,
            value: value.clamp(min, max),
        }
    }

    pub fn step(mut self, step: f32) -> Self {
        self.step = Some(step);
        self.value = self.constrain(self.value);
        self
    }

    /// Clamp into range, then snap to the step grid anchored at `min`.
    pub fn constrain(&self, value: f32) -> f32 {
        let value = value.clamp(self.min, self.max);
        match self.step {
            Some(step) if step > 0.0 => {
                let steps = ((value - self.min) / step).round();
                // Snap away float noise like 0.30000001.
                let snapped = self.min + steps * step;
                let decimals = (-step.log10().floor()).max(0.0) as i32;
                let scale = 10f32.powi(decimals);
                ((snapped * scale).round() / scale).clamp(self.min, self.max)
            }
            _ => value,
        }
    }

    /// Position of the value along the track, in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.max > self.min {
            (self.value - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Control {
    Slider(Slider),
    Readout { stat: StatId, value: u64 },
}

#[derive(Clone, Debug)]
pub struct Folder {
    pub title: String,
    pub open: bool,
    pub read_only: bool,
    pub controls: Vec<Control>,
}

impl Folder {
    fn new(title: &str, controls: Vec<Control>) -> Self {
        Self {
            title: title.to_string(),
            open: true,
            read_only: false,
            controls,
        }
    }
}

/// What a laid-out row is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RowKind {
    Header { folder: usize },
    Slider { id: ParamId, track: Rect },
    Readout { stat: StatId },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutRow {
    pub rect: Rect,
    pub kind: RowKind,
}

pub struct ParameterPanel {
    folders: Vec<Folder>,
    viewport_width: f32,
    dragging: Option<ParamId>,
}

impl ParameterPanel {
    pub fn new(
        bloom: &BloomParameters,
        color: &ColorGradeParameters,
        lighting: &LightingParameters,
    ) -> Self {
        let slider = |id, min, max, value| Control::Slider(Slider::new(id, min, max, value));
        let stepped =
            |id, min, max, value| Control::Slider(Slider::new(id, min, max, value).step(0.01));

        let mut performance = Folder::new(
            "performance",
            StatId::ALL
                .iter()
                .map(|&stat| Control::Readout { stat, value: 0 })
                .collect(),
        );
        performance.open = false;
        performance.read_only = true;

        let folders = vec![
            performance,
            Folder::new(
                "Bloom",
                vec![
                    slider(ParamId::Exposure, 0.1, 2.0, bloom.exposure),
                    slider(ParamId::BloomThreshold, 0.0, 1.0, bloom.threshold),
                    slider(ParamId::BloomStrength, 0.0, 3.0, bloom.strength),
                    stepped(ParamId::BloomRadius, 0.0, 1.0, bloom.radius),
                ],
            ),
            Folder::new(
                "Color Correction",
                vec![
                    stepped(ParamId::Hue, 0.0, 1.0, color.hue),
                    stepped(ParamId::Saturation, 0.0, 2.0, color.saturation),
                    stepped(ParamId::Vibrance, -1.0, 1.0, color.vibrance),
                    stepped(ParamId::Brightness, 0.0, 0.5, color.brightness),
                    stepped(ParamId::Contrast, 0.0, 2.0, color.contrast),
                ],
            ),
            Folder::new(
                "Lighting",
                vec![
                    slider(ParamId::EnvIntensity, 0.0, 1.0, lighting.environment_intensity),
                    slider(
                        ParamId::DirectionalIntensity,
                        0.0,
                        1.0,
                        lighting.directional_intensity,
                    ),
                ],
            ),
        ];

        Self {
            folders,
            viewport_width: PANEL_WIDTH,
            dragging: None,
        }
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn folder(&self, title: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.title == title)
    }

    /// Open or close a folder by title. Returns false if there is no such folder.
    pub fn set_open(&mut self, title: &str, open: bool) -> bool {
        match self.folders.iter_mut().find(|f| f.title == title) {
            Some(folder) => {
                folder.open = open;
                true
            }
            None => false,
        }
    }

    fn slider(&self, id: ParamId) -> Option<&Slider> {
        self.folders
            .iter()
            .flat_map(|f| f.controls.iter())
            .find_map(|c| match c {
                Control::Slider(s) if s.id == id => Some(s),
                _ => None,
            })
    }

    fn slider_mut(&mut self, id: ParamId) -> Option<&mut Slider> {
        self.folders
            .iter_mut()
            .flat_map(|f| f.controls.iter_mut())
            .find_map(|c| match c {
                Control::Slider(s) if s.id == id => Some(s),
                _ => None,
            })
    }

    pub fn value(&self, id: ParamId) -> Option<f32> {
        self.slider(id).map(|s| s.value)
    }

    /// Edit a control as if the user had set it. Non-finite values are
    /// refused.
    pub fn set(&mut self, id: ParamId, value: f32) -> Option<ParamChange> {
        if !value.is_finite() {
            return None;
        }
        let slider = self.slider_mut(id)?;
        slider.value = slider.constrain(value);
        Some(ParamChange {
            id,
            value: slider.value,
        })
    }

    /// Refresh the performance readouts.
    pub fn listen(&mut self, stats: &RenderStats) {
        for folder in self.folders.iter_mut().filter(|f| f.read_only) {
            for control in &mut folder.controls {
                if let Control::Readout { stat, value } = control {
                    *value = stat.read(stats);
                }
            }
        }
    }

    pub fn readout(&self, stat: StatId) -> Option<u64> {
        self.folders
            .iter()
            .flat_map(|f| f.controls.iter())
            .find_map(|c| match c {
                Control::Readout { stat: s, value } if *s == stat => Some(*value),
                _ => None,
            })
    }

    /// The panel hugs the right edge of the viewport.
    pub fn set_viewport_width(&mut self, width: f32) {
        self.viewport_width = width;
    }

    fn origin(&self) -> Vec2 {
        Vec2::new((self.viewport_width - PANEL_WIDTH).max(0.0), 0.0)
    }

    /// Row rectangles, top to bottom.
    pub fn layout(&self) -> Vec<LayoutRow> {
        let origin = self.origin();
        let mut rows = Vec::new();
        let mut y = origin.y;
        for (index, folder) in self.folders.iter().enumerate() {
            rows.push(LayoutRow {
                rect: Rect::new(origin.x, y, PANEL_WIDTH, ROW_HEIGHT),
                kind: RowKind::Header { folder: index },
            });
            y += ROW_HEIGHT;
            if !folder.open {
                continue;
            }
            for control in &folder.controls {
                let rect = Rect::new(origin.x, y, PANEL_WIDTH, ROW_HEIGHT);
                let kind = match control {
                    Control::Slider(slider) => RowKind::Slider {
                        id: slider.id,
                        track: Rect::new(
                            origin.x + LABEL_WIDTH,
                            y + 4.0,
                            PANEL_WIDTH - LABEL_WIDTH - VALUE_WIDTH - PADDING,
                            ROW_HEIGHT - 8.0,
                        ),
                    },
                    Control::Readout { stat, .. } => RowKind::Readout { stat: *stat },
                };
                rows.push(LayoutRow { rect, kind });
                y += ROW_HEIGHT;
            }
        }
        rows
    }

    pub fn bounds(&self) -> Rect {
        let origin = self.origin();
        let height = self.layout().last().map_or(0.0, |row| row.rect.bottom() - origin.y);
        Rect::new(origin.x, origin.y, PANEL_WIDTH, height)
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    /// True while the panel owns the pointer: during a drag or while hovering.
    pub fn wants_pointer(&self, input: &Input) -> bool {
        self.dragging.is_some() || self.bounds().contains(input.mouse_position())
    }

    /// Process this frame's pointer input and return the resulting edits.
    pub fn handle_input(&mut self, input: &Input) -> Vec<ParamChange> {
        let mut changes = Vec::new();
        let position = input.mouse_position();

        if input.mouse_pressed(MouseButton::Left) {
            let hit = self.layout().into_iter().find(|row| row.rect.contains(position));
            match hit.map(|row| row.kind) {
                Some(RowKind::Header { folder }) => {
                    if let Some(folder) = self.folders.get_mut(folder) {
                        folder.open = !folder.open;
                    }
                }
                Some(RowKind::Slider { id, track }) => {
                    self.dragging = Some(id);
                    changes.extend(self.drag_to(id, track, position.x));
                }
                _ => {}
            }
        } else if let Some(id) = self.dragging {
            if input.mouse_down(MouseButton::Left) {
                if input.mouse_delta() != Vec2::ZERO {
                    let track = self.layout().into_iter().find_map(|row| match row.kind {
                        RowKind::Slider { id: i, track } if i == id => Some(track),
                        _ => None,
                    });
                    if let Some(track) = track {
                        changes.extend(self.drag_to(id, track, position.x));
                    }
                }
            } else {
                self.dragging = None;
            }
        }

        changes
    }

    fn drag_to(&mut self, id: ParamId, track: Rect, x: f32) -> Option<ParamChange> {
        let slider = self.slider(id)?;
        let fraction = ((x - track.x) / track.width.max(1.0)).clamp(0.0, 1.0);
        let value = slider.min + fraction * (slider.max - slider.min);
        let change = self.set(id, value)?;
        log::debug!("panel: {} = {}", id.label(), change.value);
        Some(change)
    }

    pub fn draw(&self, list: &mut DrawList) {
        list.pane(self.bounds(), Color::PANEL_BG, None);
        let text_y = |rect: Rect| rect.y + 4.0;

        for row in self.layout() {
            match row.kind {
                RowKind::Header { folder } => {
                    let Some(folder) = self.folders.get(folder) else {
                        continue;
                    };
                    list.rect(row.rect, Color::HEADER_BG);
                    let marker = if folder.open { "v" } else { ">" };
                    list.text(
                        row.rect.x + PADDING,
                        text_y(row.rect),
                        format!("{marker} {}", folder.title),
                        Color::WHITE,
                    );
                }
                RowKind::Slider { id, track } => {
                    let Some(slider) = self.slider(id) else {
                        continue;
                    };
                    list.text(row.rect.x + PADDING, text_y(row.rect), id.label(), Color::WHITE);
                    list.rect(track, Color::TRACK);
                    let filled = Rect::new(
                        track.x,
                        track.y,
                        track.width * slider.fraction(),
                        track.height,
                    );
                    list.rect(filled, Color::FILL);
                    list.text(
                        track.right() + PADDING,
                        text_y(row.rect),
                        format_value(slider),
                        Color::TEXT_DIM,
                    );
                }
                RowKind::Readout { stat } => {
                    let value = self.readout(stat).unwrap_or_default();
                    list.text(row.rect.x + PADDING, text_y(row.rect), stat.label(), Color::WHITE);
                    list.text(
                        row.rect.x + LABEL_WIDTH,
                        text_y(row.rect),
                        value.to_string(),
                        Color::TEXT_DIM,
                    );
                }
            }
        }
    }
}

fn format_value(slider: &Slider) -> String {
    match slider.step {
        Some(_) => format!("{:.2}", slider.value),
        None => format!("{:.3}", slider.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> ParameterPanel {
        let mut panel = ParameterPanel::new(
            &BloomParameters::default(),
            &ColorGradeParameters::default(),
            &LightingParameters::default(),
        );
        panel.set_viewport_width(1280.0);
        panel
    }

    #[test]
    fn folders_in_order_with_performance_closed() {
        let panel = panel();
        let titles: Vec<_> = panel.folders().iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, ["performance", "Bloom", "Color Correction", "Lighting"]);
        let perf = panel.folder("performance").unwrap();
        assert!(!perf.open);
        assert!(perf.read_only);
        assert_eq!(perf.controls.len(), 7);
    }

    #[test]
    fn initial_values_come_from_the_bags() {
        let panel = panel();
        assert_eq!(panel.value(ParamId::Exposure), Some(0.88));
        assert_eq!(panel.value(ParamId::Saturation), Some(0.6));
        assert_eq!(panel.value(ParamId::Contrast), Some(1.0));
        assert_eq!(panel.value(ParamId::EnvIntensity), Some(1.0));
    }

    #[test]
    fn set_clamps_into_range() {
        let mut panel = panel();
        let change = panel.set(ParamId::Exposure, 5.0).unwrap();
        assert_eq!(change.value, 2.0);
        assert_eq!(panel.set(ParamId::Vibrance, -4.0).unwrap().value, -1.0);
        assert_eq!(panel.set(ParamId::Brightness, 0.9).unwrap().value, 0.5);
    }

    #[test]
    fn non_finite_values_are_refused() {
        let mut panel = panel();
        for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(panel.set(ParamId::Exposure, value).is_none());
        }
        assert_eq!(panel.value(ParamId::Exposure), Some(0.88));
    }

    #[test]
    fn stepped_controls_quantize() {
        let mut panel = panel();
        assert_eq!(panel.set(ParamId::Hue, 0.256).unwrap().value, 0.26);
        assert_eq!(panel.set(ParamId::BloomRadius, 0.4049).unwrap().value, 0.4);
        // Unstepped controls keep the exact value.
        assert_eq!(panel.set(ParamId::BloomThreshold, 0.75).unwrap().value, 0.75);
        assert_eq!(panel.set(ParamId::BloomThreshold, 0.123).unwrap().value, 0.123);
    }

    #[test]
    fn listen_fills_the_readouts() {
        let mut panel = panel();
        panel.listen(&RenderStats {
            programs: 3,
            draw_calls: 12,
            triangles: 900,
            ..RenderStats::default()
        });
        assert_eq!(panel.readout(StatId::Programs), Some(3));
        assert_eq!(panel.readout(StatId::DrawCalls), Some(12));
        assert_eq!(panel.readout(StatId::Triangles), Some(900));
        assert_eq!(panel.readout(StatId::Lines), Some(0));
    }

    #[test]
    fn clicking_a_header_toggles_the_folder() {
        let mut panel = panel();
        let header = panel.layout()[0].rect;
        let mut input = Input::new();
        input.move_to(Vec2::new(header.x + 10.0, header.y + 5.0));
        input.press(MouseButton::Left);
        assert!(panel.handle_input(&input).is_empty());
        assert!(panel.folder("performance").unwrap().open);
    }

    #[test]
    fn pressing_and_dragging_a_slider_emits_changes() {
        let mut panel = panel();
        let track = panel
            .layout()
            .into_iter()
            .find_map(|row| match row.kind {
                RowKind::Slider {
                    id: ParamId::BloomThreshold,
                    track,
                } => Some(track),
                _ => None,
            })
            .unwrap();

        let mut input = Input::new();
        input.move_to(Vec2::new(track.x, track.y + 1.0));
        input.press(MouseButton::Left);
        let changes = panel.handle_input(&input);
        assert_eq!(changes, vec![ParamChange { id: ParamId::BloomThreshold, value: 0.0 }]);
        assert!(panel.wants_pointer(&input));

        input.begin_frame();
        input.move_to(Vec2::new(track.right() + 40.0, track.y + 1.0));
        let changes = panel.handle_input(&input);
        assert_eq!(changes, vec![ParamChange { id: ParamId::BloomThreshold, value: 1.0 }]);

        input.begin_frame();
        input.release(MouseButton::Left);
        panel.handle_input(&input);
        assert!(!panel.is_dragging());
    }

    #[test]
    fn pointer_outside_is_not_captured() {
        let panel = panel();
        let mut input = Input::new();
        input.move_to(Vec2::new(10.0, 10.0));
        assert!(!panel.wants_pointer(&input));
    }

    #[test]
    fn draw_emits_commands() {
        let panel = panel();
        let mut list = DrawList::new();
        panel.draw(&mut list);
        assert!(list.len() > panel.layout().len());
    }
}
