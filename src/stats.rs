//! Frame-rate meter drawn in the top-left corner.

use std::collections::VecDeque;

use glam::Vec2;
use winit::event::MouseButton;

use crate::input::Input;
use crate::ui::{Color, DrawList, Rect};

const WIDTH: f32 = 80.0;
const HEIGHT: f32 = 48.0;
const GRAPH_TOP: f32 = 15.0;
const HISTORY: usize = 74;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsMode {
    /// Frames per second, sampled once a second.
    Fps,
    /// Milliseconds per frame, sampled every frame.
    Ms,
}

#[derive(Clone, Debug)]
struct Series {
    history: VecDeque<f32>,
    current: f32,
    min: f32,
    max: f32,
}

impl Series {
    fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY),
            current: 0.0,
            min: f32::INFINITY,
            max: 0.0,
        }
    }

    fn push(&mut self, value: f32, graph_max: f32) {
        self.current = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        if self.history.len() == HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((value / graph_max).clamp(0.0, 1.0));
    }
}

pub struct StatsOverlay {
    position: Vec2,
    mode: StatsMode,
    frames: u32,
    window: f64,
    fps: Series,
    ms: Series,
}

impl Default for StatsOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsOverlay {
    pub fn new() -> Self {
        Self {
            position: Vec2::ZERO,
            mode: StatsMode::Fps,
            frames: 0,
            window: 0.0,
            fps: Series::new(),
            ms: Series::new(),
        }
    }

    pub fn mode(&self) -> StatsMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: StatsMode) {
        self.mode = mode;
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, WIDTH, HEIGHT)
    }

    /// Last completed one-second FPS sample.
    pub fn fps(&self) -> f32 {
        self.fps.current
    }

    pub fn frame_ms(&self) -> f32 {
        self.ms.current
    }

    /// Record one frame that took `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        self.frames += 1;
        self.window += dt;
        self.ms.push((dt * 1000.0) as f32, 200.0);

        if self.window >= 1.0 {
            let fps = self.frames as f64 / self.window;
            self.fps.push(fps.round() as f32, 100.0);
            self.frames = 0;
            self.window = 0.0;
        }
    }

    /// Clicking the meter cycles the displayed mode. Returns true if it did.
    pub fn handle_input(&mut self, input: &Input) -> bool {
        if input.mouse_pressed(MouseButton::Left)
            && self.bounds().contains(input.mouse_position())
        {
            self.mode = match self.mode {
                StatsMode::Fps => StatsMode::Ms,
                StatsMode::Ms => StatsMode::Fps,
            };
            return true;
        }
        false
    }

    pub fn draw(&self, list: &mut DrawList) {
        let (series, label, fg, bg) = match self.mode {
            StatsMode::Fps => (
                &self.fps,
                "FPS",
                Color::rgb(0.0, 1.0, 1.0),
                Color::rgb(0.0, 0.0, 0.13),
            ),
            StatsMode::Ms => (
                &self.ms,
                "MS",
                Color::rgb(0.0, 1.0, 0.0),
                Color::rgb(0.0, 0.13, 0.0),
            ),
        };

        let bounds = self.bounds();
        list.rect(bounds, bg);

        let min = if series.min.is_finite() { series.min } else { 0.0 };
        list.text(
            bounds.x + 3.0,
            bounds.y + 2.0,
            format!("{:.0} {label} ({:.0}-{:.0})", series.current, min, series.max),
            fg,
        );

        let graph = Rect::new(
            bounds.x + 3.0,
            bounds.y + GRAPH_TOP,
            WIDTH - 6.0,
            HEIGHT - GRAPH_TOP - 3.0,
        );
        list.rect(graph, fg.with_alpha(0.25));
        let bar_width = graph.width / HISTORY as f32;
        let offset = HISTORY - series.history.len();
        for (i, &value) in series.history.iter().enumerate() {
            let height = graph.height * value;
            list.rect(
                Rect::new(
                    graph.x + (offset + i) as f32 * bar_width,
                    graph.bottom() - height,
                    bar_width,
                    height,
                ),
                fg,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_sampled_once_per_second() {
        let mut stats = StatsOverlay::new();
        for _ in 0..59 {
            stats.update(1.0 / 60.0);
        }
        assert_eq!(stats.fps(), 0.0);
        stats.update(1.0 / 60.0 + 1e-6);
        assert_eq!(stats.fps(), 60.0);
        assert!((stats.frame_ms() - 16.667).abs() < 0.01);
    }

    #[test]
    fn click_cycles_mode() {
        let mut stats = StatsOverlay::new();
        let mut input = Input::new();
        input.move_to(Vec2::new(10.0, 10.0));
        input.press(MouseButton::Left);
        assert!(stats.handle_input(&input));
        assert_eq!(stats.mode(), StatsMode::Ms);

        input.begin_frame();
        assert!(!stats.handle_input(&input));
    }

    #[test]
    fn history_is_bounded() {
        let mut stats = StatsOverlay::new();
        stats.set_mode(StatsMode::Ms);
        for _ in 0..500 {
            stats.update(0.01);
        }
        let mut list = DrawList::new();
        stats.draw(&mut list);
        // Background, text, graph background, one bar per history slot.
        assert_eq!(list.len(), 3 + HISTORY);
    }
}
