use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Pointer state accumulated from window events over one frame.
///
/// Window events feed [`Input::handle_event`]; the frame loop reads the
/// accumulated deltas and then calls [`Input::begin_frame`] to clear them.
/// The `press`/`release`/`move_to`/`scroll` methods are the same entry points
/// the event handler uses, so tests can drive them directly.
#[derive(Default)]
pub struct Input {
    buttons_down: HashSet<MouseButton>,
    buttons_pressed: HashSet<MouseButton>,
    buttons_released: HashSet<MouseButton>,
    position: Vec2,
    delta: Vec2,
    scroll: Vec2,
    has_position: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame state. Call after the frame has consumed it.
    pub fn begin_frame(&mut self) {
        self.buttons_pressed.clear();
        self.buttons_released.clear();
        self.delta = Vec2::ZERO;
        self.scroll = Vec2::ZERO;
    }

    /// Process a window event and update input state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.press(*button),
                ElementState::Released => self.release(*button),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.move_to(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => {
                self.buttons_down.clear();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(x, y) => Vec2::new(*x, *y),
                    MouseScrollDelta::PixelDelta(pos) => {
                        Vec2::new(pos.x as f32, pos.y as f32) / 120.0
                    }
                };
                self.scroll(d);
            }
            _ => {}
        }
    }

    pub fn press(&mut self, button: MouseButton) {
        if self.buttons_down.insert(button) {
            self.buttons_pressed.insert(button);
        }
    }

    pub fn release(&mut self, button: MouseButton) {
        if self.buttons_down.remove(&button) {
            self.buttons_released.insert(button);
        }
    }

    pub fn move_to(&mut self, position: Vec2) {
        // The first event only establishes the position.
        if self.has_position {
            self.delta += position - self.position;
        }
        self.position = position;
        self.has_position = true;
    }

    /// Add wheel movement in lines; positive `y` scrolls up.
    pub fn scroll(&mut self, lines: Vec2) {
        self.scroll += lines;
    }

    /// Returns true if the mouse button is currently held down.
    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Returns true if the mouse button was pressed this frame.
    pub fn mouse_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    /// Returns true if the mouse button was released this frame.
    pub fn mouse_released(&self, button: MouseButton) -> bool {
        self.buttons_released.contains(&button)
    }

    /// Current cursor position in physical window pixels.
    pub fn mouse_position(&self) -> Vec2 {
        self.position
    }

    /// Cursor movement this frame.
    pub fn mouse_delta(&self) -> Vec2 {
        self.delta
    }

    /// Scroll wheel delta this frame (in "lines").
    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_reported_once_per_frame() {
        let mut input = Input::new();
        input.press(MouseButton::Left);
        input.press(MouseButton::Left);
        assert!(input.mouse_pressed(MouseButton::Left));
        assert!(input.mouse_down(MouseButton::Left));

        input.begin_frame();
        assert!(!input.mouse_pressed(MouseButton::Left));
        assert!(input.mouse_down(MouseButton::Left));

        input.release(MouseButton::Left);
        assert!(input.mouse_released(MouseButton::Left));
        assert!(!input.mouse_down(MouseButton::Left));
    }

    #[test]
    fn first_move_has_no_delta() {
        let mut input = Input::new();
        input.move_to(Vec2::new(100.0, 100.0));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        input.move_to(Vec2::new(110.0, 95.0));
        input.move_to(Vec2::new(120.0, 90.0));
        assert_eq!(input.mouse_delta(), Vec2::new(20.0, -10.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        assert_eq!(input.mouse_position(), Vec2::new(120.0, 90.0));
    }
}
