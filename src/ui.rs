//! Screen-space drawing primitives shared by the panel and the stats overlay.
//!
//! Widgets record into a [`DrawList`]; `render::draw2d` turns it into quads
//! drawn on top of the post-processed frame.

use glam::Vec2;

/// A rectangle in screen-space pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Shrink by `amount` on every side.
    pub fn inset(&self, amount: f32) -> Self {
        Self::new(
            self.x + amount,
            self.y + amount,
            (self.width - 2.0 * amount).max(0.0),
            (self.height - 2.0 * amount).max(0.0),
        )
    }
}

/// RGBA color, straight alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const PANEL_BG: Color = Color::rgba(0.1, 0.1, 0.1, 0.85);
    pub const PANEL_BORDER: Color = Color::rgba(0.4, 0.4, 0.4, 1.0);
    pub const HEADER_BG: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRACK: Color = Color::rgb(0.19, 0.19, 0.19);
    pub const FILL: Color = Color::rgb(0.18, 0.51, 0.73);
    pub const TEXT_DIM: Color = Color::rgb(0.7, 0.7, 0.7);

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Rect { rect: Rect, color: Color },
    /// Text with its top-left corner at `position`.
    Text {
        position: Vec2,
        text: String,
        color: Color,
    },
}

/// Ordered 2D draw commands for one frame. Later commands draw on top.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn rect(&mut self, rect: Rect, color: Color) {
        if rect.width > 0.0 && rect.height > 0.0 && color.a > 0.0 {
            self.commands.push(DrawCommand::Rect { rect, color });
        }
    }

    pub fn text(&mut self, x: f32, y: f32, text: impl Into<String>, color: Color) {
        self.commands.push(DrawCommand::Text {
            position: Vec2::new(x, y),
            text: text.into(),
            color,
        });
    }

    /// A bordered background pane.
    pub fn pane(&mut self, rect: Rect, background: Color, border: Option<Color>) {
        match border {
            Some(border) => {
                self.rect(rect, border);
                self.rect(rect.inset(1.0), background);
            }
            None => self.rect(rect, background),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Append all commands of `other`, drawn above the current ones.
    pub fn append(&mut self, other: &DrawList) {
        self.commands.extend_from_slice(&other.commands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(10.0, 10.0, 20.0, 5.0);
        assert!(r.contains(Vec2::new(10.0, 10.0)));
        assert!(r.contains(Vec2::new(29.9, 14.9)));
        assert!(!r.contains(Vec2::new(30.0, 12.0)));
        assert!(!r.contains(Vec2::new(15.0, 15.0)));
    }

    #[test]
    fn invisible_rects_are_dropped() {
        let mut list = DrawList::new();
        list.rect(Rect::new(0.0, 0.0, 0.0, 10.0), Color::WHITE);
        list.rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE.with_alpha(0.0));
        assert!(list.is_empty());
    }

    #[test]
    fn bordered_pane_draws_border_first() {
        let mut list = DrawList::new();
        list.pane(Rect::new(0.0, 0.0, 10.0, 10.0), Color::PANEL_BG, Some(Color::PANEL_BORDER));
        assert_eq!(list.len(), 2);
        match &list.commands()[1] {
            DrawCommand::Rect { rect, .. } => assert_eq!(*rect, Rect::new(1.0, 1.0, 8.0, 8.0)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
