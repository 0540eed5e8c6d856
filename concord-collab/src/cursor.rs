//! Display hints shared by documents, rooms and comments: positions,
//! cursors, selections and per-user colors.
//!
//! None of these participate in edit ordering. They are last-write-wins
//! annotations that clients render on top of document content.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 2D position in canvas (world) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Default for Vec2 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// A location inside a document.
///
/// Text-like documents address by line/column, canvas-like documents
/// (whiteboards) by coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cursor {
    Text { line: u32, column: u32 },
    Point(Vec2),
}

impl Cursor {
    /// Caret at a line and column.
    pub fn text(line: u32, column: u32) -> Self {
        Cursor::Text { line, column }
    }

    /// Free position on a canvas.
    pub fn point(x: f32, y: f32) -> Self {
        Cursor::Point(Vec2::new(x, y))
    }
}

/// A selected range between two cursors. `anchor` is where the selection
/// started, `head` where it currently ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Cursor,
    pub head: Cursor,
}

impl Selection {
    pub fn new(anchor: Cursor, head: Cursor) -> Self {
        Self { anchor, head }
    }

    /// Collapsed selection (caret only).
    pub fn caret(at: Cursor) -> Self {
        Self { anchor: at, head: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }
}

/// RGBA color used to tint a user's cursor and selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl CursorColor {
    /// Stable color derived from a user id, so every client paints the
    /// same user the same way without coordinating.
    pub fn from_uuid(id: Uuid) -> Self {
        let hash = id.as_u128();
        let hue = ((hash % 360) as f32) / 360.0;
        let (r, g, b) = hsl_to_rgb(hue, 0.7, 0.6);
        Self { r, g, b, a: 1.0 }
    }
}

impl Default for CursorColor {
    fn default() -> Self {
        Self { r: 0.26, g: 0.52, b: 0.96, a: 1.0 }
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 { t += 1.0; }
    if t > 1.0 { t -= 1.0; }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_color_from_uuid_stable() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(CursorColor::from_uuid(id), CursorColor::from_uuid(id));
        let c = CursorColor::from_uuid(id);
        assert!(c.r >= 0.0 && c.r <= 1.0);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn test_hsl_to_rgb_red() {
        let (r, g, b) = hsl_to_rgb(0.0, 1.0, 0.5);
        assert!((r - 1.0).abs() < 0.01);
        assert!(g.abs() < 0.01);
        assert!(b.abs() < 0.01);
    }

    #[test]
    fn test_selection_caret_is_collapsed() {
        let sel = Selection::caret(Cursor::text(3, 7));
        assert!(sel.is_collapsed());

        let sel = Selection::new(Cursor::text(0, 0), Cursor::text(0, 4));
        assert!(!sel.is_collapsed());
    }
}
