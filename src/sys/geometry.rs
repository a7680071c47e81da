use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in display points. The origin is the top-left
/// corner of the global desktop space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn max_x(&self) -> f64 { self.x + self.width }

    pub fn max_y(&self) -> f64 { self.y + self.height }

    pub fn mid(&self) -> (f64, f64) { (self.x + self.width / 2.0, self.y + self.height / 2.0) }

    pub fn contains(&self, (px, py): (f64, f64)) -> bool {
        px >= self.x && px < self.max_x() && py >= self.y && py < self.max_y()
    }

    pub fn area(&self) -> f64 { self.width.max(0.0) * self.height.max(0.0) }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        if max_x <= x || max_y <= y {
            return None;
        }
        Some(Rect::new(x, y, max_x - x, max_y - y))
    }
}

pub trait Round {
    fn round(&self) -> Self;
}

impl Round for Rect {
    /// Rounds edges rather than origin and size independently, so adjacent
    /// rects that shared an edge before rounding still share one after.
    fn round(&self) -> Self {
        let x = self.x.round();
        let y = self.y.round();
        let max_x = self.max_x().round();
        let max_y = self.max_y().round();
        Rect::new(x, y, max_x - x, max_y - y)
    }
}

/// A display's usable work area. Index 0 in any display list is the primary
/// display.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Display {
    pub bounds: Rect,
}

impl Display {
    pub const fn new(bounds: Rect) -> Self { Self { bounds } }
}
