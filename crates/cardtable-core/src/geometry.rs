//! Geometry helpers for drop-target and area-selection resolution.

use crate::config::BoardConfig;
use kurbo::{Point, Rect, Vec2};

/// Euclidean distance between two board points.
pub fn distance(a: Point, b: Point) -> f64 {
    a.distance(b)
}

/// Strict axis-aligned overlap test.
///
/// Boxes that only share an edge do not intersect, so two cards laid out
/// side by side are never both caught by a rectangle drawn over just one.
pub fn box_intersects(rect: Rect, other: Rect) -> bool {
    let a = rect.abs();
    let b = other.abs();
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

/// Build a rectangle from an anchor and a signed size.
///
/// A negative width or height shifts the origin by that delta so the
/// result always has positive extents, whichever way the user dragged.
pub fn normalize_rect(origin: Point, size: Vec2) -> Rect {
    let x = if size.x < 0.0 { origin.x + size.x } else { origin.x };
    let y = if size.y < 0.0 { origin.y + size.y } else { origin.y };
    Rect::new(x, y, x + size.x.abs(), y + size.y.abs())
}

/// Footprint of a card whose position is its center.
pub fn card_footprint(center: Point, config: &BoardConfig) -> Rect {
    Rect::from_center_size(center, (config.card_width, config.card_height))
}
