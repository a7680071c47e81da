//! Conversion between fractional regions and absolute rectangles, and grid
//! snapping. Everything here is pure.

use std::num::NonZeroU32;

use thiserror::Error;

use crate::model::layout::Region;
use crate::sys::geometry::{Display, Rect, Round};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid region: width {width} and height {height} must both be positive")]
    InvalidRegion { width: f64, height: f64 },
    #[error("grid size must be at least 1")]
    InvalidGrid,
}

/// Resolves `region` against a display's work area.
///
/// Offsets that would push the region past the display edge are clamped, so
/// the result always lies within `display_bounds`.
pub fn resolve(region: Region, display_bounds: Rect) -> Result<Rect, GeometryError> {
    if !region.is_valid() {
        return Err(GeometryError::InvalidRegion {
            width: region.width,
            height: region.height,
        });
    }
    let r = region.clamped();
    let b = display_bounds;
    let rect = Rect::new(
        b.x + r.x * b.width,
        b.y + r.y * b.height,
        r.width * b.width,
        r.height * b.height,
    )
    .round();
    Ok(keep_within(rect, b.round()))
}

fn keep_within(mut rect: Rect, bounds: Rect) -> Rect {
    rect.width = rect.width.max(1.0).min(bounds.width.max(1.0));
    rect.height = rect.height.max(1.0).min(bounds.height.max(1.0));
    rect.x = rect.x.min(bounds.max_x() - rect.width).max(bounds.x);
    rect.y = rect.y.min(bounds.max_y() - rect.height).max(bounds.y);
    rect
}

/// Rounds every edge of `rect` to the nearest multiple of `grid`. The result
/// is at least one grid cell wide and tall.
pub fn snap(rect: Rect, grid: NonZeroU32) -> Rect {
    let g = f64::from(grid.get());
    let to_grid = |v: f64| (v / g).round() * g;
    let left = to_grid(rect.x);
    let top = to_grid(rect.y);
    let right = to_grid(rect.max_x()).max(left + g);
    let bottom = to_grid(rect.max_y()).max(top + g);
    Rect::new(left, top, right - left, bottom - top)
}

pub fn grid_size(grid: u32) -> Result<NonZeroU32, GeometryError> {
    NonZeroU32::new(grid).ok_or(GeometryError::InvalidGrid)
}

/// Index of the display `rect` belongs to: the one containing its centre,
/// else the one it overlaps most, else the primary display.
pub fn display_index_for(rect: Rect, displays: &[Display]) -> usize {
    let mid = rect.mid();
    if let Some(idx) = displays.iter().position(|d| d.bounds.contains(mid)) {
        return idx;
    }
    displays
        .iter()
        .enumerate()
        .filter_map(|(idx, d)| d.bounds.intersection(&rect).map(|i| (idx, i.area())))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(idx, _)| idx)
}

/// Inverse of [`resolve`]: expresses `rect` as a region of the display it
/// belongs to. Returns `None` when there are no displays or the display has
/// no area.
pub fn relative_region(rect: Rect, displays: &[Display]) -> Option<Region> {
    let display = display_index_for(rect, displays);
    let b = displays.get(display)?.bounds;
    if b.width <= 0.0 || b.height <= 0.0 {
        return None;
    }
    let region = Region::new(
        (rect.x - b.x) / b.width,
        (rect.y - b.y) / b.height,
        rect.width / b.width,
        rect.height / b.height,
    )
    .on_display(display);
    Some(region.clamped())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> Rect { Rect::new(0.0, 0.0, 1000.0, 800.0) }

    fn grid(g: u32) -> NonZeroU32 { NonZeroU32::new(g).unwrap() }

    #[test]
    fn resolves_left_seventy_percent() {
        let rect = resolve(Region::new(0.0, 0.0, 0.7, 1.0), screen()).unwrap();
        assert_eq!(rect, Rect::new(0.0, 0.0, 700.0, 800.0));
    }

    #[test]
    fn resolves_relative_to_display_origin() {
        let second = Rect::new(1000.0, 25.0, 1920.0, 1055.0);
        let rect = resolve(Region::new(0.5, 0.0, 0.5, 1.0), second).unwrap();
        assert_eq!(rect, Rect::new(1960.0, 25.0, 960.0, 1055.0));
    }

    #[test]
    fn rejects_degenerate_regions() {
        let err = resolve(Region::new(0.0, 0.0, 0.0, 1.0), screen()).unwrap_err();
        assert_eq!(err, GeometryError::InvalidRegion { width: 0.0, height: 1.0 });
        assert!(resolve(Region::new(0.0, 0.0, 0.5, -0.5), screen()).is_err());
    }

    #[test]
    fn clamps_regions_that_overflow() {
        let rect = resolve(Region::new(0.9, 0.9, 0.5, 0.5), screen()).unwrap();
        assert_eq!(rect, Rect::new(500.0, 400.0, 500.0, 400.0));

        let rect = resolve(Region::new(-0.3, 0.0, 2.0, 1.0), screen()).unwrap();
        assert_eq!(rect, screen());
    }

    #[test]
    fn resolve_is_deterministic() {
        let region = Region::new(0.13, 0.27, 0.31, 0.44);
        let bounds = Rect::new(12.5, 40.0, 1511.0, 943.0);
        assert_eq!(resolve(region, bounds), resolve(region, bounds));
    }

    #[test]
    fn snap_rounds_edges_to_the_grid() {
        let rect = Rect::new(13.0, 7.0, 290.0, 185.0);
        assert_eq!(snap(rect, grid(10)), Rect::new(10.0, 10.0, 290.0, 180.0));
    }

    #[test]
    fn snap_keeps_at_least_one_cell() {
        let rect = Rect::new(101.0, 99.0, 3.0, 2.0);
        let snapped = snap(rect, grid(16));
        assert_eq!(snapped.width, 16.0);
        assert_eq!(snapped.height, 16.0);
    }

    #[test]
    fn snap_is_idempotent() {
        let rects = [
            Rect::new(13.0, 7.0, 290.0, 185.0),
            Rect::new(-37.2, 1021.9, 0.5, 812.3),
            Rect::new(8.0, 8.0, 8.0, 8.0),
        ];
        for g in [1, 7, 8, 16, 100] {
            for rect in rects {
                let once = snap(rect, grid(g));
                assert_eq!(snap(once, grid(g)), once);
            }
        }
    }

    #[test]
    fn zero_grid_is_rejected() {
        assert_eq!(grid_size(0), Err(GeometryError::InvalidGrid));
        assert_eq!(grid_size(8).map(NonZeroU32::get), Ok(8));
    }

    #[test]
    fn relative_region_inverts_resolve() {
        let displays = [
            Display::new(screen()),
            Display::new(Rect::new(1000.0, 0.0, 1000.0, 800.0)),
        ];
        let region = relative_region(Rect::new(1250.0, 200.0, 500.0, 400.0), &displays).unwrap();
        assert_eq!(region, Region::new(0.25, 0.25, 0.5, 0.5).on_display(1));
        assert_eq!(
            resolve(region, displays[1].bounds).unwrap(),
            Rect::new(1250.0, 200.0, 500.0, 400.0)
        );
    }

    #[test]
    fn display_index_falls_back_to_overlap_then_primary() {
        let displays = [
            Display::new(screen()),
            Display::new(Rect::new(1000.0, 0.0, 1000.0, 800.0)),
        ];
        // Centre is below both displays; most of the rect overlaps the second.
        let rect = Rect::new(900.0, 700.0, 400.0, 300.0);
        assert_eq!(display_index_for(rect, &displays), 1);
        assert_eq!(display_index_for(Rect::new(5000.0, 5000.0, 10.0, 10.0), &displays), 0);
        assert_eq!(relative_region(rect, &[]), None);
    }
}
