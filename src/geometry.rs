//! Slot geometry primitives.
//!
//! A slot is a quadrilateral in click order. Sampling uses its axis-aligned
//! bounding rectangle; `contains` is available for per-pixel masking.

use serde::{Deserialize, Serialize};

use crate::error::{SlotError, SlotResult};

/// Polygons at or below this absolute area (square pixels) are degenerate.
pub const MIN_SLOT_AREA: f64 = 1.0;

/// Number of corners in a slot polygon.
pub const SLOT_CORNERS: usize = 4;

/// Largest accepted absolute corner coordinate. Keeps spans, areas and
/// drawing offsets well inside `i32`.
pub const MAX_COORDINATE: i32 = 1 << 20;

/// Integer pixel coordinate. Serialized as `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (i32, i32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Axis-aligned rectangle. `x + width - 1` is the last covered column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingRect {
    /// Intersect with a `width` x `height` frame. `None` if nothing overlaps.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingRect> {
        let x0 = self.x.max(0) as i64;
        let y0 = self.y.max(0) as i64;
        let x1 = (self.x as i64 + self.width as i64).min(width as i64);
        let y1 = (self.y as i64 + self.height as i64).min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(BoundingRect {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Four-corner slot outline in click order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotPolygon {
    corners: [Point; SLOT_CORNERS],
}

impl SlotPolygon {
    /// Build a polygon from exactly four points with positive area.
    pub fn new(points: &[Point]) -> SlotResult<Self> {
        let corners: [Point; SLOT_CORNERS] = points.try_into().map_err(|_| {
            SlotError::geometry(format!(
                "a slot needs exactly {} corners, got {}",
                SLOT_CORNERS,
                points.len()
            ))
        })?;
        let limit = MAX_COORDINATE.unsigned_abs();
        if let Some(p) = corners
            .iter()
            .find(|p| p.x.unsigned_abs() > limit || p.y.unsigned_abs() > limit)
        {
            return Err(SlotError::geometry(format!(
                "corner ({}, {}) is outside +-{}",
                p.x, p.y, MAX_COORDINATE
            )));
        }
        let area = shoelace_area(&corners);
        if area <= MIN_SLOT_AREA {
            return Err(SlotError::geometry(format!(
                "slot area {:.1} px is not above {:.1} px (collinear or repeated corners?)",
                area, MIN_SLOT_AREA
            )));
        }
        Ok(Self { corners })
    }

    pub fn corners(&self) -> &[Point; SLOT_CORNERS] {
        &self.corners
    }

    pub fn area(&self) -> f64 {
        shoelace_area(&self.corners)
    }

    pub fn bounding_rect(&self) -> BoundingRect {
        let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
        let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
        for p in &self.corners {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        BoundingRect {
            x: min_x,
            y: min_y,
            width: (max_x as i64 - min_x as i64 + 1) as u32,
            height: (max_y as i64 - min_y as i64 + 1) as u32,
        }
    }

    /// Vertex mean, rounded to the nearest pixel.
    pub fn centroid(&self) -> Point {
        let sx: i64 = self.corners.iter().map(|p| p.x as i64).sum();
        let sy: i64 = self.corners.iter().map(|p| p.y as i64).sum();
        let n = SLOT_CORNERS as f64;
        Point::new(
            (sx as f64 / n).round() as i32,
            (sy as f64 / n).round() as i32,
        )
    }

    /// Even-odd test at the pixel center.
    pub fn contains(&self, p: Point) -> bool {
        let px = p.x as f64 + 0.5;
        let py = p.y as f64 + 0.5;
        let mut inside = false;
        let mut j = SLOT_CORNERS - 1;
        for i in 0..SLOT_CORNERS {
            let (xi, yi) = (self.corners[i].x as f64, self.corners[i].y as f64);
            let (xj, yj) = (self.corners[j].x as f64, self.corners[j].y as f64);
            if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

fn shoelace_area(points: &[Point]) -> f64 {
    let n = points.len();
    let twice: i128 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128
        })
        .sum();
    (twice as f64 / 2.0).abs()
}
