//! Grid coordinate system.
//!
//! Maps continuous pixel (world) coordinates onto discrete cells for square
//! and hexagonal tilings, and enumerates area-of-effect cell sets.
//!
//! Cells are addressed by `(row, col)` and are never negative. Any conversion
//! that would land on a negative row or column yields `None`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

// ============================================================================
// Geometry
// ============================================================================

/// A point in world (pixel) space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned rectangle. `min` is always the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Build a rectangle from any two opposite corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Overlap test; rectangles that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

// ============================================================================
// Cells
// ============================================================================

/// One discrete address on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Build a cell from signed indices, rejecting negatives.
    pub fn from_signed(row: i64, col: i64) -> Option<Self> {
        let row = u32::try_from(row).ok()?;
        let col = u32::try_from(col).ok()?;
        Some(Self { row, col })
    }

    /// `"row,col"` form used at the snapshot boundary.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cell key: {0:?}")]
pub struct CellKeyError(pub String);

impl FromStr for Cell {
    type Err = CellKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, col) = s
            .split_once(',')
            .ok_or_else(|| CellKeyError(s.to_string()))?;
        let row = row
            .trim()
            .parse()
            .map_err(|_| CellKeyError(s.to_string()))?;
        let col = col
            .trim()
            .parse()
            .map_err(|_| CellKeyError(s.to_string()))?;
        Ok(Cell { row, col })
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Tiling used by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    #[default]
    Square,
    Hex,
}

/// Grid geometry, passed explicitly to [`GridSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub kind: GridKind,
    /// Edge length of a square cell in pixels.
    pub cell_size: f64,
    /// Hex radius (center to corner) in pixels.
    pub hex_size: f64,
    /// Vertical calibration applied to hex snapping, as a fraction of hex height.
    pub hex_vertical_correction: f64,
}

impl GridConfig {
    pub const DEFAULT_CELL_SIZE: f64 = 50.0;
    pub const DEFAULT_HEX_SIZE: f64 = 30.0;
    pub const DEFAULT_HEX_VERTICAL_CORRECTION: f64 = -0.255;

    /// Square grid with the given cell size.
    pub fn square(cell_size: f64) -> Self {
        Self {
            kind: GridKind::Square,
            cell_size,
            ..Self::default()
        }
    }

    /// Hex grid with the given hex size.
    pub fn hex(hex_size: f64) -> Self {
        Self {
            kind: GridKind::Hex,
            hex_size,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: GridKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn with_hex_size(mut self, hex_size: f64) -> Self {
        self.hex_size = hex_size;
        self
    }

    pub fn with_hex_vertical_correction(mut self, correction: f64) -> Self {
        self.hex_vertical_correction = correction;
        self
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            kind: GridKind::Square,
            cell_size: Self::DEFAULT_CELL_SIZE,
            hex_size: Self::DEFAULT_HEX_SIZE,
            hex_vertical_correction: Self::DEFAULT_HEX_VERTICAL_CORRECTION,
        }
    }
}

// ============================================================================
// Coordinate system
// ============================================================================

/// Converts between pixel space and cell space for one grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridSystem {
    config: GridConfig,
}

impl GridSystem {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn kind(&self) -> GridKind {
        self.config.kind
    }

    // --- kind dispatch ------------------------------------------------------

    /// Cell containing a world point, for the configured tiling.
    pub fn cell_at(&self, p: Point) -> Option<Cell> {
        match self.config.kind {
            GridKind::Square => self.pixel_to_cell(p),
            GridKind::Hex => self.pixel_to_hex_cell(p),
        }
    }

    /// Pixel center of a cell, for the configured tiling.
    pub fn center_of(&self, cell: Cell) -> Point {
        match self.config.kind {
            GridKind::Square => self.cell_center(cell),
            GridKind::Hex => self.hex_cell_center(cell),
        }
    }

    /// Snap a point to the nearest cell center, for the configured tiling.
    pub fn snap(&self, p: Point) -> Point {
        match self.config.kind {
            GridKind::Square => self.snap_to_square_grid(p),
            GridKind::Hex => self.snap_to_hex_grid(p),
        }
    }

    /// Pixel footprint of a cell (bounding box for hexes).
    pub fn cell_bounds(&self, cell: Cell) -> Rect {
        match self.config.kind {
            GridKind::Square => {
                let origin = self.cell_origin(cell);
                let s = self.config.cell_size;
                Rect::from_corners(origin, Point::new(origin.x + s, origin.y + s))
            }
            GridKind::Hex => {
                let c = self.hex_cell_center(cell);
                let (hw, hh) = (self.hex_width() / 2.0, self.hex_height() / 2.0);
                Rect::from_corners(
                    Point::new(c.x - hw, c.y - hh),
                    Point::new(c.x + hw, c.y + hh),
                )
            }
        }
    }

    // --- square -------------------------------------------------------------

    pub fn pixel_to_cell(&self, p: Point) -> Option<Cell> {
        let s = self.config.cell_size;
        Cell::from_signed((p.y / s).floor() as i64, (p.x / s).floor() as i64)
    }

    /// Top-left corner of a square cell.
    pub fn cell_origin(&self, cell: Cell) -> Point {
        let s = self.config.cell_size;
        Point::new(f64::from(cell.col) * s, f64::from(cell.row) * s)
    }

    pub fn cell_center(&self, cell: Cell) -> Point {
        let s = self.config.cell_size;
        let origin = self.cell_origin(cell);
        Point::new(origin.x + s / 2.0, origin.y + s / 2.0)
    }

    /// Snap to the nearest square cell center (not corner); tokens anchor on it.
    pub fn snap_to_square_grid(&self, p: Point) -> Point {
        let s = self.config.cell_size;
        let snap_axis = |v: f64| round_half_up((v - s / 2.0) / s) * s + s / 2.0;
        Point::new(snap_axis(p.x), snap_axis(p.y))
    }

    // --- hex ----------------------------------------------------------------

    pub fn hex_width(&self) -> f64 {
        SQRT_3 * self.config.hex_size
    }

    pub fn hex_height(&self) -> f64 {
        2.0 * self.config.hex_size
    }

    /// Vertical distance between consecutive hex rows.
    pub fn hex_row_spacing(&self) -> f64 {
        0.75 * self.hex_height()
    }

    fn hex_row_offset(&self, row: i64) -> f64 {
        if row.rem_euclid(2) == 1 {
            self.hex_width() / 2.0
        } else {
            0.0
        }
    }

    fn hex_center_signed(&self, row: i64, col: i64) -> Point {
        let w = self.hex_width();
        Point::new(
            col as f64 * w + w / 2.0 + self.hex_row_offset(row),
            row as f64 * self.hex_row_spacing() + self.hex_height() / 2.0,
        )
    }

    /// Pixel center of a hex cell; odd rows shift right by half a hex.
    pub fn hex_cell_center(&self, cell: Cell) -> Point {
        self.hex_center_signed(i64::from(cell.row), i64::from(cell.col))
    }

    /// Hex cell whose center is nearest to `p`.
    pub fn pixel_to_hex_cell(&self, p: Point) -> Option<Cell> {
        let w = self.hex_width();
        let h = self.hex_height();
        let approx_row = index_estimate((p.y - h / 2.0) / self.hex_row_spacing())?;

        let mut best: Option<((i64, i64), f64)> = None;
        for row in (approx_row - 1)..=(approx_row + 1) {
            let Some(approx_col) = index_estimate((p.x - w / 2.0 - self.hex_row_offset(row)) / w)
            else {
                continue;
            };
            for col in (approx_col - 1)..=(approx_col + 1) {
                let d = self.hex_center_signed(row, col).distance(p);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some(((row, col), d));
                }
            }
        }

        best.and_then(|((row, col), _)| Cell::from_signed(row, col))
    }

    /// Snap to a hex center through axial rounding.
    ///
    /// The result is shifted vertically by `hex_vertical_correction * hex_height`,
    /// a calibration constant that lines the snap up with rendered hexes.
    pub fn snap_to_hex_grid(&self, p: Point) -> Point {
        let size = self.config.hex_size;
        let q = (2.0 / 3.0 * p.x) / size;
        let r = (-1.0 / 3.0 * p.x + SQRT_3 / 3.0 * p.y) / size;
        let (q, r) = axial_round(q, r);

        let x = size * 1.5 * q;
        let y = size * SQRT_3 * (r + q / 2.0);
        Point::new(
            x,
            y + self.config.hex_vertical_correction * self.hex_height(),
        )
    }
}

/// Round half toward positive infinity.
fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

/// Round fractional axial coordinates to the nearest hex.
fn axial_round(q: f64, r: f64) -> (f64, f64) {
    let s = -q - r;
    let (mut rq, mut rr, rs) = (q.round(), r.round(), s.round());
    let (dq, dr, ds) = ((rq - q).abs(), (rr - r).abs(), (rs - s).abs());
    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }
    (rq, rr)
}

/// Rounded cell index for `v`, or `None` when no cell could be that close.
fn index_estimate(v: f64) -> Option<i64> {
    let v = v.round();
    (-1.0..=f64::from(u32::MAX) + 1.0)
        .contains(&v)
        .then_some(v as i64)
}

// ============================================================================
// Area of effect
// ============================================================================

/// Shape of an area attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaShape {
    Circle,
    /// Triangular wedge that always opens toward decreasing rows (north).
    Cone,
}

/// Largest area radius, in cells. Bigger radii are clamped to it.
pub const MAX_AREA_RADIUS: u32 = 100;

/// Cells covered by an area of `radius` around `center`, in row-major order.
///
/// Distances are measured in cell indices, for both tilings. Cells that would
/// fall at a negative row or column are dropped. `radius` is clamped to
/// [`MAX_AREA_RADIUS`].
pub fn area_cells(center: Cell, shape: AreaShape, radius: u32) -> Vec<Cell> {
    let r = i64::from(radius.min(MAX_AREA_RADIUS));
    let (cr, cc) = (i64::from(center.row), i64::from(center.col));
    let mut cells = Vec::new();

    match shape {
        AreaShape::Circle => {
            for row in (cr - r).max(0)..=(cr + r) {
                for col in (cc - r).max(0)..=(cc + r) {
                    let (dr, dc) = (row - cr, col - cc);
                    if dr * dr + dc * dc <= r * r {
                        cells.extend(Cell::from_signed(row, col));
                    }
                }
            }
        }
        AreaShape::Cone => {
            for k in (0..=r.min(cr)).rev() {
                let span = r - k;
                for col in (cc - span).max(0)..=(cc + span) {
                    cells.extend(Cell::from_signed(cr - k, col));
                }
            }
        }
    }

    cells
}
