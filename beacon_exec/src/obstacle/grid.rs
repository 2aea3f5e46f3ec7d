//! # Obstacle grid
//!
//! Accumulates world frame points over the frames of one scan, keeping per cell the highest and
//! lowest point seen and how many points landed there.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Rgb, RgbImage};
use log::trace;
use nalgebra::Vector3;

use super::grid_map::{GridMap, GridMapError, Point2};
use crate::params::GridParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Relief at which the debug view reaches full colour.
///
/// Units: centimeters
const DEBUG_FULL_SCALE_CM: f64 = 50.0;

const DEBUG_EMPTY: [u8; 3] = [0, 0, 0];
const DEBUG_FLOOR: [u8; 3] = [90, 110, 90];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Height grid built up during an obstacle scan.
#[derive(Debug, Clone)]
pub struct ObstacleGrid {
    map: GridMap<f64, ObstacleLayer>,

    /// Points at or below this are discarded
    min_z: f64,

    /// Points at or above this are discarded
    max_z: f64,

    num_added: usize,

    num_rejected: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObstacleLayer {
    /// Highest point in the cell
    MaxHeight,

    /// Lowest point in the cell
    MinHeight,

    /// Number of points in the cell
    Count,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ObstacleGrid {
    pub fn new(params: &GridParams) -> Result<Self, GridMapError> {
        let map = GridMap::new(
            params.cell_size_cm,
            Point2(params.num_cells),
            Point2(params.origin_cm),
            &[ObstacleLayer::MaxHeight, ObstacleLayer::MinHeight, ObstacleLayer::Count],
            0.0,
        )?;

        let mut grid = Self {
            map,
            min_z: params.min_z_cm,
            max_z: params.max_z_cm,
            num_added: 0,
            num_rejected: 0,
        };
        grid.clear();

        Ok(grid)
    }

    /// Forget everything accumulated so far.
    pub fn clear(&mut self) {
        for &(layer, value) in &[
            (ObstacleLayer::MaxHeight, f64::NEG_INFINITY),
            (ObstacleLayer::MinHeight, f64::INFINITY),
            (ObstacleLayer::Count, 0.0),
        ] {
            if let Ok(mut l) = self.map.get_layer_mut(layer) {
                l.fill(value);
            }
        }

        self.num_added = 0;
        self.num_rejected = 0;
    }

    /// Add a world frame point to the grid.
    ///
    /// Returns `false` if the point was rejected, either because its height is outside the
    /// accepted band or because it lies outside the grid.
    pub fn add(&mut self, point: &Vector3<f64>) -> bool {
        if !(point.z > self.min_z && point.z < self.max_z) {
            self.num_rejected += 1;
            return false;
        }

        let cell = match self.map.position_to_cell(&Point2::new(point.x, point.y)) {
            Ok(c) => c,
            Err(_) => {
                self.num_rejected += 1;
                return false;
            }
        };

        // Cell is in the map and all layers exist, so these can't fail
        if let Ok(max) = self.map.get_mut(ObstacleLayer::MaxHeight, &cell) {
            *max = max.max(point.z);
        }
        if let Ok(min) = self.map.get_mut(ObstacleLayer::MinHeight, &cell) {
            *min = min.min(point.z);
        }
        if let Ok(count) = self.map.get_mut(ObstacleLayer::Count, &cell) {
            *count += 1.0;
        }

        self.num_added += 1;
        true
    }

    /// Number of points in the given cell.
    pub fn count(&self, cell: &Point2<usize>) -> u32 {
        self.map
            .get(ObstacleLayer::Count, cell)
            .map(|c| c as u32)
            .unwrap_or(0)
    }

    /// Highest point in the given cell, `None` if the cell is empty.
    pub fn max_height(&self, cell: &Point2<usize>) -> Option<f64> {
        self.height(ObstacleLayer::MaxHeight, cell)
    }

    /// Lowest point in the given cell, `None` if the cell is empty.
    pub fn min_height(&self, cell: &Point2<usize>) -> Option<f64> {
        self.height(ObstacleLayer::MinHeight, cell)
    }

    fn height(&self, layer: ObstacleLayer, cell: &Point2<usize>) -> Option<f64> {
        if self.count(cell) == 0 {
            return None;
        }
        self.map.get(layer, cell).ok()
    }

    pub fn map(&self) -> &GridMap<f64, ObstacleLayer> {
        &self.map
    }

    /// Number of points accepted since the last clear.
    pub fn num_added(&self) -> usize {
        self.num_added
    }

    /// Number of points rejected since the last clear.
    pub fn num_rejected(&self) -> usize {
        self.num_rejected
    }

    /// Render the grid as an image, each cell drawn as a `scale` by `scale` pixel square with
    /// world +Y up.
    ///
    /// Empty cells are black. Occupied cells fade from grey-green at `floor_cm` towards red for
    /// relief above the floor and towards blue for relief below it.
    pub fn debug_view(&self, scale: u32, floor_cm: f64) -> RgbImage {
        let scale = scale.max(1);
        let n = self.map.num_cells();
        let mut img = RgbImage::new(n.x() as u32 * scale, n.y() as u32 * scale);

        for cx in 0..n.x() {
            for cy in 0..n.y() {
                let cell = Point2::new(cx, cy);
                let colour = match (self.max_height(&cell), self.min_height(&cell)) {
                    (Some(max), Some(min)) => relief_colour(max - floor_cm, min - floor_cm),
                    _ => DEBUG_EMPTY,
                };

                let px = cx as u32 * scale;
                let py = (n.y() - 1 - cy) as u32 * scale;
                for dx in 0..scale {
                    for dy in 0..scale {
                        img.put_pixel(px + dx, py + dy, Rgb(colour));
                    }
                }
            }
        }

        trace!(
            "Rendered {}x{} debug view of {} points",
            img.width(),
            img.height(),
            self.num_added
        );

        img
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Colour of a cell whose highest point is `above` the floor and lowest point is `below` it.
fn relief_colour(above: f64, below: f64) -> [u8; 3] {
    let rise = above.max(0.0);
    let drop = (-below).max(0.0);

    let (relief, target) = if rise >= drop {
        (rise, [255u8, 0, 0])
    } else {
        (drop, [0u8, 0, 255])
    };

    let t = util::maths::clamp(&(relief / DEBUG_FULL_SCALE_CM), &0.0, &1.0);

    let mut out = [0u8; 3];
    for i in 0..3 {
        out[i] = util::maths::lin_map((0.0, 1.0), (DEBUG_FLOOR[i] as f64, target[i] as f64), t)
            .round() as u8;
    }
    out
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
