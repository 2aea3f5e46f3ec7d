//! # Grid Map
//!
//! A multi-layer grid over the world XY plane. Each layer holds one value per cell, all layers
//! share the same geometry. Cell `[0, 0]` has its lower-left corner at the map origin, and cell
//! indices increase along the world X and Y axes.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::HashMap, hash::Hash};

use ndarray::{s, Array3, ArrayView2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Point2<T>(pub [T; 2])
where
    T: Copy;

/// A grid-based map containing many layers of information.
#[derive(Clone, Debug)]
pub struct GridMap<T, L>
where
    T: Clone,
    L: Hash + Eq,
{
    /// The size of each grid cell
    cell_size: f64,

    /// The number of cells in each axis of the map
    num_cells: Point2<usize>,

    /// Position of the lower-left corner of cell `[0, 0]`
    origin: Point2<f64>,

    /// A map between layer name and index into the map data array
    layer_map: HashMap<L, usize>,

    /// Raw map data, a 3D array with dimension order layer, x cell, y cell
    data: Array3<T>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GridMapError {
    #[error("Requested position or cell outside map bounds")]
    OutsideMap,

    #[error("Attempted to access unknown layer")]
    UnknownLayer,

    #[error("Map created with no layers, there must be at least one")]
    NoLayers,

    #[error("Map must have at least one cell along each axis and a positive cell size")]
    InvalidGeometry,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: Copy> Point2<T> {
    pub fn new(x: T, y: T) -> Self {
        Self([x, y])
    }

    pub fn x(&self) -> T {
        self.0[0]
    }

    pub fn y(&self) -> T {
        self.0[1]
    }
}

impl<T, L> GridMap<T, L>
where
    T: Clone,
    L: Hash + Eq + Clone,
{
    /// Create a new GridMap with the given cell size, number of cells, origin, layers, and initial
    /// empty value.
    pub fn new(
        cell_size: f64,
        num_cells: Point2<usize>,
        origin: Point2<f64>,
        layers: &[L],
        empty_value: T,
    ) -> Result<Self, GridMapError> {
        let layer_map: HashMap<L, usize> = layers
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();

        if layer_map.is_empty() {
            return Err(GridMapError::NoLayers);
        }
        if num_cells.x() == 0 || num_cells.y() == 0 || !(cell_size > 0.0) {
            return Err(GridMapError::InvalidGeometry);
        }

        Ok(Self {
            cell_size,
            num_cells,
            origin,
            layer_map,
            data: Array3::from_elem((layers.len(), num_cells.x(), num_cells.y()), empty_value),
        })
    }

    fn layer_index(&self, layer: L) -> Result<usize, GridMapError> {
        self.layer_map
            .get(&layer)
            .copied()
            .ok_or(GridMapError::UnknownLayer)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn num_cells(&self) -> Point2<usize> {
        self.num_cells
    }

    pub fn cell_in_map(&self, cell: &Point2<usize>) -> bool {
        cell.x() < self.num_cells.x() && cell.y() < self.num_cells.y()
    }

    /// Get the cell containing the given world position.
    pub fn position_to_cell(&self, position: &Point2<f64>) -> Result<Point2<usize>, GridMapError> {
        let fx = ((position.x() - self.origin.x()) / self.cell_size).floor();
        let fy = ((position.y() - self.origin.y()) / self.cell_size).floor();

        // Also rejects NaN
        if !(fx >= 0.0 && fy >= 0.0) {
            return Err(GridMapError::OutsideMap);
        }

        let cell = Point2::new(fx as usize, fy as usize);

        match self.cell_in_map(&cell) {
            true => Ok(cell),
            false => Err(GridMapError::OutsideMap),
        }
    }

    /// Get the world position of the centre of the given cell.
    pub fn cell_position(&self, cell: &Point2<usize>) -> Result<Point2<f64>, GridMapError> {
        if !self.cell_in_map(cell) {
            return Err(GridMapError::OutsideMap);
        }

        Ok(Point2::new(
            self.origin.x() + (cell.x() as f64 + 0.5) * self.cell_size,
            self.origin.y() + (cell.y() as f64 + 0.5) * self.cell_size,
        ))
    }

    pub fn get(&self, layer: L, cell: &Point2<usize>) -> Result<T, GridMapError> {
        let layer_idx = self.layer_index(layer)?;

        self.data
            .get([layer_idx, cell.x(), cell.y()])
            .cloned()
            .ok_or(GridMapError::OutsideMap)
    }

    pub fn get_mut(&mut self, layer: L, cell: &Point2<usize>) -> Result<&mut T, GridMapError> {
        let layer_idx = self.layer_index(layer)?;

        self.data
            .get_mut([layer_idx, cell.x(), cell.y()])
            .ok_or(GridMapError::OutsideMap)
    }

    pub fn get_layer(&self, layer: L) -> Result<ArrayView2<T>, GridMapError> {
        let layer_idx = self.layer_index(layer)?;

        Ok(self.data.slice(s![layer_idx, .., ..]))
    }

    pub fn get_layer_mut(&mut self, layer: L) -> Result<ArrayViewMut2<T>, GridMapError> {
        let layer_idx = self.layer_index(layer)?;

        Ok(self.data.slice_mut(s![layer_idx, .., ..]))
    }

    /// Set every cell of a layer to the given value.
    pub fn fill_layer(&mut self, layer: L, value: T) -> Result<(), GridMapError> {
        self.get_layer_mut(layer)?.fill(value);
        Ok(())
    }

    /// The up to eight cells surrounding the given cell which lie inside the map.
    pub fn neighbours(&self, cell: &Point2<usize>) -> impl Iterator<Item = Point2<usize>> {
        let (cx, cy) = (cell.x() as isize, cell.y() as isize);
        let (nx, ny) = (self.num_cells.x() as isize, self.num_cells.y() as isize);

        (-1isize..=1)
            .flat_map(move |dx| (-1isize..=1).map(move |dy| (cx + dx, cy + dy)))
            .filter(move |&(x, y)| {
                (x, y) != (cx, cy) && x >= 0 && y >= 0 && x < nx && y < ny
            })
            .map(|(x, y)| Point2::new(x as usize, y as usize))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    enum Layer {
        A,
        B,
    }

    fn map() -> GridMap<f64, Layer> {
        GridMap::new(
            10.0,
            Point2::new(4, 3),
            Point2::new(-20.0, 0.0),
            &[Layer::A, Layer::B],
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn test_new() {
        assert_eq!(
            GridMap::<f64, Layer>::new(1.0, Point2::new(2, 2), Point2::new(0.0, 0.0), &[], 0.0)
                .unwrap_err(),
            GridMapError::NoLayers
        );
        assert_eq!(
            GridMap::new(0.0, Point2::new(2, 2), Point2::new(0.0, 0.0), &[Layer::A], 0.0)
                .unwrap_err(),
            GridMapError::InvalidGeometry
        );
    }

    #[test]
    fn test_cells() {
        let m = map();

        assert_eq!(m.position_to_cell(&Point2::new(-20.0, 0.0)), Ok(Point2::new(0, 0)));
        assert_eq!(m.position_to_cell(&Point2::new(5.0, 29.9)), Ok(Point2::new(2, 2)));
        assert_eq!(m.position_to_cell(&Point2::new(20.0, 0.0)), Err(GridMapError::OutsideMap));
        assert_eq!(m.position_to_cell(&Point2::new(-20.1, 0.0)), Err(GridMapError::OutsideMap));
        assert_eq!(m.position_to_cell(&Point2::new(f64::NAN, 0.0)), Err(GridMapError::OutsideMap));

        assert_eq!(m.cell_position(&Point2::new(3, 1)), Ok(Point2::new(15.0, 15.0)));
        assert_eq!(m.cell_position(&Point2::new(4, 1)), Err(GridMapError::OutsideMap));
    }

    #[test]
    fn test_layers() {
        let mut m = map();

        *m.get_mut(Layer::B, &Point2::new(1, 2)).unwrap() = 4.0;
        assert_eq!(m.get(Layer::B, &Point2::new(1, 2)), Ok(4.0));
        assert_eq!(m.get(Layer::A, &Point2::new(1, 2)), Ok(0.0));

        m.fill_layer(Layer::A, -1.0).unwrap();
        assert!(m.get_layer(Layer::A).unwrap().iter().all(|&v| v == -1.0));
        assert_eq!(m.get(Layer::B, &Point2::new(1, 2)), Ok(4.0));
    }

    #[test]
    fn test_neighbours() {
        let m = map();

        assert_eq!(m.neighbours(&Point2::new(0, 0)).count(), 3);
        assert_eq!(m.neighbours(&Point2::new(1, 1)).count(), 8);
        assert_eq!(m.neighbours(&Point2::new(3, 2)).count(), 3);
    }
}
