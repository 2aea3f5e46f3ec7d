//! # Obstacle extraction
//!
//! Turns a completed [`ObstacleGrid`] into a list of discrete obstacles. Cells whose relief
//! exceeds the traversable height are grouped into 8-connected clusters of the same sign (bumps or
//! holes), and each big enough cluster becomes one [`DetectedObstacle`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::beacon::DetectedObstacle;
use log::debug;
use ndarray::Array2;

use super::{grid::ObstacleGrid, grid_map::Point2};
use crate::params::ObstacleParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A cell that stands out from the floor.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    /// Height relative to the floor, negative for holes
    relief: f64,

    /// World position of the cell centre
    pos: Point2<f64>,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Find the obstacles in the grid, ordered from most to least severe.
pub fn find_obstacles(grid: &ObstacleGrid, params: &ObstacleParams) -> Vec<DetectedObstacle> {
    let n = grid.map().num_cells();
    let mut candidates: Array2<Option<Candidate>> = Array2::from_elem((n.x(), n.y()), None);

    for cx in 0..n.x() {
        for cy in 0..n.y() {
            let cell = Point2::new(cx, cy);
            candidates[[cx, cy]] = candidate(grid, params, &cell);
        }
    }

    let mut visited: Array2<bool> = Array2::from_elem((n.x(), n.y()), false);
    let mut obstacles = Vec::new();

    for cx in 0..n.x() {
        for cy in 0..n.y() {
            if visited[[cx, cy]] {
                continue;
            }
            let seed = match candidates[[cx, cy]] {
                Some(c) => c,
                None => continue,
            };

            let cluster = flood_fill(grid, &candidates, &mut visited, Point2::new(cx, cy), seed);

            if cluster.len() < params.min_cluster_cells.max(1) {
                continue;
            }

            obstacles.push(summarise(&cluster));
        }
    }

    obstacles.sort_by(|a, b| {
        b.height
            .abs()
            .partial_cmp(&a.height.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    debug!("Found {} obstacles", obstacles.len());

    obstacles
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Decide whether a cell is an obstacle candidate.
fn candidate(
    grid: &ObstacleGrid,
    params: &ObstacleParams,
    cell: &Point2<usize>,
) -> Option<Candidate> {
    if grid.count(cell) < params.min_points_per_cell.max(1) {
        return None;
    }

    let rise = grid.max_height(cell)? - params.floor_height_cm;
    let drop = params.floor_height_cm - grid.min_height(cell)?;

    let relief = if rise >= drop && rise > params.traversable_height_cm {
        rise
    } else if drop > params.traversable_height_cm {
        -drop
    } else {
        return None;
    };

    Some(Candidate {
        relief,
        pos: grid.map().cell_position(cell).ok()?,
    })
}

/// Collect every candidate connected to `start` with the same sign of relief.
fn flood_fill(
    grid: &ObstacleGrid,
    candidates: &Array2<Option<Candidate>>,
    visited: &mut Array2<bool>,
    start: Point2<usize>,
    seed: Candidate,
) -> Vec<Candidate> {
    let positive = seed.relief > 0.0;
    let mut cluster = Vec::new();
    let mut stack = vec![start];
    visited[[start.x(), start.y()]] = true;

    while let Some(cell) = stack.pop() {
        if let Some(c) = candidates[[cell.x(), cell.y()]] {
            cluster.push(c);
        }

        for nb in grid.map().neighbours(&cell) {
            let idx = [nb.x(), nb.y()];
            if visited[idx] {
                continue;
            }

            match candidates[idx] {
                Some(c) if (c.relief > 0.0) == positive => {
                    visited[idx] = true;
                    stack.push(nb);
                }
                _ => (),
            }
        }
    }

    cluster
}

/// One obstacle at the relief-weighted centroid of the cluster, as high (or deep) as its most
/// extreme cell.
fn summarise(cluster: &[Candidate]) -> DetectedObstacle {
    let mut sum_w = 0.0;
    let mut x = 0.0;
    let mut y = 0.0;
    let mut extreme: f64 = 0.0;

    for c in cluster {
        let w = c.relief.abs();
        sum_w += w;
        x += c.pos.x() * w;
        y += c.pos.y() * w;

        if c.relief.abs() > extreme.abs() {
            extreme = c.relief;
        }
    }

    DetectedObstacle {
        x: (x / sum_w) as f32,
        y: (y / sum_w) as f32,
        height: extreme as f32,
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
