//! # Obstacle module
//!
//! Builds a height map of the terrain in front of the beacon during an obstacle scan and extracts
//! the obstacles from it once the scan is complete.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod extract;
pub mod grid;
pub mod grid_map;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use extract::find_obstacles;
pub use grid::{ObstacleGrid, ObstacleLayer};
pub use grid_map::{GridMap, GridMapError, Point2};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::beacon::DetectedObstacle;

use crate::params::ObstacleParams;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ObstacleGrid {
    /// Extract the obstacles found during the scan. The grid itself is left untouched.
    pub fn extract(&self, params: &ObstacleParams) -> Vec<DetectedObstacle> {
        find_obstacles(self, params)
    }
}
