//! # Localisation module
//!
//! Locates the robot in the world frame from the fiducial markers mounted on it, as seen by the
//! beacon's colour camera.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod catalog;
pub mod fusion;
pub mod pose;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use catalog::{CatalogError, MarkerCatalog, MarkerCatalogEntry, Shift};
pub use fusion::{Attitude, MarkerFusion, MarkerSighting};
pub use pose::{Pose, RobotMarkersAll};
