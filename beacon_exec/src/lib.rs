//! # Beacon library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the beacon crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Acquisition loop - pulls frames, serves commands and runs obstacle scans
pub mod acq;

/// Beacon server - receives remote commands and sends their replies
pub mod beacon_server;

/// Camera geometry - pixel undistortion and the camera to world transform
pub mod geom;

/// Localisation - fuses marker sightings into a robot pose
pub mod loc;

/// Obstacle detection - height grid and obstacle extraction
pub mod obstacle;

/// Parameters for the beacon executable
pub mod params;

/// Pose server - publishes the fused pose of every frame
pub mod pose_server;

/// Stepper controller - drives the pan head over its serial link
pub mod stepper;
