//! # Camera geometry
//!
//! Turns raw depth camera samples into world frame points. The pipeline is split in two:
//!
//! - [`DepthProjector`] maps a pixel and a depth into a 3D point in the camera frame, correcting
//!   for lens distortion using a per-pixel direction table.
//! - [`CameraTransform`] maps a camera frame point into the world frame, given the camera's mount
//!   tilt, the current pan angle and the camera's world position.
//!
//! Frames used:
//!
//! - Camera: X along the sensor's long axis (right, as seen from the sensor), Y down, Z forward
//!   out of the lens.
//! - World: right handed, Z up. Lengths are in centimeters, angles in degrees.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod camera_tf;
mod projector;
mod rotator;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use camera_tf::CameraTransform;
pub use projector::{DepthProjector, DistortionModel, Intrinsics, ProjectorCache, ProjectorError};
pub use rotator::CoordRotator;
