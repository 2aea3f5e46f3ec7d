//! # Camera to world transform

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;

use super::CoordRotator;
use crate::params::CameraParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Transforms camera frame points into the world frame by rotating and translating.
///
/// A transform is only valid for the pan angle it was built with, a new one must be built each
/// cycle after the pan stepper has been polled.
#[derive(Debug, Clone, Copy)]
pub struct CameraTransform {
    /// World position of the camera's optical centre.
    ///
    /// Units: centimeters
    pub camera: Vector3<f64>,

    /// Rotation about the optical axis, compensating for the mount tilt
    tilt: CoordRotator,

    /// Rotation about the world Z axis by the pan angle
    pan: CoordRotator,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CameraTransform {
    /// Build a transform for a camera at `camera` (world frame, cm), tilted by `tilt_deg` about
    /// its optical axis and panned by `pan_deg` about the world Z axis.
    pub fn new(camera: Vector3<f64>, tilt_deg: f64, pan_deg: f64) -> Self {
        Self {
            camera,
            tilt: CoordRotator::new(tilt_deg),
            pan: CoordRotator::new(pan_deg),
        }
    }

    /// Build the transform for this cycle's pan angle from the camera parameters.
    pub fn from_params(params: &CameraParams, pan_deg: f64) -> Self {
        Self::new(Vector3::from(params.origin_cm), params.tilt_deg, pan_deg)
    }

    /// The pan angle this transform was built for.
    ///
    /// Units: degrees
    pub fn pan_deg(&self) -> f64 {
        self.pan.angle_rad.to_degrees()
    }

    /// Project a camera frame point into world coordinates.
    pub fn world_from_camera(&self, point: &Vector3<f64>) -> Vector3<f64> {
        // Camera Z is forward, -X is left and -Y is up
        let x = point.z;
        let (y, z) = self.tilt.rotate(-point.x, -point.y);
        let (x, y) = self.pan.rotate(x, y);

        Vector3::new(x, y, z) + self.camera
    }

    /// Position of the world point relative to the camera, with the camera translation removed.
    pub fn camera_relative(&self, world: &Vector3<f64>) -> Vector3<f64> {
        world - self.camera
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const TOL: f64 = 1e-9;

    fn assert_vec_eq(a: Vector3<f64>, b: Vector3<f64>) {
        assert!((a - b).norm() < TOL, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_level_camera_axes() {
        let tf = CameraTransform::new(Vector3::new(10.0, 20.0, 70.0), 0.0, 0.0);

        // Forward, right and down in the camera are +X, -Y and -Z in the world
        assert_vec_eq(
            tf.world_from_camera(&Vector3::new(0.0, 0.0, 100.0)),
            Vector3::new(110.0, 20.0, 70.0),
        );
        assert_vec_eq(
            tf.world_from_camera(&Vector3::new(5.0, 0.0, 0.0)),
            Vector3::new(10.0, 15.0, 70.0),
        );
        assert_vec_eq(
            tf.world_from_camera(&Vector3::new(0.0, 5.0, 0.0)),
            Vector3::new(10.0, 20.0, 65.0),
        );
    }

    #[test]
    fn test_pan() {
        let tf = CameraTransform::new(Vector3::zeros(), 0.0, 90.0);

        // Panned left by 90 degrees, forward now points along world +Y
        assert_vec_eq(
            tf.world_from_camera(&Vector3::new(0.0, 0.0, 100.0)),
            Vector3::new(0.0, 100.0, 0.0),
        );
        assert!((tf.pan_deg() - 90.0).abs() < TOL);
    }

    #[test]
    fn test_tilt() {
        // The mount tilt rolls the camera about its optical axis, so a point straight ahead is
        // unaffected while a point below the lens swings sideways
        let tf = CameraTransform::new(Vector3::new(0.0, 0.0, 70.0), -20.0, 0.0);

        assert_vec_eq(
            tf.world_from_camera(&Vector3::new(0.0, 0.0, 100.0)),
            Vector3::new(100.0, 0.0, 70.0),
        );

        let (s, c) = (-20f64).to_radians().sin_cos();
        assert_vec_eq(
            tf.world_from_camera(&Vector3::new(0.0, 10.0, 0.0)),
            Vector3::new(0.0, 10.0 * s, 70.0 - 10.0 * c),
        );
    }

    #[test]
    fn test_camera_relative() {
        let tf = CameraTransform::new(Vector3::new(1.0, 2.0, 3.0), -20.0, 35.0);
        let p = Vector3::new(4.0, 6.0, 8.0);
        assert_vec_eq(tf.camera_relative(&p), Vector3::new(3.0, 4.0, 5.0));
    }
}
