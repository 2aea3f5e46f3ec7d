//! # Marker fusion
//!
//! Collects the marker sightings of one colour frame, places each marker in the world and fuses
//! them into a robot pose. Field-fixed reference markers instead produce a pan angle correction.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use nalgebra::{Matrix3x4, Vector3};
use serde::Serialize;

use super::{
    catalog::MarkerCatalog,
    pose::{Pose, RobotMarkersAll},
};
use crate::{geom::CameraTransform, stepper::StepperCtrl};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Length of the probe used to map each marker axis into the world.
///
/// Units: centimeters
const AXIS_PROBE_CM: f64 = 10.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One marker found by the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerSighting {
    pub id: usize,

    /// Camera frame pose of the marker for a marker of unit size. The first three columns are the
    /// marker's X, Y and Z axes, the last is the position of its centre.
    pub pose: Matrix3x4<f64>,
}

/// World frame attitude of a marker.
///
/// Only the yaw is well conditioned. Roll and pitch are taken from world axes rather than robot
/// axes and are noisy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Attitude {
    pub yaw_deg: f64,
    pub roll_deg: f64,
    pub pitch_deg: f64,
}

/// Marker watcher for a single frame.
pub struct MarkerFusion<'a> {
    catalog: &'a MarkerCatalog,

    camera_tf: &'a CameraTransform,

    /// Correction already included in the pan angle of `camera_tf`
    applied_correction: f64,

    markers: RobotMarkersAll,

    /// Observed minus expected bearing of the last reference marker seen, measured against the
    /// uncorrected pan angle
    angle_correction: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Attitude {
    /// Attitude from a marker's world frame axes.
    pub fn from_axes(axes: &[Vector3<f64>; 3]) -> Self {
        Self {
            yaw_deg: axes[0].y.atan2(axes[0].x).to_degrees(),
            roll_deg: axes[0].z.atan2(axes[0].x).to_degrees(),
            pitch_deg: axes[2].y.atan2(-axes[2].z).to_degrees(),
        }
    }
}

impl<'a> MarkerFusion<'a> {
    /// Start a new frame using this cycle's camera transform.
    ///
    /// `applied_correction_deg` is the stepper correction the transform's pan angle was built
    /// with. It is taken back out of reference bearings so that repeated sightings of a reference
    /// marker give the same correction.
    pub fn new(
        catalog: &'a MarkerCatalog,
        camera_tf: &'a CameraTransform,
        applied_correction_deg: f64,
    ) -> Self {
        Self {
            catalog,
            camera_tf,
            applied_correction: applied_correction_deg,
            markers: RobotMarkersAll::new(catalog.len()),
            angle_correction: None,
        }
    }

    /// Handle one detected marker.
    pub fn found_marker(&mut self, sighting: &MarkerSighting) {
        let info = self.catalog.get(sighting.id);

        if !info.is_known() {
            warn!("Unknown marker ID {} in view", sighting.id);
            return;
        }

        let scale = info.true_size;
        let centre_cam: Vector3<f64> = sighting.pose.column(3).into_owned() * scale;
        let centre = self.camera_tf.world_from_camera(&centre_cam);

        if info.is_reference() {
            let rel = self.camera_tf.camera_relative(&centre);
            let observed = rel.y.atan2(rel.x).to_degrees() - self.applied_correction;
            let expected = info.shift.angle_deg;
            let delta = util::maths::get_ang_dist_deg(expected, observed);

            info!(
                "Angle shift {:.1} (ref {:.0}, observed {:.1}, ({:.2}, {:.2}, {:.2}))",
                delta, expected, observed, rel.x, rel.y, rel.z
            );

            self.angle_correction = Some(delta);
            return;
        }

        let mut axes = [Vector3::zeros(); 3];
        for (i, axis) in axes.iter_mut().enumerate() {
            let dir = sighting.pose.column(i).into_owned();
            let probe = dir.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros);
            *axis = self
                .camera_tf
                .world_from_camera(&(centre_cam + probe * AXIS_PROBE_CM))
                - centre;
        }

        let att = Attitude::from_axes(&axes);
        debug!(
            "Marker {}: world ({:.1}, {:.1}, {:.1}) cm, yaw {:.1} deg, roll {:.1} deg, pitch {:.1} deg",
            info.id, centre.x, centre.y, centre.z, att.yaw_deg, att.roll_deg, att.pitch_deg
        );

        self.markers.add(
            info.id,
            Pose {
                pos: centre,
                fwd: axes[0] / AXIS_PROBE_CM,
                right: axes[1] / AXIS_PROBE_CM,
                confidence: 1.0,
            },
        );
    }

    /// Pan angle correction from a reference marker, if one was seen.
    pub fn angle_correction(&self) -> Option<f64> {
        self.angle_correction
    }

    pub fn markers(&self) -> &RobotMarkersAll {
        &self.markers
    }

    /// Finish the frame: apply any pan angle correction to the stepper, fuse the robot pose and
    /// stamp the result with the corrected pan angle.
    pub fn finish(mut self, stepper: &mut StepperCtrl) -> RobotMarkersAll {
        if let Some(correction) = self.angle_correction {
            stepper.set_angle_correction_deg(correction);
        }

        self.markers.fuse(self.catalog);
        self.markers.beacon = stepper.get_angle_deg();

        self.markers
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        loc::catalog::{MarkerCatalogEntry, Shift},
        params::StepperParams,
    };

    fn catalog() -> MarkerCatalog {
        MarkerCatalog::from_entries(vec![
            MarkerCatalogEntry {
                true_size: 10.0,
                side: 1,
                weight: 1.0,
                ..MarkerCatalogEntry::unknown(1)
            },
            MarkerCatalogEntry {
                true_size: 10.0,
                side: -1,
                shift: Shift {
                    angle_deg: 0.0,
                    ..Shift::default()
                },
                ..MarkerCatalogEntry::unknown(2)
            },
        ])
        .unwrap()
    }

    /// Sighting with the marker's axes aligned to the camera's.
    fn sighting(id: usize, centre_cam: Vector3<f64>) -> MarkerSighting {
        let c = centre_cam;
        #[rustfmt::skip]
        let pose = Matrix3x4::new(
            1.0, 0.0, 0.0, c.x,
            0.0, 1.0, 0.0, c.y,
            0.0, 0.0, 1.0, c.z,
        );
        MarkerSighting { id, pose }
    }

    fn software_stepper() -> StepperCtrl {
        StepperCtrl::new(
            StepperParams {
                boot_wait_s: 0.0,
                ..Default::default()
            },
            None,
        )
    }

    #[test]
    fn test_marker_yaw() {
        let cat = catalog();

        // Camera X axis is world -Y when level
        let tf = CameraTransform::new(Vector3::new(0.0, 0.0, 70.0), 0.0, 0.0);
        let mut fusion = MarkerFusion::new(&cat, &tf, 0.0);
        fusion.found_marker(&sighting(1, Vector3::new(0.0, 0.0, 20.0)));

        let m = fusion.markers().markers[1];
        assert!((m.pos - Vector3::new(200.0, 0.0, 70.0)).norm() < 1e-9);
        assert!((m.yaw_deg() + 90.0).abs() < 1e-9);

        // Panning the camera pans the marker's yaw with it
        let tf = CameraTransform::new(Vector3::new(0.0, 0.0, 70.0), -20.0, 90.0);
        let mut fusion = MarkerFusion::new(&cat, &tf, 0.0);
        fusion.found_marker(&sighting(1, Vector3::new(0.0, 0.0, 20.0)));
        let m = fusion.markers().markers[1];
        assert!(m.yaw_deg().abs() < 1e-9);
        assert!(fusion.angle_correction().is_none());

        let mut stepper = software_stepper();
        let rma = fusion.finish(&mut stepper);
        assert!(rma.pose.is_valid());
        assert!(rma.pose.yaw_deg().abs() < 1e-9);
    }

    #[test]
    fn test_reference_marker_correction() {
        let cat = catalog();
        let tf = CameraTransform::new(Vector3::new(30.0, -40.0, 70.0), 0.0, 0.0);

        // Marker 10 degrees left of the camera's forward axis, at 3 m
        let (s, c) = 10f64.to_radians().sin_cos();
        let centre_cam = Vector3::new(-s, 0.0, c) * 30.0;

        let mut fusion = MarkerFusion::new(&cat, &tf, 0.0);
        fusion.found_marker(&sighting(2, centre_cam));
        assert!((fusion.angle_correction().unwrap() - 10.0).abs() < 1e-9);

        let mut stepper = software_stepper();
        stepper.absolute_seek(25.0).unwrap();
        let rma = fusion.finish(&mut stepper);

        assert!((stepper.angle_correction_deg() - 10.0).abs() < 1e-9);
        assert!((stepper.get_angle_deg() - 35.0).abs() < 1e-9);
        assert!((rma.beacon - 35.0).abs() < 1e-9);

        // Reference markers do not place the robot
        assert!(!rma.pose.is_valid());
        assert_eq!(rma.num_seen(), 0);
    }

    #[test]
    fn test_reference_correction_is_stable() {
        let cat = catalog();
        let (s, c) = 10f64.to_radians().sin_cos();
        let centre_cam = Vector3::new(-s, 0.0, c) * 30.0;

        let mut stepper = software_stepper();
        stepper.absolute_seek(0.0).unwrap();

        // Each frame's transform is built from the corrected angle, as the acquisition loop does
        for _ in 0..5 {
            let tf =
                CameraTransform::new(Vector3::new(0.0, 0.0, 70.0), 0.0, stepper.get_angle_deg());
            let mut fusion = MarkerFusion::new(&cat, &tf, stepper.angle_correction_deg());
            fusion.found_marker(&sighting(2, centre_cam));
            fusion.finish(&mut stepper);

            assert!((stepper.angle_correction_deg() - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_marker() {
        let cat = catalog();
        let tf = CameraTransform::new(Vector3::zeros(), 0.0, 0.0);

        let mut fusion = MarkerFusion::new(&cat, &tf, 0.0);
        fusion.found_marker(&sighting(0, Vector3::new(0.0, 0.0, 10.0)));
        fusion.found_marker(&sighting(77, Vector3::new(0.0, 0.0, 10.0)));

        assert_eq!(fusion.markers().num_seen(), 0);
        assert_eq!(fusion.markers().markers.len(), cat.len());
        assert!(fusion.angle_correction().is_none());
    }

    #[test]
    fn test_attitude() {
        let att = Attitude::from_axes(&[
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(-1.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
        ]);
        assert!((att.yaw_deg - 45.0).abs() < 1e-9);
        assert!(att.roll_deg.abs() < 1e-9);
        assert!(att.pitch_deg.abs() < 1e-9);
    }
}
