//! # Robot and marker poses

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::catalog::MarkerCatalog;
use crate::geom::CoordRotator;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Poses with a confidence at or below this are treated as absent.
pub const MIN_CONFIDENCE: f64 = 0.1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position and heading of the robot or of a marker, in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Units: centimeters
    pub pos: Vector3<f64>,

    /// Unit vector along the forward axis
    pub fwd: Vector3<f64>,

    /// Unit vector along the right (lateral) axis
    pub right: Vector3<f64>,

    /// How much the pose can be trusted, 0 means not observed this cycle
    pub confidence: f64,
}

/// Everything the markers said about the robot in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotMarkersAll {
    /// Fused robot pose
    pub pose: Pose,

    /// Marker poses indexed by ID, unseen markers have zero confidence
    pub markers: Vec<Pose>,

    /// Pan angle of the beacon when the frame was taken.
    ///
    /// Units: degrees
    pub beacon: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for Pose {
    fn default() -> Self {
        Self {
            pos: Vector3::zeros(),
            fwd: Vector3::x(),
            right: -Vector3::y(),
            confidence: 0.0,
        }
    }
}

impl Pose {
    /// If the pose is confident enough to be used.
    pub fn is_valid(&self) -> bool {
        self.confidence > MIN_CONFIDENCE
    }

    /// Heading of the forward axis from the world X axis.
    ///
    /// Units: degrees
    pub fn yaw_deg(&self) -> f64 {
        self.fwd.y.atan2(self.fwd.x).to_degrees()
    }
}

impl RobotMarkersAll {
    /// Create an empty set of observations with one slot per catalog ID.
    pub fn new(num_ids: usize) -> Self {
        Self {
            pose: Pose::default(),
            markers: vec![Pose::default(); num_ids],
            beacon: 0.0,
        }
    }

    /// Record a marker observation, growing the slot table if needed.
    pub fn add(&mut self, id: usize, pose: Pose) {
        if id >= self.markers.len() {
            self.markers.resize(id + 1, Pose::default());
        }
        self.markers[id] = pose;
    }

    /// Number of markers with a valid pose.
    pub fn num_seen(&self) -> usize {
        self.markers.iter().filter(|m| m.is_valid()).count()
    }

    /// Fuse all valid robot-mounted marker poses into the robot pose.
    ///
    /// Each marker is moved back onto the robot's logical frame using its catalog shift, then the
    /// results are averaged with the catalog weights. If no marker contributes the robot pose is
    /// left with zero confidence.
    pub fn fuse(&mut self, catalog: &MarkerCatalog) {
        let mut sum_w = 0.0;
        let mut pos = Vector3::zeros();
        let mut fwd = Vector3::zeros();
        let mut right = Vector3::zeros();
        let mut confidence = 0.0;

        for (id, marker) in self.markers.iter().enumerate() {
            if !marker.is_valid() {
                continue;
            }

            let entry = catalog.get(id);
            if !entry.is_known() || entry.is_reference() || entry.weight <= 0.0 {
                continue;
            }

            // Undo the marker's mounting yaw to get the robot axes
            let unmount = CoordRotator::new(-entry.shift.angle_deg);
            let m_fwd = rotate_xy(&unmount, &marker.fwd);
            let m_right = rotate_xy(&unmount, &marker.right);

            let robot_pos =
                marker.pos - flat_unit(&m_fwd) * entry.shift.x - flat_unit(&m_right) * entry.shift.y;

            let w = entry.weight;
            sum_w += w;
            pos += robot_pos * w;
            fwd += m_fwd * w;
            right += m_right * w;
            confidence += marker.confidence * w;
        }

        if sum_w <= 0.0 {
            self.pose = Pose::default();
            return;
        }

        self.pose = Pose {
            pos: pos / sum_w,
            fwd: fwd.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::x),
            right: right.try_normalize(f64::EPSILON).unwrap_or_else(|| -Vector3::y()),
            confidence: confidence / sum_w,
        };
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn rotate_xy(rot: &CoordRotator, v: &Vector3<f64>) -> Vector3<f64> {
    let (x, y) = rot.rotate(v.x, v.y);
    Vector3::new(x, y, v.z)
}

/// Unit vector of the horizontal part of `v`, or zero if `v` is vertical.
fn flat_unit(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.x, v.y, 0.0)
        .try_normalize(f64::EPSILON)
        .unwrap_or_else(Vector3::zeros)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::catalog::{MarkerCatalogEntry, Shift};

    fn entry(id: usize, weight: f64, shift: Shift) -> MarkerCatalogEntry {
        MarkerCatalogEntry {
            true_size: 10.0,
            side: 1,
            weight,
            shift,
            ..MarkerCatalogEntry::unknown(id)
        }
    }

    fn seen(pos: Vector3<f64>, confidence: f64) -> Pose {
        Pose {
            pos,
            confidence,
            ..Pose::default()
        }
    }

    #[test]
    fn test_weighted_fusion() {
        let cat = MarkerCatalog::from_entries(vec![
            entry(0, 1.0, Shift::default()),
            entry(1, 3.0, Shift::default()),
            entry(2, 5.0, Shift::default()),
        ])
        .unwrap();

        let p1 = Vector3::new(100.0, 0.0, 20.0);
        let p2 = Vector3::new(200.0, 40.0, 20.0);

        let mut rma = RobotMarkersAll::new(cat.len());
        rma.add(0, seen(p1, 1.0));
        rma.add(1, seen(p2, 1.0));
        // Barely seen, must not pull the result
        rma.add(2, seen(Vector3::new(-500.0, -500.0, 0.0), 0.05));
        rma.fuse(&cat);

        let expected = (p1 * 1.0 + p2 * 3.0) / 4.0;
        assert!((rma.pose.pos - expected).norm() < 1e-9);
        assert!(rma.pose.is_valid());
        assert_eq!(rma.num_seen(), 2);
    }

    #[test]
    fn test_shift_back_projection() {
        // Marker mounted 20 cm behind and 30 cm right of the robot centre, facing left
        let cat = MarkerCatalog::from_entries(vec![entry(
            4,
            1.0,
            Shift {
                x: -20.0,
                y: 30.0,
                angle_deg: 90.0,
            },
        )])
        .unwrap();

        // Robot at (100, 50) facing world +X, so the marker's X axis points along world +Y
        let marker = Pose {
            pos: Vector3::new(80.0, 20.0, 30.0),
            fwd: Vector3::y(),
            right: Vector3::x(),
            confidence: 1.0,
        };

        let mut rma = RobotMarkersAll::new(cat.len());
        rma.add(4, marker);
        rma.fuse(&cat);

        assert!((rma.pose.pos - Vector3::new(100.0, 50.0, 30.0)).norm() < 1e-9);
        assert!(rma.pose.yaw_deg().abs() < 1e-9);
        assert!((rma.pose.right - -Vector3::y()).norm() < 1e-9);
    }

    #[test]
    fn test_nothing_seen() {
        let cat = MarkerCatalog::from_entries(vec![entry(0, 1.0, Shift::default())]).unwrap();

        let mut rma = RobotMarkersAll::new(cat.len());
        rma.fuse(&cat);
        assert!(!rma.pose.is_valid());

        // Markers missing from the catalog, or with no weight, do not count either
        rma.add(9, seen(Vector3::new(1.0, 2.0, 3.0), 1.0));
        rma.fuse(&cat);
        assert!(!rma.pose.is_valid());
        assert_eq!(rma.markers.len(), 10);
    }
}
