//! # Beacon Executable Parameters
//!
//! This module provides parameters for the beacon executable, loaded from `beacon_exec.toml`.
//! Every table is optional in the file, missing tables take their default values.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconExecParams {
    pub net: NetParams,

    pub camera: CameraParams,

    pub stepper: StepperParams,

    pub grid: GridParams,

    pub obstacles: ObstacleParams,

    pub scan: ScanParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetParams {
    /// Endpoint the remote command (REP) socket binds to
    pub command_endpoint: String,

    /// Endpoint the fused pose (PUB) socket binds to
    pub pose_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraParams {
    /// Mounting tilt of the camera about its optical axis.
    ///
    /// Units: degrees
    pub tilt_deg: f64,

    /// Position of the camera in the world frame.
    ///
    /// Units: centimeters
    pub origin_cm: [f64; 3],

    /// Expected depth stream width, any other width is fatal
    pub depth_width: u32,

    /// Expected depth stream height, any other height is fatal
    pub depth_height: u32,

    pub color_width: u32,

    pub color_height: u32,

    /// Depth columns left of this are sensor garbage and are skipped
    pub invalid_left_columns: u32,

    /// Run marker detection and fusion on colour frames
    pub markers_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperParams {
    /// If false the stepper is never opened and the angle is tracked in software only
    pub enabled: bool,

    pub device_path: String,

    pub baud_rate: u32,

    /// Number of position bytes per degree of pan
    pub steps_per_deg: f64,

    /// Pan angle of position byte zero.
    ///
    /// Units: degrees
    pub zero_deg: f64,

    /// Largest position byte the board accepts
    pub max_step: u8,

    /// Byte which commands the board to hard-home
    pub home_byte: u8,

    /// Time to wait for the board's bootloader after opening the port.
    ///
    /// Units: seconds
    pub boot_wait_s: f64,

    /// Longest time a hard-home may take before it is abandoned.
    ///
    /// Units: seconds
    pub home_timeout_s: f64,

    /// Angle to seek to once the stepper is open.
    ///
    /// Units: degrees
    pub initial_seek_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Side length of a grid cell.
    ///
    /// Units: centimeters
    pub cell_size_cm: f64,

    /// World position of the corner of cell `[0, 0]`.
    ///
    /// Units: centimeters
    pub origin_cm: [f64; 2],

    /// Number of cells along the X and Y axes
    pub num_cells: [usize; 2],

    /// Points at or below this height are discarded.
    ///
    /// Units: centimeters
    pub min_z_cm: f64,

    /// Points at or above this height are discarded.
    ///
    /// Units: centimeters
    pub max_z_cm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleParams {
    /// Height of the field floor in the world frame.
    ///
    /// Units: centimeters
    pub floor_height_cm: f64,

    /// Relief the robot can drive over without it being reported.
    ///
    /// Units: centimeters
    pub traversable_height_cm: f64,

    /// Height of an obstacle with a severity of one, anything this tall is impassable.
    ///
    /// Units: centimeters
    pub severity_scale_cm: f64,

    /// Cells with fewer points than this are treated as noise
    pub min_points_per_cell: u32,

    /// Clusters smaller than this are treated as noise
    pub min_cluster_cells: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Number of settled frames accumulated into one obstacle scan
    pub frame_budget: u32,

    /// Largest difference between the pan angle and the scan target at which frames are still
    /// accumulated.
    ///
    /// Units: degrees
    pub angle_tolerance_deg: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for NetParams {
    fn default() -> Self {
        Self {
            command_endpoint: "tcp://*:5100".into(),
            pose_endpoint: "tcp://*:5101".into(),
        }
    }
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            tilt_deg: -20.0,
            origin_cm: [0.0, 0.0, 70.0],
            depth_width: 1280,
            depth_height: 720,
            color_width: 1280,
            color_height: 720,
            invalid_left_columns: 50,
            markers_enabled: true,
        }
    }
}

impl Default for StepperParams {
    fn default() -> Self {
        Self {
            enabled: true,
            device_path: "/dev/ttyUSB0".into(),
            baud_rate: 57600,
            steps_per_deg: 400.0 / 360.0,
            zero_deg: -73.0,
            max_step: 250,
            home_byte: 0xFF,
            boot_wait_s: 2.0,
            home_timeout_s: 30.0,
            initial_seek_deg: 0.0,
        }
    }
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            cell_size_cm: 5.0,
            origin_cm: [-400.0, -400.0],
            num_cells: [160, 160],
            min_z_cm: -50.0,
            max_z_cm: 150.0,
        }
    }
}

impl Default for ObstacleParams {
    fn default() -> Self {
        Self {
            floor_height_cm: 0.0,
            traversable_height_cm: 8.0,
            severity_scale_cm: 25.0,
            min_points_per_cell: 3,
            min_cluster_cells: 2,
        }
    }
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            frame_budget: 18,
            angle_tolerance_deg: 4.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_file() {
        let params: BeaconExecParams = util::params::from_str(
            r#"
            [stepper]
            enabled = false

            [scan]
            frame_budget = 6
            "#,
        )
        .unwrap();

        assert!(!params.stepper.enabled);
        assert_eq!(params.stepper.baud_rate, 57600);
        assert_eq!(params.scan.frame_budget, 6);
        assert_eq!(params.scan.angle_tolerance_deg, 4.0);
        assert_eq!(params.grid.min_z_cm, -50.0);
        assert_eq!(params.camera.origin_cm[2], 70.0);
    }

    #[test]
    fn test_shipped_files() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../params");

        let params: BeaconExecParams =
            util::params::load_from_path(dir.join("beacon_exec.toml")).unwrap();
        assert_eq!(params.stepper.max_step, 250);
        assert_eq!(params.stepper.home_byte, 0xFF);
        assert!((params.stepper.steps_per_deg - 400.0 / 360.0).abs() < 1e-12);

        let scene: crate::acq::SyntheticScene =
            util::params::load_from_path(dir.join("synthetic_scene.toml")).unwrap();
        assert_eq!(scene.rocks.len(), 2);

        let catalog = std::fs::read_to_string(dir.join("marker_catalog.toml")).unwrap();
        let catalog = crate::loc::MarkerCatalog::from_toml(&catalog).unwrap();
        assert!(catalog.get(0).is_reference());
        assert_eq!(catalog.known().count(), 4);
    }
}
