//! # Command processor module
//!
//! Executes one remote command against the beacon's state.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::beacon::{BeaconCmd, BeaconLetter};
use log::{debug, info, warn};

use super::scan::ScanState;
use crate::{
    obstacle::ObstacleGrid,
    params::ScanParams,
    stepper::{StepperCtrl, StepperError},
};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How the command must be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Acknowledge now with an empty reply
    Now,

    /// The reply is sent when the scan completes
    Deferred,

    /// Acknowledge now, then power the host off
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum CmdError {
    #[error("Stepper error while executing the command: {0}")]
    Stepper(#[from] StepperError),

    #[error("Command angle {0} is not a finite number")]
    InvalidAngle(f32),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute a remote command.
///
/// If an error is returned the command may have been partially executed, but a scan is only ever
/// armed once everything else has succeeded.
pub fn exec(
    cmd: &BeaconCmd,
    stepper: &mut StepperCtrl,
    grid: &mut ObstacleGrid,
    scan: &mut ScanState,
    scan_params: &ScanParams,
) -> Result<Reply, CmdError> {
    let kind = cmd.kind();
    let angle = cmd.angle as f64;

    // Only the turn off and unknown commands ignore their angle
    if !angle.is_finite() && !matches!(kind, BeaconLetter::TurnOff | BeaconLetter::Unknown(_)) {
        return Err(CmdError::InvalidAngle(cmd.angle));
    }

    match kind {
        BeaconLetter::Point => {
            debug!("Point command to {:.1} degrees", angle);
            stepper.absolute_seek(angle)?;
            Ok(Reply::Now)
        }
        BeaconLetter::TurnOff => {
            info!("Turn off command received");
            Ok(Reply::Shutdown)
        }
        BeaconLetter::HardHome => {
            info!("Hard-home command, then seek to {:.1} degrees", angle);
            stepper.setup_seek()?;
            stepper.wait_for_home()?;
            stepper.set_angle_correction_deg(0.0);
            stepper.absolute_seek(angle)?;
            Ok(Reply::Now)
        }
        BeaconLetter::Scan => {
            info!("Obstacle scan command at {:.1} degrees", angle);
            stepper.absolute_seek(angle)?;
            grid.clear();
            scan.arm(angle, scan_params.frame_budget);
            Ok(Reply::Deferred)
        }
        BeaconLetter::Unknown(letter) => {
            warn!(
                "Ignoring unknown command {:?} ({:.1} degrees)",
                letter as char, angle
            );
            Ok(Reply::Now)
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
