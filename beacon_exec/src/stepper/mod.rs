//! # Stepper Controller Module
//!
//! Tracks and commands the pan angle of the sensor head. The head is driven by a stepper board
//! which speaks single bytes over a serial link:
//!
//! - Writing a byte in `[0, max_step]` seeks to that position.
//! - Writing the home byte drives the head into its end stop and zeroes the position.
//! - The board reports its position as a single byte whenever it moves.
//!
//! If no link is available the controller degrades to tracking the commanded angle in software,
//! so everything downstream still sees a consistent pan angle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`StepperLink`] over a serial port.
pub mod serial_link;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::params::StepperParams;
pub use serial_link::SerialLink;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Sleep between polls while waiting for the board to finish homing.
const HOME_POLL_PERIOD: Duration = Duration::from_millis(1);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Byte oriented, non-blocking connection to the stepper board.
pub trait StepperLink {
    /// Number of bytes waiting to be read.
    fn available(&mut self) -> Result<usize, StepperError>;

    /// Read one byte. Only called when [`StepperLink::available`] is non-zero.
    fn read_byte(&mut self) -> Result<u8, StepperError>;

    fn write_byte(&mut self, byte: u8) -> Result<(), StepperError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct StepperCtrl {
    params: StepperParams,

    link: Option<Box<dyn StepperLink>>,

    /// Angle the camera centre line is facing, as reported by the board.
    ///
    /// Units: degrees
    angle_deg: f64,

    /// Last angle requested with [`StepperCtrl::absolute_seek`].
    target_deg: Option<f64>,

    /// Observed minus true heading, added to every reported angle.
    angle_correction_deg: f64,

    /// Last position byte reported, used to only log changes
    last_report: Option<u8>,
}

/// Snapshot of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepperState {
    pub angle_deg: f64,

    pub target_deg: Option<f64>,

    pub angle_correction_deg: f64,

    pub connected: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StepperError {
    #[error("Could not open the stepper port: {0}")]
    OpenError(serialport::Error),

    #[error("Stepper link error: {0}")]
    LinkError(serialport::Error),

    #[error("Stepper IO error: {0}")]
    IoError(std::io::Error),

    #[error("Stepper did not report homing within {0} s")]
    HomeTimeout(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StepperCtrl {
    /// Create a controller on top of the given link, or a software-only controller if `link` is
    /// `None`.
    ///
    /// With a link this waits `boot_wait_s` for the board's bootloader and then reads whatever the
    /// board has already reported.
    pub fn new(params: StepperParams, link: Option<Box<dyn StepperLink>>) -> Self {
        let mut ctrl = Self {
            angle_deg: params.zero_deg,
            params,
            link,
            target_deg: None,
            angle_correction_deg: 0.0,
            last_report: None,
        };

        if ctrl.link.is_some() {
            if ctrl.params.boot_wait_s > 0.0 {
                std::thread::sleep(Duration::from_secs_f64(ctrl.params.boot_wait_s));
            }

            if let Err(e) = ctrl.serial_poll() {
                warn!("Initial stepper read failed: {}", e);
            }
        } else {
            info!("Stepper not connected, pan angle tracked in software only");
        }

        ctrl
    }

    /// Create a controller, opening the serial port named in the parameters.
    ///
    /// Failing to open the port is not an error, the controller runs software-only instead.
    #[cfg(feature = "stepper")]
    pub fn connect(params: StepperParams) -> Self {
        let link: Option<Box<dyn StepperLink>> = if params.enabled {
            match SerialLink::open(&params.device_path, params.baud_rate) {
                Ok(l) => {
                    info!("Connected to stepper");
                    Some(Box::new(l))
                }
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            }
        } else {
            None
        };

        Self::new(params, link)
    }

    /// Create a software-only controller.
    #[cfg(not(feature = "stepper"))]
    pub fn connect(params: StepperParams) -> Self {
        Self::new(params, None)
    }

    /// Read all position reports waiting on the link without blocking.
    ///
    /// Returns `true` if anything was read. A software-only controller always returns `true`, so
    /// that callers waiting on the board never hang.
    pub fn serial_poll(&mut self) -> Result<bool, StepperError> {
        let link = match self.link {
            Some(ref mut l) => l,
            None => return Ok(true),
        };

        let mut read = false;

        while link.available()? > 0 {
            let pos = link.read_byte()?;
            read = true;

            self.angle_deg = pos as f64 / self.params.steps_per_deg + self.params.zero_deg;

            if self.last_report != Some(pos) {
                debug!("Stepper reports {:.0} degrees / {} steps", self.angle_deg, pos);
                self.last_report = Some(pos);
            }
        }

        Ok(read)
    }

    /// Command the board to hard-home.
    ///
    /// The position is unknown until the board reports again, so callers should poll until
    /// [`StepperCtrl::serial_poll`] returns `true` before trusting the angle.
    pub fn setup_seek(&mut self) -> Result<(), StepperError> {
        let home_byte = self.params.home_byte;

        if let Some(ref mut link) = self.link {
            info!("Hard-homing stepper");
            self.angle_deg = self.params.zero_deg;
            link.write_byte(home_byte)?;
        }

        Ok(())
    }

    /// Poll the link until the board reports, or until `home_timeout_s` passes.
    pub fn wait_for_home(&mut self) -> Result<(), StepperError> {
        let timeout = self.params.home_timeout_s;
        let start = Instant::now();

        while !self.serial_poll()? {
            if start.elapsed().as_secs_f64() > timeout {
                return Err(StepperError::HomeTimeout(timeout));
            }
            std::thread::sleep(HOME_POLL_PERIOD);
        }

        Ok(())
    }

    /// Seek to the given corrected angle.
    ///
    /// Units: degrees
    pub fn absolute_seek(&mut self, angle_deg: f64) -> Result<(), StepperError> {
        self.target_deg = Some(angle_deg);

        let step = self.angle_to_step(angle_deg);

        match self.link {
            Some(ref mut link) => {
                info!("Seeking stepper to {:.0} degrees / {} steps", angle_deg, step);
                link.write_byte(step)
            }
            None => {
                self.angle_deg = angle_deg - self.angle_correction_deg;
                Ok(())
            }
        }
    }

    /// Current corrected angle.
    ///
    /// Units: degrees
    pub fn get_angle_deg(&self) -> f64 {
        self.angle_deg + self.angle_correction_deg
    }

    pub fn angle_correction_deg(&self) -> f64 {
        self.angle_correction_deg
    }

    /// Set the learned correction, it applies to the next [`StepperCtrl::get_angle_deg`] and to
    /// subsequent seeks.
    pub fn set_angle_correction_deg(&mut self, correction_deg: f64) {
        self.angle_correction_deg = correction_deg;
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn state(&self) -> StepperState {
        StepperState {
            angle_deg: self.get_angle_deg(),
            target_deg: self.target_deg,
            angle_correction_deg: self.angle_correction_deg,
            connected: self.is_connected(),
        }
    }

    /// Position byte for the given corrected angle, clamped to the board's range.
    fn angle_to_step(&self, angle_deg: f64) -> u8 {
        let step = ((angle_deg - self.angle_correction_deg - self.params.zero_deg)
            * self.params.steps_per_deg)
            .trunc();

        util::maths::clamp(&step, &0.0, &(self.params.max_step as f64)) as u8
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
