//! # Acquisition collaborators
//!
//! Interfaces to the things the acquisition loop drives but does not own: the depth camera, the
//! marker detector, the power control of the host and the debug output. Each is a trait so that
//! the loop can be run against in-memory fakes.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::RgbImage;
use log::{info, trace};
use std::{
    process::Command,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{geom::Intrinsics, loc::MarkerSighting};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A depth camera delivering synchronised depth and colour frames.
pub trait FrameSource {
    /// Intrinsics of the depth stream. May change if the device is reconfigured.
    fn depth_intrinsics(&self) -> Intrinsics;

    /// Size of one depth unit.
    ///
    /// Units: meters
    fn depth_scale(&self) -> f64;

    /// Block until the next coherent pair of frames is available.
    fn wait_for_frames(&mut self) -> Result<FrameSet, FrameSourceError>;
}

/// A fiducial marker detector.
pub trait MarkerDetector {
    /// Find the markers in the image, calling `found` once per marker.
    fn detect(&mut self, image: &ColorFrame, found: &mut dyn FnMut(MarkerSighting));
}

/// Control over the power of the host computer.
pub trait PowerCtrl {
    fn shutdown(&mut self) -> std::io::Result<()>;
}

/// Destination for visualisation and diagnostic output.
///
/// Failures of a sink are never reported back to the loop.
pub trait DebugSink {
    fn text(&mut self, _line: &str) {}

    fn image(&mut self, _name: &str, _image: &RgbImage) {}
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A depth frame in device units, row-major, zero where the sensor has no data.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u16>,
}

/// An RGB8 colour frame.
pub type ColorFrame = RgbImage;

/// One pair of frames from the camera.
#[derive(Debug, Clone)]
pub struct FrameSet {
    pub depth: DepthFrame,

    /// Missing if the colour stream dropped a frame
    pub color: Option<ColorFrame>,
}

/// Powers the host off with `shutdown`.
pub struct SystemShutdown;

/// Sink that only forwards text to the log.
pub struct LogSink;

/// Sink which discards everything.
pub struct NullSink;

/// Flag set by the surrounding application to ask the loop to stop.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FrameSourceError {
    #[error("Timed out waiting for frames")]
    Timeout,

    #[error("Frame source disconnected: {0}")]
    Disconnected(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DepthFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width * height) as usize],
        }
    }

    /// Depth at the given pixel, `None` outside the frame.
    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }
}

impl PowerCtrl for SystemShutdown {
    fn shutdown(&mut self) -> std::io::Result<()> {
        info!("Shutting down the host");

        let status = Command::new("sudo")
            .args(&["shutdown", "-h", "now"])
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("shutdown exited with {}", status),
            ))
        }
    }
}

impl DebugSink for LogSink {
    fn text(&mut self, line: &str) {
        info!("{}", line);
    }

    fn image(&mut self, name: &str, image: &RgbImage) {
        trace!("Debug image {} ({}x{})", name, image.width(), image.height());
    }
}

impl DebugSink for NullSink {}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at the start of its next cycle.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_depth_frame() {
        let mut f = DepthFrame::new(4, 3);
        f.data[2 * 4 + 1] = 500;

        assert_eq!(f.get(1, 2), Some(500));
        assert_eq!(f.get(0, 0), Some(0));
        assert_eq!(f.get(4, 0), None);
        assert_eq!(f.get(0, 3), None);
    }

    #[test]
    fn test_stop_flag() {
        let flag = StopFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_stopped());

        handle.stop();
        assert!(flag.is_stopped());
    }
}
