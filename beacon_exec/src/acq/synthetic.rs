//! # Synthetic frame source
//!
//! Renders depth frames of a flat floor with box shaped rocks on it, as seen by a pinhole camera.
//! Used when no depth camera is available and to drive the loop in tests and benchmarks.
//!
//! Only the floor and the tops of the rocks are rendered, rock sides are invisible.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::io::{DepthFrame, FrameSet, FrameSource, FrameSourceError};
use crate::{
    geom::{CameraTransform, Intrinsics},
    params::CameraParams,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Horizontal field of view of the synthetic camera.
///
/// Units: degrees
const SYNTHETIC_HFOV_DEG: f64 = 87.0;

/// Depth unit of the synthetic camera.
///
/// Units: meters
const SYNTHETIC_DEPTH_SCALE: f64 = 0.001;

/// Furthest surface the synthetic camera reports.
///
/// Units: centimeters
const SYNTHETIC_MAX_RANGE_CM: f64 = 1000.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An axis aligned box standing on the floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rock {
    /// World frame `[min, max]` extent along X.
    ///
    /// Units: centimeters
    pub x_cm: [f64; 2],

    /// World frame `[min, max]` extent along Y.
    ///
    /// Units: centimeters
    pub y_cm: [f64; 2],

    /// Height of the top face.
    ///
    /// Units: centimeters
    pub top_cm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticScene {
    /// Units: centimeters
    pub floor_cm: f64,

    pub rocks: Vec<Rock>,
}

pub struct SyntheticSource {
    intrinsics: Intrinsics,

    camera: CameraParams,

    scene: SyntheticScene,

    /// Pan angle the frames are rendered at.
    ///
    /// Units: degrees
    pan_deg: f64,

    /// Sleep before each frame, emulating the camera's frame rate
    frame_period: Option<Duration>,

    /// Rendered once, the scene and pose never change between frames
    cached: Option<DepthFrame>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SyntheticSource {
    pub fn new(intrinsics: Intrinsics, camera: CameraParams, scene: SyntheticScene) -> Self {
        Self {
            intrinsics,
            camera,
            scene,
            pan_deg: 0.0,
            frame_period: None,
            cached: None,
        }
    }

    /// A source matching the configured depth resolution with a distortion free lens.
    pub fn from_params(camera: &CameraParams, scene: SyntheticScene) -> Self {
        let w = camera.depth_width;
        let h = camera.depth_height;
        let f = (w as f64 / 2.0) / (SYNTHETIC_HFOV_DEG.to_radians() / 2.0).tan();

        let intrinsics =
            Intrinsics::pinhole(w, h, w as f64 / 2.0, h as f64 / 2.0, f, f);

        Self::new(intrinsics, camera.clone(), scene)
    }

    pub fn with_frame_period(mut self, period: Duration) -> Self {
        self.frame_period = Some(period);
        self
    }

    pub fn set_pan_deg(&mut self, pan_deg: f64) {
        if pan_deg != self.pan_deg {
            self.pan_deg = pan_deg;
            self.cached = None;
        }
    }

    /// Render one depth frame.
    pub fn render(&self) -> DepthFrame {
        let tf = CameraTransform::from_params(&self.camera, self.pan_deg);
        let units_per_cm = 1.0 / (SYNTHETIC_DEPTH_SCALE * 100.0);

        let mut frame = DepthFrame::new(self.intrinsics.width, self.intrinsics.height);

        for y in 0..self.intrinsics.height {
            for x in 0..self.intrinsics.width {
                let [dx, dy] = self.intrinsics.pixel_direction(x as f64, y as f64);

                // Point at unit camera depth, so the ray parameter is the depth itself
                let dir = tf.world_from_camera(&Vector3::new(dx, dy, 1.0)) - tf.camera;

                let depth_cm = match self.intersect(&tf.camera, &dir) {
                    Some(d) if d <= SYNTHETIC_MAX_RANGE_CM => d,
                    _ => continue,
                };

                let raw = (depth_cm * units_per_cm).round();
                if raw > 0.0 && raw <= u16::MAX as f64 {
                    frame.data[(y * frame.width + x) as usize] = raw as u16;
                }
            }
        }

        frame
    }

    /// Nearest surface hit by the ray `origin + t * dir`, returns `t`.
    fn intersect(&self, origin: &Vector3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        if dir.z >= 0.0 {
            return None;
        }

        let mut best = plane_hit(origin, dir, self.scene.floor_cm);

        for rock in &self.scene.rocks {
            let t = match plane_hit(origin, dir, rock.top_cm) {
                Some(t) => t,
                None => continue,
            };

            let p = origin + dir * t;
            let inside = p.x >= rock.x_cm[0]
                && p.x <= rock.x_cm[1]
                && p.y >= rock.y_cm[0]
                && p.y <= rock.y_cm[1];

            if inside && best.map_or(true, |b| t < b) {
                best = Some(t);
            }
        }

        best
    }
}

impl FrameSource for SyntheticSource {
    fn depth_intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn depth_scale(&self) -> f64 {
        SYNTHETIC_DEPTH_SCALE
    }

    fn wait_for_frames(&mut self) -> Result<FrameSet, FrameSourceError> {
        if let Some(period) = self.frame_period {
            std::thread::sleep(period);
        }

        if self.cached.is_none() {
            self.cached = Some(self.render());
        }

        let depth = self
            .cached
            .clone()
            .ok_or_else(|| FrameSourceError::Disconnected("no frame rendered".into()))?;

        Ok(FrameSet {
            color: Some(image::RgbImage::new(
                self.camera.color_width,
                self.camera.color_height,
            )),
            depth,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Ray parameter at which the ray crosses the horizontal plane at `z`, if it does so in front of
/// the origin.
fn plane_hit(origin: &Vector3<f64>, dir: &Vector3<f64>, z: f64) -> Option<f64> {
    if dir.z == 0.0 {
        return None;
    }

    let t = (z - origin.z) / dir.z;
    if t > 0.0 {
        Some(t)
    } else {
        None
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
