//! # Depth projector
//!
//! Converts depth pixels into camera frame 3D points. Working out the undistorted direction of
//! each pixel is expensive, so it is done once for every pixel in the frame and cached. Projecting
//! a pixel is then a single table lookup and a scale by the depth.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Calibration of a depth stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,

    /// Horizontal position of the principal point, in pixels from the left edge
    pub ppx: f64,

    /// Vertical position of the principal point, in pixels from the top edge
    pub ppy: f64,

    /// Horizontal focal length, in multiples of the pixel width
    pub fx: f64,

    /// Vertical focal length, in multiples of the pixel height
    pub fy: f64,

    /// The distortion model the coefficients belong to
    pub model: DistortionModel,

    /// Distortion coefficients, in the order `[k1, k2, p1, p2, k3]`
    pub coeffs: [f64; 5],
}

/// Per-pixel direction table for one set of intrinsics.
#[derive(Debug, Clone)]
pub struct DepthProjector {
    intrinsics: Intrinsics,

    /// Normalised `(x, y)` direction at unit depth, row major
    dirs: Vec<[f64; 2]>,
}

/// Holds the projector for the most recently seen intrinsics, rebuilding it when the capture
/// reconfigures.
#[derive(Debug, Default)]
pub struct ProjectorCache {
    projector: Option<DepthProjector>,

    num_builds: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Lens distortion models a depth stream may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistortionModel {
    /// Rectified image, no distortion
    None,

    /// Brown-Conrady model inverted so it maps distorted pixels to undistorted rays. This is the
    /// only model that is corrected for.
    InverseBrownConrady,

    /// Brown-Conrady with the radial term also applied to the tangential terms
    ModifiedBrownConrady,

    /// Forward Brown-Conrady
    BrownConrady,

    /// Fisheye F-Theta
    FTheta,

    /// Kannala-Brandt fisheye
    KannalaBrandt4,
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectorError {
    #[error("Intrinsics describe an empty image ({0}x{1})")]
    EmptyImage(u32, u32),

    #[error("Focal length must be non-zero and finite (fx: {0}, fy: {1})")]
    InvalidFocalLength(f64, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Intrinsics {
    /// Intrinsics for an undistorted image.
    pub fn pinhole(width: u32, height: u32, ppx: f64, ppy: f64, fx: f64, fy: f64) -> Self {
        Self {
            width,
            height,
            ppx,
            ppy,
            fx,
            fy,
            model: DistortionModel::None,
            coeffs: [0.0; 5],
        }
    }

    /// Undistorted direction of the given pixel at unit depth.
    ///
    /// Models other than [`DistortionModel::InverseBrownConrady`] are treated as already
    /// rectified.
    pub fn pixel_direction(&self, px: f64, py: f64) -> [f64; 2] {
        let x = (px - self.ppx) / self.fx;
        let y = (py - self.ppy) / self.fy;

        match self.model {
            DistortionModel::InverseBrownConrady => {
                let [k1, k2, p1, p2, k3] = self.coeffs;

                let r2 = x * x + y * y;
                let f = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;

                [
                    x * f + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
                    y * f + 2.0 * p2 * x * y + p1 * (r2 + 2.0 * y * y),
                ]
            }
            _ => [x, y],
        }
    }
}

impl DepthProjector {
    /// Build the direction table for the given intrinsics.
    ///
    /// This visits every pixel in the image so should only be done when the intrinsics change.
    pub fn new(intrinsics: Intrinsics) -> Result<Self, ProjectorError> {
        if intrinsics.width == 0 || intrinsics.height == 0 {
            return Err(ProjectorError::EmptyImage(intrinsics.width, intrinsics.height));
        }
        let focal_ok = |f: f64| f.is_finite() && f != 0.0;
        if !focal_ok(intrinsics.fx) || !focal_ok(intrinsics.fy) {
            return Err(ProjectorError::InvalidFocalLength(intrinsics.fx, intrinsics.fy));
        }

        let mut dirs = Vec::with_capacity((intrinsics.width * intrinsics.height) as usize);

        for h in 0..intrinsics.height {
            for w in 0..intrinsics.width {
                dirs.push(intrinsics.pixel_direction(w as f64, h as f64));
            }
        }

        Ok(Self { intrinsics, dirs })
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Cached direction of the given pixel at unit depth, or `None` if the pixel is outside the
    /// image.
    #[inline]
    pub fn direction(&self, x: u32, y: u32) -> Option<[f64; 2]> {
        if x >= self.intrinsics.width || y >= self.intrinsics.height {
            return None;
        }

        Some(self.dirs[(y * self.intrinsics.width + x) as usize])
    }

    /// Project a depth at the given pixel into a camera frame point.
    ///
    /// The point's Z is the depth itself, X and Y scale linearly with it. Returns `None` if the
    /// pixel is outside the image.
    #[inline]
    pub fn lookup(&self, depth: f64, x: u32, y: u32) -> Option<Vector3<f64>> {
        self.direction(x, y)
            .map(|d| Vector3::new(d[0] * depth, d[1] * depth, depth))
    }
}

impl ProjectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the projector for the given intrinsics, building it if these differ from the cached
    /// ones.
    pub fn get(&mut self, intrinsics: &Intrinsics) -> Result<&DepthProjector, ProjectorError> {
        let projector = match self.projector.take() {
            Some(p) if p.intrinsics() == intrinsics => p,
            _ => {
                info!(
                    "Building depth projector for {}x{} ({:?})",
                    intrinsics.width, intrinsics.height, intrinsics.model
                );
                self.num_builds += 1;
                DepthProjector::new(*intrinsics)?
            }
        };

        Ok(self.projector.insert(projector))
    }

    /// Number of times the table has been built.
    pub fn num_builds(&self) -> usize {
        self.num_builds
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn distorted() -> Intrinsics {
        Intrinsics {
            model: DistortionModel::InverseBrownConrady,
            coeffs: [0.1, -0.05, 0.002, -0.001, 0.01],
            ..Intrinsics::pinhole(64, 48, 31.5, 23.5, 60.0, 61.0)
        }
    }

    #[test]
    fn test_principal_point_is_on_axis() {
        let intr = Intrinsics {
            coeffs: [0.0; 5],
            ..distorted()
        };
        let proj = DepthProjector::new(intr).unwrap();

        // Pixel (31, 23) is half a pixel off the principal point, so use pixel_direction
        assert_eq!(intr.pixel_direction(31.5, 23.5), [0.0, 0.0]);

        let p = proj.lookup(100.0, 0, 0).unwrap();
        assert!((p.x - 100.0 * (0.0 - 31.5) / 60.0).abs() < 1e-9);
        assert!((p.y - 100.0 * (0.0 - 23.5) / 61.0).abs() < 1e-9);
        assert_eq!(p.z, 100.0);
    }

    #[test]
    fn test_principal_pixel_exact() {
        let intr = Intrinsics::pinhole(10, 10, 4.0, 6.0, 5.0, 5.0);
        let proj = DepthProjector::new(intr).unwrap();

        assert_eq!(proj.direction(4, 6), Some([0.0, 0.0]));
        assert_eq!(proj.lookup(250.0, 4, 6), Some(Vector3::new(0.0, 0.0, 250.0)));
    }

    #[test]
    fn test_linear_in_depth() {
        let proj = DepthProjector::new(distorted()).unwrap();

        for &(x, y) in [(0, 0), (63, 47), (10, 40), (50, 3)].iter() {
            let a = proj.lookup(1.0, x, y).unwrap();
            let b = proj.lookup(37.5, x, y).unwrap();
            assert!((a * 37.5 - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_inverse_brown_conrady() {
        let intr = distorted();
        let proj = DepthProjector::new(intr).unwrap();

        // Hand-computed for pixel (0, 0)
        let x: f64 = (0.0 - 31.5) / 60.0;
        let y: f64 = (0.0 - 23.5) / 61.0;
        let r2 = x * x + y * y;
        let f = 1.0 + 0.1 * r2 - 0.05 * r2 * r2 + 0.01 * r2 * r2 * r2;
        let ux = x * f + 2.0 * 0.002 * x * y - 0.001 * (r2 + 2.0 * x * x);
        let uy = y * f + 2.0 * -0.001 * x * y + 0.002 * (r2 + 2.0 * y * y);

        let d = proj.direction(0, 0).unwrap();
        assert!((d[0] - ux).abs() < 1e-12);
        assert!((d[1] - uy).abs() < 1e-12);
    }

    #[test]
    fn test_unsupported_model_passes_through() {
        let intr = Intrinsics {
            model: DistortionModel::FTheta,
            ..distorted()
        };
        let d = intr.pixel_direction(0.0, 0.0);
        assert_eq!(d, [(0.0 - 31.5) / 60.0, (0.0 - 23.5) / 61.0]);
    }

    #[test]
    fn test_out_of_range() {
        let proj = DepthProjector::new(distorted()).unwrap();
        assert!(proj.lookup(1.0, 64, 0).is_none());
        assert!(proj.lookup(1.0, 0, 48).is_none());
    }

    #[test]
    fn test_invalid_intrinsics() {
        assert!(DepthProjector::new(Intrinsics::pinhole(0, 10, 0.0, 0.0, 1.0, 1.0)).is_err());
        assert!(DepthProjector::new(Intrinsics::pinhole(10, 10, 0.0, 0.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_cache_rebuilds_on_change() {
        let mut cache = ProjectorCache::new();
        let a = distorted();
        let b = Intrinsics::pinhole(32, 24, 15.5, 11.5, 30.0, 30.0);

        cache.get(&a).unwrap();
        cache.get(&a).unwrap();
        assert_eq!(cache.num_builds(), 1);

        assert_eq!(cache.get(&b).unwrap().intrinsics().width, 32);
        assert_eq!(cache.num_builds(), 2);

        cache.get(&a).unwrap();
        assert_eq!(cache.num_builds(), 3);
    }
}
