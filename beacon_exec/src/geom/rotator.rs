//! # Coordinate rotator

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Rotates 2D coordinates by a fixed angle, following the right hand rule.
///
/// The sine and cosine are computed once at construction.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CoordRotator {
    /// Rotation angle.
    ///
    /// Units: radians
    pub angle_rad: f64,

    c: f64,
    s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CoordRotator {
    /// Create a rotator for the given angle in degrees.
    pub fn new(angle_deg: f64) -> Self {
        let angle_rad = angle_deg.to_radians();
        Self {
            angle_rad,
            c: angle_rad.cos(),
            s: angle_rad.sin(),
        }
    }

    /// Rotate the vector `(x, y)`, returning the rotated vector.
    #[inline]
    pub fn rotate(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.c - y * self.s, x * self.s + y * self.c)
    }
}

impl Default for CoordRotator {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn test_quarter_turn() {
        let (x, y) = CoordRotator::new(90.0).rotate(1.0, 0.0);
        assert!(x.abs() < TOL);
        assert!((y - 1.0).abs() < TOL);

        let (x, y) = CoordRotator::new(-90.0).rotate(1.0, 0.0);
        assert!(x.abs() < TOL);
        assert!((y + 1.0).abs() < TOL);
    }

    #[test]
    fn test_composition() {
        let vectors = [(1.0, 0.0), (0.3, -2.0), (-15.0, 7.5)];
        let angles = [(10.0, 20.0), (-73.0, 250.0), (179.0, 181.0), (0.0, -45.0)];

        for &(x, y) in vectors.iter() {
            for &(a, b) in angles.iter() {
                let (x1, y1) = CoordRotator::new(a).rotate(x, y);
                let (x2, y2) = CoordRotator::new(b).rotate(x1, y1);
                let (x3, y3) = CoordRotator::new(a + b).rotate(x, y);

                assert!((x2 - x3).abs() < TOL, "x mismatch for {:?} by {}+{}", (x, y), a, b);
                assert!((y2 - y3).abs() < TOL, "y mismatch for {:?} by {}+{}", (x, y), a, b);
            }
        }
    }
}
