//! Small numeric helpers shared by the executables

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Linearly map `value` from the `from` range onto the `to` range. Values outside `from` are
/// extrapolated.
pub fn lin_map<T: Float>(from: (T, T), to: (T, T), value: T) -> T {
    let frac = (value - from.0) / (from.1 - from.0);
    to.0 + frac * (to.1 - to.0)
}

/// Limit `value` to `[min, max]`.
pub fn clamp<T: PartialOrd + Copy>(value: &T, min: &T, max: &T) -> T {
    match value {
        v if v < min => *min,
        v if v > max => *max,
        v => *v,
    }
}

/// Signed shortest rotation taking heading `a` onto heading `b`, in degrees, within `(-180, 180]`.
pub fn get_ang_dist_deg<T: Float + FloatConst>(a: T, b: T) -> T {
    // 180 and 360 built from pi so no fallible cast is needed
    let half_turn = T::PI().to_degrees();
    let full_turn = half_turn + half_turn;

    let mut d = (b - a) % full_turn;
    if d < T::zero() {
        d = d + full_turn;
    }

    if d > half_turn {
        d - full_turn
    } else {
        d
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ang_dist() {
        let close = |a: f64, b: f64, expected: f64| {
            let d = get_ang_dist_deg(a, b);
            assert!((d - expected).abs() < 1e-9, "{} -> {}: {}", a, b, d);
        };

        close(10.0, 20.0, 10.0);
        close(20.0, 10.0, -10.0);
        close(350.0, 10.0, 20.0);
        close(10.0, 350.0, -20.0);
        close(179.0, -179.0, 2.0);
        close(-90.0, 90.0, 180.0);
        close(90.0, -90.0, 180.0);
        close(-720.0, 30.0, 30.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&-3i32, &0, &250), 0);
        assert_eq!(clamp(&300i32, &0, &250), 250);
        assert_eq!(clamp(&12.5f64, &0.0, &250.0), 12.5);
    }

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 10f64), (0f64, 100f64), 2.5), 25.0);
        assert_eq!(lin_map((0f64, 1f64), (40f64, 240f64), 0.5), 140.0);
    }
}
