//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Limit a value to the range `[min, max]`.
///
/// NaN values are passed through unchanged.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// The sign of a value as `1` or `-1`. Zero is treated as positive.
pub fn polarity<T>(value: T) -> T
where
    T: Float,
{
    if value < T::zero() {
        -T::one()
    } else {
        T::one()
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// `num_traits::Float` has no equivalent of the std `rem_euclid`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle in radians into the range `[-pi, pi)`.
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float + FloatConst,
{
    let pi = T::PI();

    rem_euclid(angle + pi, pi + pi) - pi
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_clamp_and_polarity() {
        assert_eq!(clamp(80.0, -65.0, 65.0), 65.0);
        assert_eq!(clamp(-80.0, -65.0, 65.0), -65.0);
        assert_eq!(clamp(12.5, -65.0, 65.0), 12.5);

        assert_eq!(polarity(-0.1f64), -1.0);
        assert_eq!(polarity(0.0f64), 1.0);
        assert_eq!(polarity(3.0f32), 1.0);
    }

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0.0, 10.0), (0.0, 100.0), 2.5), 25.0);
        assert_eq!(lin_map((10.0, 100.0), (0.0, 1.0), 55.0), 0.5);
    }

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_pi(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert!((wrap_pi(0.25) - 0.25).abs() < 1e-12);
        assert_eq!(rem_euclid(-1.0, 4.0), 3.0);
    }
}
