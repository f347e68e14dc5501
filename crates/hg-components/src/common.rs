//! Common utilities for component calculations.

use crate::error::{ComponentError, ComponentResult};
use hg_core::numeric::ensure_finite;

/// Ensure a value is finite, returning ComponentError if not.
pub fn check_finite(value: f64, what: &'static str) -> ComponentResult<f64> {
    ensure_finite(value, what).map_err(|_| ComponentError::NonPhysical { what })
}

/// Ensure a parameter is strictly positive.
pub fn check_positive(value: f64, what: &'static str) -> ComponentResult<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ComponentError::InvalidArg { what })
    }
}

/// Fold `x` into `[0, bound]` by reflecting at both ends.
pub fn reflect_into(x: f64, bound: f64) -> f64 {
    ((x + bound).rem_euclid(2.0 * bound) - bound).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_into() {
        assert_eq!(reflect_into(1.0, 2.0), 1.0);
        assert_eq!(reflect_into(-0.5, 2.0), 0.5);
        assert!((reflect_into(2.5, 2.0) - 1.5).abs() < 1e-12);
        assert!((reflect_into(5.0, 2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_check_finite() {
        assert!(check_finite(1.0, "test").is_ok());
        assert!(check_finite(f64::INFINITY, "test").is_err());
        assert!(check_finite(f64::NAN, "test").is_err());
    }

    #[test]
    fn test_check_positive() {
        assert!(check_positive(0.3, "diameter").is_ok());
        assert!(check_positive(0.0, "diameter").is_err());
        assert!(check_positive(f64::NAN, "diameter").is_err());
    }
}
