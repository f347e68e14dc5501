//! Combined heat and power helpers: feasible operating region and ramp checks.

use crate::error::{ComponentError, ComponentResult};

/// Convex feasible region of a CHP unit in the (heat, electricity) plane.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRegion {
    /// Vertices ordered clockwise around their centroid.
    points: Vec<[f64; 2]>,
}

impl OperationRegion {
    /// Builds the region from its key points in any order.
    pub fn new(points: Vec<[f64; 2]>) -> ComponentResult<Self> {
        if points.len() < 3 {
            return Err(ComponentError::InvalidArg {
                what: "operation region needs at least three points",
            });
        }
        if points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ComponentError::NonPhysical {
                what: "operation region point",
            });
        }

        let n = points.len() as f64;
        let cx = points.iter().map(|p| p[0]).sum::<f64>() / n;
        let cy = points.iter().map(|p| p[1]).sum::<f64>() / n;

        // Angle clockwise from the +y axis, then distance.
        let key = |p: &[f64; 2]| {
            let (dx, dy) = (p[0] - cx, p[1] - cy);
            let len = dx.hypot(dy);
            if len == 0.0 {
                return (-std::f64::consts::PI, 0.0);
            }
            let angle = (dx / len).atan2(dy / len);
            let angle = if angle < 0.0 {
                angle + 2.0 * std::f64::consts::PI
            } else {
                angle
            };
            (angle, len)
        };

        let mut points = points;
        points.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal));
        Ok(Self { points })
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Largest heat output over the region.
    pub fn max_heat(&self) -> f64 {
        self.points.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Largest electricity output over the region.
    pub fn max_power(&self) -> f64 {
        self.points.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Boundary points count as inside.
    pub fn contains(&self, heat: f64, power: f64) -> bool {
        let n = self.points.len();
        (0..n).all(|i| {
            let a = self.points[(i + n - 1) % n];
            let b = self.points[i];
            (heat - a[0]) * (b[1] - a[1]) - (power - a[1]) * (b[0] - a[0]) >= 0.0
        })
    }
}

/// Amount by which the change from `previous` to `x` exceeds `limit`.
///
/// The change is taken relative to `range` (use 1.0 for an absolute limit).
/// Zero when there is no previous value, when the limit or the previous
/// value is not positive, or when the change is within the limit.
pub fn ramp_excess(x: f64, previous: Option<f64>, limit: f64, range: f64) -> f64 {
    let Some(px) = previous else {
        return 0.0;
    };
    let change = (x - px).abs() / range;
    if limit > 0.0 && px > 0.0 && change > limit {
        change - limit
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> OperationRegion {
        OperationRegion::new(vec![[0.0, 10.0], [10.0, 5.0], [0.0, 50.0], [70.0, 35.0]]).unwrap()
    }

    #[test]
    fn inside_and_outside() {
        let r = region();
        assert!(r.contains(10.0, 10.0));
        assert!(!r.contains(10.0, 4.0));
        assert!(!r.contains(80.0, 20.0));
        // Vertex
        assert!(r.contains(0.0, 50.0));
    }

    #[test]
    fn sorted_clockwise() {
        let r = region();
        assert_eq!(r.points()[0], [70.0, 35.0]);
        assert_eq!(r.points()[3], [0.0, 50.0]);
        assert_eq!(r.max_heat(), 70.0);
        assert_eq!(r.max_power(), 50.0);
    }

    #[test]
    fn degenerate_region_rejected() {
        assert!(OperationRegion::new(vec![[0.0, 0.0], [1.0, 1.0]]).is_err());
        assert!(OperationRegion::new(vec![[0.0, 0.0], [1.0, f64::NAN], [2.0, 0.0]]).is_err());
    }

    #[test]
    fn ramp_excess_cases() {
        assert_eq!(ramp_excess(50.0, None, 0.1, 100.0), 0.0);
        assert_eq!(ramp_excess(50.0, Some(45.0), 0.1, 100.0), 0.0);
        assert!((ramp_excess(70.0, Some(50.0), 0.1, 100.0) - 0.1).abs() < 1e-12);
        // Disabled limit
        assert_eq!(ramp_excess(70.0, Some(50.0), 0.0, 100.0), 0.0);
        // Absolute limit in degrees
        assert!((ramp_excess(95.0, Some(90.0), 2.0, 1.0) - 3.0).abs() < 1e-12);
        // Unit was off
        assert_eq!(ramp_excess(50.0, Some(0.0), 0.1, 100.0), 0.0);
    }
}
