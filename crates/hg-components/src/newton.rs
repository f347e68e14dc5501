//! Scalar Newton-Raphson with a projection hook.

use crate::error::{ComponentError, ComponentResult};

/// Newton solver configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Converged once two successive iterates are closer than this
    pub step_tol: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            step_tol: 1e-6,
        }
    }
}

/// Newton iteration result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NewtonResult {
    pub root: f64,
    /// Number of iterations
    pub iterations: usize,
}

/// Find a root of `residual_fn` starting from `x0`.
///
/// After each raw Newton step `project(x, candidate)` maps the candidate
/// back into the admissible domain. A zero residual or a zero derivative
/// stops the iteration at the current point.
pub fn newton_solve<F, D, P>(
    x0: f64,
    residual_fn: F,
    derivative_fn: D,
    project: P,
    config: &NewtonConfig,
) -> ComponentResult<NewtonResult>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
    P: Fn(f64, f64) -> f64,
{
    let mut x = x0;

    for iter in 0..config.max_iterations {
        let r = residual_fn(x);
        if !r.is_finite() {
            return Err(ComponentError::ConvergenceFailed {
                what: "non-finite Newton residual",
            });
        }
        if r == 0.0 {
            return Ok(NewtonResult {
                root: x,
                iterations: iter,
            });
        }

        let d = derivative_fn(x);
        if d == 0.0 {
            return Ok(NewtonResult {
                root: x,
                iterations: iter,
            });
        }

        let next = project(x, x - r / d);
        if !next.is_finite() {
            return Err(ComponentError::ConvergenceFailed {
                what: "non-finite Newton iterate",
            });
        }
        if (next - x).abs() < config.step_tol {
            return Ok(NewtonResult {
                root: next,
                iterations: iter + 1,
            });
        }
        x = next;
    }

    Err(ComponentError::ConvergenceFailed {
        what: "Newton iteration limit reached",
    })
}
