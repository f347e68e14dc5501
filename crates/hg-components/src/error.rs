//! Error types for component operations.

use hg_core::error::HgError;
use thiserror::Error;

/// Errors that can occur during component calculations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Hardware limit exceeded: {what} ({value} > {limit})")]
    HardwareLimit {
        what: &'static str,
        value: f64,
        limit: f64,
    },
}

pub type ComponentResult<T> = Result<T, ComponentError>;

impl From<ComponentError> for HgError {
    fn from(e: ComponentError) -> Self {
        match e {
            ComponentError::NonPhysical { what } => HgError::InvalidArg { what },
            ComponentError::ConvergenceFailed { what } => HgError::InvalidArg { what },
            ComponentError::InvalidArg { what } => HgError::InvalidArg { what },
            ComponentError::HardwareLimit { what, .. } => HgError::Invariant { what },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ComponentError::HardwareLimit {
            what: "primary mass flow",
            value: 301.0,
            limit: 300.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("primary mass flow"));
        assert!(msg.contains("301"));
    }

    #[test]
    fn error_conversion() {
        let comp_err = ComponentError::InvalidArg { what: "test" };
        let hg_err: HgError = comp_err.into();
        assert!(matches!(hg_err, HgError::InvalidArg { .. }));
    }
}
