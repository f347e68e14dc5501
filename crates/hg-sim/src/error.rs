//! Error types for network simulation.

use hg_components::ComponentError;
use hg_core::{HgError, ObjectId};
use hg_graph::GraphError;
use thiserror::Error;

/// Fatal conditions of a simulation step.
///
/// Soft constraint breaches never show up here; they are recorded as signed
/// violation magnitudes on the entity instead.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Object {object} read {what} (slot={slot}) before it was written at step {step}")]
    NotYetWritten {
        object: ObjectId,
        what: &'static str,
        slot: usize,
        step: usize,
    },

    #[error(
        "Pressure mismatch on edge {edge} at step {step}: expected drop {expected} Pa, got {actual} Pa"
    )]
    PressureMismatch {
        edge: ObjectId,
        step: usize,
        expected: f64,
        actual: f64,
    },

    #[error("Edge {edge} ran out of plugs at step {step} ({missing} kg missing)")]
    PlugUnderflow {
        edge: ObjectId,
        step: usize,
        missing: f64,
    },

    #[error("Transfer {object}: secondary return {return_temp} °C is above the setpoint {setpoint} °C")]
    TransferReturnTooHot {
        object: ObjectId,
        return_temp: f64,
        setpoint: f64,
    },

    #[error(
        "Transfer {object}: secondary setpoint {setpoint} °C unreachable, at most {achievable} °C"
    )]
    TransferSetpointUnreachable {
        object: ObjectId,
        setpoint: f64,
        achievable: f64,
    },

    #[error("Object {object}: mass flow {actual} kg/s does not match {expected} kg/s at step {step}")]
    FlowMismatch {
        object: ObjectId,
        step: usize,
        expected: f64,
        actual: f64,
    },

    #[error("Object {object} is being updated and cannot be queried")]
    Busy { object: ObjectId },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown object {object}")]
    UnknownObject { object: ObjectId },

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Core(#[from] HgError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SimError {
    /// The queried value is not available yet in this step, either because
    /// it was never written or because its owner is mid-update.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SimError::NotYetWritten { .. }
                | SimError::Busy { .. }
                | SimError::Core(HgError::Unwritten { .. })
        )
    }
}

pub type SimResult<T> = Result<T, SimError>;
