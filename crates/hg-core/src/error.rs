use thiserror::Error;

pub type HgResult<T> = Result<T, HgError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HgError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Read before write: {what} (slot={slot}, step={step})")]
    Unwritten {
        what: &'static str,
        slot: usize,
        step: usize,
    },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}
