//! hg-results: query result types and pipe state snapshot storage.

pub mod store;
pub mod types;

pub use store::SnapshotStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot not found: {name}")]
    SnapshotNotFound { name: String },

    #[error("Invalid snapshot name: {name}")]
    InvalidName { name: String },
}
