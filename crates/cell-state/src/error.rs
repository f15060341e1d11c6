//! Error types for decoding kernel messages and routing them to cells.
//!
//! These are protocol-level failures between kernel and frontend. A cell's
//! own run outcome (interrupted, errored, stopped) is never an error here; it
//! is recorded as flags on [`CellState`](crate::CellState).

use crate::status::RunStatus;

/// Error type for message decoding and cell routing failures.
#[derive(Debug, thiserror::Error)]
pub enum CellStateError {
    /// The kernel sent a status this frontend does not know about.
    #[error("Unknown run status {0:?} (kernel/frontend protocol mismatch)")]
    UnknownStatus(String),

    #[error("Message for status {status} is missing a timestamp")]
    MissingTimestamp { status: RunStatus },

    /// Error output arrived without the time the run stopped.
    #[error("Error output is missing a timestamp")]
    MissingErrorTimestamp,

    #[error("Invalid output payload: {0}")]
    InvalidOutput(String),

    #[error("No cell registered with id {0:?}")]
    UnknownCell(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for cell state operations.
pub type CellStateResult<T> = Result<T, CellStateError>;
