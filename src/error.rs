//! Error types shared by the correlation store, the persistence codec and the
//! kNN predictor.

use thiserror::Error;

/// Errors raised by corrspace operations.
///
/// `predict` never surfaces any of these: entities outside the known range
/// degrade to the baseline estimate instead.
#[derive(Debug, Error)]
pub enum CorrError {
    /// The requested matrix dimension cannot be represented or allocated.
    #[error("capacity error: cannot allocate a {requested}x{requested} correlation matrix")]
    Capacity { requested: usize },

    /// Direct cell access outside the current dimension.
    #[error("index out of range: ({i}, {j}) for a {dim}x{dim} correlation matrix")]
    IndexOutOfRange { i: usize, j: usize, dim: usize },

    /// Malformed persisted correlation matrix.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Invalid parameter, rejected before any computation.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// I/O failure while reading or writing a matrix.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CorrError>;

impl CorrError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        CorrError::Parse {
            line,
            message: message.into(),
        }
    }
}
