//! Error types for the simulation layer

use spindrift_state::StateError;
use thiserror::Error;

/// Errors that can occur while reading inputs or running the iteration
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed line in a state or Hamiltonian file
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The outer loop needs at least one iteration
    #[error("number of iterations must be positive")]
    NoIterations,

    /// Error from the sparse-state engine
    #[error(transparent)]
    State(#[from] StateError),

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;
