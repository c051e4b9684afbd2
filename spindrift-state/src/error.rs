//! Error types for the sparse-state engine

use crate::spin_key::SpinKey;
use thiserror::Error;

/// Errors that can occur in state-table operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    /// Soft cap below the supported minimum
    #[error("soft cap must be at least 2, got {0}")]
    SoftCapTooSmall(usize),

    /// Shard count is not a power of two within the routable range
    #[error("shard count must be a power of two between 1 and 256, got {0}")]
    InvalidShardCount(usize),

    /// Hard cap below the soft cap
    #[error("hard cap {hard} must be at least the soft cap {soft}")]
    HardCapBelowSoft { hard: usize, soft: usize },

    /// Basis configuration inserted twice
    #[error("duplicate basis configuration {0}")]
    DuplicateKey(SpinKey),

    /// State has zero norm and cannot be renormalised
    #[error("cannot normalise: state norm is zero")]
    ZeroNorm,

    /// Weighted resampling over an all-zero distribution
    #[error("cannot resample: all truncation weights are zero")]
    ZeroWeights,
}

/// Result type for state-table operations
pub type Result<T> = std::result::Result<T, StateError>;
