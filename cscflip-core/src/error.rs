//! Structured error types for the cscflip tools.

use thiserror::Error;

/// Unified error type for all cscflip operations.
#[derive(Debug, Error)]
pub enum FlipError {
    /// I/O error (file not found, permission denied, disk full, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required group or array is absent from the store.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Stored arrays violate the CSC invariants.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Failure reported by the array store backend.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An array was found with an unexpected element type.
    #[error("array '{name}' has dtype {found}, expected {expected}")]
    DtypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Convenience alias used throughout cscflip.
pub type Result<T> = std::result::Result<T, FlipError>;
