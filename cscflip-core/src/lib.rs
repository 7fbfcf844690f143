//! Shared primitives for the cscflip workspace.
//!
//! - **Error types**: [`FlipError`] and [`Result`] for structured error handling
//! - **Traits**: [`Summarizable`] for one-line reports of matrices and runs

pub mod error;
pub mod traits;

pub use error::{FlipError, Result};
pub use traits::*;
