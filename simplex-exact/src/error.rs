//! Error types for the refinement layer.

use thiserror::Error;

/// Errors surfaced by the exact solver.
#[derive(Error, Debug)]
pub enum RefineError {
    /// The underlying kernel rejected the problem or failed terminally
    #[error("Kernel error: {0}")]
    Kernel(#[from] simplex_core::KernelError),

    /// Problem data cannot be represented exactly (NaN coefficients)
    #[error("Invalid problem data: {0}")]
    InvalidData(String),

    /// The rational basis factorization met a singular matrix
    #[error("Rational factorization failed: singular basis")]
    SingularRationalBasis,

    /// The recovery ladder ran out of options
    #[error("Numerical recovery exhausted: {0}")]
    RecoveryExhausted(String),
}

/// Result type for refinement operations.
pub type RefineResult<T> = Result<T, RefineError>;
