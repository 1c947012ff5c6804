//! Error types for the simplex kernel.

use thiserror::Error;

/// Errors that can occur while building or solving a problem.
#[derive(Error, Debug)]
pub enum KernelError {
    /// Problem data is inconsistent (dimension mismatch, empty LP, ...)
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// An index passed to a mutation or query is out of range
    #[error("Index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        /// Offending index
        index: usize,
        /// Exclusive upper limit
        limit: usize,
    },

    /// The basis matrix is singular and could not be repaired
    #[error("Singular basis matrix")]
    SingularBasis,

    /// A basis descriptor does not have exactly `dim` basic entries
    #[error("Invalid basis: {0}")]
    InvalidBasis(String),

    /// Numerical trouble that exhausted the local recovery budget
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
