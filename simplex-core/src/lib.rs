//! Revised simplex kernel.
//!
//! This crate implements the floating-point half of the solver stack:
//!
//! - **Semi-sparse vectors** ([`linalg::SsVec`]): dense storage with an
//!   optional nonzero index list driving the inner-loop arithmetic.
//! - **Sparse LU factorization** ([`linalg::FactorLu`]): Markowitz-style
//!   threshold pivoting with eta and Forrest-Tomlin update forms and a
//!   stability metric gating refactorization.
//! - **Basis descriptor** ([`basis::Basis`]): per-row/per-column statuses
//!   whose sign encodes basic membership under the active representation.
//! - **Simplex loop** ([`kernel::Kernel`]): entering and leaving variants
//!   over row and column representations, with bound shifting for
//!   anti-cycling and numerical stabilization.
//! - **Pricers and ratio testers** ([`pricing`], [`ratio`]): Dantzig,
//!   Devex, steepest edge, and static weight pricing; textbook and
//!   Harris two-phase ratio tests.
//!
//! The exact-arithmetic refinement loop lives in the `simplex-exact`
//! crate and drives this kernel as a black box.
//!
//! # Example
//!
//! ```
//! use simplex_core::linalg::SparseVec;
//! use simplex_core::problem::LpProblem;
//! use simplex_core::kernel::{Kernel, SolverStatus};
//! use simplex_core::settings::{KernelSettings, Sense};
//!
//! // max x0 + x1  s.t.  x0 + x1 <= 1, x >= 0
//! let mut lp = LpProblem::new(Sense::Maximize);
//! lp.add_col(&SparseVec::new(), 1.0, 0.0, f64::INFINITY).unwrap();
//! lp.add_col(&SparseVec::new(), 1.0, 0.0, f64::INFINITY).unwrap();
//! lp.add_row(
//!     &SparseVec::from_pairs(&[(0, 1.0), (1, 1.0)]),
//!     f64::NEG_INFINITY,
//!     1.0,
//! )
//! .unwrap();
//!
//! let mut kernel = Kernel::new(lp, KernelSettings::default());
//! let status = kernel.solve().unwrap();
//! assert_eq!(status, SolverStatus::Optimal);
//! assert!((kernel.value() - 1.0).abs() < 1e-6);
//! ```

#![warn(clippy::all)]

pub mod basis;
pub mod error;
pub mod kernel;
pub mod linalg;
pub mod pricing;
pub mod problem;
pub mod ratio;
pub mod settings;

pub use basis::{Basis, Desc, Id, Status, VarStatusTag};
pub use error::{KernelError, KernelResult};
pub use kernel::{Kernel, SolverStatus};
pub use problem::{LpProblem, RangeType, RowRange};
pub use settings::{
    AlgoType, KernelSettings, PricerKind, PricingMode, RatioKind, Representation, Sense,
    UpdateMode,
};
