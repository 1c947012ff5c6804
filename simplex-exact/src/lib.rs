//! Exact LP solving via iterative refinement.
//!
//! Wraps the `simplex-core` kernel in an outer loop that measures primal
//! and dual violations in exact rational arithmetic, re-solves scaled
//! residual problems at machine precision, and certifies the final
//! verdict: optimality (through reconstruction or an exact basis
//! factorization), infeasibility (through the feasibility test LP and a
//! Farkas certificate), or unboundedness (through the primal ray LP).
//!
//! # Example
//!
//! ```
//! use simplex_core::linalg::SparseVec;
//! use simplex_core::problem::LpProblem;
//! use simplex_core::settings::{KernelSettings, Sense};
//! use simplex_exact::{ExactSolver, ExactStatus, RefineSettings};
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
//! let mut solver =
//!     ExactSolver::new(lp, KernelSettings::default(), RefineSettings::default()).unwrap();
//! let status = solver.solve().unwrap();
//! assert_eq!(status, ExactStatus::Optimal);
//! assert_eq!(solver.objective_value().to_string(), "1");
//! ```

#![warn(clippy::all)]

pub mod certify;
pub mod error;
pub mod factor;
pub mod rational;
pub mod reconstruct;
pub mod recover;
pub mod refine;
pub mod settings;

use log::{info, warn};
use num_rational::BigRational;

pub use error::{RefineError, RefineResult};
pub use rational::{RationalLp, SolRational};
pub use refine::Refinement;
pub use settings::RefineSettings;

use certify::FeasOutcome;
use simplex_core::problem::LpProblem;
use simplex_core::settings::KernelSettings;

/// Verdict of the exact solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExactStatus {
    Unknown,
    Optimal,
    Infeasible,
    Unbounded,
    AbortTime,
    AbortIter,
    AbortValue,
    Error,
}

impl std::fmt::Display for ExactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExactStatus::Unknown => "unknown",
            ExactStatus::Optimal => "optimal",
            ExactStatus::Infeasible => "infeasible",
            ExactStatus::Unbounded => "unbounded",
            ExactStatus::AbortTime => "aborted (time)",
            ExactStatus::AbortIter => "aborted (iterations)",
            ExactStatus::AbortValue => "aborted (objective)",
            ExactStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Exact LP solver: refinement loop plus certification.
pub struct ExactSolver {
    refinement: Refinement,
}

impl ExactSolver {
    pub fn new(
        lp: LpProblem,
        kernel_settings: KernelSettings,
        settings: RefineSettings,
    ) -> RefineResult<Self> {
        Ok(Self {
            refinement: Refinement::new(lp, kernel_settings, settings)?,
        })
    }

    /// Solve to an exactly certified verdict.
    pub fn solve(&mut self) -> RefineResult<ExactStatus> {
        let r = &mut self.refinement;

        let lifted = if r.settings.lifting {
            Some(certify::lift(r)?)
        } else {
            None
        };
        let eq_transformed = if r.settings.equality_transform {
            Some(certify::transform_equality(r)?)
        } else {
            None
        };

        let mut unboundedness_not_certified = false;
        let mut infeasibility_not_certified = false;

        let result = loop {
            let status = r.perform_opt_ir()?;
            match status {
                ExactStatus::Optimal => break ExactStatus::Optimal,
                ExactStatus::Unbounded => {
                    if unboundedness_not_certified {
                        warn!("repeated uncertifiable unboundedness verdict");
                        break ExactStatus::Error;
                    }
                    let (certified, verdict) = certify::test_unboundedness(r)?;
                    if certified {
                        break ExactStatus::Unbounded;
                    }
                    match verdict {
                        ExactStatus::Unknown => {
                            info!("unboundedness rejected, continuing refinement");
                            unboundedness_not_certified = true;
                        }
                        other => break other,
                    }
                }
                ExactStatus::Infeasible => {
                    if infeasibility_not_certified {
                        warn!("repeated uncertifiable infeasibility verdict");
                        break ExactStatus::Error;
                    }
                    match certify::test_feasibility(r)? {
                        FeasOutcome::Infeasible => break ExactStatus::Infeasible,
                        FeasOutcome::Feasible => {
                            info!("infeasibility rejected, continuing refinement");
                            infeasibility_not_certified = true;
                        }
                        FeasOutcome::Aborted(st) => break st,
                    }
                }
                other => break other,
            }
        };

        if let Some(t) = eq_transformed {
            certify::untransform_equality(r, t)?;
        }
        if let Some(t) = lifted {
            certify::project(r, t)?;
        }

        r.status = result;
        Ok(result)
    }

    pub fn status(&self) -> ExactStatus {
        self.refinement.status()
    }

    /// Exact objective value in the caller's sense.
    pub fn objective_value(&self) -> BigRational {
        self.refinement.objective_value()
    }

    /// Exact primal solution.
    pub fn primal(&self) -> &[BigRational] {
        &self.refinement.solution().primal
    }

    /// Exact row activities.
    pub fn slacks(&self) -> &[BigRational] {
        &self.refinement.solution().slacks
    }

    /// Exact dual solution (internal maximization sign).
    pub fn dual(&self) -> &[BigRational] {
        &self.refinement.solution().dual
    }

    /// Exact reduced costs (internal maximization sign).
    pub fn reduced_cost(&self) -> &[BigRational] {
        &self.refinement.solution().redcost
    }

    /// Exact primal ray, when unboundedness was certified.
    pub fn primal_ray(&self) -> Option<&[BigRational]> {
        self.refinement.solution().primal_ray.as_deref()
    }

    /// Exact Farkas certificate, when infeasibility was certified.
    pub fn dual_farkas(&self) -> Option<&[BigRational]> {
        self.refinement.solution().dual_farkas.as_deref()
    }

    /// Number of refinement rounds performed.
    pub fn refinements(&self) -> usize {
        self.refinement.refinements
    }

    /// Access to the underlying kernel (interrupt flag, statistics).
    pub fn kernel_mut(&mut self) -> &mut simplex_core::Kernel {
        &mut self.refinement.kernel
    }
}
