//! The iterative refinement loop.
//!
//! Drives the machine kernel repeatedly under exact scaling: measure the
//! primal and dual violations of the current rational candidate in exact
//! arithmetic, scale the residual problem so the machine solver sees it
//! at full precision, and fold the machine correction back into the
//! rational candidate. Rational reconstruction and the exact basis
//! factorization provide early exits with certified optimality.

use log::{debug, info, warn};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use simplex_core::basis::{Id, VarStatusTag};
use simplex_core::kernel::{Kernel, SolverStatus};
use simplex_core::problem::LpProblem;
use simplex_core::settings::KernelSettings;

use crate::error::RefineResult;
use crate::factor::RationalLu;
use crate::rational::{
    f64_from_rational, pow2_round, rational_from_f64, OptRational, RationalLp, SolRational,
};
use crate::reconstruct::reconstruct_vector;
use crate::recover::solve_real_stable;
use crate::settings::RefineSettings;
use crate::ExactStatus;

/// Per-round scale growth ceiling.
const MAX_SCALE_INCR_LOG2: u64 = 50;

/// Exact refinement driver around a machine kernel.
pub struct Refinement {
    pub(crate) kernel: Kernel,
    pub(crate) rational: RationalLp,
    pub(crate) settings: RefineSettings,
    pub(crate) sol: SolRational,
    pub(crate) status: ExactStatus,
    /// Total refinement rounds across all sub-problems.
    pub(crate) refinements: usize,
}

/// Exact violation measurements of one round.
#[derive(Debug, Clone)]
pub(crate) struct Violations {
    pub bounds: BigRational,
    pub sides: BigRational,
    pub redcost: BigRational,
    pub dual: BigRational,
}

impl Violations {
    pub fn max(&self) -> BigRational {
        let mut v = self.bounds.clone();
        for w in [&self.sides, &self.redcost, &self.dual] {
            if *w > v {
                v = w.clone();
            }
        }
        v
    }
}

impl Refinement {
    pub fn new(
        lp: LpProblem,
        kernel_settings: KernelSettings,
        settings: RefineSettings,
    ) -> RefineResult<Self> {
        let rational = RationalLp::from_problem(&lp)?;
        let m = lp.num_rows();
        let n = lp.num_cols();
        let kernel = Kernel::new(lp, kernel_settings);
        Ok(Self {
            kernel,
            rational,
            settings,
            sol: SolRational::zeros(m, n),
            status: ExactStatus::Unknown,
            refinements: 0,
        })
    }

    pub fn status(&self) -> ExactStatus {
        self.status
    }

    pub fn solution(&self) -> &SolRational {
        &self.sol
    }

    pub fn rational_lp(&self) -> &RationalLp {
        &self.rational
    }

    /// Exact objective value of the current candidate, in the caller's
    /// sense.
    pub fn objective_value(&self) -> BigRational {
        let v = self.rational.objective(&self.sol.primal);
        match self.rational.sense {
            simplex_core::settings::Sense::Maximize => v,
            simplex_core::settings::Sense::Minimize => -v,
        }
    }

    // ------------------------------------------------------------------
    // Kernel synchronization.

    /// Push the exact problem data (values, not shape) into the kernel.
    pub(crate) fn sync_kernel_from_rational(&mut self) -> RefineResult<()> {
        for j in 0..self.rational.num_cols() {
            let lo = bound_f64(&self.rational.lower[j], true);
            let up = bound_f64(&self.rational.upper[j], false);
            self.kernel.change_bounds(j, lo, up)?;
            let c = f64_from_rational(&self.rational.obj[j]);
            self.kernel.change_max_obj(j, c)?;
        }
        for i in 0..self.rational.num_rows() {
            let lhs = bound_f64(&self.rational.lhs[i], true);
            let rhs = bound_f64(&self.rational.rhs[i], false);
            self.kernel.change_sides(i, lhs, rhs)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Candidate bookkeeping.

    /// Install the machine solution as the rational candidate, forcing
    /// nonbasic primals exactly onto their bounds.
    fn adopt_machine_solution(&mut self) -> RefineResult<()> {
        let m = self.rational.num_rows();
        let n = self.rational.num_cols();
        self.sol = SolRational::zeros(m, n);

        let mut x = vec![0.0; n];
        self.kernel.get_primal(&mut x);
        let mut y = vec![0.0; m];
        self.kernel.get_dual_internal(&mut y);

        let (_, col_tags) = self.kernel.get_basis();
        for j in 0..n {
            self.sol.primal[j] = self.forced_primal(j, col_tags[j], x[j])?;
        }
        for i in 0..m {
            self.sol.dual[i] = rational_from_f64(y[i])?;
        }
        self.recompute_slacks();
        self.recompute_redcost();
        Ok(())
    }

    /// Exact primal value of a column under its basis tag.
    fn forced_primal(
        &self,
        j: usize,
        tag: VarStatusTag,
        machine: f64,
    ) -> RefineResult<BigRational> {
        Ok(match tag {
            VarStatusTag::OnLower | VarStatusTag::Fixed => match &self.rational.lower[j] {
                Some(lo) => lo.clone(),
                None => rational_from_f64(machine)?,
            },
            VarStatusTag::OnUpper => match &self.rational.upper[j] {
                Some(up) => up.clone(),
                None => rational_from_f64(machine)?,
            },
            VarStatusTag::Zero => BigRational::zero(),
            VarStatusTag::Basic => rational_from_f64(machine)?,
        })
    }

    fn recompute_slacks(&mut self) {
        for i in 0..self.rational.num_rows() {
            self.sol.slacks[i] = self.rational.activity(i, &self.sol.primal);
        }
    }

    fn recompute_redcost(&mut self) {
        for j in 0..self.rational.num_cols() {
            self.sol.redcost[j] = self.rational.reduced_cost(j, &self.sol.dual);
        }
    }

    // ------------------------------------------------------------------
    // Exact violation measurement.

    pub(crate) fn compute_violations(&self) -> Violations {
        let zero = BigRational::zero();
        let mut bounds = zero.clone();
        let mut sides = zero.clone();
        let mut redcost = zero.clone();
        let mut dual = zero.clone();

        let (row_tags, col_tags) = self.kernel.get_basis();

        for j in 0..self.rational.num_cols() {
            let x = &self.sol.primal[j];
            if let Some(lo) = &self.rational.lower[j] {
                let v = lo - x;
                if v > bounds {
                    bounds = v;
                }
            }
            if let Some(up) = &self.rational.upper[j] {
                let v = x - up;
                if v > bounds {
                    bounds = v;
                }
            }

            // Reduced cost sign per basis status (maximization form).
            let d = &self.sol.redcost[j];
            let v = match col_tags[j] {
                VarStatusTag::OnLower => d.clone(),
                VarStatusTag::OnUpper => -d.clone(),
                VarStatusTag::Fixed => zero.clone(),
                VarStatusTag::Zero | VarStatusTag::Basic => d.abs(),
            };
            if v > redcost {
                redcost = v;
            }
        }

        for i in 0..self.rational.num_rows() {
            let a = &self.sol.slacks[i];
            if let Some(lhs) = &self.rational.lhs[i] {
                let v = lhs - a;
                if v > sides {
                    sides = v;
                }
            }
            if let Some(rhs) = &self.rational.rhs[i] {
                let v = a - rhs;
                if v > sides {
                    sides = v;
                }
            }

            // Dual sign per row status: an active right-hand side needs a
            // nonnegative multiplier.
            let y = &self.sol.dual[i];
            let v = match row_tags[i] {
                VarStatusTag::OnLower => -y.clone(),
                VarStatusTag::OnUpper => y.clone(),
                VarStatusTag::Fixed => zero.clone(),
                VarStatusTag::Zero | VarStatusTag::Basic => y.abs(),
            };
            if v > dual {
                dual = v;
            }
        }

        Violations { bounds, sides, redcost, dual }
    }

    // ------------------------------------------------------------------
    // The refinement loop proper.

    /// Refine towards exact optimality on the current problem.
    ///
    /// Returns `Optimal` with the candidate solution installed, a
    /// machine-level `Infeasible`/`Unbounded` verdict for the caller to
    /// certify, or an abort status.
    pub(crate) fn perform_opt_ir(&mut self) -> RefineResult<ExactStatus> {
        self.sync_kernel_from_rational()?;
        let status = solve_real_stable(&mut self.kernel)?;
        match status {
            SolverStatus::Optimal => {}
            SolverStatus::Infeasible => {
                self.capture_machine_farkas()?;
                return Ok(ExactStatus::Infeasible);
            }
            SolverStatus::Unbounded => {
                self.capture_machine_ray()?;
                return Ok(ExactStatus::Unbounded);
            }
            other => return Ok(map_abort(other)),
        }
        self.adopt_machine_solution()?;

        let one = BigRational::one();
        let mut primal_scale = one.clone();
        let mut dual_scale;
        let mut best_violation: Option<BigRational> = None;
        let mut failed_refinements = 0usize;

        for round in 0..self.settings.max_refinements {
            let viol = self.compute_violations();
            let primal_ok = &viol.bounds + &viol.sides <= self.settings.feastol;
            let dual_ok = &viol.redcost + &viol.dual <= self.settings.opttol;
            debug!(
                "refinement round {round}: bounds {:.3e} sides {:.3e} redcost {:.3e} dual {:.3e}",
                viol.bounds.to_f64().unwrap_or(f64::NAN),
                viol.sides.to_f64().unwrap_or(f64::NAN),
                viol.redcost.to_f64().unwrap_or(f64::NAN),
                viol.dual.to_f64().unwrap_or(f64::NAN),
            );
            if primal_ok && dual_ok {
                info!("refinement converged after {round} rounds");
                return Ok(ExactStatus::Optimal);
            }

            // Violation watchdog.
            let maxv = viol.max();
            let factor =
                BigRational::from_integer(BigInt::from(self.settings.violation_improvement_factor));
            let improved = match &best_violation {
                Some(best) => &maxv * &factor <= *best,
                None => true,
            };
            if improved {
                best_violation = Some(maxv.clone());
                failed_refinements = 0;
            } else {
                failed_refinements += 1;
                info!("failed to reduce violation significantly ({failed_refinements})");
                if failed_refinements > self.settings.max_failed_refinements {
                    warn!("refinement stalled, returning best so far");
                    return Ok(ExactStatus::AbortIter);
                }
            }

            // Optional certified early exits.
            if self.settings.rational_reconstruction
                && round > 0
                && round % self.settings.ratrec_freq == 0
                && self.try_reconstruct()?
            {
                info!("rational reconstruction certified optimality");
                return Ok(ExactStatus::Optimal);
            }
            if self.settings.rational_factorization
                && maxv <= crate::settings::ratio_pow10(-5)
                && self.try_rational_factorization()?
            {
                info!("rational factorization certified optimality");
                return Ok(ExactStatus::Optimal);
            }

            // Scaling step.
            let max_scale =
                &primal_scale * BigRational::from_integer(BigInt::one() << MAX_SCALE_INCR_LOG2);
            let primal_denom = max3(&viol.bounds, &viol.sides, &viol.redcost);
            primal_scale = if primal_denom.is_zero() {
                max_scale.clone()
            } else {
                let inv = primal_denom.recip();
                if inv > max_scale {
                    max_scale.clone()
                } else {
                    inv
                }
            };
            if primal_scale < one {
                primal_scale = one.clone();
            }
            if self.settings.power_scaling {
                primal_scale = pow2_round(&primal_scale);
            }

            let dual_denom = if viol.redcost > viol.dual {
                viol.redcost.clone()
            } else {
                viol.dual.clone()
            };
            dual_scale = if dual_denom.is_zero() {
                primal_scale.clone()
            } else {
                let inv = dual_denom.recip();
                if inv > primal_scale {
                    primal_scale.clone()
                } else {
                    inv
                }
            };
            if dual_scale < one {
                dual_scale = one.clone();
            }
            if self.settings.power_scaling {
                dual_scale = pow2_round(&dual_scale);
            }
            debug!(
                "scaling primal by {:.3e}, dual by {:.3e}",
                primal_scale.to_f64().unwrap_or(f64::NAN),
                dual_scale.to_f64().unwrap_or(f64::NAN),
            );

            // Load the scaled residual problem into the kernel.
            self.load_scaled_residual(&primal_scale, &dual_scale)?;

            // Corrected machine solve, warm-started from the basis.
            let status = solve_real_stable(&mut self.kernel)?;
            if status != SolverStatus::Optimal {
                warn!("corrected solve returned {status}, stopping refinement");
                return Ok(match status {
                    SolverStatus::Infeasible => ExactStatus::Infeasible,
                    SolverStatus::Unbounded => ExactStatus::Unbounded,
                    other => map_abort(other),
                });
            }
            self.apply_correction(&primal_scale, &dual_scale)?;
            self.refinements += 1;
        }

        warn!("refinement budget exhausted");
        Ok(ExactStatus::AbortIter)
    }

    /// Residual problem: shifted bounds/sides and scaled reduced costs.
    fn load_scaled_residual(
        &mut self,
        primal_scale: &BigRational,
        dual_scale: &BigRational,
    ) -> RefineResult<()> {
        for j in 0..self.rational.num_cols() {
            let lo = match &self.rational.lower[j] {
                Some(lo) => f64_from_rational(&((lo - &self.sol.primal[j]) * primal_scale)),
                None => f64::NEG_INFINITY,
            };
            let up = match &self.rational.upper[j] {
                Some(up) => f64_from_rational(&((up - &self.sol.primal[j]) * primal_scale)),
                None => f64::INFINITY,
            };
            self.kernel.change_bounds(j, lo, up)?;
            let obj = f64_from_rational(&(&self.sol.redcost[j] * dual_scale));
            self.kernel.change_max_obj(j, obj)?;
        }
        for i in 0..self.rational.num_rows() {
            let lhs = match &self.rational.lhs[i] {
                Some(lhs) => f64_from_rational(&((lhs - &self.sol.slacks[i]) * primal_scale)),
                None => f64::NEG_INFINITY,
            };
            let rhs = match &self.rational.rhs[i] {
                Some(rhs) => f64_from_rational(&((rhs - &self.sol.slacks[i]) * primal_scale)),
                None => f64::INFINITY,
            };
            self.kernel.change_sides(i, lhs, rhs)?;
        }
        Ok(())
    }

    /// Fold the machine correction into the rational candidate through
    /// the sparse primal-dual difference.
    fn apply_correction(
        &mut self,
        primal_scale: &BigRational,
        dual_scale: &BigRational,
    ) -> RefineResult<()> {
        let m = self.rational.num_rows();
        let n = self.rational.num_cols();
        let inv_p = primal_scale.recip();
        let inv_d = dual_scale.recip();

        let mut x = vec![0.0; n];
        self.kernel.get_primal(&mut x);
        let mut y = vec![0.0; m];
        self.kernel.get_dual_internal(&mut y);
        let (_, col_tags) = self.kernel.get_basis();

        // Sparse primal correction.
        let mut primal_dual_diff: Vec<(usize, BigRational)> = Vec::new();
        for j in 0..n {
            let new_val = match col_tags[j] {
                VarStatusTag::OnLower | VarStatusTag::Fixed => match &self.rational.lower[j] {
                    Some(lo) => lo.clone(),
                    None => &self.sol.primal[j] + rational_from_f64(x[j])? * &inv_p,
                },
                VarStatusTag::OnUpper => match &self.rational.upper[j] {
                    Some(up) => up.clone(),
                    None => &self.sol.primal[j] + rational_from_f64(x[j])? * &inv_p,
                },
                // A free nonbasic in the residual problem sits at zero:
                // the original value is unchanged up to the correction.
                VarStatusTag::Zero | VarStatusTag::Basic => {
                    &self.sol.primal[j] + rational_from_f64(x[j])? * &inv_p
                }
            };
            let diff = &new_val - &self.sol.primal[j];
            if !diff.is_zero() {
                primal_dual_diff.push((j, diff));
                self.sol.primal[j] = new_val;
            }
        }

        // Slack update: incremental through the diff when it is smaller
        // than the primal support, full recomputation otherwise.
        let primal_size = self.sol.primal.iter().filter(|v| !v.is_zero()).count();
        if primal_dual_diff.len() < primal_size.max(1) {
            for (j, diff) in &primal_dual_diff {
                for (i, a) in &self.rational.cols[*j] {
                    let delta = a * diff;
                    self.sol.slacks[*i] += delta;
                }
            }
        } else {
            self.recompute_slacks();
        }

        // Dual correction and exact reduced costs.
        for i in 0..m {
            let dy = rational_from_f64(y[i])? * &inv_d;
            if !dy.is_zero() {
                self.sol.dual[i] += dy;
            }
        }
        self.recompute_redcost();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Certified early exits.

    /// Attempt to reconstruct the candidate as an exact rational optimum.
    fn try_reconstruct(&mut self) -> RefineResult<bool> {
        // Denominator bound grows with the refinement depth, boosted by
        // the error correction factor.
        let growth = 16.0 * self.settings.error_correction_factor;
        let shift = (32 + (growth * self.refinements as f64) as u64).min(512);
        let bound = BigInt::one() << shift;

        let Some(primal) = reconstruct_vector(&self.sol.primal, &bound) else {
            return Ok(false);
        };
        let Some(dual) = reconstruct_vector(&self.sol.dual, &bound) else {
            return Ok(false);
        };

        // Exact feasibility of the reconstructed primal.
        for j in 0..self.rational.num_cols() {
            if let Some(lo) = &self.rational.lower[j] {
                if &primal[j] < lo {
                    return Ok(false);
                }
            }
            if let Some(up) = &self.rational.upper[j] {
                if &primal[j] > up {
                    return Ok(false);
                }
            }
        }
        let mut slacks = Vec::with_capacity(self.rational.num_rows());
        for i in 0..self.rational.num_rows() {
            let a = self.rational.activity(i, &primal);
            if let Some(lhs) = &self.rational.lhs[i] {
                if &a < lhs {
                    return Ok(false);
                }
            }
            if let Some(rhs) = &self.rational.rhs[i] {
                if &a > rhs {
                    return Ok(false);
                }
            }
            slacks.push(a);
        }

        // Dual feasibility and complementarity.
        let mut redcost = Vec::with_capacity(self.rational.num_cols());
        for j in 0..self.rational.num_cols() {
            let d = self.rational.reduced_cost(j, &dual);
            let at_lower = self.rational.lower[j].as_ref() == Some(&primal[j]);
            let at_upper = self.rational.upper[j].as_ref() == Some(&primal[j]);
            if d.is_positive() && !at_upper {
                return Ok(false);
            }
            if d.is_negative() && !at_lower {
                return Ok(false);
            }
            redcost.push(d);
        }
        for i in 0..self.rational.num_rows() {
            let y = &dual[i];
            let at_lhs = self.rational.lhs[i].as_ref() == Some(&slacks[i]);
            let at_rhs = self.rational.rhs[i].as_ref() == Some(&slacks[i]);
            if y.is_positive() && !at_rhs {
                return Ok(false);
            }
            if y.is_negative() && !at_lhs {
                return Ok(false);
            }
        }

        // Basis-status consistency is advisory only.
        let (_, col_tags) = self.kernel.get_basis();
        for j in 0..self.rational.num_cols() {
            if col_tags[j] == VarStatusTag::OnLower
                && self.rational.lower[j].as_ref() != Some(&primal[j])
            {
                warn!("reconstructed solution disagrees with basis status of column {j}");
                break;
            }
        }

        self.sol.primal = primal;
        self.sol.dual = dual;
        self.sol.slacks = slacks;
        self.sol.redcost = redcost;
        Ok(true)
    }

    /// Exact factorization of the current basis; certifies optimality or
    /// jumps to the exactly basic-feasible point.
    fn try_rational_factorization(&mut self) -> RefineResult<bool> {
        use simplex_core::settings::Representation;
        if self.kernel.settings.representation != Representation::Column {
            return Ok(false);
        }
        let m = self.rational.num_rows();
        let n = self.rational.num_cols();
        if m == 0 {
            return Ok(false);
        }

        let (row_tags, col_tags) = self.kernel.get_basis();

        // Collect basis columns in position order.
        let mut cols: Vec<Vec<(usize, BigRational)>> = Vec::with_capacity(m);
        let mut base_ids = Vec::with_capacity(m);
        for pos in 0..m {
            let id = self.kernel.basis.base_id(pos);
            base_ids.push(id);
            match id {
                Id::Col(j) => cols.push(self.rational.cols[j].clone()),
                Id::Row(i) => cols.push(vec![(i, BigRational::one())]),
            }
        }
        let lu = match RationalLu::factorize(&cols) {
            Ok(lu) => lu,
            Err(_) => {
                debug!("rational basis factorization is singular");
                return Ok(false);
            }
        };

        // Nonbasic values: columns at their exact bounds, row slacks at
        // the negated sides.
        let nb_col_val = |j: usize| -> BigRational {
            match col_tags[j] {
                VarStatusTag::OnLower | VarStatusTag::Fixed => self.rational.lower[j]
                    .clone()
                    .unwrap_or_else(BigRational::zero),
                VarStatusTag::OnUpper => self.rational.upper[j]
                    .clone()
                    .unwrap_or_else(BigRational::zero),
                _ => BigRational::zero(),
            }
        };
        let nb_row_val = |i: usize| -> BigRational {
            match row_tags[i] {
                VarStatusTag::OnLower | VarStatusTag::Fixed => self.rational.rhs[i]
                    .clone()
                    .map(|r| -r)
                    .unwrap_or_else(BigRational::zero),
                VarStatusTag::OnUpper => self.rational.lhs[i]
                    .clone()
                    .map(|l| -l)
                    .unwrap_or_else(BigRational::zero),
                _ => BigRational::zero(),
            }
        };

        // Right-hand side of the basic system: minus the nonbasic
        // contributions (A x + s = 0 convention).
        let mut rhs = vec![BigRational::zero(); m];
        for j in 0..n {
            if col_tags[j] == VarStatusTag::Basic {
                continue;
            }
            let v = nb_col_val(j);
            if v.is_zero() {
                continue;
            }
            for (i, a) in &self.rational.cols[j] {
                rhs[*i] -= a * &v;
            }
        }
        for i in 0..m {
            if row_tags[i] == VarStatusTag::Basic {
                continue;
            }
            let v = nb_row_val(i);
            rhs[i] -= v;
        }
        let x_basic = lu.solve_right(&rhs);

        // Duals: B^T y = objective of the basic entries.
        let mut cb = vec![BigRational::zero(); m];
        for (pos, id) in base_ids.iter().enumerate() {
            if let Id::Col(j) = id {
                cb[pos] = self.rational.obj[*j].clone();
            }
        }
        let dual = lu.solve_left(&cb);

        // Assemble the exact candidate.
        let mut primal = vec![BigRational::zero(); n];
        for j in 0..n {
            if col_tags[j] != VarStatusTag::Basic {
                primal[j] = nb_col_val(j);
            }
        }
        for (pos, id) in base_ids.iter().enumerate() {
            if let Id::Col(j) = id {
                primal[*j] = x_basic[pos].clone();
            }
        }

        // Exact primal feasibility check.
        let mut feasible = true;
        for j in 0..n {
            if let Some(lo) = &self.rational.lower[j] {
                if &primal[j] < lo {
                    feasible = false;
                }
            }
            if let Some(up) = &self.rational.upper[j] {
                if &primal[j] > up {
                    feasible = false;
                }
            }
        }
        let mut slacks = Vec::with_capacity(m);
        for i in 0..m {
            let a = self.rational.activity(i, &primal);
            if let Some(lhs) = &self.rational.lhs[i] {
                if &a < lhs {
                    feasible = false;
                }
            }
            if let Some(rhs_v) = &self.rational.rhs[i] {
                if &a > rhs_v {
                    feasible = false;
                }
            }
            slacks.push(a);
        }
        if !feasible {
            return Ok(false);
        }

        // Exact dual feasibility per basis status.
        let mut dual_ok = true;
        for j in 0..n {
            let d = self.rational.reduced_cost(j, &dual);
            match col_tags[j] {
                VarStatusTag::OnLower if d.is_positive() => dual_ok = false,
                VarStatusTag::OnUpper if d.is_negative() => dual_ok = false,
                VarStatusTag::Zero if !d.is_zero() => dual_ok = false,
                _ => {}
            }
        }
        for i in 0..m {
            match row_tags[i] {
                VarStatusTag::OnLower if dual[i].is_negative() => dual_ok = false,
                VarStatusTag::OnUpper if dual[i].is_positive() => dual_ok = false,
                VarStatusTag::Zero if !dual[i].is_zero() => dual_ok = false,
                _ => {}
            }
        }

        // Jump onto the exactly basic-feasible point; with dual
        // feasibility the candidate is optimal.
        self.sol.primal = primal;
        self.sol.slacks = slacks;
        if dual_ok {
            self.sol.dual = dual;
            self.recompute_redcost();
        }
        Ok(dual_ok)
    }

    // ------------------------------------------------------------------
    // Machine certificates (approximate; exact certification happens in
    // the dedicated sub-problems).

    fn capture_machine_farkas(&mut self) -> RefineResult<()> {
        if let Some(y) = self.kernel.get_dual_farkas() {
            let y = y.to_vec();
            let mut exact = Vec::with_capacity(y.len());
            for v in y {
                exact.push(rational_from_f64(v)?);
            }
            self.sol.dual_farkas = Some(exact);
        }
        Ok(())
    }

    fn capture_machine_ray(&mut self) -> RefineResult<()> {
        if let Some(r) = self.kernel.get_primal_ray() {
            let r = r.to_vec();
            let mut exact = Vec::with_capacity(r.len());
            for v in r {
                exact.push(rational_from_f64(v)?);
            }
            self.sol.primal_ray = Some(exact);
        }
        Ok(())
    }
}

fn bound_f64(b: &OptRational, negative_side: bool) -> f64 {
    crate::rational::f64_from_bound(b, negative_side)
}

fn max3(a: &BigRational, b: &BigRational, c: &BigRational) -> BigRational {
    let mut v = a.clone();
    if b > &v {
        v = b.clone();
    }
    if c > &v {
        v = c.clone();
    }
    v
}

pub(crate) fn map_abort(status: SolverStatus) -> ExactStatus {
    match status {
        SolverStatus::Optimal => ExactStatus::Optimal,
        SolverStatus::Infeasible => ExactStatus::Infeasible,
        SolverStatus::Unbounded => ExactStatus::Unbounded,
        SolverStatus::AbortTime => ExactStatus::AbortTime,
        SolverStatus::AbortIter => ExactStatus::AbortIter,
        SolverStatus::AbortValue => ExactStatus::AbortValue,
        _ => ExactStatus::Error,
    }
}
