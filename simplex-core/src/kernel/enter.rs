//! Entering variant of the simplex iteration.
//!
//! Price a violated nonbasic id, ratio-test the basic side along its
//! update column, pivot, and propagate rank-1 corrections into the
//! co-state and the tests.

use log::debug;

use super::{box_slack, Kernel, PhaseResult};
use crate::basis::{base_vector, dual_status, Id, Status};
use crate::error::KernelResult;
use crate::linalg::SsVec;
use crate::pricing::{PivotInfo, PriceInput, Pricer};
use crate::ratio::{RatioCandidate, RatioOutcome, RatioTester};
use crate::settings::Representation;

impl Kernel {
    /// Run entering iterations until the phase settles.
    pub(crate) fn enter_loop(&mut self) -> KernelResult<PhaseResult> {
        loop {
            if let Some(st) = self.check_aborts() {
                return Ok(PhaseResult::Abort(st));
            }
            if self.refactorize_if_due()? {
                // Recomputation drops shifts; restore a feasible start.
                self.shift_f_side();
            }

            let q = {
                let inp = PriceInput {
                    test: &self.test,
                    cotest: &self.cotest,
                    dim_is_basic: &self.dim_is_basic,
                    matrix_is_basic: &self.matrix_is_basic,
                    delta: self.settings.delta,
                    rep: self.rep,
                };
                self.pricer.select_enter(&inp)
            };
            let Some(q) = q else {
                return Ok(PhaseResult::Done);
            };

            if let Some(result) = self.enter_iteration(q)? {
                return Ok(result);
            }
        }
    }

    pub(crate) fn refactorize_if_due(&mut self) -> KernelResult<bool> {
        let before = self.basis.updates_since_factor();
        if before == 0 && self.basis.factor.is_loaded() {
            return Ok(false);
        }
        let due = before >= self.settings.refactor_interval
            || self.basis.factor.stability() < self.settings.min_stability
            || !self.basis.factor.is_loaded();
        if due {
            self.maybe_refactorize()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Stored (possibly shifted) quantity box of an id.
    fn stored_q_box(&self, id: Id) -> (f64, f64) {
        let k = id.index();
        if self.on_matrix_side(id) {
            (self.qlo_m[k], self.qup_m[k])
        } else {
            (self.qlo_d[k], self.qup_d[k])
        }
    }

    /// Refresh an id's stored quantity box from its status.
    pub(crate) fn reset_stored_q_box(&mut self, id: Id) {
        let (lo, up) = self.q_box(id);
        let k = id.index();
        if self.on_matrix_side(id) {
            self.qlo_m[k] = lo;
            self.qup_m[k] = up;
        } else {
            self.qlo_d[k] = lo;
            self.qup_d[k] = up;
        }
    }

    /// Test value against the stored box.
    pub(crate) fn stored_test(&self, id: Id) -> f64 {
        let (lo, up) = self.stored_q_box(id);
        box_slack(self.quantity(id), lo, up)
    }

    /// Store the up-to-date test of a (non)basic id.
    pub(crate) fn update_test_of(&mut self, id: Id) {
        let v = if self.basis.is_basic(id) {
            f64::INFINITY
        } else {
            self.stored_test(id)
        };
        self.store_test(id, v);
    }

    /// Minimum acceptable pivot magnitude.
    pub(crate) fn min_pivot(&self) -> f64 {
        self.settings.epsilon.max(1e-12)
    }

    /// Mark basic membership in the pricer-facing arrays.
    pub(crate) fn mark_basic(&mut self, id: Id, basic: bool) {
        let k = id.index();
        if self.on_matrix_side(id) {
            self.matrix_is_basic[k] = basic;
        } else {
            self.dim_is_basic[k] = basic;
        }
    }

    /// One entering pivot; `Some` carries a phase verdict.
    fn enter_iteration(&mut self, q: Id) -> KernelResult<Option<PhaseResult>> {
        let dim = self.dim();
        let eps = self.settings.epsilon;

        // Direction: +1 when the quantity exceeds the upper box side.
        let quantity_q = self.quantity(q);
        let (qlo, qup) = self.stored_q_box(q);
        let dir = if qup.is_finite() && quantity_q > qup { 1.0 } else { -1.0 };

        let enter_vec = base_vector(&self.lp, self.rep, q);
        let mut w = SsVec::zeros(dim, eps);
        self.basis.solve_for_update(&enter_vec, &mut w);

        // Blocking candidates on the basic side.
        let mut cands = Vec::with_capacity(w.size());
        for (pos, wv) in w.iter_nonzero() {
            let coeff = dir * wv;
            cands.push(RatioCandidate {
                key: pos,
                coeff,
                val: self.fvec.get(pos),
                lb: self.flo[pos],
                ub: self.fup[pos],
            });
        }

        // The entering variable's own span caps the step.
        let cap = match self.rep {
            Representation::Column => {
                let (lo, up) = self.f_box(q);
                if lo.is_finite() && up.is_finite() {
                    up - lo
                } else {
                    f64::INFINITY
                }
            }
            Representation::Row => f64::INFINITY,
        };

        let outcome = self
            .ratio
            .select(&cands, cap, self.settings.delta, self.min_pivot());

        match outcome {
            RatioOutcome::Cap { step } => {
                // Bound flip: the entering variable jumps to its other
                // bound without a basis change.
                self.fvec.mult_add(-dir * step, &w);
                let flipped = match self.basis.desc.status(q) {
                    Status::POnLower => Status::POnUpper,
                    Status::POnUpper => Status::POnLower,
                    other => other,
                };
                self.basis.desc.set_status(q, flipped);
                self.reset_stored_q_box(q);
                self.update_test_of(q);
                for n in 0..w.size() {
                    self.refresh_ftest(w.index(n));
                }
                self.note_step(step);
                self.iter_count += 1;
                self.enter_count += 1;
                Ok(None)
            }
            RatioOutcome::Unbounded => {
                self.record_enter_ray(q, dir, &w);
                Ok(Some(PhaseResult::Unbounded))
            }
            RatioOutcome::Pivot { key: r, mut step, coeff: _, to_lower, needs_shift } => {
                if needs_shift {
                    let v = self.fvec.get(r);
                    self.apply_f_shift(r, v, to_lower);
                    step = 0.0;
                }
                let pivot = w.get(r);
                if pivot.abs() <= self.min_pivot() {
                    debug!("tiny entering pivot {pivot:.3e}, refactorizing");
                    self.maybe_refactorize()?;
                    return Ok(None);
                }

                // Co-state step so the entering quantity lands on the box
                // side it violated.
                let target = if dir > 0.0 { qup } else { qlo };
                let gamma = match self.rep {
                    Representation::Column => (quantity_q - target) / pivot,
                    Representation::Row => (target - quantity_q) / pivot,
                };

                let enter_val = self.nb_value(q) + dir * step;
                self.fvec.mult_add(-dir * step, &w);

                let leave_id = self.basis.base_id(r);
                let leave_status = self.leaving_status(leave_id, to_lower);
                self.basis.desc.set_status(leave_id, leave_status);
                let enter_status = self.entering_status(q, dir);
                self.basis.desc.set_status(q, enter_status);

                if self.basis.change(r, q, &enter_vec).is_err() {
                    // Singular update: rebuild and retry the iteration.
                    self.factorize_with_repair()?;
                    self.compute_all();
                    self.shift_f_side();
                    return Ok(None);
                }
                self.fvec.set_value(r, enter_val);
                self.mark_basic(q, true);
                self.mark_basic(leave_id, false);
                self.refresh_f_bounds(r);
                self.coprhs[r] = self.pin_value(q);

                // Rank-1 dual correction.
                let mut rho = SsVec::zeros(dim, eps);
                self.basis.solve_left_unit(r, &mut rho);
                let mut alpha = SsVec::zeros(self.pvec.dim(), eps);
                let mat = match self.rep {
                    Representation::Column => self.lp.cols(),
                    Representation::Row => self.lp.rows(),
                };
                alpha.assign_product_transposed(&rho, mat);
                if gamma != 0.0 {
                    self.copvec.mult_add(gamma, &rho);
                    self.pvec.mult_add(gamma, &alpha);
                }

                self.reset_stored_q_box(leave_id);
                self.update_test_of(leave_id);
                self.update_test_of(q);
                for n in 0..alpha.size() {
                    let id = self.matrix_id(alpha.index(n));
                    if !self.basis.is_basic(id) {
                        self.update_test_of(id);
                    }
                }
                for n in 0..rho.size() {
                    let id = self.dim_id(rho.index(n));
                    if !self.basis.is_basic(id) {
                        self.update_test_of(id);
                    }
                }
                for n in 0..w.size() {
                    self.refresh_ftest(w.index(n));
                }
                self.refresh_ftest(r);

                let info = PivotInfo {
                    pivot_col: &w,
                    pivot_row: &alpha,
                    rho: &rho,
                    pivot_val: pivot,
                };
                self.pricer.entered4(q, r, &info);

                self.note_step(step);
                self.iter_count += 1;
                self.enter_count += 1;
                Ok(None)
            }
        }
    }

    /// Status of a variable leaving the basis at one of its bounds.
    pub(crate) fn leaving_status(&self, leave_id: Id, to_lower: bool) -> Status {
        match self.rep {
            Representation::Column => {
                let (lo, up) = self.f_box(leave_id);
                if lo == up && lo.is_finite() {
                    Status::PFixed
                } else if !lo.is_finite() && !up.is_finite() {
                    Status::PFree
                } else if to_lower {
                    Status::POnLower
                } else {
                    Status::POnUpper
                }
            }
            Representation::Row => match leave_id {
                Id::Row(i) => dual_status(-self.cur_rhs[i], -self.cur_lhs[i]),
                Id::Col(j) => dual_status(self.cur_lo[j], self.cur_up[j]),
            },
        }
    }

    /// Status of a variable entering the basis moving in `dir`.
    pub(crate) fn entering_status(&self, q: Id, dir: f64) -> Status {
        match self.rep {
            Representation::Column => match q {
                Id::Row(i) => dual_status(-self.cur_rhs[i], -self.cur_lhs[i]),
                Id::Col(j) => dual_status(self.cur_lo[j], self.cur_up[j]),
            },
            Representation::Row => match q {
                Id::Row(i) => {
                    if self.cur_lhs[i] == self.cur_rhs[i] && self.cur_lhs[i].is_finite() {
                        Status::PFixed
                    } else if dir > 0.0 {
                        // Positive dual: right-hand side active.
                        Status::POnLower
                    } else {
                        Status::POnUpper
                    }
                }
                Id::Col(j) => {
                    if self.cur_lo[j] == self.cur_up[j] && self.cur_lo[j].is_finite() {
                        Status::PFixed
                    } else if dir > 0.0 {
                        Status::POnUpper
                    } else {
                        Status::POnLower
                    }
                }
            },
        }
    }

    /// Record the ray certified by an unbounded entering step.
    fn record_enter_ray(&mut self, q: Id, dir: f64, w: &SsVec) {
        match self.rep {
            Representation::Column => {
                // Primal ray in column space.
                let mut ray = vec![0.0; self.lp.num_cols()];
                if let Id::Col(j) = q {
                    ray[j] = dir;
                }
                for (pos, wv) in w.iter_nonzero() {
                    if let Id::Col(j) = self.basis.base_id(pos) {
                        ray[j] = -dir * wv;
                    }
                }
                self.set_primal_ray(ray);
            }
            Representation::Row => {
                // Dual ray, oriented so that positive entries select
                // left-hand sides (Farkas certificate convention).
                let mut y = vec![0.0; self.lp.num_rows()];
                if let Id::Row(i) = q {
                    y[i] = -dir;
                }
                for (pos, wv) in w.iter_nonzero() {
                    if let Id::Row(i) = self.basis.base_id(pos) {
                        y[i] = dir * wv;
                    }
                }
                self.set_dual_farkas(y);
            }
        }
    }

}
