//! Leaving variant of the simplex iteration.
//!
//! Price a basic position violating its feasibility box, run the dual
//! ratio test along `rho = B^{-T} e_r` to find the entering counterpart
//! that first pins to its quantity box, and pivot.

use log::debug;

use super::{Kernel, PhaseResult};
use crate::basis::{base_vector, Id, Status};
use crate::error::KernelResult;
use crate::linalg::SsVec;
use crate::pricing::{PivotInfo, Pricer};
use crate::ratio::{RatioCandidate, RatioOutcome, RatioTester};
use crate::settings::Representation;

impl Kernel {
    /// Run leaving iterations until the phase settles.
    pub(crate) fn leave_loop(&mut self) -> KernelResult<PhaseResult> {
        loop {
            if let Some(st) = self.check_aborts() {
                return Ok(PhaseResult::Abort(st));
            }
            if self.refactorize_if_due()? {
                self.shift_q_side();
            }

            let r = self
                .pricer
                .select_leave(&self.ftest, self.settings.delta);
            let Some(r) = r else {
                return Ok(PhaseResult::Done);
            };

            if let Some(result) = self.leave_iteration(r)? {
                return Ok(result);
            }
        }
    }

    /// One leaving pivot; `Some` carries a phase verdict.
    fn leave_iteration(&mut self, r: usize) -> KernelResult<Option<PhaseResult>> {
        let dim = self.dim();
        let eps = self.settings.epsilon;

        let fval = self.fvec.get(r);
        let below = fval < self.flo[r];
        let target_r = if below { self.flo[r] } else { self.fup[r] };
        let s = if below { 1.0 } else { -1.0 };

        let mut rho = SsVec::zeros(dim, eps);
        self.basis.solve_left_unit(r, &mut rho);
        let mut alpha = SsVec::zeros(self.pvec.dim(), eps);
        let mat = match self.rep {
            Representation::Column => self.lp.cols(),
            Representation::Row => self.lp.rows(),
        };
        alpha.assign_product_transposed(&rho, mat);

        // Candidate counterparts: nonbasic ids moved by the co-state
        // step. Their quantity travels as `q - t * (s * coefficient)`.
        let mut cands = Vec::new();
        let mut keys: Vec<Id> = Vec::new();
        for (k, a) in alpha.iter_nonzero() {
            if self.matrix_is_basic[k] {
                continue;
            }
            let id = self.matrix_id(k);
            cands.push(RatioCandidate {
                key: keys.len(),
                coeff: s * a,
                val: self.quantity(id),
                lb: self.qlo_m[k],
                ub: self.qup_m[k],
            });
            keys.push(id);
        }
        for (k, rv) in rho.iter_nonzero() {
            if self.dim_is_basic[k] {
                continue;
            }
            let id = self.dim_id(k);
            cands.push(RatioCandidate {
                key: keys.len(),
                coeff: s * rv,
                val: self.quantity(id),
                lb: self.qlo_d[k],
                ub: self.qup_d[k],
            });
            keys.push(id);
        }

        let outcome = self.ratio.select(
            &cands,
            f64::INFINITY,
            self.settings.delta,
            self.min_pivot(),
        );

        let (key, mut t, to_lower, needs_shift) = match outcome {
            RatioOutcome::Unbounded | RatioOutcome::Cap { .. } => {
                self.record_leave_ray(s, &rho);
                return Ok(Some(PhaseResult::Unbounded));
            }
            RatioOutcome::Pivot { key, step, coeff: _, to_lower, needs_shift } => {
                (key, step, to_lower, needs_shift)
            }
        };
        let q = keys[key];

        if needs_shift {
            self.shift_q_box_to_admit(q, to_lower);
            t = 0.0;
        }

        let enter_vec = base_vector(&self.lp, self.rep, q);
        let mut w = SsVec::zeros(dim, eps);
        self.basis.solve_for_update(&enter_vec, &mut w);
        let pivot = w.get(r);
        if pivot.abs() <= self.min_pivot() {
            debug!("tiny leaving pivot {pivot:.3e}, refactorizing");
            self.maybe_refactorize()?;
            self.shift_q_side();
            return Ok(None);
        }

        // Co-state step direction per representation.
        let theta = match self.rep {
            Representation::Column => s * t,
            Representation::Row => -s * t,
        };

        // Primal movement of the entering variable drives the leaving
        // value onto its violated bound.
        let delta_q = (fval - target_r) / pivot;
        self.fvec.mult_add(-delta_q, &w);
        let enter_val = self.nb_value(q) + delta_q;

        let leave_id = self.basis.base_id(r);
        let leave_status = self.leaving_status(leave_id, below);
        self.basis.desc.set_status(leave_id, leave_status);
        let enter_status = self.entering_status_from_pin(q, to_lower);
        self.basis.desc.set_status(q, enter_status);

        if self.basis.change(r, q, &enter_vec).is_err() {
            self.factorize_with_repair()?;
            self.compute_all();
            self.shift_q_side();
            return Ok(None);
        }
        self.fvec.set_value(r, enter_val);
        self.mark_basic(q, true);
        self.mark_basic(leave_id, false);
        self.refresh_f_bounds(r);
        self.coprhs[r] = self.pin_value(q);

        if theta != 0.0 {
            self.copvec.mult_add(theta, &rho);
            self.pvec.mult_add(theta, &alpha);
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
        self.pricer.left4(r, q, &info);

        self.note_step(delta_q.abs().min(t.abs()));
        self.iter_count += 1;
        self.leave_count += 1;
        Ok(None)
    }

    /// Widen the stored quantity box of `id` so its current quantity is
    /// admissible (degenerate dual step).
    fn shift_q_box_to_admit(&mut self, id: Id, lower_side: bool) {
        let qv = self.quantity(id);
        let margin = self.settings.delta * 1e-2;
        let k = id.index();
        if self.on_matrix_side(id) {
            if lower_side && qv < self.qlo_m[k] {
                self.the_shift += self.qlo_m[k] - qv + margin;
                self.qlo_m[k] = qv - margin;
            } else if !lower_side && qv > self.qup_m[k] {
                self.the_shift += qv - self.qup_m[k] + margin;
                self.qup_m[k] = qv + margin;
            }
            self.test[k] = super::box_slack(qv, self.qlo_m[k], self.qup_m[k]);
        } else {
            if lower_side && qv < self.qlo_d[k] {
                self.the_shift += self.qlo_d[k] - qv + margin;
                self.qlo_d[k] = qv - margin;
            } else if !lower_side && qv > self.qup_d[k] {
                self.the_shift += qv - self.qup_d[k] + margin;
                self.qup_d[k] = qv + margin;
            }
            self.cotest[k] = super::box_slack(qv, self.qlo_d[k], self.qup_d[k]);
        }
    }

    /// Status of an id entering through the dual ratio test, pinned at
    /// the given side of its quantity box.
    fn entering_status_from_pin(&self, q: Id, to_lower: bool) -> Status {
        match self.rep {
            Representation::Column => self.entering_status(q, 0.0),
            Representation::Row => match q {
                Id::Row(i) => {
                    if self.cur_lhs[i] == self.cur_rhs[i] && self.cur_lhs[i].is_finite() {
                        Status::PFixed
                    } else if to_lower {
                        // Pinned at lhs: left side active.
                        Status::POnUpper
                    } else {
                        Status::POnLower
                    }
                }
                Id::Col(j) => {
                    if self.cur_lo[j] == self.cur_up[j] && self.cur_lo[j].is_finite() {
                        Status::PFixed
                    } else if to_lower {
                        Status::POnLower
                    } else {
                        Status::POnUpper
                    }
                }
            },
        }
    }

    /// Certificate from an unbounded dual step.
    fn record_leave_ray(&mut self, s: f64, rho: &SsVec) {
        match self.rep {
            Representation::Column => {
                // Dual ray over the rows, oriented so that positive
                // entries select left-hand sides: y+^T lhs - y-^T rhs > 0.
                let mut y = vec![0.0; self.lp.num_rows()];
                for (i, v) in rho.iter_nonzero() {
                    y[i] = -s * v;
                }
                self.set_dual_farkas(y);
            }
            Representation::Row => {
                // Primal ray over the columns.
                let mut x = vec![0.0; self.lp.num_cols()];
                for (j, v) in rho.iter_nonzero() {
                    x[j] = -s * v;
                }
                self.set_primal_ray(x);
            }
        }
    }
}
