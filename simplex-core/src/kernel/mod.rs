//! The revised simplex loop.
//!
//! One kernel drives all four mode combinations. The basis lives either
//! in row space (`Column` representation, order `nRows`) or column space
//! (`Row` representation, order `nCols`); the entering and leaving
//! variants walk the same state:
//!
//! * `fvec`: values of the basic variables (primal values in column
//!   representation, dual values in row representation), bounded by
//!   `flo`/`fup` per basis position;
//! * `copvec`: the co-state solved from `B^T z = coprhs` (duals in
//!   column representation, primal values in row representation);
//! * `pvec`: products `vector(k)^T copvec` over the matrix-side ids,
//!   from which the `test` array derives; `cotest` covers the dim-side
//!   ids directly through `copvec`.
//!
//! Violations are box slacks: a negative test marks a candidate. The
//! driver alternates entering and leaving phases until both sides are
//! clean, shifting bounds outward where a phase needs a feasible start
//! and unshifting before any verdict.

mod enter;
mod leave;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::basis::{base_vector, Basis, BasisState, Desc, Id, Status, VarStatusTag, NO_POS};
use crate::error::{KernelError, KernelResult};
use crate::linalg::{DenseVec, SparseVec, SsVec};
use crate::problem::LpProblem;
use crate::ratio::AnyRatioTester;
use crate::pricing::{AnyPricer, Pricer};
use crate::settings::{AlgoType, KernelSettings, PricerKind, RatioKind, Representation};

/// Degenerate-step threshold for the cycling guard.
const DEGENERACY_EPS: f64 = 1e-10;
/// Cap on entering/leaving phase alternations before giving up.
const MAX_ALTERNATIONS: usize = 64;

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// No problem loaded.
    NoProblem,
    /// Loaded but not solved.
    Unknown,
    /// Basis factorized, no verdict yet.
    Regular,
    /// Basis is singular and could not be repaired.
    Singular,
    Optimal,
    Infeasible,
    Unbounded,
    AbortTime,
    AbortIter,
    AbortValue,
    Error,
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SolverStatus::NoProblem => "no problem",
            SolverStatus::Unknown => "unknown",
            SolverStatus::Regular => "regular",
            SolverStatus::Singular => "singular",
            SolverStatus::Optimal => "optimal",
            SolverStatus::Infeasible => "infeasible",
            SolverStatus::Unbounded => "unbounded",
            SolverStatus::AbortTime => "aborted (time)",
            SolverStatus::AbortIter => "aborted (iterations)",
            SolverStatus::AbortValue => "aborted (objective)",
            SolverStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Result of one simplex phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhaseResult {
    /// No more candidates: the driven side is clean under current
    /// (possibly shifted) bounds.
    Done,
    /// Step unbounded along the improving direction.
    Unbounded,
    Abort(SolverStatus),
}

/// Deterministic xorshift generator for perturbations.
#[derive(Debug, Clone)]
struct SimpleRng(u64);

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform draw in [lo, hi].
    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Box slack: positive inside, negative outside, infinite for a free box.
pub(crate) fn box_slack(x: f64, lo: f64, up: f64) -> f64 {
    let a = if lo.is_finite() { x - lo } else { f64::INFINITY };
    let b = if up.is_finite() { up - x } else { f64::INFINITY };
    a.min(b)
}

/// Dual box of a quantity, by descriptor status: the admissible range of
/// the reduced-cost-like value of a nonbasic entry.
pub(crate) fn d_box(status: Status) -> (f64, f64) {
    match status {
        Status::POnLower => (f64::NEG_INFINITY, 0.0),
        Status::POnUpper => (0.0, f64::INFINITY),
        Status::PFixed => (f64::NEG_INFINITY, f64::INFINITY),
        Status::PFree => (0.0, 0.0),
        // Basic-side statuses carry no quantity restriction here.
        _ => (f64::NEG_INFINITY, f64::INFINITY),
    }
}

/// The revised simplex kernel.
pub struct Kernel {
    pub lp: LpProblem,
    pub basis: Basis,
    pub settings: KernelSettings,
    rep: Representation,

    // Shiftable working copies of the LP bounds and sides.
    cur_lo: Vec<f64>,
    cur_up: Vec<f64>,
    cur_lhs: Vec<f64>,
    cur_rhs: Vec<f64>,

    fvec: SsVec,
    frhs: DenseVec,
    flo: Vec<f64>,
    fup: Vec<f64>,
    ftest: Vec<f64>,

    copvec: SsVec,
    coprhs: DenseVec,

    pvec: SsVec,
    test: Vec<f64>,
    cotest: Vec<f64>,
    qlo_m: Vec<f64>,
    qup_m: Vec<f64>,
    qlo_d: Vec<f64>,
    qup_d: Vec<f64>,

    matrix_is_basic: Vec<bool>,
    dim_is_basic: Vec<bool>,

    the_shift: f64,
    status: SolverStatus,
    iter_count: usize,
    enter_count: usize,
    leave_count: usize,
    degen_count: usize,

    pricer: AnyPricer,
    ratio: AnyRatioTester,
    rng: SimpleRng,

    initialized: bool,
    lp_version_seen: u64,
    interrupt: Option<Arc<AtomicBool>>,
    start_time: Instant,

    primal_ray: Option<Vec<f64>>,
    dual_farkas: Option<Vec<f64>>,
}

impl Kernel {
    pub fn new(lp: LpProblem, settings: KernelSettings) -> Self {
        let basis = Basis::new(
            settings.update_mode,
            settings.markowitz_floor,
            settings.min_stability,
        );
        let pricer = AnyPricer::new(settings.pricer, settings.pricing);
        let ratio = AnyRatioTester::new(settings.ratio_tester);
        let rep = settings.representation;
        Self {
            lp,
            basis,
            settings,
            rep,
            cur_lo: Vec::new(),
            cur_up: Vec::new(),
            cur_lhs: Vec::new(),
            cur_rhs: Vec::new(),
            fvec: SsVec::zeros(0, 1e-16),
            frhs: DenseVec::zeros(0),
            flo: Vec::new(),
            fup: Vec::new(),
            ftest: Vec::new(),
            copvec: SsVec::zeros(0, 1e-16),
            coprhs: DenseVec::zeros(0),
            pvec: SsVec::zeros(0, 1e-16),
            test: Vec::new(),
            cotest: Vec::new(),
            qlo_m: Vec::new(),
            qup_m: Vec::new(),
            qlo_d: Vec::new(),
            qup_d: Vec::new(),
            matrix_is_basic: Vec::new(),
            dim_is_basic: Vec::new(),
            the_shift: 0.0,
            status: SolverStatus::NoProblem,
            iter_count: 0,
            enter_count: 0,
            leave_count: 0,
            degen_count: 0,
            pricer,
            ratio,
            rng: SimpleRng::new(0x5eed_cafe),
            initialized: false,
            lp_version_seen: u64::MAX,
            interrupt: None,
            start_time: Instant::now(),
            primal_ray: None,
            dual_farkas: None,
        }
    }

    /// External interrupt flag, polled at suspension points.
    pub fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = Some(flag);
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    pub fn iterations(&self) -> usize {
        self.iter_count
    }

    pub fn enter_iterations(&self) -> usize {
        self.enter_count
    }

    pub fn leave_iterations(&self) -> usize {
        self.leave_count
    }

    /// Aggregate amount of outstanding bound shifting.
    pub fn shift(&self) -> f64 {
        self.the_shift
    }

    pub fn representation(&self) -> Representation {
        self.rep
    }

    /// Swap the pricer implementation (recovery ladder hook).
    pub fn set_pricer(&mut self, kind: PricerKind) {
        self.settings.pricer = kind;
        self.pricer = AnyPricer::new(kind, self.settings.pricing);
        self.pricer.load(self.n_matrix(), self.n_dim_side());
    }

    /// Swap the ratio tester implementation (recovery ladder hook).
    pub fn set_ratio_tester(&mut self, kind: RatioKind) {
        self.settings.ratio_tester = kind;
        self.ratio = AnyRatioTester::new(kind);
    }

    /// Change the feasibility tolerance (recovery ladder hook).
    pub fn set_delta(&mut self, delta: f64) {
        self.settings.delta = delta;
    }

    /// Invalidate the prepared state; the next solve starts fresh.
    pub fn unload(&mut self) {
        self.initialized = false;
        self.basis.factor.clear();
        self.status = SolverStatus::Unknown;
    }

    // ------------------------------------------------------------------
    // Id arithmetic.

    /// Basis order: row count in column representation.
    pub fn dim(&self) -> usize {
        match self.rep {
            Representation::Column => self.lp.num_rows(),
            Representation::Row => self.lp.num_cols(),
        }
    }

    fn n_matrix(&self) -> usize {
        match self.rep {
            Representation::Column => self.lp.num_cols(),
            Representation::Row => self.lp.num_rows(),
        }
    }

    fn n_dim_side(&self) -> usize {
        self.dim()
    }

    pub(crate) fn matrix_id(&self, k: usize) -> Id {
        match self.rep {
            Representation::Column => Id::Col(k),
            Representation::Row => Id::Row(k),
        }
    }

    pub(crate) fn dim_id(&self, k: usize) -> Id {
        match self.rep {
            Representation::Column => Id::Row(k),
            Representation::Row => Id::Col(k),
        }
    }

    /// Is the id priced through `pvec` (matrix side)?
    pub(crate) fn on_matrix_side(&self, id: Id) -> bool {
        matches!(
            (self.rep, id),
            (Representation::Column, Id::Col(_)) | (Representation::Row, Id::Row(_))
        )
    }

    // ------------------------------------------------------------------
    // Boxes, values, quantities.

    /// Feasibility box of an id on the fvec side.
    pub(crate) fn f_box(&self, id: Id) -> (f64, f64) {
        match (self.rep, id) {
            (Representation::Column, Id::Col(j)) => (self.cur_lo[j], self.cur_up[j]),
            (Representation::Column, Id::Row(i)) => (-self.cur_rhs[i], -self.cur_lhs[i]),
            (Representation::Row, Id::Col(j)) => d_box(self.basis.desc.status(Id::Col(j))),
            (Representation::Row, Id::Row(i)) => {
                let (lo, up) = d_box(self.basis.desc.status(Id::Row(i)));
                (-up, -lo)
            }
        }
    }

    /// Box of an id's quantity on the test side.
    pub(crate) fn q_box(&self, id: Id) -> (f64, f64) {
        match (self.rep, id) {
            (Representation::Column, id) => d_box(self.basis.desc.status(id)),
            (Representation::Row, Id::Row(i)) => (self.cur_lhs[i], self.cur_rhs[i]),
            (Representation::Row, Id::Col(j)) => (self.cur_lo[j], self.cur_up[j]),
        }
    }

    /// Value of a nonbasic id (its contribution to the basic system).
    pub(crate) fn nb_value(&self, id: Id) -> f64 {
        match self.basis.desc.status(id) {
            Status::POnLower | Status::PFixed => self.f_box(id).0,
            Status::POnUpper => self.f_box(id).1,
            Status::PFree => 0.0,
            // Nonbasic dual-side statuses rest at zero.
            _ => 0.0,
        }
    }

    /// Objective coefficient on the basis system's right-hand side.
    fn cost(&self, id: Id) -> f64 {
        match (self.rep, id) {
            (Representation::Column, Id::Col(j)) => self.lp.max_obj(j),
            (Representation::Column, Id::Row(_)) => 0.0,
            // Row representation: the cost vector lives in frhs space.
            (Representation::Row, _) => 0.0,
        }
    }

    /// Reduced-cost-like quantity of an id on the test side.
    pub(crate) fn quantity(&self, id: Id) -> f64 {
        if self.on_matrix_side(id) {
            let k = id.index();
            let dot = self.pvec.get(k);
            match self.rep {
                Representation::Column => self.lp.max_obj(k) - dot,
                Representation::Row => dot,
            }
        } else {
            let k = id.index();
            let z = self.copvec.get(k);
            match self.rep {
                Representation::Column => -z,
                Representation::Row => z,
            }
        }
    }

    /// Test value (box slack of the quantity) of a nonbasic id.
    pub(crate) fn compute_test(&self, id: Id) -> f64 {
        let (lo, up) = self.q_box(id);
        box_slack(self.quantity(id), lo, up)
    }

    pub(crate) fn store_test(&mut self, id: Id, value: f64) {
        let k = id.index();
        if self.on_matrix_side(id) {
            self.test[k] = value;
        } else {
            self.cotest[k] = value;
        }
    }

    /// Refresh the stored test of one id (basic ids get +inf).
    pub(crate) fn refresh_test(&mut self, id: Id) {
        let v = if self.basis.is_basic(id) {
            f64::INFINITY
        } else {
            self.compute_test(id)
        };
        self.store_test(id, v);
    }

    /// Refresh the f-side bounds of one basis position.
    pub(crate) fn refresh_f_bounds(&mut self, pos: usize) {
        let (lo, up) = self.f_box(self.basis.base_id(pos));
        self.flo[pos] = lo;
        self.fup[pos] = up;
        self.ftest[pos] = box_slack(self.fvec.get(pos), lo, up);
    }

    pub(crate) fn refresh_ftest(&mut self, pos: usize) {
        self.ftest[pos] = box_slack(self.fvec.get(pos), self.flo[pos], self.fup[pos]);
    }

    // ------------------------------------------------------------------
    // State computation.

    /// Prepare the kernel: match the basis to the problem, factorize, and
    /// compute all state vectors from scratch.
    fn initialize(&mut self) -> KernelResult<()> {
        self.lp.validate()?;
        self.rep = self.settings.representation;
        let dim = self.dim();
        let n_matrix = self.n_matrix();

        // Keep a preset or previous basis when it still fits the problem
        // shape; anything else falls back to the slack basis.
        let shape_ok = self.basis.rep() == self.rep
            && self.basis.desc.row_status.len() == self.lp.num_rows()
            && self.basis.desc.col_status.len() == self.lp.num_cols()
            && self.basis.desc.num_basic(self.rep) == dim;
        if !shape_ok {
            self.basis.load_slack_basis(&self.lp, self.rep);
        }
        self.lp_version_seen = self.lp.version();

        self.restore_cur_from_lp();

        let eps = self.settings.epsilon;
        self.fvec = SsVec::zeros(dim, eps);
        self.frhs = DenseVec::zeros(dim);
        self.copvec = SsVec::zeros(dim, eps);
        self.coprhs = DenseVec::zeros(dim);
        self.pvec = SsVec::zeros(n_matrix, eps);
        self.flo = vec![0.0; dim];
        self.fup = vec![0.0; dim];
        self.ftest = vec![0.0; dim];
        self.test = vec![f64::INFINITY; n_matrix];
        self.cotest = vec![f64::INFINITY; dim];
        self.qlo_m = vec![0.0; n_matrix];
        self.qup_m = vec![0.0; n_matrix];
        self.qlo_d = vec![0.0; dim];
        self.qup_d = vec![0.0; dim];
        self.matrix_is_basic = vec![false; n_matrix];
        self.dim_is_basic = vec![false; dim];
        self.the_shift = 0.0;
        self.iter_count = 0;
        self.enter_count = 0;
        self.leave_count = 0;
        self.degen_count = 0;
        self.primal_ray = None;
        self.dual_farkas = None;
        self.pricer.set_rep(self.rep);
        self.pricer.set_type(self.settings.algorithm);
        self.pricer.load(n_matrix, dim);

        if dim > 0 {
            self.factorize_with_repair()?;
        }
        self.compute_all();
        self.initialized = true;
        self.status = SolverStatus::Regular;
        Ok(())
    }

    fn restore_cur_from_lp(&mut self) {
        let n = self.lp.num_cols();
        let m = self.lp.num_rows();
        self.cur_lo = (0..n).map(|j| self.lp.lower(j)).collect();
        self.cur_up = (0..n).map(|j| self.lp.upper(j)).collect();
        self.cur_lhs = (0..m).map(|i| self.lp.lhs(i)).collect();
        self.cur_rhs = (0..m).map(|i| self.lp.rhs(i)).collect();
        self.the_shift = 0.0;
    }

    /// Factorize; on singularity, repair by swapping offending basis
    /// entries for slack-side units once, then fail hard.
    fn factorize_with_repair(&mut self) -> KernelResult<()> {
        match self.basis.factorize(&self.lp) {
            Ok(()) => Ok(()),
            Err(KernelError::SingularBasis) => {
                warn!("singular basis, falling back to the slack basis");
                self.basis.load_slack_basis(&self.lp, self.rep);
                self.basis.factorize(&self.lp).map_err(|e| {
                    self.status = SolverStatus::Singular;
                    e
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Recompute every state vector from the factorized basis.
    pub(crate) fn compute_all(&mut self) {
        let dim = self.dim();
        let n_matrix = self.n_matrix();

        for k in 0..n_matrix {
            self.matrix_is_basic[k] = self.basis.is_basic(self.matrix_id(k));
        }
        for k in 0..dim {
            self.dim_is_basic[k] = self.basis.is_basic(self.dim_id(k));
        }

        // Right-hand side of the basic system.
        self.frhs.clear();
        if self.rep == Representation::Row {
            for j in 0..self.lp.num_cols() {
                self.frhs[j] = self.lp.max_obj(j);
            }
        }
        for i in 0..self.lp.num_rows() {
            let id = Id::Row(i);
            if !self.basis.is_basic(id) {
                let v = self.nb_value(id);
                if v != 0.0 {
                    self.frhs.mult_add_sparse(-v, &base_vector(&self.lp, self.rep, id));
                }
            }
        }
        for j in 0..self.lp.num_cols() {
            let id = Id::Col(j);
            if !self.basis.is_basic(id) {
                let v = self.nb_value(id);
                if v != 0.0 {
                    self.frhs.mult_add_sparse(-v, &base_vector(&self.lp, self.rep, id));
                }
            }
        }

        if dim > 0 {
            {
                let vals = self.fvec.alt_values();
                self.basis.factor.solve_right(self.frhs.as_slice(), vals);
            }
            self.fvec.setup();
        }

        // Co-state.
        for pos in 0..dim {
            self.coprhs[pos] = self.pin_value(self.basis.base_id(pos));
        }
        if dim > 0 {
            {
                let vals = self.copvec.alt_values();
                self.basis.factor.solve_left(self.coprhs.as_slice(), vals);
            }
            self.copvec.setup();
        }

        // Pricing vector over the matrix side: in both representations
        // it is the product of the co-state with the other orientation
        // of the matrix.
        {
            let mut z = self.copvec.clone();
            let mut pv = std::mem::replace(&mut self.pvec, SsVec::zeros(0, self.settings.epsilon));
            let set = match self.rep {
                Representation::Column => self.lp.rows(),
                Representation::Row => self.lp.cols(),
            };
            pv.assign_product_and_setup(set, &mut z);
            pv.setup();
            self.pvec = pv;
        }

        // Boxes and tests.
        for k in 0..n_matrix {
            let id = self.matrix_id(k);
            let (lo, up) = self.q_box(id);
            self.qlo_m[k] = lo;
            self.qup_m[k] = up;
            self.refresh_test(id);
        }
        for k in 0..dim {
            let id = self.dim_id(k);
            let (lo, up) = self.q_box(id);
            self.qlo_d[k] = lo;
            self.qup_d[k] = up;
            self.refresh_test(id);
        }
        for pos in 0..dim {
            self.refresh_f_bounds(pos);
        }
    }

    /// Pinned co-state value of a basic id (`coprhs` entry).
    fn pin_value(&self, id: Id) -> f64 {
        match self.rep {
            Representation::Column => self.cost(id),
            Representation::Row => match (id, self.basis.desc.status(id)) {
                (Id::Row(i), Status::POnLower) => self.cur_rhs[i],
                (Id::Row(i), Status::POnUpper) => self.cur_lhs[i],
                (Id::Row(i), Status::PFixed) => self.cur_lhs[i],
                (Id::Row(_), _) => 0.0,
                (Id::Col(j), Status::POnLower) => self.cur_lo[j],
                (Id::Col(j), Status::POnUpper) => self.cur_up[j],
                (Id::Col(j), Status::PFixed) => self.cur_lo[j],
                (Id::Col(_), _) => 0.0,
            },
        }
    }

    // ------------------------------------------------------------------
    // Shifting.

    /// Make the f-side feasible by shifting violated bounds onto the
    /// current basic values. A tiny randomized margin breaks ties.
    pub(crate) fn shift_f_side(&mut self) {
        for pos in 0..self.dim() {
            let v = self.fvec.get(pos);
            if v < self.flo[pos] {
                let margin = self.rng.range(0.0, self.settings.delta);
                self.apply_f_shift(pos, v - margin, true);
            } else if v > self.fup[pos] {
                let margin = self.rng.range(0.0, self.settings.delta);
                self.apply_f_shift(pos, v + margin, false);
            }
        }
    }

    /// Shift the bound behind basis position `pos` to `new_bound`.
    pub(crate) fn apply_f_shift(&mut self, pos: usize, new_bound: f64, lower_side: bool) {
        let id = self.basis.base_id(pos);
        let old = if lower_side { self.flo[pos] } else { self.fup[pos] };
        if old.is_finite() {
            self.the_shift += (old - new_bound).abs();
        } else {
            return;
        }
        match (self.rep, id) {
            (Representation::Column, Id::Col(j)) => {
                if lower_side {
                    self.cur_lo[j] = new_bound;
                } else {
                    self.cur_up[j] = new_bound;
                }
            }
            (Representation::Column, Id::Row(i)) => {
                // Slack box is [-rhs, -lhs].
                if lower_side {
                    self.cur_rhs[i] = -new_bound;
                } else {
                    self.cur_lhs[i] = -new_bound;
                }
            }
            // Row representation f-side boxes derive from statuses; widen
            // through the quantity boxes instead.
            (Representation::Row, _) => {}
        }
        if lower_side {
            self.flo[pos] = new_bound;
        } else {
            self.fup[pos] = new_bound;
        }
        self.refresh_ftest(pos);
    }

    /// Make the test side feasible by widening violated quantity boxes.
    pub(crate) fn shift_q_side(&mut self) {
        for k in 0..self.n_matrix() {
            let id = self.matrix_id(k);
            if self.basis.is_basic(id) {
                continue;
            }
            let q = self.quantity(id);
            let margin = self.rng.range(0.0, self.settings.delta);
            if q < self.qlo_m[k] {
                self.the_shift += self.qlo_m[k] - q + margin;
                self.qlo_m[k] = q - margin;
            } else if q > self.qup_m[k] {
                self.the_shift += q - self.qup_m[k] + margin;
                self.qup_m[k] = q + margin;
            }
            self.test[k] = box_slack(q, self.qlo_m[k], self.qup_m[k]);
        }
        for k in 0..self.dim() {
            let id = self.dim_id(k);
            if self.basis.is_basic(id) {
                continue;
            }
            let q = self.quantity(id);
            let margin = self.rng.range(0.0, self.settings.delta);
            if q < self.qlo_d[k] {
                self.the_shift += self.qlo_d[k] - q + margin;
                self.qlo_d[k] = q - margin;
            } else if q > self.qup_d[k] {
                self.the_shift += q - self.qup_d[k] + margin;
                self.qup_d[k] = q + margin;
            }
            self.cotest[k] = box_slack(q, self.qlo_d[k], self.qup_d[k]);
        }
    }

    /// Undo all shifting: restore pristine bounds and recompute.
    pub(crate) fn un_shift(&mut self) {
        if self.the_shift == 0.0 {
            return;
        }
        debug!("unshifting, accumulated shift {:.3e}", self.the_shift);
        self.restore_cur_from_lp();
        self.compute_all();
    }

    /// Anti-cycling perturbation: push every finite nonbasic bound
    /// outward by a small random amount and recompute the affected state.
    pub(crate) fn perturb(&mut self) {
        info!(
            "degeneracy guard: perturbing bounds after {} stalled pivots",
            self.degen_count
        );
        let lo = self.settings.perturb_min;
        let hi = self.settings.perturb_max;
        for j in 0..self.lp.num_cols() {
            if self.basis.is_basic(Id::Col(j)) {
                continue;
            }
            if self.cur_lo[j].is_finite() && self.cur_lo[j] != self.cur_up[j] {
                let d = self.rng.range(lo, hi);
                self.cur_lo[j] -= d;
                self.the_shift += d;
            }
            if self.cur_up[j].is_finite() && self.cur_lo[j] != self.cur_up[j] {
                let d = self.rng.range(lo, hi);
                self.cur_up[j] += d;
                self.the_shift += d;
            }
        }
        for i in 0..self.lp.num_rows() {
            if self.basis.is_basic(Id::Row(i)) {
                continue;
            }
            if self.cur_lhs[i].is_finite() && self.cur_lhs[i] != self.cur_rhs[i] {
                let d = self.rng.range(lo, hi);
                self.cur_lhs[i] -= d;
                self.the_shift += d;
            }
            if self.cur_rhs[i].is_finite() && self.cur_lhs[i] != self.cur_rhs[i] {
                let d = self.rng.range(lo, hi);
                self.cur_rhs[i] += d;
                self.the_shift += d;
            }
        }
        self.degen_count = 0;
        self.compute_all();
    }

    // ------------------------------------------------------------------
    // Iteration bookkeeping shared by both variants.

    /// Limit and interrupt checks; `None` means keep running.
    pub(crate) fn check_aborts(&mut self) -> Option<SolverStatus> {
        if let Some(flag) = &self.interrupt {
            if flag.load(Ordering::Relaxed) {
                return Some(SolverStatus::AbortTime);
            }
        }
        if let Some(limit) = self.settings.time_limit_ms {
            if self.start_time.elapsed().as_millis() as u64 > limit {
                return Some(SolverStatus::AbortTime);
            }
        }
        if let Some(limit) = self.settings.max_iters {
            if self.iter_count >= limit {
                return Some(SolverStatus::AbortIter);
            }
        }
        if let Some(limit) = self.settings.objective_limit {
            if self.internal_value() > limit {
                return Some(SolverStatus::AbortValue);
            }
        }
        None
    }

    /// Periodic refactorization: counts, stability, and drift control.
    pub(crate) fn maybe_refactorize(&mut self) -> KernelResult<()> {
        let due = self.basis.updates_since_factor() >= self.settings.refactor_interval
            || self.basis.factor.stability() < self.settings.min_stability
            || self.basis.state() != BasisState::Regular;
        if !due {
            return Ok(());
        }
        let old_fvec: Vec<f64> = self.fvec.values().to_vec();
        self.factorize_with_repair()?;
        self.compute_all();
        let drift = self
            .fvec
            .values()
            .iter()
            .zip(old_fvec.iter())
            .fold(0.0f64, |m, (a, b)| m.max((a - b).abs()));
        if drift > self.settings.delta {
            debug!("refactorization drift {:.3e} above tolerance", drift);
        }
        Ok(())
    }

    pub(crate) fn note_step(&mut self, step: f64) {
        if step.abs() <= DEGENERACY_EPS {
            self.degen_count += 1;
            if self.degen_count >= self.settings.max_cycle {
                self.perturb();
            }
        } else {
            self.degen_count = 0;
        }
    }

    // ------------------------------------------------------------------
    // Driver.

    /// Maximum violation on the basic (f) side.
    fn f_violation(&self) -> f64 {
        self.ftest.iter().fold(0.0f64, |m, &t| m.max(-t))
    }

    /// Maximum violation on the test side.
    fn q_violation(&self) -> f64 {
        let mut v = 0.0f64;
        for (k, &t) in self.test.iter().enumerate() {
            if !self.matrix_is_basic[k] {
                v = v.max(-t);
            }
        }
        for (k, &t) in self.cotest.iter().enumerate() {
            if !self.dim_is_basic[k] {
                v = v.max(-t);
            }
        }
        v
    }

    /// Run the simplex to a verdict.
    pub fn solve(&mut self) -> KernelResult<SolverStatus> {
        self.start_time = Instant::now();

        if self.lp.num_rows() == 0 && self.lp.num_cols() == 0 {
            self.status = SolverStatus::Optimal;
            return Ok(self.status);
        }

        if !self.initialized || self.lp_version_seen != self.lp.version() {
            self.initialize()?;
        }

        let mut alg = self.settings.algorithm;
        let mut alternations = 0usize;

        loop {
            // A phase needs a feasible start on the side its ratio test
            // maintains.
            match alg {
                AlgoType::Enter => self.shift_f_side(),
                AlgoType::Leave => self.shift_q_side(),
            }

            let result = match alg {
                AlgoType::Enter => self.enter_loop()?,
                AlgoType::Leave => self.leave_loop()?,
            };

            match result {
                PhaseResult::Abort(status) => {
                    self.status = status;
                    return Ok(status);
                }
                PhaseResult::Unbounded => {
                    if self.the_shift > self.settings.delta {
                        // Not trustworthy under shifted bounds: clean up,
                        // let the complementary phase repair feasibility,
                        // then revisit.
                        self.un_shift();
                        alternations += 1;
                        if alternations > MAX_ALTERNATIONS {
                            self.status = SolverStatus::Error;
                            return Ok(self.status);
                        }
                        let fv = self.f_violation();
                        let qv = self.q_violation();
                        if fv.max(qv) > self.settings.delta {
                            alg = if fv > qv { AlgoType::Leave } else { AlgoType::Enter };
                            self.pricer.set_type(alg);
                        }
                        continue;
                    }
                    self.status = match (self.rep, alg) {
                        (Representation::Column, AlgoType::Enter) => SolverStatus::Unbounded,
                        (Representation::Column, AlgoType::Leave) => SolverStatus::Infeasible,
                        (Representation::Row, AlgoType::Enter) => SolverStatus::Infeasible,
                        (Representation::Row, AlgoType::Leave) => SolverStatus::Unbounded,
                    };
                    return Ok(self.status);
                }
                PhaseResult::Done => {
                    self.un_shift();
                    let fv = self.f_violation();
                    let qv = self.q_violation();
                    if fv <= self.settings.delta && qv <= self.settings.delta {
                        self.status = SolverStatus::Optimal;
                        info!(
                            "optimal after {} iterations ({} entering, {} leaving)",
                            self.iter_count, self.enter_count, self.leave_count
                        );
                        return Ok(self.status);
                    }
                    alternations += 1;
                    if alternations > MAX_ALTERNATIONS {
                        warn!(
                            "alternation budget exhausted (violations {:.3e}/{:.3e})",
                            fv, qv
                        );
                        self.status = SolverStatus::Error;
                        return Ok(self.status);
                    }
                    // Address the side that is still violated.
                    alg = if fv > qv { AlgoType::Leave } else { AlgoType::Enter };
                    self.pricer.set_type(alg);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Solution queries.

    /// Objective value in the internal maximization sense.
    pub(crate) fn internal_value(&self) -> f64 {
        match self.rep {
            Representation::Column => {
                let mut v = 0.0;
                for j in 0..self.lp.num_cols() {
                    let id = Id::Col(j);
                    let x = match self.basis.pos_of(id) {
                        NO_POS => self.nb_value(id),
                        pos => self.fvec.get(pos),
                    };
                    v += self.lp.max_obj(j) * x;
                }
                v
            }
            Representation::Row => {
                let mut v = 0.0;
                for j in 0..self.lp.num_cols() {
                    v += self.lp.max_obj(j) * self.copvec.get(j);
                }
                v
            }
        }
    }

    /// Objective value in the caller's sense.
    pub fn value(&self) -> f64 {
        self.lp.external_value(self.internal_value())
    }

    /// Primal solution (length `num_cols`).
    pub fn get_primal(&self, x: &mut [f64]) {
        debug_assert_eq!(x.len(), self.lp.num_cols());
        match self.rep {
            Representation::Column => {
                for (j, slot) in x.iter_mut().enumerate() {
                    let id = Id::Col(j);
                    *slot = match self.basis.pos_of(id) {
                        NO_POS => self.nb_value(id),
                        pos => self.fvec.get(pos),
                    };
                }
            }
            Representation::Row => {
                for (j, slot) in x.iter_mut().enumerate() {
                    *slot = self.copvec.get(j);
                }
            }
        }
    }

    /// Row activities `A x` (length `num_rows`).
    pub fn get_slacks(&self, s: &mut [f64]) {
        debug_assert_eq!(s.len(), self.lp.num_rows());
        match self.rep {
            Representation::Column => {
                for (i, slot) in s.iter_mut().enumerate() {
                    let id = Id::Row(i);
                    // The slack variable carries -activity.
                    *slot = -match self.basis.pos_of(id) {
                        NO_POS => self.nb_value(id),
                        pos => self.fvec.get(pos),
                    };
                }
            }
            Representation::Row => {
                for (i, slot) in s.iter_mut().enumerate() {
                    *slot = self.pvec.get(i);
                }
            }
        }
    }

    /// Dual values in the internal maximization convention.
    pub fn get_dual_internal(&self, y: &mut [f64]) {
        debug_assert_eq!(y.len(), self.lp.num_rows());
        match self.rep {
            Representation::Column => {
                for (i, slot) in y.iter_mut().enumerate() {
                    *slot = self.copvec.get(i);
                }
            }
            Representation::Row => {
                for (i, slot) in y.iter_mut().enumerate() {
                    let id = Id::Row(i);
                    *slot = match self.basis.pos_of(id) {
                        NO_POS => 0.0,
                        pos => self.fvec.get(pos),
                    };
                }
            }
        }
    }

    /// Reduced costs in the internal maximization convention.
    pub fn get_reduced_cost_internal(&self, d: &mut [f64]) {
        debug_assert_eq!(d.len(), self.lp.num_cols());
        match self.rep {
            Representation::Column => {
                for (j, slot) in d.iter_mut().enumerate() {
                    let id = Id::Col(j);
                    *slot = if self.basis.is_basic(id) {
                        0.0
                    } else {
                        self.quantity(id)
                    };
                }
            }
            Representation::Row => {
                for (j, slot) in d.iter_mut().enumerate() {
                    let id = Id::Col(j);
                    *slot = match self.basis.pos_of(id) {
                        NO_POS => 0.0,
                        pos => self.fvec.get(pos),
                    };
                }
            }
        }
    }

    /// Dual solution (length `num_rows`), in the caller's sense.
    pub fn get_dual(&self, y: &mut [f64]) {
        self.get_dual_internal(y);
        if self.lp.sense() == crate::settings::Sense::Minimize {
            for slot in y.iter_mut() {
                *slot = -*slot;
            }
        }
    }

    /// Reduced costs (length `num_cols`), in the caller's sense.
    pub fn get_reduced_cost(&self, d: &mut [f64]) {
        self.get_reduced_cost_internal(d);
        if self.lp.sense() == crate::settings::Sense::Minimize {
            for slot in d.iter_mut() {
                *slot = -*slot;
            }
        }
    }

    /// Primal unbounded ray, when the last solve ended `Unbounded`.
    pub fn get_primal_ray(&self) -> Option<&[f64]> {
        self.primal_ray.as_deref()
    }

    /// Dual Farkas certificate, when the last solve ended `Infeasible`.
    pub fn get_dual_farkas(&self) -> Option<&[f64]> {
        self.dual_farkas.as_deref()
    }

    pub(crate) fn set_primal_ray(&mut self, ray: Vec<f64>) {
        self.primal_ray = Some(ray);
    }

    pub(crate) fn set_dual_farkas(&mut self, y: Vec<f64>) {
        self.dual_farkas = Some(y);
    }

    /// Export the basis as external tags.
    pub fn get_basis(&self) -> (Vec<VarStatusTag>, Vec<VarStatusTag>) {
        self.basis.get_basis(&self.lp)
    }

    /// Install a basis from external tags; the next solve warm-starts
    /// from it.
    pub fn set_basis(
        &mut self,
        rows: &[VarStatusTag],
        cols: &[VarStatusTag],
    ) -> KernelResult<()> {
        self.rep = self.settings.representation;
        self.basis.load_slack_basis(&self.lp, self.rep);
        self.basis.set_basis(&self.lp, rows, cols)?;
        self.initialized = false;
        self.lp_version_seen = self.lp.version();
        Ok(())
    }

    /// Direct descriptor install (used by the refinement layer).
    pub fn set_desc(&mut self, desc: Desc) -> KernelResult<()> {
        self.rep = self.settings.representation;
        self.basis.load_desc(&self.lp, self.rep, desc)?;
        self.initialized = false;
        self.lp_version_seen = self.lp.version();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation pass-through (invalidates the prepared state).

    pub fn change_bounds(&mut self, j: usize, lo: f64, up: f64) -> KernelResult<()> {
        self.lp.change_bounds(j, lo, up)?;
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }

    pub fn change_sides(&mut self, i: usize, lhs: f64, rhs: f64) -> KernelResult<()> {
        self.lp.change_sides(i, lhs, rhs)?;
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }

    pub fn change_obj(&mut self, j: usize, obj: f64) -> KernelResult<()> {
        self.lp.change_obj(j, obj)?;
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }

    pub fn change_max_obj(&mut self, j: usize, obj: f64) -> KernelResult<()> {
        self.lp.change_max_obj(j, obj)?;
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }

    pub fn change_element(&mut self, i: usize, j: usize, v: f64) -> KernelResult<()> {
        self.lp.change_element(i, j, v)?;
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }

    pub fn add_row(&mut self, coeffs: &SparseVec, lhs: f64, rhs: f64) -> KernelResult<()> {
        self.lp.add_row(coeffs, lhs, rhs)?;
        self.basis.rematch_dimensions(&self.lp);
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }

    pub fn add_col(
        &mut self,
        coeffs: &SparseVec,
        obj: f64,
        lo: f64,
        up: f64,
    ) -> KernelResult<()> {
        self.lp.add_col(coeffs, obj, lo, up)?;
        self.basis.rematch_dimensions(&self.lp);
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }

    pub fn remove_row(&mut self, i: usize) -> KernelResult<()> {
        self.lp.remove_row(i)?;
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }

    pub fn remove_col(&mut self, j: usize) -> KernelResult<()> {
        self.lp.remove_col(j)?;
        self.initialized = false;
        self.basis.factor.clear();
        Ok(())
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("rows", &self.lp.num_rows())
            .field("cols", &self.lp.num_cols())
            .field("rep", &self.rep)
            .field("status", &self.status)
            .field("iters", &self.iter_count)
            .field("shift", &self.the_shift)
            .finish()
    }
}
