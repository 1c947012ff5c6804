//! Basis descriptor and factorization management.
//!
//! The descriptor assigns every row and column a status whose sign
//! decides basic membership: statuses with the same sign as the active
//! representation are basic. In `Column` representation the `D*` statuses
//! (positive) mark basic entries; in `Row` representation the `P*`
//! statuses (negative) do. Exactly `dim` entries are basic, where `dim`
//! is the row count in column representation and the column count in row
//! representation.

use log::warn;

use crate::error::{KernelError, KernelResult};
use crate::linalg::lu::LuStatus;
use crate::linalg::{FactorLu, SparseVec, SsVec};
use crate::problem::LpProblem;
use crate::settings::{Representation, UpdateMode};

/// Marker for "not in the basis" in the position maps.
pub const NO_POS: usize = usize::MAX;

/// Row or column identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Id {
    Row(usize),
    Col(usize),
}

impl Id {
    pub fn is_row(self) -> bool {
        matches!(self, Id::Row(_))
    }

    pub fn index(self) -> usize {
        match self {
            Id::Row(i) | Id::Col(i) => i,
        }
    }
}

/// Descriptor status of a single row or column.
///
/// The numeric values make `status as i32 * rep.sign() > 0` the basic
/// test. `P*` statuses describe a nonbasic primal position (in column
/// representation); `D*` statuses record the bound pattern relevant to
/// the dual value of a basic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    /// Fixed at coinciding bounds.
    PFixed = -6,
    /// Sitting at its lower bound.
    POnLower = -4,
    /// Sitting at its upper bound.
    POnUpper = -2,
    /// Free and sitting at zero.
    PFree = -1,
    /// Basic; fixed entry, dual value unrestricted.
    DFree = 1,
    /// Basic; only the upper bound is finite.
    DOnUpper = 2,
    /// Basic; only the lower bound is finite.
    DOnLower = 4,
    /// Basic; both bounds finite.
    DOnBoth = 6,
    /// Basic; no finite bounds, dual value pinned to zero.
    DUndefined = 8,
}

impl Status {
    /// Basic under the given representation?
    pub fn is_basic(self, rep: Representation) -> bool {
        (self as i32) * rep.sign() > 0
    }
}

/// Externally visible basis tag, used by `get_basis`/`set_basis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum VarStatusTag {
    OnLower = 0,
    OnUpper = 1,
    Fixed = 2,
    Zero = 3,
    Basic = 4,
}

/// Dual-side status for an entry with the given finite-bound pattern.
pub fn dual_status(lower: f64, upper: f64) -> Status {
    match (lower.is_finite(), upper.is_finite()) {
        (false, false) => Status::DUndefined,
        (true, true) if lower == upper => Status::DFree,
        (true, true) => Status::DOnBoth,
        (true, false) => Status::DOnLower,
        (false, true) => Status::DOnUpper,
    }
}

/// Preferred nonbasic status for an entry with the given bounds: the
/// finite bound closest to zero, lower bound on ties.
pub fn preferred_status(lower: f64, upper: f64) -> Status {
    match (lower.is_finite(), upper.is_finite()) {
        (false, false) => Status::PFree,
        (true, true) if lower == upper => Status::PFixed,
        (true, true) => {
            if upper.abs() < lower.abs() {
                Status::POnUpper
            } else {
                Status::POnLower
            }
        }
        (true, false) => Status::POnLower,
        (false, true) => Status::POnUpper,
    }
}

/// Per-row and per-column status table.
#[derive(Debug, Clone, Default)]
pub struct Desc {
    pub row_status: Vec<Status>,
    pub col_status: Vec<Status>,
}

impl Desc {
    pub fn status(&self, id: Id) -> Status {
        match id {
            Id::Row(i) => self.row_status[i],
            Id::Col(j) => self.col_status[j],
        }
    }

    pub fn set_status(&mut self, id: Id, s: Status) {
        match id {
            Id::Row(i) => self.row_status[i] = s,
            Id::Col(j) => self.col_status[j] = s,
        }
    }

    /// Count of basic entries under the given representation.
    pub fn num_basic(&self, rep: Representation) -> usize {
        self.row_status
            .iter()
            .chain(self.col_status.iter())
            .filter(|s| s.is_basic(rep))
            .count()
    }

    /// Debug validation: exactly `dim` basic entries.
    #[cfg(debug_assertions)]
    pub fn is_consistent(&self, rep: Representation, dim: usize) -> bool {
        self.num_basic(rep) == dim
    }
}

/// Lifecycle of the basis relative to the loaded problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisState {
    /// No problem loaded.
    NoProblem,
    /// Problem loaded, basis not factorized yet.
    Unknown,
    /// Last factorization failed.
    Singular,
    /// Factorized and usable.
    Regular,
}

/// Basis: descriptor, position maps, and the LU factorization of the
/// basis matrix.
#[derive(Debug)]
pub struct Basis {
    pub desc: Desc,
    /// Basis position to id.
    base_ids: Vec<Id>,
    /// Row id to basis position (or `NO_POS`).
    row_pos: Vec<usize>,
    /// Column id to basis position (or `NO_POS`).
    col_pos: Vec<usize>,
    pub factor: FactorLu,
    rep: Representation,
    state: BasisState,
    /// Updates absorbed since the last factorization.
    updates: usize,
}

/// The basis-matrix column associated with an id: the LP column (plus
/// slack units) in column representation, the LP row (plus unit columns)
/// in row representation.
pub fn base_vector(lp: &LpProblem, rep: Representation, id: Id) -> SparseVec {
    match (rep, id) {
        (Representation::Column, Id::Col(j)) => lp.col(j).clone(),
        (Representation::Column, Id::Row(i)) => SparseVec::unit(i),
        (Representation::Row, Id::Row(i)) => lp.row(i).clone(),
        (Representation::Row, Id::Col(j)) => SparseVec::unit(j),
    }
}

impl Basis {
    pub fn new(update_mode: UpdateMode, markowitz_floor: f64, min_stability: f64) -> Self {
        Self {
            desc: Desc::default(),
            base_ids: Vec::new(),
            row_pos: Vec::new(),
            col_pos: Vec::new(),
            factor: FactorLu::new(update_mode, markowitz_floor, min_stability),
            rep: Representation::Column,
            state: BasisState::NoProblem,
            updates: 0,
        }
    }

    pub fn state(&self) -> BasisState {
        self.state
    }

    pub fn rep(&self) -> Representation {
        self.rep
    }

    /// Basis dimension: row count in column representation, column count
    /// in row representation.
    pub fn dim(&self) -> usize {
        self.base_ids.len()
    }

    pub fn base_id(&self, pos: usize) -> Id {
        self.base_ids[pos]
    }

    /// Basis position of an id, or `NO_POS`.
    pub fn pos_of(&self, id: Id) -> usize {
        match id {
            Id::Row(i) => self.row_pos[i],
            Id::Col(j) => self.col_pos[j],
        }
    }

    pub fn is_basic(&self, id: Id) -> bool {
        self.pos_of(id) != NO_POS
    }

    pub fn updates_since_factor(&self) -> usize {
        self.updates
    }

    /// Install the all-slack default basis for the problem.
    ///
    /// In column representation every row is basic; in row representation
    /// every column is. Nonbasic entries rest at their preferred bound.
    pub fn load_slack_basis(&mut self, lp: &LpProblem, rep: Representation) {
        self.rep = rep;
        let m = lp.num_rows();
        let n = lp.num_cols();
        self.desc.row_status.clear();
        self.desc.col_status.clear();
        self.base_ids.clear();
        self.row_pos = vec![NO_POS; m];
        self.col_pos = vec![NO_POS; n];

        match rep {
            Representation::Column => {
                for i in 0..m {
                    // Slack bounds are [-rhs, -lhs].
                    self.desc
                        .row_status
                        .push(dual_status(-lp.rhs(i), -lp.lhs(i)));
                    self.row_pos[i] = self.base_ids.len();
                    self.base_ids.push(Id::Row(i));
                }
                for j in 0..n {
                    self.desc
                        .col_status
                        .push(preferred_status(lp.lower(j), lp.upper(j)));
                }
            }
            Representation::Row => {
                for i in 0..m {
                    self.desc
                        .row_status
                        .push(preferred_status(-lp.rhs(i), -lp.lhs(i)));
                }
                for j in 0..n {
                    self.desc
                        .col_status
                        .push(preferred_status(lp.lower(j), lp.upper(j)));
                    self.col_pos[j] = self.base_ids.len();
                    self.base_ids.push(Id::Col(j));
                }
            }
        }
        self.factor.clear();
        self.updates = 0;
        self.state = if m == 0 && n == 0 {
            BasisState::NoProblem
        } else {
            BasisState::Unknown
        };
    }

    /// Rebuild position maps and base ids from the descriptor. Fails when
    /// the number of basic entries does not match the dimension.
    pub fn load_desc(&mut self, lp: &LpProblem, rep: Representation, desc: Desc) -> KernelResult<()> {
        let dim = match rep {
            Representation::Column => lp.num_rows(),
            Representation::Row => lp.num_cols(),
        };
        let basic = desc.num_basic(rep);
        if basic != dim {
            return Err(KernelError::InvalidBasis(format!(
                "{basic} basic entries, expected {dim}"
            )));
        }
        self.rep = rep;
        self.desc = desc;
        self.base_ids.clear();
        self.row_pos = vec![NO_POS; lp.num_rows()];
        self.col_pos = vec![NO_POS; lp.num_cols()];
        for i in 0..lp.num_rows() {
            if self.desc.row_status[i].is_basic(rep) {
                self.row_pos[i] = self.base_ids.len();
                self.base_ids.push(Id::Row(i));
            }
        }
        for j in 0..lp.num_cols() {
            if self.desc.col_status[j].is_basic(rep) {
                self.col_pos[j] = self.base_ids.len();
                self.base_ids.push(Id::Col(j));
            }
        }
        self.factor.clear();
        self.updates = 0;
        self.state = BasisState::Unknown;
        Ok(())
    }

    /// Factorize the current basis matrix.
    pub fn factorize(&mut self, lp: &LpProblem) -> KernelResult<()> {
        let cols: Vec<SparseVec> = self
            .base_ids
            .iter()
            .map(|&id| base_vector(lp, self.rep, id))
            .collect();
        match self.factor.load(&cols) {
            LuStatus::Ok => {
                self.updates = 0;
                self.state = BasisState::Regular;
                Ok(())
            }
            LuStatus::Singular => {
                self.state = BasisState::Singular;
                Err(KernelError::SingularBasis)
            }
        }
    }

    /// Exchange the basis entry at `pos` for `enter_id`, whose basis
    /// column is `enter_vec`. The descriptor statuses of both ids must
    /// already be set by the caller. Returns the leaving id.
    pub fn change(
        &mut self,
        pos: usize,
        enter_id: Id,
        enter_vec: &SparseVec,
    ) -> KernelResult<Id> {
        let leave_id = self.base_ids[pos];
        match leave_id {
            Id::Row(i) => self.row_pos[i] = NO_POS,
            Id::Col(j) => self.col_pos[j] = NO_POS,
        }
        match enter_id {
            Id::Row(i) => self.row_pos[i] = pos,
            Id::Col(j) => self.col_pos[j] = pos,
        }
        self.base_ids[pos] = enter_id;
        self.updates += 1;
        match self.factor.change(pos, enter_vec) {
            LuStatus::Ok => Ok(leave_id),
            LuStatus::Singular => {
                warn!("basis update produced a singular factorization, refactorizing");
                self.state = BasisState::Unknown;
                Err(KernelError::SingularBasis)
            }
        }
    }

    /// Solve `B x = b` into a semi-sparse result.
    pub fn solve_for_update(&mut self, b: &SparseVec, x: &mut SsVec) {
        self.factor.solve_right_for_update(b, x);
    }

    /// Solve `rho^T B = e_pos^T` into a semi-sparse result.
    pub fn solve_left_unit(&mut self, pos: usize, x: &mut SsVec) {
        self.factor.solve_left_unit(pos, x);
    }

    /// Export the descriptor as external tags.
    pub fn get_basis(&self, lp: &LpProblem) -> (Vec<VarStatusTag>, Vec<VarStatusTag>) {
        let tag = |s: Status, lo: f64, up: f64| -> VarStatusTag {
            if s.is_basic(self.rep) {
                VarStatusTag::Basic
            } else {
                match s {
                    Status::POnLower => VarStatusTag::OnLower,
                    Status::POnUpper => VarStatusTag::OnUpper,
                    Status::PFixed => VarStatusTag::Fixed,
                    Status::PFree => VarStatusTag::Zero,
                    // Nonbasic D status (row representation): derive from
                    // the bound pattern.
                    _ => {
                        if lo == up && lo.is_finite() {
                            VarStatusTag::Fixed
                        } else if lo.is_finite() {
                            VarStatusTag::OnLower
                        } else if up.is_finite() {
                            VarStatusTag::OnUpper
                        } else {
                            VarStatusTag::Zero
                        }
                    }
                }
            }
        };
        let rows = (0..lp.num_rows())
            .map(|i| tag(self.desc.row_status[i], -lp.rhs(i), -lp.lhs(i)))
            .collect();
        let cols = (0..lp.num_cols())
            .map(|j| tag(self.desc.col_status[j], lp.lower(j), lp.upper(j)))
            .collect();
        (rows, cols)
    }

    /// Install a basis from external tags.
    pub fn set_basis(
        &mut self,
        lp: &LpProblem,
        rows: &[VarStatusTag],
        cols: &[VarStatusTag],
    ) -> KernelResult<()> {
        if rows.len() != lp.num_rows() || cols.len() != lp.num_cols() {
            return Err(KernelError::InvalidBasis(format!(
                "tag vectors sized {}/{}, expected {}/{}",
                rows.len(),
                cols.len(),
                lp.num_rows(),
                lp.num_cols()
            )));
        }
        // Basic entries carry the sign of the active representation;
        // nonbasic entries the opposite one.
        let rep = self.rep;
        let to_status = |t: VarStatusTag, lo: f64, up: f64| -> Status {
            match (rep, t) {
                (Representation::Column, VarStatusTag::Basic) => dual_status(lo, up),
                (Representation::Row, VarStatusTag::Basic) => preferred_status(lo, up),
                (Representation::Row, _) => dual_status(lo, up),
                (Representation::Column, VarStatusTag::OnLower) => Status::POnLower,
                (Representation::Column, VarStatusTag::OnUpper) => Status::POnUpper,
                (Representation::Column, VarStatusTag::Fixed) => Status::PFixed,
                (Representation::Column, VarStatusTag::Zero) => Status::PFree,
            }
        };
        let desc = Desc {
            row_status: rows
                .iter()
                .enumerate()
                .map(|(i, &t)| to_status(t, -lp.rhs(i), -lp.lhs(i)))
                .collect(),
            col_status: cols
                .iter()
                .enumerate()
                .map(|(j, &t)| to_status(t, lp.lower(j), lp.upper(j)))
                .collect(),
        };
        self.load_desc(lp, self.rep, desc)
    }

    /// Grow the descriptor after rows or columns were added to the
    /// problem; new entries default to nonbasic statuses.
    pub fn rematch_dimensions(&mut self, lp: &LpProblem) {
        while self.desc.row_status.len() < lp.num_rows() {
            let i = self.desc.row_status.len();
            self.desc
                .row_status
                .push(preferred_status(-lp.rhs(i), -lp.lhs(i)));
            self.row_pos.push(NO_POS);
        }
        while self.desc.col_status.len() < lp.num_cols() {
            let j = self.desc.col_status.len();
            self.desc
                .col_status
                .push(preferred_status(lp.lower(j), lp.upper(j)));
            self.col_pos.push(NO_POS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Sense;

    fn lp() -> LpProblem {
        let mut lp = LpProblem::new(Sense::Maximize);
        lp.add_col(&SparseVec::new(), 1.0, 0.0, f64::INFINITY).unwrap();
        lp.add_col(&SparseVec::new(), 1.0, 0.0, 2.0).unwrap();
        lp.add_row(&SparseVec::from_pairs(&[(0, 1.0), (1, 1.0)]), f64::NEG_INFINITY, 1.0)
            .unwrap();
        lp.add_row(&SparseVec::from_pairs(&[(0, 1.0)]), 0.0, 0.0).unwrap();
        lp
    }

    #[test]
    fn test_slack_basis_counts() {
        let lp = lp();
        let mut b = Basis::new(UpdateMode::Eta, 0.01, 1e-2);
        b.load_slack_basis(&lp, Representation::Column);
        assert_eq!(b.dim(), 2);
        assert_eq!(b.desc.num_basic(Representation::Column), 2);
        assert!(b.is_basic(Id::Row(0)));
        assert!(!b.is_basic(Id::Col(0)));
        b.factorize(&lp).unwrap();
        assert_eq!(b.state(), BasisState::Regular);
    }

    #[test]
    fn test_status_sign_convention() {
        assert!(Status::DOnBoth.is_basic(Representation::Column));
        assert!(!Status::POnLower.is_basic(Representation::Column));
        assert!(Status::POnLower.is_basic(Representation::Row));
        assert!(!Status::DOnBoth.is_basic(Representation::Row));
    }

    #[test]
    fn test_get_set_basis_roundtrip() {
        let lp = lp();
        let mut b = Basis::new(UpdateMode::Eta, 0.01, 1e-2);
        b.load_slack_basis(&lp, Representation::Column);
        let (rows, cols) = b.get_basis(&lp);
        assert_eq!(rows, vec![VarStatusTag::Basic, VarStatusTag::Basic]);
        assert_eq!(cols, vec![VarStatusTag::OnLower, VarStatusTag::OnLower]);

        b.set_basis(&lp, &rows, &cols).unwrap();
        let (rows2, cols2) = b.get_basis(&lp);
        assert_eq!(rows, rows2);
        assert_eq!(cols, cols2);
    }

    #[test]
    fn test_set_basis_wrong_count_rejected() {
        let lp = lp();
        let mut b = Basis::new(UpdateMode::Eta, 0.01, 1e-2);
        b.load_slack_basis(&lp, Representation::Column);
        let err = b.set_basis(
            &lp,
            &[VarStatusTag::Basic, VarStatusTag::OnLower],
            &[VarStatusTag::OnLower, VarStatusTag::OnLower],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_change_swaps_position_maps(){
        let lp = lp();
        let mut b = Basis::new(UpdateMode::Eta, 0.01, 1e-2);
        b.load_slack_basis(&lp, Representation::Column);
        b.factorize(&lp).unwrap();

        let enter = Id::Col(0);
        let vec = base_vector(&lp, Representation::Column, enter);
        b.desc.set_status(enter, dual_status(lp.lower(0), lp.upper(0)));
        b.desc.set_status(Id::Row(1), Status::POnLower);
        let left = b.change(1, enter, &vec).unwrap();
        assert_eq!(left, Id::Row(1));
        assert_eq!(b.pos_of(Id::Col(0)), 1);
        assert_eq!(b.pos_of(Id::Row(1)), NO_POS);
        assert_eq!(b.updates_since_factor(), 1);
    }
}
