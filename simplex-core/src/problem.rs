//! LP data model.
//!
//! The problem is
//!
//! ```text
//! maximize    c^T x
//! subject to  lhs <= A x <= rhs
//!             lo  <=  x  <= up
//! ```
//!
//! with infinite entries standing for absent sides or bounds. The matrix
//! is stored twice, by rows and by columns, so that both representations
//! of the simplex kernel can stream over their natural orientation.
//! Internally the objective is always kept in maximization form; the
//! original sense is recorded and honored by the solution queries.

use crate::error::{KernelError, KernelResult};
use crate::linalg::{DenseVec, SparseVec, VecSet};
use crate::settings::Sense;

/// Classification of a row's side pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeType {
    /// Both sides infinite.
    Free,
    /// Only the right side is finite (`Ax <= rhs`).
    LessEqual,
    /// Only the left side is finite (`Ax >= lhs`).
    GreaterEqual,
    /// Both finite, `lhs < rhs`.
    Ranged,
    /// Both finite and equal.
    Equality,
}

/// A row's activity range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowRange {
    pub lhs: f64,
    pub rhs: f64,
}

impl RowRange {
    /// Classify the side pattern.
    pub fn range_type(&self) -> RangeType {
        match (self.lhs.is_finite(), self.rhs.is_finite()) {
            (false, false) => RangeType::Free,
            (false, true) => RangeType::LessEqual,
            (true, false) => RangeType::GreaterEqual,
            (true, true) if self.lhs == self.rhs => RangeType::Equality,
            (true, true) => RangeType::Ranged,
        }
    }
}

/// In-memory LP in the solver's canonical maximization form.
#[derive(Debug, Clone)]
pub struct LpProblem {
    /// A by columns; member dimension is the row count.
    cols: VecSet,
    /// A by rows; member dimension is the column count.
    rows: VecSet,
    lhs: DenseVec,
    rhs: DenseVec,
    lower: DenseVec,
    upper: DenseVec,
    /// Objective in maximization form.
    max_obj: DenseVec,
    sense: Sense,
    /// Bumped on every mutation; lets owners detect staleness.
    version: u64,
}

impl LpProblem {
    /// Empty problem.
    pub fn new(sense: Sense) -> Self {
        Self {
            cols: VecSet::new(0),
            rows: VecSet::new(0),
            lhs: DenseVec::zeros(0),
            rhs: DenseVec::zeros(0),
            lower: DenseVec::zeros(0),
            upper: DenseVec::zeros(0),
            max_obj: DenseVec::zeros(0),
            sense,
            version: 0,
        }
    }

    /// Build from a sparse constraint matrix and dense side/bound/objective
    /// vectors. The matrix may be in either compressed orientation.
    pub fn from_csc(
        a: &sprs::CsMatI<f64, usize>,
        obj: &[f64],
        lhs: &[f64],
        rhs: &[f64],
        lower: &[f64],
        upper: &[f64],
        sense: Sense,
    ) -> KernelResult<Self> {
        let (m, n) = (a.rows(), a.cols());
        if obj.len() != n || lower.len() != n || upper.len() != n {
            return Err(KernelError::InvalidProblem(format!(
                "column vectors have lengths {}/{}/{}, expected {}",
                obj.len(),
                lower.len(),
                upper.len(),
                n
            )));
        }
        if lhs.len() != m || rhs.len() != m {
            return Err(KernelError::InvalidProblem(format!(
                "side vectors have lengths {}/{}, expected {}",
                lhs.len(),
                rhs.len(),
                m
            )));
        }

        let mut lp = Self::new(sense);
        for j in 0..n {
            lp.add_col(&SparseVec::new(), obj[j], lower[j], upper[j])?;
        }
        for i in 0..m {
            lp.add_row(&SparseVec::new(), lhs[i], rhs[i])?;
        }
        for (&v, (i, j)) in a.iter() {
            if v != 0.0 {
                lp.change_element(i, j, v)?;
            }
        }
        Ok(lp)
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.num()
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.cols.num()
    }

    /// Mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Objective sense as posed by the caller.
    pub fn sense(&self) -> Sense {
        self.sense
    }

    /// Row `i` of A.
    pub fn row(&self, i: usize) -> &SparseVec {
        self.rows.vec(i)
    }

    /// Column `j` of A.
    pub fn col(&self, j: usize) -> &SparseVec {
        self.cols.vec(j)
    }

    /// Row-wise view of A.
    pub fn rows(&self) -> &VecSet {
        &self.rows
    }

    /// Column-wise view of A.
    pub fn cols(&self) -> &VecSet {
        &self.cols
    }

    pub fn lhs(&self, i: usize) -> f64 {
        self.lhs[i]
    }

    pub fn rhs(&self, i: usize) -> f64 {
        self.rhs[i]
    }

    pub fn lower(&self, j: usize) -> f64 {
        self.lower[j]
    }

    pub fn upper(&self, j: usize) -> f64 {
        self.upper[j]
    }

    /// Side range of row `i`.
    pub fn row_range(&self, i: usize) -> RowRange {
        RowRange { lhs: self.lhs[i], rhs: self.rhs[i] }
    }

    /// Objective coefficient in maximization form.
    pub fn max_obj(&self, j: usize) -> f64 {
        self.max_obj[j]
    }

    /// Objective coefficient in the caller's sense.
    pub fn obj(&self, j: usize) -> f64 {
        match self.sense {
            Sense::Maximize => self.max_obj[j],
            Sense::Minimize => -self.max_obj[j],
        }
    }

    /// Convert an internal (maximization) objective value into the
    /// caller's sense.
    pub fn external_value(&self, internal: f64) -> f64 {
        match self.sense {
            Sense::Maximize => internal,
            Sense::Minimize => -internal,
        }
    }

    fn check_row(&self, i: usize) -> KernelResult<()> {
        if i >= self.num_rows() {
            return Err(KernelError::IndexOutOfRange { index: i, limit: self.num_rows() });
        }
        Ok(())
    }

    fn check_col(&self, j: usize) -> KernelResult<()> {
        if j >= self.num_cols() {
            return Err(KernelError::IndexOutOfRange { index: j, limit: self.num_cols() });
        }
        Ok(())
    }

    /// Append a row with coefficients over existing columns.
    pub fn add_row(&mut self, coeffs: &SparseVec, lhs: f64, rhs: f64) -> KernelResult<()> {
        let n = self.num_cols();
        for (j, _) in coeffs.iter() {
            if j >= n {
                return Err(KernelError::IndexOutOfRange { index: j, limit: n });
            }
        }
        let i = self.num_rows();
        self.rows.add(coeffs.clone());
        self.cols.re_dim(i + 1);
        for (j, v) in coeffs.iter() {
            self.cols.set_entry(j, i, v);
        }
        let m = i + 1;
        self.lhs.re_dim(m);
        self.rhs.re_dim(m);
        self.lhs[i] = lhs;
        self.rhs[i] = rhs;
        self.version += 1;
        Ok(())
    }

    /// Append a column with coefficients over existing rows. The
    /// objective coefficient is interpreted in the caller's sense.
    pub fn add_col(
        &mut self,
        coeffs: &SparseVec,
        obj: f64,
        lower: f64,
        upper: f64,
    ) -> KernelResult<()> {
        let m = self.num_rows();
        for (i, _) in coeffs.iter() {
            if i >= m {
                return Err(KernelError::IndexOutOfRange { index: i, limit: m });
            }
        }
        let j = self.num_cols();
        self.cols.add(coeffs.clone());
        self.rows.re_dim(j + 1);
        for (i, v) in coeffs.iter() {
            self.rows.set_entry(i, j, v);
        }
        let n = j + 1;
        self.lower.re_dim(n);
        self.upper.re_dim(n);
        self.max_obj.re_dim(n);
        self.lower[j] = lower;
        self.upper[j] = upper;
        self.max_obj[j] = match self.sense {
            Sense::Maximize => obj,
            Sense::Minimize => -obj,
        };
        self.version += 1;
        Ok(())
    }

    /// Remove row `i`; later rows shift down by one.
    pub fn remove_row(&mut self, i: usize) -> KernelResult<()> {
        self.check_row(i)?;
        let m = self.num_rows();
        // Shift the row list.
        let mut rows = std::mem::take(&mut self.rows);
        let mut new_rows = VecSet::new(rows.dim());
        for k in 0..m {
            let v = rows.vec(k).clone();
            if k != i {
                new_rows.add(v);
            }
        }
        rows = new_rows;
        self.rows = rows;
        // Re-index the column copies.
        for j in 0..self.num_cols() {
            let mut col = self.cols.vec(j).clone();
            col.remove_and_shift(i);
            self.cols.replace(j, col);
        }
        self.cols.re_dim(m - 1);
        // Shift sides.
        for k in i..m - 1 {
            self.lhs[k] = self.lhs[k + 1];
            self.rhs[k] = self.rhs[k + 1];
        }
        self.lhs.re_dim(m - 1);
        self.rhs.re_dim(m - 1);
        self.version += 1;
        Ok(())
    }

    /// Remove column `j`; later columns shift down by one.
    pub fn remove_col(&mut self, j: usize) -> KernelResult<()> {
        self.check_col(j)?;
        let n = self.num_cols();
        let mut cols = std::mem::take(&mut self.cols);
        let mut new_cols = VecSet::new(cols.dim());
        for k in 0..n {
            let v = cols.vec(k).clone();
            if k != j {
                new_cols.add(v);
            }
        }
        cols = new_cols;
        self.cols = cols;
        for i in 0..self.num_rows() {
            let mut row = self.rows.vec(i).clone();
            row.remove_and_shift(j);
            self.rows.replace(i, row);
        }
        self.rows.re_dim(n - 1);
        for k in j..n - 1 {
            self.lower[k] = self.lower[k + 1];
            self.upper[k] = self.upper[k + 1];
            self.max_obj[k] = self.max_obj[k + 1];
        }
        self.lower.re_dim(n - 1);
        self.upper.re_dim(n - 1);
        self.max_obj.re_dim(n - 1);
        self.version += 1;
        Ok(())
    }

    /// Change the objective coefficient of column `j` (caller's sense).
    pub fn change_obj(&mut self, j: usize, obj: f64) -> KernelResult<()> {
        self.check_col(j)?;
        self.max_obj[j] = match self.sense {
            Sense::Maximize => obj,
            Sense::Minimize => -obj,
        };
        self.version += 1;
        Ok(())
    }

    /// Change the objective coefficient in internal maximization form.
    pub fn change_max_obj(&mut self, j: usize, obj: f64) -> KernelResult<()> {
        self.check_col(j)?;
        self.max_obj[j] = obj;
        self.version += 1;
        Ok(())
    }

    /// Change the bounds of column `j`.
    pub fn change_bounds(&mut self, j: usize, lower: f64, upper: f64) -> KernelResult<()> {
        self.check_col(j)?;
        self.lower[j] = lower;
        self.upper[j] = upper;
        self.version += 1;
        Ok(())
    }

    /// Change the sides of row `i`.
    pub fn change_sides(&mut self, i: usize, lhs: f64, rhs: f64) -> KernelResult<()> {
        self.check_row(i)?;
        self.lhs[i] = lhs;
        self.rhs[i] = rhs;
        self.version += 1;
        Ok(())
    }

    /// Change a single matrix coefficient.
    pub fn change_element(&mut self, i: usize, j: usize, v: f64) -> KernelResult<()> {
        self.check_row(i)?;
        self.check_col(j)?;
        self.rows.set_entry(i, j, v);
        self.cols.set_entry(j, i, v);
        self.version += 1;
        Ok(())
    }

    /// Validate internal consistency (dimension agreement of the two
    /// matrix copies and bound ordering where both bounds are finite).
    pub fn validate(&self) -> KernelResult<()> {
        if self.rows.dim() != self.num_cols() {
            return Err(KernelError::Internal(
                "row copy dimension disagrees with column count".into(),
            ));
        }
        if self.cols.dim() != self.num_rows() {
            return Err(KernelError::Internal(
                "column copy dimension disagrees with row count".into(),
            ));
        }
        for j in 0..self.num_cols() {
            if self.lower[j] > self.upper[j] {
                return Err(KernelError::InvalidProblem(format!(
                    "column {} has lower bound {} > upper bound {}",
                    j, self.lower[j], self.upper[j]
                )));
            }
        }
        for i in 0..self.num_rows() {
            if self.lhs[i] > self.rhs[i] {
                return Err(KernelError::InvalidProblem(format!(
                    "row {} has lhs {} > rhs {}",
                    i, self.lhs[i], self.rhs[i]
                )));
            }
        }
        Ok(())
    }

    /// Row activities `A x` for a given primal point.
    pub fn activities(&self, x: &[f64]) -> Vec<f64> {
        let mut act = vec![0.0; self.num_rows()];
        for (i, a) in act.iter_mut().enumerate() {
            *a = self.rows.vec(i).dot_slice(x);
        }
        act
    }

    /// Internal (maximization) objective value of a primal point.
    pub fn objective_internal(&self, x: &[f64]) -> f64 {
        x.iter()
            .enumerate()
            .map(|(j, &v)| self.max_obj[j] * v)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_lp() -> LpProblem {
        // max x0 + 2 x1  s.t.  1 <= x0 + x1 <= 4, x0 - x1 <= 2, x >= 0
        let mut lp = LpProblem::new(Sense::Maximize);
        lp.add_col(&SparseVec::new(), 1.0, 0.0, f64::INFINITY).unwrap();
        lp.add_col(&SparseVec::new(), 2.0, 0.0, f64::INFINITY).unwrap();
        lp.add_row(&SparseVec::from_pairs(&[(0, 1.0), (1, 1.0)]), 1.0, 4.0)
            .unwrap();
        lp.add_row(
            &SparseVec::from_pairs(&[(0, 1.0), (1, -1.0)]),
            f64::NEG_INFINITY,
            2.0,
        )
        .unwrap();
        lp
    }

    #[test]
    fn test_dual_storage_agrees() {
        let lp = small_lp();
        assert_eq!(lp.num_rows(), 2);
        assert_eq!(lp.num_cols(), 2);
        assert_eq!(lp.row(0).get(1), 1.0);
        assert_eq!(lp.col(1).get(0), 1.0);
        assert_eq!(lp.col(1).get(1), -1.0);
        lp.validate().unwrap();
    }

    #[test]
    fn test_range_types() {
        let lp = small_lp();
        assert_eq!(lp.row_range(0).range_type(), RangeType::Ranged);
        assert_eq!(lp.row_range(1).range_type(), RangeType::LessEqual);
    }

    #[test]
    fn test_minimize_flips_internal_objective() {
        let mut lp = LpProblem::new(Sense::Minimize);
        lp.add_col(&SparseVec::new(), 3.0, 0.0, 1.0).unwrap();
        assert_eq!(lp.max_obj(0), -3.0);
        assert_eq!(lp.obj(0), 3.0);
        assert_eq!(lp.external_value(-3.0), 3.0);
    }

    #[test]
    fn test_change_element_updates_both_copies() {
        let mut lp = small_lp();
        let v0 = lp.version();
        lp.change_element(1, 1, 5.0).unwrap();
        assert_eq!(lp.row(1).get(1), 5.0);
        assert_eq!(lp.col(1).get(1), 5.0);
        assert!(lp.version() > v0);
    }

    #[test]
    fn test_remove_row_shifts_indices() {
        let mut lp = small_lp();
        lp.remove_row(0).unwrap();
        assert_eq!(lp.num_rows(), 1);
        assert_eq!(lp.row(0).get(0), 1.0);
        assert_eq!(lp.row(0).get(1), -1.0);
        assert_eq!(lp.col(0).get(0), 1.0);
        lp.validate().unwrap();
    }

    #[test]
    fn test_from_csc_roundtrip() {
        let mut tri = sprs::TriMat::new((2, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, 1.0);
        tri.add_triplet(1, 0, 1.0);
        tri.add_triplet(1, 1, -1.0);
        let a = tri.to_csc();
        let lp = LpProblem::from_csc(
            &a,
            &[1.0, 2.0],
            &[1.0, f64::NEG_INFINITY],
            &[4.0, 2.0],
            &[0.0, 0.0],
            &[f64::INFINITY, f64::INFINITY],
            Sense::Maximize,
        )
        .unwrap();
        assert_eq!(lp.row(1).get(1), -1.0);
        assert_eq!(lp.col(1).get(1), -1.0);
    }
}
