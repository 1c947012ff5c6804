//! The exact domain: conversions and the rational LP copy.
//!
//! The refinement loop owns a second copy of the problem with every
//! coefficient lifted to an arbitrary-precision rational. Bounds and
//! sides use `None` for the infinite case. All mutations mirror the
//! declared mutation points of the machine LP so the two copies stay in
//! sync.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use simplex_core::linalg::SparseVec;
use simplex_core::problem::LpProblem;
use simplex_core::settings::Sense;

use crate::error::{RefineError, RefineResult};

/// An optional rational: `None` stands for an infinite bound.
pub type OptRational = Option<BigRational>;

/// Exact conversion of a finite double; infinities map to `None`.
pub fn rational_from_bound(x: f64) -> RefineResult<OptRational> {
    if x.is_infinite() {
        return Ok(None);
    }
    BigRational::from_float(x)
        .map(Some)
        .ok_or_else(|| RefineError::InvalidData(format!("non-finite value {x}")))
}

/// Exact conversion of a finite double.
pub fn rational_from_f64(x: f64) -> RefineResult<BigRational> {
    BigRational::from_float(x)
        .ok_or_else(|| RefineError::InvalidData(format!("non-finite value {x}")))
}

/// Nearest-double conversion back into the machine domain.
pub fn f64_from_rational(r: &BigRational) -> f64 {
    r.to_f64().unwrap_or_else(|| {
        if r.is_negative() {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    })
}

/// Bound conversion back into the machine domain.
pub fn f64_from_bound(b: &OptRational, negative_side: bool) -> f64 {
    match b {
        Some(r) => f64_from_rational(r),
        None => {
            if negative_side {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        }
    }
}

/// Round a positive rational to a nearby power of two, keeping scale
/// factors cheap to apply exactly.
pub fn pow2_round(r: &BigRational) -> BigRational {
    if r.is_zero() || r.is_negative() {
        return r.clone();
    }
    let bits_num = r.numer().bits() as i64;
    let bits_den = r.denom().bits() as i64;
    let exp = bits_num - bits_den;
    let one = BigInt::from(1);
    if exp >= 0 {
        BigRational::from_integer(one << exp as u64)
    } else {
        BigRational::new(one.clone(), one << (-exp) as u64)
    }
}

/// Exact copy of the LP in maximization form.
#[derive(Debug, Clone)]
pub struct RationalLp {
    /// A by columns: per column, `(row, value)` entries.
    pub cols: Vec<Vec<(usize, BigRational)>>,
    /// A by rows: per row, `(col, value)` entries.
    pub rows: Vec<Vec<(usize, BigRational)>>,
    pub lower: Vec<OptRational>,
    pub upper: Vec<OptRational>,
    pub lhs: Vec<OptRational>,
    pub rhs: Vec<OptRational>,
    /// Objective in maximization form.
    pub obj: Vec<BigRational>,
    pub sense: Sense,
}

impl RationalLp {
    /// Lift the machine LP exactly into the rational domain.
    pub fn from_problem(lp: &LpProblem) -> RefineResult<Self> {
        let m = lp.num_rows();
        let n = lp.num_cols();
        let mut cols = Vec::with_capacity(n);
        let mut rows: Vec<Vec<(usize, BigRational)>> = vec![Vec::new(); m];
        for j in 0..n {
            let mut col = Vec::with_capacity(lp.col(j).len());
            for (i, v) in lp.col(j).iter() {
                let rv = rational_from_f64(v)?;
                rows[i].push((j, rv.clone()));
                col.push((i, rv));
            }
            cols.push(col);
        }
        Ok(Self {
            cols,
            rows,
            lower: (0..n).map(|j| rational_from_bound(lp.lower(j))).collect::<RefineResult<_>>()?,
            upper: (0..n).map(|j| rational_from_bound(lp.upper(j))).collect::<RefineResult<_>>()?,
            lhs: (0..m).map(|i| rational_from_bound(lp.lhs(i))).collect::<RefineResult<_>>()?,
            rhs: (0..m).map(|i| rational_from_bound(lp.rhs(i))).collect::<RefineResult<_>>()?,
            obj: (0..n).map(|j| rational_from_f64(lp.max_obj(j))).collect::<RefineResult<_>>()?,
            sense: lp.sense(),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    /// Exact activity of row `i` at the point `x`.
    pub fn activity(&self, i: usize, x: &[BigRational]) -> BigRational {
        let mut a = BigRational::zero();
        for (j, v) in &self.rows[i] {
            a += v * &x[*j];
        }
        a
    }

    /// Exact reduced cost of column `j` given duals `y`:
    /// `c_j - A_j^T y`.
    pub fn reduced_cost(&self, j: usize, y: &[BigRational]) -> BigRational {
        let mut d = self.obj[j].clone();
        for (i, v) in &self.cols[j] {
            d -= v * &y[*i];
        }
        d
    }

    /// Exact internal objective value.
    pub fn objective(&self, x: &[BigRational]) -> BigRational {
        let mut v = BigRational::zero();
        for (j, c) in self.obj.iter().enumerate() {
            v += c * &x[j];
        }
        v
    }

    /// Mutate one coefficient, keeping both orientations in sync.
    pub fn change_element(&mut self, i: usize, j: usize, v: BigRational) {
        let set = |entries: &mut Vec<(usize, BigRational)>, key: usize, v: &BigRational| {
            if let Some(p) = entries.iter().position(|(k, _)| *k == key) {
                if v.is_zero() {
                    entries.swap_remove(p);
                } else {
                    entries[p].1 = v.clone();
                }
            } else if !v.is_zero() {
                entries.push((key, v.clone()));
            }
        };
        set(&mut self.rows[i], j, &v);
        set(&mut self.cols[j], i, &v);
    }

    pub fn change_bounds(&mut self, j: usize, lower: OptRational, upper: OptRational) {
        self.lower[j] = lower;
        self.upper[j] = upper;
    }

    pub fn change_sides(&mut self, i: usize, lhs: OptRational, rhs: OptRational) {
        self.lhs[i] = lhs;
        self.rhs[i] = rhs;
    }

    pub fn change_obj(&mut self, j: usize, obj: BigRational) {
        self.obj[j] = obj;
    }

    /// Append a column.
    pub fn add_col(
        &mut self,
        entries: Vec<(usize, BigRational)>,
        obj: BigRational,
        lower: OptRational,
        upper: OptRational,
    ) -> usize {
        let j = self.num_cols();
        for (i, v) in &entries {
            self.rows[*i].push((j, v.clone()));
        }
        self.cols.push(entries);
        self.obj.push(obj);
        self.lower.push(lower);
        self.upper.push(upper);
        j
    }

    /// Append a row.
    pub fn add_row(
        &mut self,
        entries: Vec<(usize, BigRational)>,
        lhs: OptRational,
        rhs: OptRational,
    ) -> usize {
        let i = self.num_rows();
        for (j, v) in &entries {
            self.cols[*j].push((i, v.clone()));
        }
        self.rows.push(entries);
        self.lhs.push(lhs);
        self.rhs.push(rhs);
        i
    }

    /// Remove the last column (transform undo).
    pub fn pop_col(&mut self) {
        let j = self.num_cols() - 1;
        for row in &mut self.rows {
            row.retain(|(k, _)| *k != j);
        }
        self.cols.pop();
        self.obj.pop();
        self.lower.pop();
        self.upper.pop();
    }

    /// Remove the last row (transform undo).
    pub fn pop_row(&mut self) {
        let i = self.num_rows() - 1;
        for col in &mut self.cols {
            col.retain(|(k, _)| *k != i);
        }
        self.rows.pop();
        self.lhs.pop();
        self.rhs.pop();
    }
}

/// Machine-side sparse vector from rational entries.
pub fn sparse_from_rational(entries: &[(usize, BigRational)]) -> SparseVec {
    let mut v = SparseVec::with_capacity(entries.len());
    for (i, r) in entries {
        let x = f64_from_rational(r);
        if x != 0.0 {
            v.push(*i, x);
        }
    }
    v
}

/// Exact primal-dual solution candidate.
#[derive(Debug, Clone, Default)]
pub struct SolRational {
    pub primal: Vec<BigRational>,
    pub slacks: Vec<BigRational>,
    pub dual: Vec<BigRational>,
    pub redcost: Vec<BigRational>,
    /// Exact primal ray, when unboundedness was certified.
    pub primal_ray: Option<Vec<BigRational>>,
    /// Exact Farkas certificate, when infeasibility was certified.
    pub dual_farkas: Option<Vec<BigRational>>,
}

impl SolRational {
    pub fn zeros(m: usize, n: usize) -> Self {
        Self {
            primal: vec![BigRational::zero(); n],
            slacks: vec![BigRational::zero(); m],
            dual: vec![BigRational::zero(); m],
            redcost: vec![BigRational::zero(); n],
            primal_ray: None,
            dual_farkas: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    #[test]
    fn test_pow2_round() {
        let r = BigRational::new(BigInt::from(7), BigInt::from(1));
        let p = pow2_round(&r);
        assert_eq!(p, BigRational::from_integer(BigInt::from(4)));

        let r = BigRational::new(BigInt::from(1), BigInt::from(3));
        let p = pow2_round(&r);
        assert_eq!(p, BigRational::new(BigInt::from(1), BigInt::from(2)));

        assert!(pow2_round(&BigRational::zero()).is_zero());
    }

    #[test]
    fn test_exact_float_conversion() {
        let r = rational_from_f64(0.1).unwrap();
        // 0.1 is not exactly 1/10 in binary; the rational must match the
        // double bit pattern, not the decimal.
        assert_ne!(r, BigRational::new(BigInt::from(1), BigInt::from(10)));
        assert_eq!(f64_from_rational(&r), 0.1);

        assert_eq!(rational_from_bound(f64::INFINITY).unwrap(), None);
    }

    #[test]
    fn test_rational_lp_roundtrip() {
        use simplex_core::linalg::SparseVec as SV;
        let mut lp = LpProblem::new(Sense::Maximize);
        lp.add_col(&SV::new(), 1.0, 0.0, f64::INFINITY).unwrap();
        lp.add_col(&SV::new(), 2.0, 0.0, 3.0).unwrap();
        lp.add_row(&SV::from_pairs(&[(0, 1.0), (1, 0.5)]), 1.0, 2.0)
            .unwrap();

        let rat = RationalLp::from_problem(&lp).unwrap();
        assert_eq!(rat.num_rows(), 1);
        assert_eq!(rat.num_cols(), 2);
        assert_eq!(rat.obj[0], BigRational::one());
        assert_eq!(rat.upper[0], None);

        let x = vec![BigRational::one(), BigRational::from_float(2.0).unwrap()];
        assert_eq!(rat.activity(0, &x), BigRational::from_float(2.0).unwrap());
    }

    #[test]
    fn test_change_element_sync() {
        use simplex_core::linalg::SparseVec as SV;
        let mut lp = LpProblem::new(Sense::Maximize);
        lp.add_col(&SV::new(), 0.0, 0.0, 1.0).unwrap();
        lp.add_row(&SV::from_pairs(&[(0, 1.0)]), 0.0, 1.0).unwrap();
        let mut rat = RationalLp::from_problem(&lp).unwrap();

        rat.change_element(0, 0, BigRational::zero());
        assert!(rat.rows[0].is_empty());
        assert!(rat.cols[0].is_empty());

        rat.change_element(0, 0, BigRational::one());
        assert_eq!(rat.rows[0].len(), 1);
        assert_eq!(rat.cols[0].len(), 1);
    }
}
