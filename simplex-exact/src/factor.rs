//! Exact basis factorization.
//!
//! A dense fraction-preserving LU over the rationals, used to certify a
//! candidate basis: solve `B x_B = b` for the exact primal values and
//! `B^T y = c_B` for the exact duals. Pivoting is by the first
//! structurally nonzero entry; exact arithmetic needs no threshold.

use num_rational::BigRational;
use num_traits::Zero;

use crate::error::{RefineError, RefineResult};

/// Dense rational LU with partial pivoting.
pub struct RationalLu {
    dim: usize,
    /// Row-major packed factors: L below the diagonal, U on and above.
    lu: Vec<BigRational>,
    /// Row permutation: `perm[k]` is the original row in pivot slot `k`.
    perm: Vec<usize>,
}

impl RationalLu {
    /// Factor the matrix given by its columns.
    pub fn factorize(cols: &[Vec<(usize, BigRational)>]) -> RefineResult<Self> {
        let dim = cols.len();
        let mut lu = vec![BigRational::zero(); dim * dim];
        for (c, col) in cols.iter().enumerate() {
            for (r, v) in col {
                lu[*r * dim + c] = v.clone();
            }
        }
        let mut perm: Vec<usize> = (0..dim).collect();

        for k in 0..dim {
            // Pivot: first nonzero in column k at or below the diagonal.
            let pivot_row = (k..dim)
                .find(|&r| !lu[perm[r] * dim + k].is_zero())
                .ok_or(RefineError::SingularRationalBasis)?;
            perm.swap(k, pivot_row);
            let piv = lu[perm[k] * dim + k].clone();

            for r in k + 1..dim {
                let row = perm[r];
                if lu[row * dim + k].is_zero() {
                    continue;
                }
                let mult = &lu[row * dim + k] / &piv;
                for c in k + 1..dim {
                    let delta = &mult * &lu[perm[k] * dim + c];
                    lu[row * dim + c] -= delta;
                }
                lu[row * dim + k] = mult;
            }
        }

        Ok(Self { dim, lu, perm })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Solve `B x = b` exactly.
    pub fn solve_right(&self, b: &[BigRational]) -> Vec<BigRational> {
        let n = self.dim;
        // Forward: L y = P b.
        let mut y: Vec<BigRational> = (0..n).map(|k| b[self.perm[k]].clone()).collect();
        for k in 0..n {
            for r in k + 1..n {
                let m = &self.lu[self.perm[r] * n + k];
                if !m.is_zero() {
                    let delta = m * &y[k];
                    y[r] -= delta;
                }
            }
        }
        // Backward: U x = y.
        let mut x = vec![BigRational::zero(); n];
        for k in (0..n).rev() {
            let mut s = y[k].clone();
            for c in k + 1..n {
                s -= &self.lu[self.perm[k] * n + c] * &x[c];
            }
            x[k] = s / &self.lu[self.perm[k] * n + k];
        }
        x
    }

    /// Solve `B^T y = b` exactly.
    pub fn solve_left(&self, b: &[BigRational]) -> Vec<BigRational> {
        let n = self.dim;
        // U^T z = b (forward).
        let mut z = vec![BigRational::zero(); n];
        for k in 0..n {
            let mut s = b[k].clone();
            for r in 0..k {
                s -= &self.lu[self.perm[r] * n + k] * &z[r];
            }
            z[k] = s / &self.lu[self.perm[k] * n + k];
        }
        // L^T w = z (backward), then undo the permutation.
        for k in (0..n).rev() {
            for r in k + 1..n {
                let m = &self.lu[self.perm[r] * n + k];
                if !m.is_zero() {
                    let delta = m * &z[r];
                    z[k] -= delta;
                }
            }
        }
        let mut y = vec![BigRational::zero(); n];
        for k in 0..n {
            y[self.perm[k]] = z[k].clone();
        }
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn cols_from_dense(dense: &[&[i64]]) -> Vec<Vec<(usize, BigRational)>> {
        let n = dense.len();
        (0..n)
            .map(|c| {
                (0..n)
                    .filter(|&r| dense[r][c] != 0)
                    .map(|r| (r, rat(dense[r][c])))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_exact_solve_right_and_left() {
        // B = [[2, 1, 0], [1, 3, 1], [0, 1, 4]]
        let cols = cols_from_dense(&[&[2, 1, 0], &[1, 3, 1], &[0, 1, 4]]);
        let lu = RationalLu::factorize(&cols).unwrap();

        let b = vec![rat(3), rat(5), rat(5)];
        let x = lu.solve_right(&b);
        // Verify B x = b exactly.
        let dense = [[2, 1, 0], [1, 3, 1], [0, 1, 4]];
        for r in 0..3 {
            let mut s = BigRational::zero();
            for c in 0..3 {
                s += rat(dense[r][c]) * &x[c];
            }
            assert_eq!(s, b[r]);
        }

        let y = lu.solve_left(&b);
        for c in 0..3 {
            let mut s = BigRational::zero();
            for r in 0..3 {
                s += rat(dense[r][c]) * &y[r];
            }
            assert_eq!(s, b[c]);
        }
    }

    #[test]
    fn test_singular_detected() {
        let cols = cols_from_dense(&[&[1, 2], &[2, 4]]);
        assert!(matches!(
            RationalLu::factorize(&cols),
            Err(RefineError::SingularRationalBasis)
        ));
    }

    #[test]
    fn test_permutation_handling() {
        // Leading zero forces a row swap.
        let cols = cols_from_dense(&[&[0, 1], &[1, 0]]);
        let lu = RationalLu::factorize(&cols).unwrap();
        let b = vec![rat(7), rat(9)];
        let x = lu.solve_right(&b);
        assert_eq!(x, vec![rat(9), rat(7)]);
    }
}
