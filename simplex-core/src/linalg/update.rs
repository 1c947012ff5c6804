//! Factorization update forms.
//!
//! Two ways to absorb a basis column replacement without refactorizing:
//!
//! * **Eta file**: the product form of the inverse. Each update appends
//!   the solved column `eta = B^{-1} a` together with its basis position;
//!   solves post-process (right) or pre-process (left) through the file.
//! * **Forrest-Tomlin**: the spike `L^{-1} P a` replaces the column of U
//!   at its pivot coordinate, the coordinate rotates to the end of the
//!   elimination order, and the leftover row spike is eliminated with row
//!   factors appended to L.

use super::lu::{LuCore, LuStatus};
use super::sparse::SparseVec;

/// One product-form update: the basis position that changed and the
/// solved replacement column.
#[derive(Debug, Clone)]
pub struct EtaFactor {
    pub pos: usize,
    pub pivot: f64,
    /// Off-pivot entries of `B^{-1} a`, indexed by basis position.
    pub col: SparseVec,
}

/// Ordered eta file.
#[derive(Debug, Clone, Default)]
pub struct EtaFile {
    factors: Vec<EtaFactor>,
}

impl EtaFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn clear(&mut self) {
        self.factors.clear();
    }

    /// Append an update. `eta` is `B^{-1} a` over basis positions; the
    /// entry at `pos` is the pivot and must be well away from zero.
    pub fn push(&mut self, pos: usize, eta: &SparseVec, epsilon: f64) -> LuStatus {
        let pivot = eta.get(pos);
        if pivot.abs() <= epsilon {
            return LuStatus::Singular;
        }
        let mut col = SparseVec::with_capacity(eta.len());
        for (i, v) in eta.iter() {
            if i != pos && v != 0.0 {
                col.push(i, v);
            }
        }
        self.factors.push(EtaFactor { pos, pivot, col });
        LuStatus::Ok
    }

    /// Largest entry magnitude across the file (for stability tracking).
    pub fn max_abs(&self) -> f64 {
        self.factors.iter().fold(0.0, |m, f| {
            m.max(f.pivot.abs()).max(f.col.max_abs())
        })
    }

    /// Post-process a right solve: `x := E_k^{-1} ... E_1^{-1} x`.
    pub fn apply_right(&self, x: &mut [f64]) {
        for f in &self.factors {
            let xp = x[f.pos] / f.pivot;
            x[f.pos] = xp;
            if xp != 0.0 {
                for (i, v) in f.col.iter() {
                    x[i] -= v * xp;
                }
            }
        }
    }

    /// Pre-process a left solve: apply the transposed file in reverse.
    pub fn apply_left(&self, b: &mut [f64]) {
        for f in self.factors.iter().rev() {
            let mut s = b[f.pos];
            for (i, v) in f.col.iter() {
                s -= v * b[i];
            }
            b[f.pos] = s / f.pivot;
        }
    }
}

impl LuCore {
    /// Forrest-Tomlin update: replace the basis column at `basis_pos` by
    /// `new_col` (given in original row space).
    ///
    /// Returns `Singular` and leaves the factors unusable when the new
    /// diagonal element vanishes; the caller refactorizes.
    pub fn ft_update(
        &mut self,
        basis_pos: usize,
        new_col: &SparseVec,
        epsilon: f64,
    ) -> LuStatus {
        debug_assert!(basis_pos < self.dim);

        // Spike in pivot coordinates: L^{-1} P a.
        let mut spike = vec![0.0; self.dim];
        for (i, v) in new_col.iter() {
            spike[i] = v;
        }
        self.solve_lright(&mut spike);
        let p = self.col_perm[basis_pos];

        // Remove the old column p from both orientations of U.
        for n in 0..self.u_cols[p].len() {
            let k = self.u_cols[p].index(n);
            self.u_rows[k].remove_index(p);
        }
        self.u_cols[p].clear();

        // Stash the old row p (the row spike to eliminate) and detach it.
        let mut row_spike = vec![0.0; self.dim];
        for n in 0..self.u_rows[p].len() {
            let m = self.u_rows[p].index(n);
            let v = self.u_rows[p].value(n);
            row_spike[m] = v;
            self.u_cols[m].remove_index(p);
        }
        self.u_rows[p].clear();

        // Insert the spike as the new column p.
        let mut spike_diag = 0.0;
        for k in 0..self.dim {
            let v = spike[self.row_orig[k]];
            if v == 0.0 {
                continue;
            }
            self.max_abs = self.max_abs.max(v.abs());
            if k == p {
                spike_diag = v;
            } else {
                self.u_cols[p].push(k, v);
                self.u_rows[k].push(p, v);
            }
        }

        // Rotate coordinate p to the end of the elimination order.
        let old_pos = self.order_pos[p];
        for pos in old_pos..self.dim - 1 {
            let k = self.order[pos + 1];
            self.order[pos] = k;
            self.order_pos[k] = pos;
        }
        self.order[self.dim - 1] = p;
        self.order_pos[p] = self.dim - 1;

        // Eliminate the row spike left to right; fill lands further right
        // and is consumed by the same walk. The new diagonal accumulates
        // in `row_spike[p]`.
        row_spike[p] = spike_diag;
        for pos in old_pos..self.dim - 1 {
            let q = self.order[pos];
            let alpha = row_spike[q];
            if alpha == 0.0 {
                continue;
            }
            row_spike[q] = 0.0;
            let mu = alpha / self.diag[q];
            self.ft_etas.push((p, q, mu));
            self.max_abs = self.max_abs.max(mu.abs());
            for (m, v) in self.u_rows[q].iter() {
                row_spike[m] -= mu * v;
            }
        }

        let new_diag = row_spike[p];
        if new_diag.abs() <= epsilon {
            self.status = LuStatus::Singular;
            return self.status;
        }
        self.diag[p] = new_diag;
        self.max_abs = self.max_abs.max(new_diag.abs());
        self.update_count += 1;
        LuStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(data: &[&[f64]]) -> Vec<SparseVec> {
        data.iter()
            .map(|col| {
                let mut v = SparseVec::new();
                for (i, &x) in col.iter().enumerate() {
                    if x != 0.0 {
                        v.push(i, x);
                    }
                }
                v
            })
            .collect()
    }

    fn mat_vec(cols: &[SparseVec], x: &[f64]) -> Vec<f64> {
        let dim = cols.len();
        let mut y = vec![0.0; dim];
        for (c, col) in cols.iter().enumerate() {
            for (i, v) in col.iter() {
                y[i] += v * x[c];
            }
        }
        y
    }

    #[test]
    fn test_ft_update_solves_replaced_basis() {
        let mut cols = columns(&[
            &[4.0, 1.0, 0.0, 0.0],
            &[0.0, 3.0, 1.0, 0.0],
            &[2.0, 0.0, 5.0, 1.0],
            &[0.0, 0.0, 0.0, 2.0],
        ]);
        let mut lu = LuCore::new();
        assert_eq!(lu.factorize(&cols, 0.1, 1e-14), LuStatus::Ok);

        // Replace column 1.
        let new_col = SparseVec::from_pairs(&[(0, 1.0), (1, 1.0), (3, 2.0)]);
        assert_eq!(lu.ft_update(1, &new_col, 1e-14), LuStatus::Ok);
        cols[1] = new_col;

        let xref = vec![1.0, 2.0, -1.0, 0.5];
        let b = mat_vec(&cols, &xref);
        let mut x = vec![0.0; 4];
        lu.solve_right(&b, &mut x);
        for (a, r) in x.iter().zip(xref.iter()) {
            assert!((a - r).abs() < 1e-10, "{x:?}");
        }

        // Left solve against the replaced basis as well.
        let bt = vec![1.0, -1.0, 2.0, 0.0];
        let mut y = vec![0.0; 4];
        lu.solve_left(&bt, &mut y);
        for (c, col) in cols.iter().enumerate() {
            let s: f64 = col.iter().map(|(i, v)| y[i] * v).sum();
            assert!((s - bt[c]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_sequential_ft_updates() {
        let mut cols = columns(&[
            &[1.0, 0.0, 0.0],
            &[0.0, 1.0, 0.0],
            &[0.0, 0.0, 1.0],
        ]);
        let mut lu = LuCore::new();
        assert_eq!(lu.factorize(&cols, 0.1, 1e-14), LuStatus::Ok);

        let c0 = SparseVec::from_pairs(&[(0, 2.0), (2, 1.0)]);
        assert_eq!(lu.ft_update(0, &c0, 1e-14), LuStatus::Ok);
        cols[0] = c0;

        let c2 = SparseVec::from_pairs(&[(1, 1.0), (2, 3.0)]);
        assert_eq!(lu.ft_update(2, &c2, 1e-14), LuStatus::Ok);
        cols[2] = c2;

        let xref = vec![0.5, -1.0, 2.0];
        let b = mat_vec(&cols, &xref);
        let mut x = vec![0.0; 3];
        lu.solve_right(&b, &mut x);
        for (a, r) in x.iter().zip(xref.iter()) {
            assert!((a - r).abs() < 1e-10, "{x:?}");
        }
    }

    #[test]
    fn test_eta_file_right_and_left() {
        // B = I, replace column 1 with a = [1, 2, 1]^T: eta = a.
        let mut file = EtaFile::new();
        let eta = SparseVec::from_pairs(&[(0, 1.0), (1, 2.0), (2, 1.0)]);
        assert_eq!(file.push(1, &eta, 1e-14), LuStatus::Ok);

        // Solve B_new x = [1, 4, 3]^T  =>  x = [-1, 2, 1].
        let mut x = vec![1.0, 4.0, 3.0];
        file.apply_right(&mut x);
        assert_eq!(x, vec![-1.0, 2.0, 1.0]);

        // Solve y^T B_new = [0, 1, 0]  =>  y = [−0.5?, ...] check algebraically:
        // B_new columns: e0, a, e2. y^T e0 = 0, y^T a = 1, y^T e2 = 0
        // => y0 = 0, y2 = 0, 2 y1 = 1.
        let mut y = vec![0.0, 1.0, 0.0];
        file.apply_left(&mut y);
        assert_eq!(y, vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_eta_singular_pivot_rejected() {
        let mut file = EtaFile::new();
        let eta = SparseVec::from_pairs(&[(0, 1.0)]);
        assert_eq!(file.push(1, &eta, 1e-14), LuStatus::Singular);
        assert!(file.is_empty());
    }
}
