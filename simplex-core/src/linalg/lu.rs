//! Sparse LU factorization of a basis matrix.
//!
//! Left-looking column factorization with threshold pivoting and a static
//! sparsity preference: pivot candidates within the Markowitz threshold of
//! the column maximum are ranked by the occupancy of their row in the
//! basis matrix. The factors are stored as
//!
//! * `l_cols[k]`: multipliers of elimination step `k`, indexed by
//!   original row,
//! * `u_cols`/`u_rows`: the upper factor in both orientations, indexed
//!   by pivot coordinates, with the diagonal kept separately,
//! * `row_perm`/`col_perm`: permutations between original rows / basis
//!   positions and pivot coordinates,
//! * `order`: the triangular elimination order of the pivot coordinates.
//!
//! After a fresh factorization `order` is the identity; Forrest-Tomlin
//! updates rotate it and append row-elimination factors (see
//! `update.rs`).

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::sparse::SparseVec;

/// Marker for a row that has not been assigned a pivot coordinate yet.
const UNPIVOTED: usize = usize::MAX;

/// Outcome of a factorization or update step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuStatus {
    /// Factors are valid.
    Ok,
    /// A zero pivot was met; the factors are unusable.
    Singular,
}

/// LU factor storage and triangular solve kernels.
#[derive(Debug, Clone)]
pub struct LuCore {
    pub(crate) dim: usize,

    pub(crate) row_perm: Vec<usize>,
    pub(crate) row_orig: Vec<usize>,
    pub(crate) col_perm: Vec<usize>,
    pub(crate) col_orig: Vec<usize>,

    pub(crate) order: Vec<usize>,
    pub(crate) order_pos: Vec<usize>,

    pub(crate) l_cols: Vec<SparseVec>,
    /// Row-elimination factors appended by Forrest-Tomlin updates:
    /// `(target, source, multiplier)` in pivot coordinates.
    pub(crate) ft_etas: Vec<(usize, usize, f64)>,

    pub(crate) u_cols: Vec<SparseVec>,
    pub(crate) u_rows: Vec<SparseVec>,
    pub(crate) diag: Vec<f64>,

    /// Largest factor entry produced so far (grows with updates).
    pub(crate) max_abs: f64,
    /// Largest factor entry right after the last full factorization.
    pub(crate) init_max_abs: f64,

    pub(crate) status: LuStatus,
    pub(crate) update_count: usize,

    work: Vec<f64>,
    coord_work: Vec<f64>,
}

impl LuCore {
    /// Empty core; `factorize` sets the dimension.
    pub fn new() -> Self {
        Self {
            dim: 0,
            row_perm: Vec::new(),
            row_orig: Vec::new(),
            col_perm: Vec::new(),
            col_orig: Vec::new(),
            order: Vec::new(),
            order_pos: Vec::new(),
            l_cols: Vec::new(),
            ft_etas: Vec::new(),
            u_cols: Vec::new(),
            u_rows: Vec::new(),
            diag: Vec::new(),
            max_abs: 1.0,
            init_max_abs: 1.0,
            status: LuStatus::Singular,
            update_count: 0,
            work: Vec::new(),
            coord_work: Vec::new(),
        }
    }

    /// Order of the factored matrix.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Factorization state.
    pub fn status(&self) -> LuStatus {
        self.status
    }

    /// Number of stored nonzeros across both factors.
    pub fn nnz(&self) -> usize {
        let l: usize = self.l_cols.iter().map(|c| c.len()).sum();
        let u: usize = self.u_cols.iter().map(|c| c.len()).sum();
        l + u + self.dim + self.ft_etas.len()
    }

    fn reset(&mut self, dim: usize) {
        self.dim = dim;
        self.row_perm.clear();
        self.row_perm.resize(dim, UNPIVOTED);
        self.row_orig.clear();
        self.row_orig.resize(dim, 0);
        self.col_perm.clear();
        self.col_perm.resize(dim, 0);
        self.col_orig.clear();
        self.col_orig.resize(dim, 0);
        self.order = (0..dim).collect();
        self.order_pos = (0..dim).collect();
        self.l_cols.clear();
        self.l_cols.resize(dim, SparseVec::new());
        self.ft_etas.clear();
        self.u_cols.clear();
        self.u_cols.resize(dim, SparseVec::new());
        self.u_rows.clear();
        self.u_rows.resize(dim, SparseVec::new());
        self.diag.clear();
        self.diag.resize(dim, 0.0);
        self.work.clear();
        self.work.resize(dim, 0.0);
        self.coord_work.clear();
        self.coord_work.resize(dim, 0.0);
        self.update_count = 0;
        self.max_abs = 1.0;
        self.init_max_abs = 1.0;
    }

    /// Factor the matrix whose columns are `cols`.
    ///
    /// `threshold` is the pivot tolerance relative to the column maximum;
    /// `epsilon` is the singularity cutoff.
    pub fn factorize(&mut self, cols: &[SparseVec], threshold: f64, epsilon: f64) -> LuStatus {
        let dim = cols.len();
        self.reset(dim);
        if dim == 0 {
            self.status = LuStatus::Ok;
            return self.status;
        }

        // Static row occupancy for the sparsity preference.
        let mut row_count = vec![0usize; dim];
        for col in cols {
            for (i, _) in col.iter() {
                row_count[i] += 1;
            }
        }

        // Process columns sparsest-first.
        let mut col_order: Vec<usize> = (0..dim).collect();
        col_order.sort_by_key(|&c| cols[c].len());

        let mut touched: Vec<usize> = Vec::with_capacity(dim);
        let mut visited = vec![false; dim];
        let mut heap: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
        let mut max_abs: f64 = 1.0;

        for (t, &bp) in col_order.iter().enumerate() {
            // Scatter column bp into the dense workspace.
            for (i, v) in cols[bp].iter() {
                if self.work[i] == 0.0 {
                    touched.push(i);
                }
                self.work[i] += v;
                let k = self.row_perm[i];
                if k != UNPIVOTED && !visited[k] {
                    visited[k] = true;
                    heap.push(Reverse(k));
                }
            }

            // Eliminate against already-placed pivots in coordinate order.
            while let Some(Reverse(k)) = heap.pop() {
                let x = self.work[self.row_orig[k]];
                if x != 0.0 {
                    for (i, m) in self.l_cols[k].iter() {
                        if self.work[i] == 0.0 {
                            touched.push(i);
                        }
                        self.work[i] -= x * m;
                        let kk = self.row_perm[i];
                        if kk != UNPIVOTED && !visited[kk] {
                            visited[kk] = true;
                            heap.push(Reverse(kk));
                        }
                    }
                }
            }

            // Pick the pivot among entries in unpivoted rows.
            let mut vmax: f64 = 0.0;
            for &i in &touched {
                if self.row_perm[i] == UNPIVOTED {
                    vmax = vmax.max(self.work[i].abs());
                }
            }
            if vmax <= epsilon {
                // Column is linearly dependent on earlier ones.
                for &i in &touched {
                    self.work[i] = 0.0;
                }
                self.status = LuStatus::Singular;
                return self.status;
            }

            let mut pivot_row = UNPIVOTED;
            let mut pivot_count = usize::MAX;
            let mut pivot_val = 0.0f64;
            for &i in &touched {
                if self.row_perm[i] != UNPIVOTED {
                    continue;
                }
                let v = self.work[i].abs();
                if v >= threshold * vmax
                    && (row_count[i] < pivot_count
                        || (row_count[i] == pivot_count && v > pivot_val.abs()))
                {
                    pivot_row = i;
                    pivot_count = row_count[i];
                    pivot_val = self.work[i];
                }
            }
            debug_assert_ne!(pivot_row, UNPIVOTED);

            // Record the pivot and split the workspace into U and L parts.
            self.row_perm[pivot_row] = t;
            self.row_orig[t] = pivot_row;
            self.col_perm[bp] = t;
            self.col_orig[t] = bp;
            self.diag[t] = pivot_val;
            max_abs = max_abs.max(pivot_val.abs());

            // Consume the workspace while building the factor columns; a
            // position cancelled and refilled can sit twice in `touched`,
            // zeroing on first read makes the duplicate a no-op.
            let mut l_col = SparseVec::new();
            let mut u_col = SparseVec::new();
            for &i in &touched {
                let v = self.work[i];
                self.work[i] = 0.0;
                if v == 0.0 || i == pivot_row {
                    continue;
                }
                let k = self.row_perm[i];
                if k == UNPIVOTED {
                    l_col.push(i, v / pivot_val);
                } else if k != t {
                    u_col.push(k, v);
                    max_abs = max_abs.max(v.abs());
                }
            }
            self.l_cols[t] = l_col;
            self.u_cols[t] = u_col;

            for &i in &touched {
                let k = self.row_perm[i];
                if k != UNPIVOTED {
                    visited[k] = false;
                }
            }
            touched.clear();
        }

        // Row-oriented copy of U.
        for m in 0..dim {
            // Split borrow: walk a clone-free index pass.
            for n in 0..self.u_cols[m].len() {
                let k = self.u_cols[m].index(n);
                let v = self.u_cols[m].value(n);
                self.u_rows[k].push(m, v);
            }
        }

        self.max_abs = max_abs;
        self.init_max_abs = max_abs;
        self.status = LuStatus::Ok;
        self.status
    }

    /// Forward solve `y := L^{-1} y` with `y` in original row space,
    /// including appended Forrest-Tomlin row factors.
    pub fn solve_lright(&self, y: &mut [f64]) {
        for k in 0..self.dim {
            let x = y[self.row_orig[k]];
            if x != 0.0 {
                for (i, m) in self.l_cols[k].iter() {
                    y[i] -= x * m;
                }
            }
        }
        for &(p, m, mu) in &self.ft_etas {
            y[self.row_orig[p]] -= mu * y[self.row_orig[m]];
        }
    }

    /// Back substitution through U: consumes the forward-solved vector in
    /// original row space and writes the solution in basis-position space.
    fn solve_uright(&mut self, y: &[f64], x: &mut [f64]) {
        for pos in (0..self.dim).rev() {
            let k = self.order[pos];
            let mut s = y[self.row_orig[k]];
            for (m, v) in self.u_rows[k].iter() {
                s -= v * self.coord_work[m];
            }
            self.coord_work[k] = s / self.diag[k];
        }
        for k in 0..self.dim {
            x[self.col_orig[k]] = self.coord_work[k];
            self.coord_work[k] = 0.0;
        }
    }

    /// Solve `B x = b`; `b` indexed by original rows, `x` by basis
    /// positions. The eta file of the product-form update (if any) is
    /// applied by the caller.
    pub fn solve_right(&mut self, b: &[f64], x: &mut [f64]) {
        debug_assert_eq!(b.len(), self.dim);
        debug_assert_eq!(x.len(), self.dim);
        self.work[..self.dim].copy_from_slice(b);
        let mut work = std::mem::take(&mut self.work);
        self.solve_lright(&mut work);
        self.solve_uright(&work, x);
        for w in work.iter_mut() {
            *w = 0.0;
        }
        self.work = work;
    }

    /// Solve `x^T B = b^T` (equivalently `B^T x = b`); `b` indexed by
    /// basis positions, `x` by original rows.
    pub fn solve_left(&mut self, b: &[f64], x: &mut [f64]) {
        debug_assert_eq!(b.len(), self.dim);
        debug_assert_eq!(x.len(), self.dim);

        // U^T is lower triangular with respect to the elimination order.
        for pos in 0..self.dim {
            let k = self.order[pos];
            let mut s = b[self.col_orig[k]];
            for (r, v) in self.u_cols[k].iter() {
                s -= v * self.coord_work[r];
            }
            self.coord_work[k] = s / self.diag[k];
        }

        // Transposed Forrest-Tomlin factors, in reverse.
        for &(p, m, mu) in self.ft_etas.iter().rev() {
            self.coord_work[m] -= mu * self.coord_work[p];
        }

        // Scatter into original row space and run L^T.
        for k in 0..self.dim {
            x[self.row_orig[k]] = self.coord_work[k];
            self.coord_work[k] = 0.0;
        }
        for k in (0..self.dim).rev() {
            let mut s = x[self.row_orig[k]];
            for (i, m) in self.l_cols[k].iter() {
                s -= m * x[i];
            }
            x[self.row_orig[k]] = s;
        }
    }
}

impl Default for LuCore {
    fn default() -> Self {
        Self::new()
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
    fn test_factorize_and_solve_right() {
        let cols = columns(&[
            &[2.0, 1.0, 0.0],
            &[0.0, 3.0, 1.0],
            &[1.0, 0.0, 4.0],
        ]);
        let mut lu = LuCore::new();
        assert_eq!(lu.factorize(&cols, 0.1, 1e-14), LuStatus::Ok);

        let xref = vec![1.0, -2.0, 0.5];
        let b = mat_vec(&cols, &xref);
        let mut x = vec![0.0; 3];
        lu.solve_right(&b, &mut x);
        for (a, b) in x.iter().zip(xref.iter()) {
            assert!((a - b).abs() < 1e-12, "{x:?}");
        }
    }

    #[test]
    fn test_solve_left_is_transposed_solve() {
        let cols = columns(&[
            &[1.0, 0.0, 2.0, 0.0],
            &[0.0, 5.0, 0.0, 1.0],
            &[3.0, 0.0, 1.0, 0.0],
            &[0.0, 2.0, 0.0, 4.0],
        ]);
        let mut lu = LuCore::new();
        assert_eq!(lu.factorize(&cols, 0.1, 1e-14), LuStatus::Ok);

        // y^T B = b^T  <=>  for each basis position c: sum_i y_i B[i][c] = b_c
        let b = vec![1.0, 2.0, 3.0, 4.0];
        let mut y = vec![0.0; 4];
        lu.solve_left(&b, &mut y);
        for (c, col) in cols.iter().enumerate() {
            let s: f64 = col.iter().map(|(i, v)| y[i] * v).sum();
            assert!((s - b[c]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_singular_matrix_detected() {
        let cols = columns(&[
            &[1.0, 2.0],
            &[2.0, 4.0],
        ]);
        let mut lu = LuCore::new();
        assert_eq!(lu.factorize(&cols, 0.1, 1e-14), LuStatus::Singular);
    }

    #[test]
    fn test_permuted_identity() {
        let cols = columns(&[
            &[0.0, 1.0, 0.0],
            &[0.0, 0.0, 1.0],
            &[1.0, 0.0, 0.0],
        ]);
        let mut lu = LuCore::new();
        assert_eq!(lu.factorize(&cols, 0.1, 1e-14), LuStatus::Ok);
        let b = vec![5.0, 6.0, 7.0];
        let mut x = vec![0.0; 3];
        lu.solve_right(&b, &mut x);
        assert_eq!(x, vec![6.0, 7.0, 5.0]);
    }
}
