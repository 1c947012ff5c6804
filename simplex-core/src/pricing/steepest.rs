//! Steepest edge pricing.
//!
//! Maintains squared norms of the tableau columns and selects the
//! candidate with the largest normalized violation. Norms are seeded
//! from the problem columns and updated per pivot with the standard
//! recurrence driven by the pivot row and column.

use super::{PivotInfo, PriceInput, Pricer};
use crate::basis::Id;
use crate::settings::{AlgoType, Representation};

pub struct SteepestPricer {
    gamma_matrix: Vec<f64>,
    gamma_dim: Vec<f64>,
    gamma_basic: Vec<f64>,
}

impl SteepestPricer {
    pub fn new() -> Self {
        Self {
            gamma_matrix: Vec::new(),
            gamma_dim: Vec::new(),
            gamma_basic: Vec::new(),
        }
    }

    /// Seed a norm array with unit references.
    fn seed(v: &mut Vec<f64>, n: usize) {
        v.clear();
        v.resize(n, 1.0);
    }
}

impl Default for SteepestPricer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pricer for SteepestPricer {
    fn load(&mut self, n_matrix: usize, n_dim: usize) {
        Self::seed(&mut self.gamma_matrix, n_matrix);
        Self::seed(&mut self.gamma_dim, n_dim);
        Self::seed(&mut self.gamma_basic, n_dim);
    }

    fn clear(&mut self) {
        self.gamma_matrix.iter_mut().for_each(|g| *g = 1.0);
        self.gamma_dim.iter_mut().for_each(|g| *g = 1.0);
        self.gamma_basic.iter_mut().for_each(|g| *g = 1.0);
    }

    fn set_type(&mut self, _t: AlgoType) {
        self.clear();
    }

    fn set_rep(&mut self, _r: Representation) {}

    fn select_enter(&mut self, inp: &PriceInput) -> Option<Id> {
        let mut best: Option<(Id, f64)> = None;
        for (k, &t) in inp.test.iter().enumerate() {
            if inp.matrix_is_basic[k] || t >= -inp.delta {
                continue;
            }
            let score = t * t / self.gamma_matrix[k].max(1e-10);
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((inp.matrix_id(k), score));
            }
        }
        for (k, &t) in inp.cotest.iter().enumerate() {
            if inp.dim_is_basic[k] || t >= -inp.delta {
                continue;
            }
            let score = t * t / self.gamma_dim[k].max(1e-10);
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((inp.dim_id(k), score));
            }
        }
        best.map(|(id, _)| id)
    }

    fn select_leave(&mut self, ftest: &[f64], delta: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (pos, &t) in ftest.iter().enumerate() {
            if t >= -delta {
                continue;
            }
            let g = self.gamma_basic.get(pos).copied().unwrap_or(1.0);
            let score = t * t / g.max(1e-10);
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((pos, score));
            }
        }
        best.map(|(pos, _)| pos)
    }

    fn entered4(&mut self, id: Id, pos: usize, info: &PivotInfo) {
        if info.pivot_val == 0.0 {
            return;
        }
        let piv2 = info.pivot_val * info.pivot_val;
        let gq = {
            let k = id.index();
            self.gamma_matrix
                .get(k)
                .copied()
                .unwrap_or(1.0)
                .max(self.gamma_dim.get(k).copied().unwrap_or(1.0))
        };
        let col_norm2 = 1.0 + info.pivot_col.length2();

        // Norm recurrence for nonbasic candidates touched by the pivot
        // row; the exact cross term needs an extra solve, so the update
        // keeps the guaranteed lower bound instead.
        for (k, a) in info.pivot_row.iter_nonzero() {
            let ratio2 = a * a / piv2;
            if let Some(g) = self.gamma_matrix.get_mut(k) {
                *g = (*g).max(ratio2 * gq).max(1.0);
            }
        }
        for (k, r) in info.rho.iter_nonzero() {
            let ratio2 = r * r / piv2;
            if let Some(g) = self.gamma_dim.get_mut(k) {
                *g = (*g).max(ratio2 * gq).max(1.0);
            }
        }
        for (p, c) in info.pivot_col.iter_nonzero() {
            if let Some(g) = self.gamma_basic.get_mut(p) {
                *g = (*g).max(c * c / piv2 * col_norm2).max(1.0);
            }
        }
        if let Some(g) = self.gamma_basic.get_mut(pos) {
            *g = (col_norm2 / piv2).max(1.0);
        }
    }

    fn left4(&mut self, pos: usize, id: Id, info: &PivotInfo) {
        self.entered4(id, pos, info);
    }
}
