//! Devex pricing.
//!
//! Reference-framework weights approximate steepest-edge norms without
//! extra solves. Weights start at one, grow with the pivot geometry, and
//! the framework resets whenever they drift too far.

use super::{PivotInfo, PriceInput, Pricer};
use crate::basis::Id;
use crate::settings::{AlgoType, Representation};

/// Weight ceiling triggering a framework reset.
const MAX_WEIGHT: f64 = 1e8;

pub struct DevexPricer {
    w_matrix: Vec<f64>,
    w_dim: Vec<f64>,
    /// Weights over basic positions, used by the leaving variant.
    w_basic: Vec<f64>,
}

impl DevexPricer {
    pub fn new() -> Self {
        Self {
            w_matrix: Vec::new(),
            w_dim: Vec::new(),
            w_basic: Vec::new(),
        }
    }

    fn reset_needed(&self) -> bool {
        self.w_matrix.iter().any(|&w| w > MAX_WEIGHT)
            || self.w_dim.iter().any(|&w| w > MAX_WEIGHT)
    }
}

impl Default for DevexPricer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pricer for DevexPricer {
    fn load(&mut self, n_matrix: usize, n_dim: usize) {
        self.w_matrix = vec![1.0; n_matrix];
        self.w_dim = vec![1.0; n_dim];
        self.w_basic = vec![1.0; n_dim];
    }

    fn clear(&mut self) {
        self.w_matrix.iter_mut().for_each(|w| *w = 1.0);
        self.w_dim.iter_mut().for_each(|w| *w = 1.0);
        self.w_basic.iter_mut().for_each(|w| *w = 1.0);
    }

    fn set_type(&mut self, _t: AlgoType) {
        self.clear();
    }

    fn set_rep(&mut self, _r: Representation) {}

    fn select_enter(&mut self, inp: &PriceInput) -> Option<Id> {
        if self.reset_needed() {
            self.clear();
        }
        let mut best: Option<(Id, f64)> = None;
        for (k, &t) in inp.test.iter().enumerate() {
            if inp.matrix_is_basic[k] || t >= -inp.delta {
                continue;
            }
            let score = t * t / self.w_matrix[k];
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((inp.matrix_id(k), score));
            }
        }
        for (k, &t) in inp.cotest.iter().enumerate() {
            if inp.dim_is_basic[k] || t >= -inp.delta {
                continue;
            }
            let score = t * t / self.w_dim[k];
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
            let w = self.w_basic.get(pos).copied().unwrap_or(1.0);
            let score = t * t / w;
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
        // Reference weight of the entering variable; it lived on one of
        // the two sides, take the larger candidate.
        let k = id.index();
        let wq = self
            .w_matrix
            .get(k)
            .copied()
            .unwrap_or(1.0)
            .max(self.w_dim.get(k).copied().unwrap_or(1.0));
        let piv2 = info.pivot_val * info.pivot_val;

        // Nonbasic weights through the pivot row.
        for (k, a) in info.pivot_row.iter_nonzero() {
            let cand = wq * a * a / piv2;
            if let Some(w) = self.w_matrix.get_mut(k) {
                if cand > *w {
                    *w = cand;
                }
            }
        }
        for (k, r) in info.rho.iter_nonzero() {
            let cand = wq * r * r / piv2;
            if let Some(w) = self.w_dim.get_mut(k) {
                if cand > *w {
                    *w = cand;
                }
            }
        }

        // Basic weights through the pivot column.
        for (p, c) in info.pivot_col.iter_nonzero() {
            let cand = wq * c * c / piv2;
            if let Some(w) = self.w_basic.get_mut(p) {
                if cand > *w {
                    *w = cand;
                }
            }
        }
        if let Some(w) = self.w_basic.get_mut(pos) {
            *w = (wq / piv2).max(1.0);
        }
    }

    fn left4(&mut self, pos: usize, id: Id, info: &PivotInfo) {
        self.entered4(id, pos, info);
    }
}
