//! Static weight pricing.
//!
//! Every candidate carries a fixed penalty weight derived from the
//! objective and the column geometry at load time; selection picks the
//! violation with the largest weighted magnitude. Cheap per iteration
//! and immune to weight drift, at the cost of less informed choices.

use super::{PivotInfo, PriceInput, Pricer};
use crate::basis::Id;
use crate::settings::{AlgoType, Representation};

pub struct WeightPricer {
    w_matrix: Vec<f64>,
    w_dim: Vec<f64>,
}

impl WeightPricer {
    pub fn new() -> Self {
        Self { w_matrix: Vec::new(), w_dim: Vec::new() }
    }

    /// Install externally computed penalties (objective over column norm).
    pub fn set_weights(&mut self, w_matrix: Vec<f64>, w_dim: Vec<f64>) {
        self.w_matrix = w_matrix;
        self.w_dim = w_dim;
    }
}

impl Default for WeightPricer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pricer for WeightPricer {
    fn load(&mut self, n_matrix: usize, n_dim: usize) {
        if self.w_matrix.len() != n_matrix {
            self.w_matrix = vec![1.0; n_matrix];
        }
        if self.w_dim.len() != n_dim {
            self.w_dim = vec![1.0; n_dim];
        }
    }

    fn clear(&mut self) {}

    fn set_type(&mut self, _t: AlgoType) {}

    fn set_rep(&mut self, _r: Representation) {}

    fn select_enter(&mut self, inp: &PriceInput) -> Option<Id> {
        let mut best: Option<(Id, f64)> = None;
        for (k, &t) in inp.test.iter().enumerate() {
            if inp.matrix_is_basic[k] || t >= -inp.delta {
                continue;
            }
            let score = -t * self.w_matrix[k];
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((inp.matrix_id(k), score));
            }
        }
        for (k, &t) in inp.cotest.iter().enumerate() {
            if inp.dim_is_basic[k] || t >= -inp.delta {
                continue;
            }
            let score = -t * self.w_dim[k];
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((inp.dim_id(k), score));
            }
        }
        best.map(|(id, _)| id)
    }

    fn select_leave(&mut self, ftest: &[f64], delta: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (pos, &t) in ftest.iter().enumerate() {
            if t < -delta && best.map_or(true, |(_, b)| t < b) {
                best = Some((pos, t));
            }
        }
        best.map(|(pos, _)| pos)
    }

    fn entered4(&mut self, _id: Id, _pos: usize, _info: &PivotInfo) {}

    fn left4(&mut self, _pos: usize, _id: Id, _info: &PivotInfo) {}
}
