//! Textbook most-violated pricing, with an optional partial scan.

use super::{PivotInfo, PriceInput, Pricer};
use crate::basis::Id;
use crate::settings::{AlgoType, PricingMode, Representation};

/// Fraction of the index range scanned per round in partial mode.
const PARTIAL_WINDOW: usize = 8;

/// Dantzig rule: select the most negative test value.
pub struct DantzigPricer {
    mode: PricingMode,
    /// Rotating scan start for partial pricing.
    start: usize,
    n_matrix: usize,
    n_dim: usize,
}

impl DantzigPricer {
    pub fn new(mode: PricingMode) -> Self {
        Self { mode, start: 0, n_matrix: 0, n_dim: 0 }
    }

    fn scan(
        &self,
        inp: &PriceInput,
        range_m: impl Iterator<Item = usize>,
        range_d: impl Iterator<Item = usize>,
    ) -> Option<(Id, f64)> {
        let mut best: Option<(Id, f64)> = None;
        for k in range_m {
            if inp.matrix_is_basic[k] {
                continue;
            }
            let t = inp.test[k];
            if t < -inp.delta && best.map_or(true, |(_, b)| t < b) {
                best = Some((inp.matrix_id(k), t));
            }
        }
        for k in range_d {
            if inp.dim_is_basic[k] {
                continue;
            }
            let t = inp.cotest[k];
            if t < -inp.delta && best.map_or(true, |(_, b)| t < b) {
                best = Some((inp.dim_id(k), t));
            }
        }
        best
    }
}

impl Pricer for DantzigPricer {
    fn load(&mut self, n_matrix: usize, n_dim: usize) {
        self.n_matrix = n_matrix;
        self.n_dim = n_dim;
        self.start = 0;
    }

    fn clear(&mut self) {
        self.start = 0;
    }

    fn set_type(&mut self, _t: AlgoType) {}

    fn set_rep(&mut self, _r: Representation) {}

    fn select_enter(&mut self, inp: &PriceInput) -> Option<Id> {
        if self.mode == PricingMode::Partial && self.n_matrix > PARTIAL_WINDOW {
            // Scan one window per call, falling back to a full sweep when
            // the window comes up empty.
            let win = self.n_matrix.div_ceil(PARTIAL_WINDOW);
            let lo = self.start;
            let hi = (lo + win).min(self.n_matrix);
            self.start = if hi == self.n_matrix { 0 } else { hi };
            if let Some((id, _)) = self.scan(inp, lo..hi, 0..self.n_dim) {
                return Some(id);
            }
        }
        self.scan(inp, 0..self.n_matrix, 0..self.n_dim).map(|(id, _)| id)
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
