//! Basis factorization front end.
//!
//! Wraps the LU core with the numeric policy: pivot-threshold tightening
//! on poor stability, the eta / Forrest-Tomlin update dispatch, and the
//! semi-sparse solve entry points used by the simplex loop.

use log::debug;

use super::lu::{LuCore, LuStatus};
use super::sparse::SparseVec;
use super::ssvector::SsVec;
use super::update::EtaFile;
use crate::settings::UpdateMode;

/// Absolute floor for the pivot threshold.
const MIN_THRESHOLD: f64 = 0.01;
/// Default stability floor below which a refactorization is requested.
const MIN_STABILITY: f64 = 1e-2;

/// Basis factorization with update support.
#[derive(Debug, Clone)]
pub struct FactorLu {
    core: LuCore,
    etas: EtaFile,
    update_mode: UpdateMode,
    /// Singularity cutoff for pivots.
    pub epsilon: f64,
    min_threshold: f64,
    last_threshold: f64,
    min_stability: f64,
    loaded: bool,
    /// Cached `B^{-1} a` from the last `solve_right_for_update`, consumed
    /// by the next `change` in eta mode.
    cached_eta: Option<SparseVec>,
}

impl FactorLu {
    /// Fresh, unloaded factorization.
    pub fn new(update_mode: UpdateMode, markowitz_floor: f64, min_stability: f64) -> Self {
        let floor = markowitz_floor.max(MIN_THRESHOLD * 1e-2);
        Self {
            core: LuCore::new(),
            etas: EtaFile::new(),
            update_mode,
            epsilon: 1e-14,
            min_threshold: floor,
            last_threshold: floor,
            min_stability: if min_stability > 0.0 { min_stability } else { MIN_STABILITY },
            loaded: false,
            cached_eta: None,
        }
    }

    /// Order of the loaded basis (0 when unloaded).
    pub fn dim(&self) -> usize {
        self.core.dim()
    }

    /// Whether valid factors are loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded && self.core.status() == LuStatus::Ok
    }

    /// Number of updates absorbed since the last full factorization.
    pub fn num_updates(&self) -> usize {
        self.etas.len() + self.core.update_count
    }

    /// Total stored nonzeros (diagnostics).
    pub fn nnz(&self) -> usize {
        self.core.nnz()
    }

    /// Change the update mode; takes effect at the next `load`.
    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.update_mode = mode;
    }

    /// Raise the Markowitz threshold floor (recovery ladder hook).
    pub fn set_markowitz_floor(&mut self, floor: f64) {
        self.min_threshold = floor.clamp(1e-4, 0.9999);
        self.last_threshold = self.last_threshold.max(self.min_threshold);
    }

    /// Drop the factors and reset the numeric policy.
    pub fn clear(&mut self) {
        self.core = LuCore::new();
        self.etas.clear();
        self.loaded = false;
        self.cached_eta = None;
        self.last_threshold = self.min_threshold;
    }

    /// Stability estimate in [0, 1]: the ratio of the post-factorization
    /// magnitude to the current factor magnitude.
    pub fn stability(&self) -> f64 {
        if !self.is_loaded() {
            return 0.0;
        }
        let max_abs = self.core.max_abs.max(self.etas.max_abs());
        if max_abs < self.core.init_max_abs {
            1.0
        } else {
            self.core.init_max_abs / max_abs
        }
    }

    /// Monotone pivot-threshold tightening.
    fn better_threshold(th: f64) -> f64 {
        if th < 0.1 {
            th * 10.0
        } else if th < 0.9 {
            (th + 1.0) / 2.0
        } else if th < 0.999 {
            0.99999
        } else {
            th
        }
    }

    /// Factor the basis whose columns are `cols`.
    ///
    /// Retries with a tightened pivot threshold until the stability
    /// estimate reaches the floor or the threshold saturates. A stable
    /// previous factorization relaxes the threshold back toward the
    /// configured floor first.
    pub fn load(&mut self, cols: &[SparseVec]) -> LuStatus {
        if self.stability() > 2.0 * self.min_stability {
            self.last_threshold = self.min_threshold;
        }
        self.etas.clear();
        self.cached_eta = None;

        let mut min_stability = self.min_stability;
        loop {
            let stat = self.core.factorize(cols, self.last_threshold, self.epsilon);
            if stat == LuStatus::Singular {
                self.loaded = false;
                return LuStatus::Singular;
            }
            self.loaded = true;
            if self.stability() >= min_stability {
                break;
            }
            let tightened = Self::better_threshold(self.last_threshold);
            if tightened == self.last_threshold {
                break;
            }
            debug!(
                "factorization stability {:.3e} below floor, retrying with threshold {:.5}",
                self.stability(),
                tightened
            );
            self.last_threshold = tightened;
            min_stability /= 2.0;
        }
        LuStatus::Ok
    }

    /// Solve `B x = b` (dense slices over original rows / basis
    /// positions).
    pub fn solve_right(&mut self, b: &[f64], x: &mut [f64]) {
        self.core.solve_right(b, x);
        self.etas.apply_right(x);
    }

    /// Solve `x^T B = b^T`.
    pub fn solve_left(&mut self, b: &[f64], x: &mut [f64]) {
        if self.etas.is_empty() {
            self.core.solve_left(b, x);
        } else {
            let mut bb = b.to_vec();
            self.etas.apply_left(&mut bb);
            self.core.solve_left(&bb, x);
        }
    }

    /// Solve `B x = b` for a sparse right-hand side, returning the result
    /// as a set-up semi-sparse vector. The solved column is cached for
    /// the next `change` when running eta updates.
    pub fn solve_right_for_update(&mut self, b: &SparseVec, x: &mut SsVec) {
        debug_assert_eq!(x.dim(), self.dim());
        let dim = self.dim();
        let mut rhs = vec![0.0; dim];
        for (i, v) in b.iter() {
            rhs[i] = v;
        }
        {
            let vals = x.alt_values();
            self.core.solve_right(&rhs, vals);
            self.etas.apply_right(vals);
        }
        x.setup();
        if self.update_mode == UpdateMode::Eta {
            let mut eta = SparseVec::with_capacity(x.size());
            for (i, v) in x.iter_nonzero() {
                eta.push(i, v);
            }
            self.cached_eta = Some(eta);
        }
    }

    /// Solve `x^T B = e_pos^T`, returning a set-up semi-sparse vector.
    pub fn solve_left_unit(&mut self, pos: usize, x: &mut SsVec) {
        debug_assert_eq!(x.dim(), self.dim());
        let dim = self.dim();
        let mut rhs = vec![0.0; dim];
        rhs[pos] = 1.0;
        self.etas.apply_left(&mut rhs);
        {
            let vals = x.alt_values();
            self.core.solve_left(&rhs, vals);
        }
        x.setup();
    }

    /// Debug validation: loaded factors agree on their dimension and the
    /// stability estimate stays in range.
    #[cfg(debug_assertions)]
    pub fn is_consistent(&self) -> bool {
        if !self.loaded {
            return true;
        }
        let s = self.stability();
        (0.0..=1.0).contains(&s)
    }

    /// Replace the basis column at `pos` by `col` (original row space),
    /// absorbing the change into the update form.
    ///
    /// `Singular` invalidates the factors; the caller refactorizes.
    pub fn change(&mut self, pos: usize, col: &SparseVec) -> LuStatus {
        debug_assert!(self.is_loaded());
        let stat = match self.update_mode {
            UpdateMode::Eta => {
                let eta = match self.cached_eta.take() {
                    Some(eta) => eta,
                    None => {
                        let dim = self.dim();
                        let mut rhs = vec![0.0; dim];
                        for (i, v) in col.iter() {
                            rhs[i] = v;
                        }
                        let mut sol = vec![0.0; dim];
                        self.core.solve_right(&rhs, &mut sol);
                        self.etas.apply_right(&mut sol);
                        let mut eta = SparseVec::new();
                        for (i, &v) in sol.iter().enumerate() {
                            if v != 0.0 {
                                eta.push(i, v);
                            }
                        }
                        eta
                    }
                };
                self.etas.push(pos, &eta, self.epsilon)
            }
            UpdateMode::ForrestTomlin => {
                self.cached_eta = None;
                self.core.ft_update(pos, col, self.epsilon)
            }
        };
        if stat == LuStatus::Singular {
            self.loaded = false;
        }
        stat
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
        let mut y = vec![0.0; cols.len()];
        for (c, col) in cols.iter().enumerate() {
            for (i, v) in col.iter() {
                y[i] += v * x[c];
            }
        }
        y
    }

    fn check_right(f: &mut FactorLu, cols: &[SparseVec], xref: &[f64], tol: f64) {
        let b = mat_vec(cols, xref);
        let mut x = vec![0.0; cols.len()];
        f.solve_right(&b, &mut x);
        for (a, r) in x.iter().zip(xref.iter()) {
            assert!((a - r).abs() < tol, "{x:?} vs {xref:?}");
        }
    }

    #[test]
    fn test_load_solve_change_eta() {
        let mut cols = columns(&[
            &[2.0, 0.0, 1.0],
            &[1.0, 3.0, 0.0],
            &[0.0, 1.0, 4.0],
        ]);
        let mut f = FactorLu::new(UpdateMode::Eta, 0.01, 1e-2);
        assert_eq!(f.load(&cols), LuStatus::Ok);
        assert!(f.stability() > 0.0);
        check_right(&mut f, &cols, &[1.0, 2.0, 3.0], 1e-10);

        let new_col = SparseVec::from_pairs(&[(0, 1.0), (2, 2.0)]);
        let mut eta = SsVec::zeros(3, 1e-16);
        f.solve_right_for_update(&new_col, &mut eta);
        assert_eq!(f.change(1, &new_col), LuStatus::Ok);
        cols[1] = new_col;
        assert_eq!(f.num_updates(), 1);
        check_right(&mut f, &cols, &[-1.0, 0.5, 2.0], 1e-10);
    }

    #[test]
    fn test_load_solve_change_forrest_tomlin() {
        let mut cols = columns(&[
            &[2.0, 0.0, 1.0],
            &[1.0, 3.0, 0.0],
            &[0.0, 1.0, 4.0],
        ]);
        let mut f = FactorLu::new(UpdateMode::ForrestTomlin, 0.01, 1e-2);
        assert_eq!(f.load(&cols), LuStatus::Ok);

        let new_col = SparseVec::from_pairs(&[(0, 1.0), (1, 1.0), (2, 2.0)]);
        assert_eq!(f.change(2, &new_col), LuStatus::Ok);
        cols[2] = new_col;
        check_right(&mut f, &cols, &[3.0, -1.0, 1.0], 1e-10);

        // Left solves thread through the update as well.
        let bt = vec![1.0, 0.0, -2.0];
        let mut y = vec![0.0; 3];
        f.solve_left(&bt, &mut y);
        for (c, col) in cols.iter().enumerate() {
            let s: f64 = col.iter().map(|(i, v)| y[i] * v).sum();
            assert!((s - bt[c]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_singular_load_reported() {
        let cols = columns(&[
            &[1.0, 1.0],
            &[1.0, 1.0],
        ]);
        let mut f = FactorLu::new(UpdateMode::Eta, 0.01, 1e-2);
        assert_eq!(f.load(&cols), LuStatus::Singular);
        assert!(!f.is_loaded());
        assert_eq!(f.stability(), 0.0);
    }

    #[test]
    fn test_solve_left_unit_rows() {
        let cols = columns(&[
            &[1.0, 4.0, 0.0],
            &[2.0, 5.0, 0.0],
            &[3.0, 6.0, 1.0],
        ]);
        let mut f = FactorLu::new(UpdateMode::Eta, 0.01, 1e-2);
        assert_eq!(f.load(&cols), LuStatus::Ok);
        let mut rho = SsVec::zeros(3, 1e-16);
        f.solve_left_unit(1, &mut rho);
        // rho^T B = e_1: check every column.
        for (c, col) in cols.iter().enumerate() {
            let s: f64 = col.iter().map(|(i, v)| rho.get(i) * v).sum();
            let expect = if c == 1 { 1.0 } else { 0.0 };
            assert!((s - expect).abs() < 1e-10);
        }
    }
}
