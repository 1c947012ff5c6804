//! Semi-sparse vectors.
//!
//! An [`SsVec`] is a dense vector that can additionally carry the index
//! list of its nonzero positions. In "setup" state the index list is
//! valid and sparse consumers iterate over it; after dense writes the
//! vector is "not setup" and behaves like a plain dense array until
//! [`SsVec::setup`] rebuilds the list. Entries with absolute value at or
//! below the vector's zero threshold count as zero.

use super::dense::DenseVec;
use super::sparse::{SparseVec, VecSet};

/// Work estimate factor deciding between the sparse and the dense matrix
/// product kernels.
const SHORT_PRODUCT_FACTOR: f64 = 0.5;

/// Placeholder magnitude stored where an exact cancellation occurred while
/// the position is still tracked in the index list.
const MARKER: f64 = 1e-100;

/// Semi-sparse vector.
#[derive(Debug, Clone)]
pub struct SsVec {
    vals: Vec<f64>,
    idx: Vec<usize>,
    is_setup: bool,
    /// Zero threshold; `|x| <= epsilon` counts as zero.
    pub epsilon: f64,
}

impl SsVec {
    /// Zero vector of dimension `dim`, set up, with threshold `epsilon`.
    pub fn zeros(dim: usize, epsilon: f64) -> Self {
        Self {
            vals: vec![0.0; dim],
            idx: Vec::new(),
            is_setup: true,
            epsilon,
        }
    }

    /// Dimension of the vector.
    pub fn dim(&self) -> usize {
        self.vals.len()
    }

    /// Resize to `new_dim`; the vector is cleared.
    pub fn re_dim(&mut self, new_dim: usize) {
        self.vals.resize(new_dim, 0.0);
        self.clear();
    }

    /// Whether the nonzero index list is valid.
    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    /// Drop the index list information; values stay intact.
    pub fn un_setup(&mut self) {
        self.is_setup = false;
    }

    /// Declare the index list valid without verification. The caller must
    /// have produced a list covering every nonzero position.
    pub fn force_setup(&mut self) {
        self.is_setup = true;
    }

    /// Rebuild the index list: positions with `|x| > epsilon` are kept,
    /// everything else is snapped to exact zero. Linear in the dimension.
    /// Idempotent.
    pub fn setup(&mut self) {
        if self.is_setup {
            // Re-validate the existing list instead of scanning the full
            // dimension: drop entries that decayed below the threshold.
            let eps = self.epsilon;
            let mut n = 0;
            while n < self.idx.len() {
                let i = self.idx[n];
                if self.vals[i].abs() <= eps {
                    self.vals[i] = 0.0;
                    self.idx.swap_remove(n);
                } else {
                    n += 1;
                }
            }
            return;
        }
        self.idx.clear();
        let eps = self.epsilon;
        for (i, v) in self.vals.iter_mut().enumerate() {
            if v.abs() > eps {
                self.idx.push(i);
            } else {
                *v = 0.0;
            }
        }
        self.is_setup = true;
    }

    /// Zero every entry; the result is set up and empty.
    pub fn clear(&mut self) {
        if self.is_setup {
            for &i in &self.idx {
                self.vals[i] = 0.0;
            }
        } else {
            self.vals.fill(0.0);
        }
        self.idx.clear();
        self.is_setup = true;
    }

    /// Number of tracked nonzeros. Requires setup state.
    pub fn size(&self) -> usize {
        debug_assert!(self.is_setup);
        self.idx.len()
    }

    /// Index of the n-th tracked nonzero. Requires setup state.
    pub fn index(&self, n: usize) -> usize {
        debug_assert!(self.is_setup);
        self.idx[n]
    }

    /// Value at position `i`.
    pub fn get(&self, i: usize) -> f64 {
        self.vals[i]
    }

    /// Tracked nonzero index list.
    pub fn indices(&self) -> &[usize] {
        debug_assert!(self.is_setup);
        &self.idx
    }

    /// Dense value storage.
    pub fn values(&self) -> &[f64] {
        &self.vals
    }

    /// Mutable dense value storage; drops the setup state.
    pub fn alt_values(&mut self) -> &mut [f64] {
        self.is_setup = false;
        &mut self.vals
    }

    /// Iterate over `(index, value)` of tracked nonzeros.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        debug_assert!(self.is_setup);
        self.idx.iter().map(move |&i| (i, self.vals[i]))
    }

    /// Add a nonzero at a position currently holding zero.
    pub fn add(&mut self, i: usize, x: f64) {
        debug_assert!(self.is_setup);
        debug_assert_eq!(self.vals[i], 0.0);
        self.idx.push(i);
        self.vals[i] = x;
    }

    /// Set position `i` to `x`, maintaining the index list when set up.
    pub fn set_value(&mut self, i: usize, x: f64) {
        if self.is_setup {
            let tracked = self.vals[i] != 0.0;
            if !tracked && x != 0.0 {
                self.idx.push(i);
            } else if tracked && x == 0.0 {
                if let Some(n) = self.idx.iter().position(|&j| j == i) {
                    self.idx.swap_remove(n);
                }
            }
        }
        self.vals[i] = x;
    }

    /// Clear position `i`, maintaining the index list when set up.
    pub fn clear_idx(&mut self, i: usize) {
        if self.is_setup {
            if let Some(n) = self.idx.iter().position(|&j| j == i) {
                self.idx.swap_remove(n);
            }
        }
        self.vals[i] = 0.0;
    }

    /// Clear the n-th tracked nonzero. Requires setup state.
    pub fn clear_num(&mut self, n: usize) {
        debug_assert!(self.is_setup);
        let i = self.idx[n];
        self.vals[i] = 0.0;
        self.idx.swap_remove(n);
    }

    /// Infinity norm.
    pub fn max_abs(&self) -> f64 {
        if self.is_setup {
            self.idx
                .iter()
                .fold(0.0, |m, &i| m.max(self.vals[i].abs()))
        } else {
            self.vals.iter().fold(0.0, |m, v| m.max(v.abs()))
        }
    }

    /// Squared euclidian norm.
    pub fn length2(&self) -> f64 {
        if self.is_setup {
            self.idx.iter().map(|&i| self.vals[i] * self.vals[i]).sum()
        } else {
            self.vals.iter().map(|v| v * v).sum()
        }
    }

    /// Euclidian norm.
    pub fn length(&self) -> f64 {
        self.length2().sqrt()
    }

    /// `self *= x`.
    pub fn scale(&mut self, x: f64) {
        if self.is_setup {
            for &i in &self.idx {
                self.vals[i] *= x;
            }
        } else {
            for v in &mut self.vals {
                *v *= x;
            }
        }
    }

    /// `self += alpha * v` for a sparse operand. Keeps the vector set up;
    /// exact cancellations leave a tiny marker value so the tracked
    /// positions stay nonzero until the next `setup` pass.
    pub fn mult_add_sparse(&mut self, alpha: f64, v: &SparseVec) {
        if alpha == 0.0 {
            return;
        }
        if self.is_setup {
            for (i, x) in v.iter() {
                let old = self.vals[i];
                if old == 0.0 {
                    self.idx.push(i);
                }
                let mut new = old + alpha * x;
                if new == 0.0 {
                    new = MARKER;
                }
                self.vals[i] = new;
            }
        } else {
            for (i, x) in v.iter() {
                self.vals[i] += alpha * x;
            }
        }
    }

    /// `self += alpha * v` for a semi-sparse operand.
    pub fn mult_add(&mut self, alpha: f64, v: &SsVec) {
        if alpha == 0.0 {
            return;
        }
        if v.is_setup() {
            if self.is_setup {
                for (i, x) in v.iter_nonzero() {
                    let old = self.vals[i];
                    if old == 0.0 {
                        self.idx.push(i);
                    }
                    let mut new = old + alpha * x;
                    if new == 0.0 {
                        new = MARKER;
                    }
                    self.vals[i] = new;
                }
            } else {
                for (i, x) in v.iter_nonzero() {
                    self.vals[i] += alpha * x;
                }
            }
        } else {
            // Dense absorption invalidates the index list.
            self.un_setup();
            for (a, b) in self.vals.iter_mut().zip(v.vals.iter()) {
                *a += alpha * b;
            }
        }
    }

    /// `self += alpha * v` for a dense operand; leaves the vector not
    /// set up.
    pub fn mult_add_dense(&mut self, alpha: f64, v: &DenseVec) {
        self.un_setup();
        for (a, b) in self.vals.iter_mut().zip(v.as_slice().iter()) {
            *a += alpha * b;
        }
    }

    /// Inner product with a dense slice.
    pub fn dot_slice(&self, dense: &[f64]) -> f64 {
        if self.is_setup {
            self.idx.iter().map(|&i| self.vals[i] * dense[i]).sum()
        } else {
            self.vals
                .iter()
                .zip(dense.iter())
                .map(|(a, b)| a * b)
                .sum()
        }
    }

    /// Inner product with a sparse operand.
    pub fn dot_sparse(&self, v: &SparseVec) -> f64 {
        v.iter().map(|(i, x)| self.vals[i] * x).sum()
    }

    /// Copy assign from a sparse vector; the result is set up.
    pub fn assign_sparse(&mut self, rhs: &SparseVec) {
        self.clear();
        for (i, x) in rhs.iter() {
            if x != 0.0 {
                self.idx.push(i);
                self.vals[i] = x;
            }
        }
    }

    /// Set up `rhs` and copy its contents into `self`.
    pub fn setup_and_assign(&mut self, rhs: &mut SsVec) {
        rhs.setup();
        self.clear();
        for (i, x) in rhs.iter_nonzero() {
            self.idx.push(i);
            self.vals[i] = x;
        }
    }

    /// `self := A * x` where `A` is a set of sparse columns and `x` is a
    /// set-up semi-sparse vector over the members of `A`.
    ///
    /// Dispatches on the estimated work: a single-nonzero `x` scatters one
    /// column, a "short" product accumulates sparsely and keeps the result
    /// set up, and the dense fallback leaves the result not set up.
    pub fn assign_product(&mut self, a: &VecSet, x: &SsVec) {
        debug_assert!(x.is_setup());
        debug_assert_eq!(a.num(), x.dim());
        self.clear();

        if x.size() == 0 {
            return;
        }
        if x.size() == 1 {
            self.assign_product_one(a, x);
        } else if (x.size() * a.mem_size()) as f64
            <= SHORT_PRODUCT_FACTOR * self.dim() as f64 * a.num() as f64
        {
            self.assign_product_short(a, x);
        } else {
            self.assign_product_full(a, x);
            self.is_setup = false;
        }
    }

    /// `self := A * x`, setting up `x` on the fly when it is not.
    ///
    /// The not-set-up path scans the dense array of `x` with a sentinel
    /// written to the last slot so the inner skip loop needs no range
    /// check; the sentinel slot is restored before returning.
    pub fn assign_product_and_setup(&mut self, a: &VecSet, x: &mut SsVec) {
        if x.is_setup() {
            self.assign_product(a, x);
            return;
        }

        self.clear();
        let xdim = x.dim();
        if xdim == 0 {
            x.force_setup();
            return;
        }

        let eps = x.epsilon;
        let last = xdim - 1;
        let saved = x.vals[last];
        x.vals[last] = MARKER; // sentinel: loop below stops at a nonzero
        x.idx.clear();

        let mut k = 0;
        loop {
            while x.vals[k] == 0.0 {
                k += 1;
            }
            if k == last {
                break;
            }
            let y = x.vals[k];
            if y.abs() > eps {
                x.idx.push(k);
                for (i, v) in a.vec(k).iter() {
                    self.vals[i] += y * v;
                }
            } else {
                x.vals[k] = 0.0;
            }
            k += 1;
        }

        // Restore the sentinel slot.
        x.vals[last] = saved;
        if saved.abs() > eps {
            x.idx.push(last);
            for (i, v) in a.vec(last).iter() {
                self.vals[i] += saved * v;
            }
        } else {
            x.vals[last] = 0.0;
        }
        x.is_setup = true;
        self.is_setup = false;
    }

    /// `self := x^T * A`: one inner product per member of `A`. The result
    /// (dimension `A.num()`) is set up with threshold pruning.
    pub fn assign_product_transposed(&mut self, x: &SsVec, a: &VecSet) {
        debug_assert_eq!(a.num(), self.dim());
        self.clear();
        let eps = self.epsilon;
        for n in 0..a.num() {
            let y = x.dot_sparse(a.vec(n));
            if y.abs() > eps {
                self.vals[n] = y;
                self.idx.push(n);
            }
        }
    }

    fn assign_product_one(&mut self, a: &VecSet, x: &SsVec) {
        let k = x.index(0);
        let y = x.get(k);
        for (i, v) in a.vec(k).iter() {
            self.vals[i] = y * v;
            self.idx.push(i);
        }
    }

    fn assign_product_short(&mut self, a: &VecSet, x: &SsVec) {
        // First column scatters, the rest accumulate. A marker value keeps
        // exactly-cancelled positions in the index list; the final sweep
        // prunes everything at or below the threshold.
        let k0 = x.index(0);
        let y0 = x.get(k0);
        for (i, v) in a.vec(k0).iter() {
            let y = y0 * v;
            if y != 0.0 {
                self.vals[i] = y;
                self.idx.push(i);
            }
        }
        for n in 1..x.size() {
            let k = x.index(n);
            let xx = x.get(k);
            for (i, v) in a.vec(k).iter() {
                let old = self.vals[i];
                if old == 0.0 {
                    self.idx.push(i);
                }
                let mut y = old + xx * v;
                if y == 0.0 {
                    y = MARKER;
                }
                self.vals[i] = y;
            }
        }
        let eps = self.epsilon;
        let mut n = 0;
        while n < self.idx.len() {
            let i = self.idx[n];
            if self.vals[i].abs() <= eps {
                self.vals[i] = 0.0;
                self.idx.swap_remove(n);
            } else {
                n += 1;
            }
        }
    }

    fn assign_product_full(&mut self, a: &VecSet, x: &SsVec) {
        for (k, y) in x.iter_nonzero() {
            for (i, v) in a.vec(k).iter() {
                self.vals[i] += y * v;
            }
        }
    }

    /// Debug validation of the setup invariant: every nonzero position is
    /// tracked and every tracked position holds a nonzero.
    #[cfg(debug_assertions)]
    pub fn is_consistent(&self) -> bool {
        if !self.is_setup {
            return true;
        }
        for (i, v) in self.vals.iter().enumerate() {
            if *v != 0.0 && !self.idx.contains(&i) {
                return false;
            }
        }
        self.idx.iter().all(|&i| self.vals[i] != 0.0)
    }
}

impl std::ops::MulAssign<f64> for SsVec {
    fn mul_assign(&mut self, x: f64) {
        self.scale(x);
    }
}

impl std::ops::AddAssign<&SparseVec> for SsVec {
    fn add_assign(&mut self, v: &SparseVec) {
        self.mult_add_sparse(1.0, v);
    }
}

impl std::ops::SubAssign<&SparseVec> for SsVec {
    fn sub_assign(&mut self, v: &SparseVec) {
        self.mult_add_sparse(-1.0, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_set() -> VecSet {
        // 3x3 matrix by columns:
        //   [1 0 2]
        //   [0 3 0]
        //   [4 0 5]
        let mut a = VecSet::new(3);
        a.add(SparseVec::from_pairs(&[(0, 1.0), (2, 4.0)]));
        a.add(SparseVec::from_pairs(&[(1, 3.0)]));
        a.add(SparseVec::from_pairs(&[(0, 2.0), (2, 5.0)]));
        a
    }

    #[test]
    fn test_setup_snaps_small_entries() {
        let mut v = SsVec::zeros(4, 1e-12);
        {
            let vals = v.alt_values();
            vals[0] = 1.0;
            vals[2] = 1e-15;
            vals[3] = -2.0;
        }
        assert!(!v.is_setup());
        v.setup();
        assert!(v.is_setup());
        assert_eq!(v.size(), 2);
        assert_eq!(v.get(2), 0.0);
        assert!(v.is_consistent());
    }

    #[test]
    fn test_set_value_tracks_indices() {
        let mut v = SsVec::zeros(3, 1e-12);
        v.set_value(1, 5.0);
        assert_eq!(v.size(), 1);
        v.set_value(1, 0.0);
        assert_eq!(v.size(), 0);
        assert!(v.is_consistent());
    }

    #[test]
    fn test_assign_product_one() {
        let a = column_set();
        let mut x = SsVec::zeros(3, 1e-12);
        x.set_value(2, 2.0);
        let mut y = SsVec::zeros(3, 1e-12);
        y.assign_product(&a, &x);
        assert!(y.is_setup());
        assert_eq!(y.get(0), 4.0);
        assert_eq!(y.get(2), 10.0);
    }

    #[test]
    fn test_assign_product_matches_dense() {
        let a = column_set();
        let mut x = SsVec::zeros(3, 1e-12);
        x.set_value(0, 1.0);
        x.set_value(1, -1.0);
        x.set_value(2, 0.5);
        let mut y = SsVec::zeros(3, 1e-12);
        y.assign_product(&a, &x);
        // Dense reference: A * [1, -1, 0.5]
        assert!((y.get(0) - 2.0).abs() < 1e-12);
        assert!((y.get(1) + 3.0).abs() < 1e-12);
        assert!((y.get(2) - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_assign_product_and_setup_restores_sentinel() {
        let a = column_set();
        let mut x = SsVec::zeros(3, 1e-12);
        {
            let vals = x.alt_values();
            vals[0] = 1.0;
            vals[2] = 3.0;
        }
        let mut y = SsVec::zeros(3, 1e-12);
        y.assign_product_and_setup(&a, &mut x);
        assert!(x.is_setup());
        assert_eq!(x.get(2), 3.0);
        assert_eq!(x.size(), 2);
        assert!((y.get(0) - 7.0).abs() < 1e-12);
        assert!((y.get(2) - 19.0).abs() < 1e-12);
    }

    #[test]
    fn test_transposed_product() {
        let a = column_set();
        let mut x = SsVec::zeros(3, 1e-12);
        x.set_value(0, 1.0);
        x.set_value(2, 1.0);
        let mut y = SsVec::zeros(3, 1e-12);
        y.assign_product_transposed(&x, &a);
        // x^T A = [1+4, 0, 2+5]
        assert_eq!(y.get(0), 5.0);
        assert_eq!(y.get(1), 0.0);
        assert_eq!(y.get(2), 7.0);
        assert_eq!(y.size(), 2);
    }

    #[test]
    fn test_cancellation_keeps_invariant() {
        let mut v = SsVec::zeros(2, 1e-12);
        v.set_value(0, 1.0);
        let s = SparseVec::from_pairs(&[(0, -1.0)]);
        v.mult_add_sparse(1.0, &s);
        assert!(v.is_consistent());
        v.setup();
        assert_eq!(v.size(), 0);
        assert_eq!(v.get(0), 0.0);
    }
}
