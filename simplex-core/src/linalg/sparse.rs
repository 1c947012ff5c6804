//! Sparse vector and sparse column-set primitives.

/// Sparse `(index, value)` vector.
///
/// Indices are unique; whether they are sorted depends on the producer.
/// Iteration order is insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVec {
    idx: Vec<usize>,
    val: Vec<f64>,
}

impl SparseVec {
    /// Empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty vector with reserved capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            idx: Vec::with_capacity(cap),
            val: Vec::with_capacity(cap),
        }
    }

    /// Build from parallel index/value slices.
    pub fn from_pairs(pairs: &[(usize, f64)]) -> Self {
        let mut v = Self::with_capacity(pairs.len());
        for &(i, x) in pairs {
            v.push(i, x);
        }
        v
    }

    /// Unit vector `e_i` (a single 1.0 entry).
    pub fn unit(i: usize) -> Self {
        Self { idx: vec![i], val: vec![1.0] }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.idx.len()
    }

    /// True if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.idx.clear();
        self.val.clear();
    }

    /// Append an entry. The index must not already be present.
    pub fn push(&mut self, i: usize, x: f64) {
        debug_assert!(!self.idx.contains(&i), "duplicate index {i}");
        self.idx.push(i);
        self.val.push(x);
    }

    /// Iterate over `(index, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.idx.iter().copied().zip(self.val.iter().copied())
    }

    /// Stored indices.
    pub fn indices(&self) -> &[usize] {
        &self.idx
    }

    /// Stored values.
    pub fn values(&self) -> &[f64] {
        &self.val
    }

    /// n-th stored index.
    pub fn index(&self, n: usize) -> usize {
        self.idx[n]
    }

    /// n-th stored value.
    pub fn value(&self, n: usize) -> f64 {
        self.val[n]
    }

    /// Value at logical position `i`, zero if absent. Linear scan.
    pub fn get(&self, i: usize) -> f64 {
        match self.idx.iter().position(|&j| j == i) {
            Some(n) => self.val[n],
            None => 0.0,
        }
    }

    /// Overwrite the n-th stored value.
    pub fn set_value(&mut self, n: usize, x: f64) {
        self.val[n] = x;
    }

    /// Remove the n-th stored entry (order not preserved).
    pub fn swap_remove(&mut self, n: usize) {
        self.idx.swap_remove(n);
        self.val.swap_remove(n);
    }

    /// Remove the entry with logical index `i` if present.
    pub fn remove_index(&mut self, i: usize) {
        if let Some(n) = self.idx.iter().position(|&j| j == i) {
            self.swap_remove(n);
        }
    }

    /// Remove the entry at logical index `i` and shift all larger indices
    /// down by one (used when a dimension slot disappears).
    pub fn remove_and_shift(&mut self, i: usize) {
        self.remove_index(i);
        for j in &mut self.idx {
            if *j > i {
                *j -= 1;
            }
        }
    }

    /// Scale all values by `x`.
    pub fn scale(&mut self, x: f64) {
        for v in &mut self.val {
            *v *= x;
        }
    }

    /// Drop entries with `|value| <= eps`.
    pub fn prune(&mut self, eps: f64) {
        let mut n = 0;
        while n < self.val.len() {
            if self.val[n].abs() <= eps {
                self.swap_remove(n);
            } else {
                n += 1;
            }
        }
    }

    /// Sort entries by index.
    pub fn sort(&mut self) {
        let mut perm: Vec<usize> = (0..self.idx.len()).collect();
        perm.sort_unstable_by_key(|&n| self.idx[n]);
        self.idx = perm.iter().map(|&n| self.idx[n]).collect();
        self.val = perm.iter().map(|&n| self.val[n]).collect();
    }

    /// Inner product with a dense slice.
    pub fn dot_slice(&self, dense: &[f64]) -> f64 {
        self.iter().map(|(i, x)| dense[i] * x).sum()
    }

    /// Infinity norm.
    pub fn max_abs(&self) -> f64 {
        self.val.iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    /// Squared euclidian norm.
    pub fn length2(&self) -> f64 {
        self.val.iter().map(|v| v * v).sum()
    }
}

/// An ordered set of sparse vectors of a common dimension, used for the
/// row-wise and column-wise copies of the constraint matrix and for basis
/// column collections.
#[derive(Debug, Clone, Default)]
pub struct VecSet {
    dim: usize,
    vecs: Vec<SparseVec>,
    nnz: usize,
}

impl VecSet {
    /// Empty set of vectors of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self { dim, vecs: Vec::new(), nnz: 0 }
    }

    /// Common dimension of the member vectors.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Change the common dimension (entries beyond it must not exist).
    pub fn re_dim(&mut self, dim: usize) {
        debug_assert!(self
            .vecs
            .iter()
            .all(|v| v.indices().iter().all(|&i| i < dim)));
        self.dim = dim;
    }

    /// Number of member vectors.
    pub fn num(&self) -> usize {
        self.vecs.len()
    }

    /// Total number of stored nonzeros.
    pub fn mem_size(&self) -> usize {
        self.nnz
    }

    /// The n-th member vector.
    pub fn vec(&self, n: usize) -> &SparseVec {
        &self.vecs[n]
    }

    /// Append a member vector.
    pub fn add(&mut self, v: SparseVec) {
        debug_assert!(v.indices().iter().all(|&i| i < self.dim));
        self.nnz += v.len();
        self.vecs.push(v);
    }

    /// Replace the n-th member vector.
    pub fn replace(&mut self, n: usize, v: SparseVec) {
        self.nnz = self.nnz - self.vecs[n].len() + v.len();
        self.vecs[n] = v;
    }

    /// Remove the last member vector.
    pub fn pop(&mut self) -> Option<SparseVec> {
        let v = self.vecs.pop();
        if let Some(ref v) = v {
            self.nnz -= v.len();
        }
        v
    }

    /// Mutate a single coefficient of member `n` at logical index `i`.
    pub fn set_entry(&mut self, n: usize, i: usize, x: f64) {
        let v = &mut self.vecs[n];
        if let Some(p) = v.indices().iter().position(|&j| j == i) {
            if x == 0.0 {
                v.swap_remove(p);
                self.nnz -= 1;
            } else {
                v.set_value(p, x);
            }
        } else if x != 0.0 {
            v.push(i, x);
            self.nnz += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_iter() {
        let mut v = SparseVec::new();
        v.push(3, 1.5);
        v.push(0, -2.0);
        let pairs: Vec<_> = v.iter().collect();
        assert_eq!(pairs, vec![(3, 1.5), (0, -2.0)]);
    }

    #[test]
    fn test_prune_sort() {
        let mut v = SparseVec::from_pairs(&[(2, 1e-20), (0, 1.0), (5, -3.0)]);
        v.prune(1e-12);
        v.sort();
        let pairs: Vec<_> = v.iter().collect();
        assert_eq!(pairs, vec![(0, 1.0), (5, -3.0)]);
    }

    #[test]
    fn test_vecset_entry_updates() {
        let mut set = VecSet::new(4);
        set.add(SparseVec::from_pairs(&[(0, 1.0), (2, 2.0)]));
        assert_eq!(set.mem_size(), 2);

        set.set_entry(0, 2, 0.0);
        assert_eq!(set.mem_size(), 1);
        assert_eq!(set.vec(0).get(2), 0.0);

        set.set_entry(0, 3, 4.0);
        assert_eq!(set.vec(0).get(3), 4.0);
        assert_eq!(set.mem_size(), 2);
    }
}
