//! Entering/leaving variable selection.
//!
//! A pricer picks the most promising violated test value. The kernel
//! maintains the test arrays (full pricing) and hands them over as
//! slices; partial pricing restricts the scan to a rotating window.
//!
//! Index convention: "matrix-side" indices enumerate the ids priced
//! through the pricing vector (columns in column representation, rows in
//! row representation); "dim-side" indices enumerate the ids priced
//! through the co-pricing vector.

mod dantzig;
mod devex;
mod steepest;
mod weight;

pub use dantzig::DantzigPricer;
pub use devex::DevexPricer;
pub use steepest::SteepestPricer;
pub use weight::WeightPricer;

use crate::basis::Id;
use crate::linalg::SsVec;
use crate::settings::{AlgoType, PricerKind, PricingMode, Representation};

/// Read view for entering selection.
pub struct PriceInput<'a> {
    /// Test values over matrix-side ids (violation iff negative).
    pub test: &'a [f64],
    /// Test values over dim-side ids; entries of basic ids are ignored.
    pub cotest: &'a [f64],
    /// Marks dim-side ids that are basic (never candidates).
    pub dim_is_basic: &'a [bool],
    /// Marks matrix-side ids that are basic.
    pub matrix_is_basic: &'a [bool],
    pub delta: f64,
    pub rep: Representation,
}

impl PriceInput<'_> {
    /// Translate a matrix-side index into an id.
    pub fn matrix_id(&self, k: usize) -> Id {
        match self.rep {
            Representation::Column => Id::Col(k),
            Representation::Row => Id::Row(k),
        }
    }

    /// Translate a dim-side index into an id.
    pub fn dim_id(&self, k: usize) -> Id {
        match self.rep {
            Representation::Column => Id::Row(k),
            Representation::Row => Id::Col(k),
        }
    }
}

/// Pivot context handed to the update hooks after a basis change.
pub struct PivotInfo<'a> {
    /// `B^{-1} a_q`: the entering column in basis coordinates.
    pub pivot_col: &'a SsVec,
    /// Row coefficients over matrix-side ids.
    pub pivot_row: &'a SsVec,
    /// `rho = B^{-T} e_r` over dim-side positions.
    pub rho: &'a SsVec,
    /// The pivot element.
    pub pivot_val: f64,
}

/// Variable selection strategy.
pub trait Pricer {
    /// Size (or re-size) internal score arrays.
    fn load(&mut self, n_matrix: usize, n_dim: usize);

    /// Drop all learned state.
    fn clear(&mut self);

    fn set_type(&mut self, t: AlgoType);

    fn set_rep(&mut self, r: Representation);

    /// Entering variant: pick a violated nonbasic id, or `None` at
    /// (shifted) optimality.
    fn select_enter(&mut self, inp: &PriceInput) -> Option<Id>;

    /// Leaving variant: pick a violated basic position, or `None` when
    /// the basic side is feasible.
    fn select_leave(&mut self, ftest: &[f64], delta: f64) -> Option<usize>;

    /// Notification: `id` entered the basis at position `pos`.
    fn entered4(&mut self, id: Id, pos: usize, info: &PivotInfo);

    /// Notification: position `pos` left the basis, releasing `id`.
    fn left4(&mut self, pos: usize, id: Id, info: &PivotInfo);
}

/// Concrete pricer dispatch.
pub enum AnyPricer {
    Dantzig(DantzigPricer),
    Devex(DevexPricer),
    Steepest(SteepestPricer),
    Weight(WeightPricer),
}

impl AnyPricer {
    pub fn new(kind: PricerKind, mode: PricingMode) -> Self {
        match kind {
            PricerKind::Dantzig => AnyPricer::Dantzig(DantzigPricer::new(mode)),
            PricerKind::Devex => AnyPricer::Devex(DevexPricer::new()),
            PricerKind::SteepestEdge => AnyPricer::Steepest(SteepestPricer::new()),
            PricerKind::Weight => AnyPricer::Weight(WeightPricer::new()),
        }
    }

    fn inner(&mut self) -> &mut dyn Pricer {
        match self {
            AnyPricer::Dantzig(p) => p,
            AnyPricer::Devex(p) => p,
            AnyPricer::Steepest(p) => p,
            AnyPricer::Weight(p) => p,
        }
    }
}

impl Pricer for AnyPricer {
    fn load(&mut self, n_matrix: usize, n_dim: usize) {
        self.inner().load(n_matrix, n_dim)
    }

    fn clear(&mut self) {
        self.inner().clear()
    }

    fn set_type(&mut self, t: AlgoType) {
        self.inner().set_type(t)
    }

    fn set_rep(&mut self, r: Representation) {
        self.inner().set_rep(r)
    }

    fn select_enter(&mut self, inp: &PriceInput) -> Option<Id> {
        self.inner().select_enter(inp)
    }

    fn select_leave(&mut self, ftest: &[f64], delta: f64) -> Option<usize> {
        self.inner().select_leave(ftest, delta)
    }

    fn entered4(&mut self, id: Id, pos: usize, info: &PivotInfo) {
        self.inner().entered4(id, pos, info)
    }

    fn left4(&mut self, pos: usize, id: Id, info: &PivotInfo) {
        self.inner().left4(pos, id, info)
    }
}
