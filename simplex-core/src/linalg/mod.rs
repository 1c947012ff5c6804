//! Vector and factorization primitives for the simplex kernel.

pub mod dense;
pub mod factor;
pub mod lu;
pub mod sparse;
pub mod ssvector;
pub mod update;

pub use dense::DenseVec;
pub use factor::FactorLu;
pub use lu::LuStatus;
pub use sparse::{SparseVec, VecSet};
pub use ssvector::SsVec;
