//! Refinement settings.

use num_rational::BigRational;
use num_traits::FromPrimitive;

/// Settings for the iterative refinement loop.
#[derive(Debug, Clone)]
pub struct RefineSettings {
    /// Primal feasibility tolerance in the exact domain.
    pub feastol: BigRational,

    /// Dual optimality tolerance in the exact domain.
    pub opttol: BigRational,

    /// Maximum refinement rounds per (certification) sub-problem.
    pub max_refinements: usize,

    /// Required per-round improvement of the maximal violation.
    pub violation_improvement_factor: u32,

    /// Consecutive failed refinements tolerated before giving up.
    pub max_failed_refinements: usize,

    /// Multiplier applied to the scale ceiling each round.
    pub error_correction_factor: f64,

    /// Round scaling factors to powers of two.
    pub power_scaling: bool,

    /// Turn ranged rows into equalities with slack columns.
    pub equality_transform: bool,

    /// Replace extreme matrix coefficients by lifted auxiliary columns.
    pub lifting: bool,

    /// Attempt continued-fraction reconstruction of the solution.
    pub rational_reconstruction: bool,

    /// Attempt an exact factorization of the final basis.
    pub rational_factorization: bool,

    /// Reconstruction frequency: try every `ratrec_freq`-th round.
    pub ratrec_freq: usize,

    /// Coefficient magnitude above which lifting kicks in.
    pub lift_max: f64,

    /// Coefficient magnitude below which lifting kicks in.
    pub lift_min: f64,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            feastol: ratio_pow10(-9),
            opttol: ratio_pow10(-9),
            max_refinements: 30,
            violation_improvement_factor: 16,
            max_failed_refinements: 2,
            error_correction_factor: 1.1,
            power_scaling: true,
            equality_transform: false,
            lifting: false,
            rational_reconstruction: true,
            rational_factorization: true,
            ratrec_freq: 2,
            lift_max: 1e7,
            lift_min: 1e-7,
        }
    }
}

/// `10^exp` as an exact rational.
pub fn ratio_pow10(exp: i32) -> BigRational {
    let base = BigRational::from_u32(10).unwrap();
    let mut r = BigRational::from_u32(1).unwrap();
    for _ in 0..exp.unsigned_abs() {
        r *= &base;
    }
    if exp < 0 {
        r.recip()
    } else {
        r
    }
}
