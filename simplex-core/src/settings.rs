//! Kernel settings and enumerated solver options.

/// Which space the basis lives in.
///
/// In `Column` representation the basis matrix is square of order `nRows`
/// and the simplex walks primal vertices; in `Row` representation it is of
/// order `nCols` and the same machinery walks dual vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Basis of order `nRows`; pricing runs over columns.
    Column,
    /// Basis of order `nCols`; pricing runs over rows.
    Row,
}

impl Representation {
    /// Sign used to classify descriptor statuses as basic/nonbasic.
    pub fn sign(self) -> i32 {
        match self {
            Representation::Column => 1,
            Representation::Row => -1,
        }
    }
}

/// Which of the two symmetric simplex variants runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgoType {
    /// Select a violated nonbasic variable to enter the basis.
    Enter,
    /// Select a violated basic variable to leave the basis.
    Leave,
}

/// Pricing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingMode {
    /// The kernel maintains the full pricing vector every iteration.
    Full,
    /// Tests are computed on demand over a rotating window.
    Partial,
}

/// Pricer implementation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricerKind {
    /// Textbook most-violated selection.
    Dantzig,
    /// Approximate steepest edge with reference framework.
    Devex,
    /// Exact steepest edge norms, updated per pivot.
    SteepestEdge,
    /// Static penalty weights from objective and column norms.
    Weight,
}

/// Ratio tester implementation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioKind {
    /// First minimal ratio with a stability tie-break.
    Textbook,
    /// Harris two-phase test with bound relaxation.
    Harris,
}

/// LU update mode for the basis factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Product-form eta file appended after the factors.
    Eta,
    /// Forrest-Tomlin row-spike elimination inside the factors.
    ForrestTomlin,
}

/// Objective sense of the problem as posed by the caller.
///
/// Internally the kernel always maximizes; `value()` undoes the flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

/// Solver settings and parameters.
#[derive(Debug, Clone)]
pub struct KernelSettings {
    /// Basis representation.
    pub representation: Representation,

    /// Starting algorithm; the kernel may alternate internally to restore
    /// feasibility of the other side.
    pub algorithm: AlgoType,

    /// Pricing mode (full or partial).
    pub pricing: PricingMode,

    /// Pricer implementation.
    pub pricer: PricerKind,

    /// Ratio tester implementation.
    pub ratio_tester: RatioKind,

    /// LU update mode.
    pub update_mode: UpdateMode,

    /// Feasibility/optimality tolerance delta.
    pub delta: f64,

    /// Nonzero threshold epsilon for semi-sparse vectors.
    pub epsilon: f64,

    /// Markowitz threshold floor for LU pivoting.
    pub markowitz_floor: f64,

    /// Minimum acceptable factorization stability.
    pub min_stability: f64,

    /// Refactorize at the latest after this many updates.
    pub refactor_interval: usize,

    /// Maximum simplex iterations (None = unlimited).
    pub max_iters: Option<usize>,

    /// Time limit in milliseconds (None = unlimited).
    pub time_limit_ms: Option<u64>,

    /// Abort once the internal objective passes this value.
    pub objective_limit: Option<f64>,

    /// Consecutive degenerate steps tolerated before perturbation.
    pub max_cycle: usize,

    /// Perturbation magnitude range for the anti-cycling guard.
    pub perturb_min: f64,
    /// See `perturb_min`.
    pub perturb_max: f64,
}

impl Default for KernelSettings {
    fn default() -> Self {
        // Environment overrides mirror the style used elsewhere in the
        // workspace; handy when bisecting numerical trouble.
        let refactor_interval = std::env::var("SIMPLEX_REFACTOR_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(200);

        Self {
            representation: Representation::Column,
            algorithm: AlgoType::Enter,
            pricing: PricingMode::Full,
            pricer: PricerKind::Devex,
            ratio_tester: RatioKind::Harris,
            update_mode: UpdateMode::ForrestTomlin,
            delta: 1e-6,
            epsilon: 1e-16,
            markowitz_floor: 0.01,
            min_stability: 1e-2,
            refactor_interval,
            max_iters: None,
            time_limit_ms: None,
            objective_limit: None,
            max_cycle: 100,
            perturb_min: 1e-8,
            perturb_max: 1e-6,
        }
    }
}
