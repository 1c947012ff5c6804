//! End-to-end tests for the exact refinement solver.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use simplex_core::linalg::SparseVec;
use simplex_core::problem::LpProblem;
use simplex_core::settings::{KernelSettings, Sense};
use simplex_exact::{ExactSolver, ExactStatus, RefineSettings};

const INF: f64 = f64::INFINITY;

fn rat(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

fn build_lp(
    sense: Sense,
    obj: &[f64],
    bounds: &[(f64, f64)],
    rows: &[(&[(usize, f64)], f64, f64)],
) -> LpProblem {
    let mut lp = LpProblem::new(sense);
    for (j, &c) in obj.iter().enumerate() {
        let (lo, up) = bounds[j];
        lp.add_col(&SparseVec::new(), c, lo, up).unwrap();
    }
    for (coeffs, lhs, rhs) in rows {
        lp.add_row(&SparseVec::from_pairs(coeffs), *lhs, *rhs).unwrap();
    }
    lp
}

fn solve(lp: LpProblem, settings: RefineSettings) -> ExactSolver {
    let mut solver = ExactSolver::new(lp, KernelSettings::default(), settings).unwrap();
    solver.solve().unwrap();
    solver
}

#[test]
fn test_trivial_exact_optimum() {
    let lp = build_lp(
        Sense::Maximize,
        &[1.0, 1.0],
        &[(0.0, INF), (0.0, INF)],
        &[(&[(0, 1.0), (1, 1.0)], f64::NEG_INFINITY, 1.0)],
    );
    let solver = solve(lp, RefineSettings::default());
    assert_eq!(solver.status(), ExactStatus::Optimal);
    // The optimum is exactly 1, not merely within tolerance.
    assert_eq!(solver.objective_value(), rat(1, 1));
    let x = solver.primal();
    assert_eq!(&x[0] + &x[1], rat(1, 1));
}

#[test]
fn test_refinement_gain_on_tiny_objective() {
    // max 1e-15 x  s.t.  x <= 1: the optimal basis is found in double
    // precision, but the exact optimum 10^-15 requires the rational
    // domain. The refinement must certify it exactly.
    let lp = build_lp(
        Sense::Maximize,
        &[1e-15],
        &[(0.0, INF)],
        &[(&[(0, 1.0)], f64::NEG_INFINITY, 1.0)],
    );
    let solver = solve(lp, RefineSettings::default());
    assert_eq!(solver.status(), ExactStatus::Optimal);
    // 1e-15 as a double is a dyadic rational; the exact optimum is that
    // dyadic value times exactly 1.
    let expected = BigRational::from_float(1e-15).unwrap();
    assert_eq!(solver.objective_value(), expected);
    assert_eq!(solver.primal()[0], rat(1, 1));
}

#[test]
fn test_exact_fractional_optimum() {
    // max x0 + x1  s.t.  3 x0 + x1 <= 1, x0 + 3 x1 <= 1, x >= 0
    // Optimum x = (1/4, 1/4), value 1/2: exact rationals required.
    let lp = build_lp(
        Sense::Maximize,
        &[1.0, 1.0],
        &[(0.0, INF), (0.0, INF)],
        &[
            (&[(0, 3.0), (1, 1.0)][..], f64::NEG_INFINITY, 1.0),
            (&[(0, 1.0), (1, 3.0)][..], f64::NEG_INFINITY, 1.0),
        ],
    );
    let solver = solve(lp, RefineSettings::default());
    assert_eq!(solver.status(), ExactStatus::Optimal);
    assert_eq!(solver.objective_value(), rat(1, 2));
    assert_eq!(solver.primal()[0], rat(1, 4));
    assert_eq!(solver.primal()[1], rat(1, 4));
}

#[test]
fn test_unbounded_certified_with_ray() {
    // max x  s.t.  x >= 0: unbounded; the certification LP must confirm
    // tau >= 1 and produce an exact ray.
    let lp = build_lp(Sense::Maximize, &[1.0], &[(0.0, INF)], &[]);
    let solver = solve(lp, RefineSettings::default());
    assert_eq!(solver.status(), ExactStatus::Unbounded);
    let ray = solver.primal_ray().expect("exact primal ray");
    assert!(ray[0].is_positive(), "ray {ray:?}");
}

#[test]
fn test_infeasible_certified_with_farkas() {
    // max 0  s.t.  x <= 0 and x >= 1.
    let lp = build_lp(
        Sense::Maximize,
        &[0.0],
        &[(f64::NEG_INFINITY, INF)],
        &[
            (&[(0, 1.0)][..], f64::NEG_INFINITY, 0.0),
            (&[(0, 1.0)][..], 1.0, INF),
        ],
    );
    let solver = solve(lp, RefineSettings::default());
    assert_eq!(solver.status(), ExactStatus::Infeasible);

    // Exact Farkas certificate: y^T A = 0 and y+^T lhs - y-^T rhs > 0.
    let y = solver.dual_farkas().expect("farkas certificate");
    let combo = &y[0] + &y[1];
    assert!(combo.is_zero(), "y^T A = {combo}");
    // Row 0 has rhs 0; row 1 has lhs 1.
    let mut gain = BigRational::zero();
    if y[1].is_positive() {
        gain += &y[1] * rat(1, 1);
    }
    if y[0].is_negative() {
        gain -= -y[0].clone() * rat(0, 1);
    }
    assert!(gain.is_positive(), "gain {gain}, y = {y:?}");
}

#[test]
fn test_equality_transform_roundtrip_end_to_end() {
    // Ranged rows solved with and without the equality transform must
    // agree exactly.
    let make = || {
        build_lp(
            Sense::Maximize,
            &[1.0, 1.0],
            &[(0.0, 2.0), (0.0, 2.0)],
            &[
                (&[(0, 1.0), (1, 1.0)][..], 1.0, 3.0),
                (&[(0, 1.0), (1, -1.0)][..], 0.0, 1.0),
            ],
        )
    };

    let plain = solve(make(), RefineSettings::default());
    let transformed = solve(
        make(),
        RefineSettings {
            equality_transform: true,
            ..Default::default()
        },
    );
    assert_eq!(plain.status(), ExactStatus::Optimal);
    assert_eq!(transformed.status(), ExactStatus::Optimal);
    assert_eq!(plain.objective_value(), transformed.objective_value());
    assert_eq!(plain.objective_value(), rat(3, 1));
    // The transformed solve reports the solution in the original space.
    assert_eq!(transformed.primal().len(), 2);
}

#[test]
fn test_lifting_roundtrip_end_to_end() {
    // A coefficient far above the lifting ceiling; lifted and plain
    // solves must agree exactly.
    let make = || {
        build_lp(
            Sense::Maximize,
            &[1.0, 1.0],
            &[(0.0, INF), (0.0, INF)],
            &[
                (&[(0, 1e9), (1, 1.0)][..], f64::NEG_INFINITY, 1e9),
                (&[(1, 1.0)][..], f64::NEG_INFINITY, 2.0),
            ],
        )
    };

    let plain = solve(make(), RefineSettings::default());
    let lifted = solve(
        make(),
        RefineSettings {
            lifting: true,
            ..Default::default()
        },
    );
    assert_eq!(plain.status(), ExactStatus::Optimal);
    assert_eq!(lifted.status(), ExactStatus::Optimal);
    assert_eq!(plain.objective_value(), lifted.objective_value());
    assert_eq!(lifted.primal().len(), 2);
}

#[test]
fn test_minimization_exact_value() {
    // min 1/3-ish objective: the stored double coefficient is dyadic;
    // the exact solve works with that dyadic value.
    let c = 1.0 / 3.0;
    let lp = build_lp(
        Sense::Minimize,
        &[c],
        &[(2.0, INF)],
        &[],
    );
    let solver = solve(lp, RefineSettings::default());
    assert_eq!(solver.status(), ExactStatus::Optimal);
    let expected = BigRational::from_float(c).unwrap() * rat(2, 1);
    assert_eq!(solver.objective_value(), expected);
}

#[test]
fn test_violations_shrink_monotonically_to_zero() {
    // A moderately ill-scaled problem; after refinement the exact
    // violations must be identically zero on the reported solution.
    let lp = build_lp(
        Sense::Maximize,
        &[1.0, 1e-7],
        &[(0.0, INF), (0.0, INF)],
        &[
            (&[(0, 1.0), (1, 1e7)][..], f64::NEG_INFINITY, 3.0),
            (&[(0, 1.0)][..], f64::NEG_INFINITY, 1.0),
        ],
    );
    let solver = solve(lp, RefineSettings::default());
    assert_eq!(solver.status(), ExactStatus::Optimal);

    // Recheck feasibility from the public solution, within the exact
    // feasibility tolerance of the refinement.
    let tol = rat(1, 1_000_000_000);
    let x = solver.primal();
    assert!(x.iter().all(|v| *v >= -tol.clone()));
    let row0 = &x[0] + BigRational::from_float(1e7).unwrap() * &x[1];
    assert!(row0 <= rat(3, 1) + &tol);
    assert!(x[0] <= rat(1, 1) + &tol);
}
