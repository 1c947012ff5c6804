//! End-to-end tests for the simplex kernel.
//!
//! These exercise the full pipeline (problem load, slack basis,
//! factorization, pricing, ratio test, pivoting) on small constructed
//! problems across the mode combinations.

use simplex_core::kernel::{Kernel, SolverStatus};
use simplex_core::linalg::SparseVec;
use simplex_core::problem::LpProblem;
use simplex_core::settings::{
    AlgoType, KernelSettings, PricerKind, PricingMode, RatioKind, Representation, Sense,
    UpdateMode,
};

const INF: f64 = f64::INFINITY;

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

#[test]
fn test_trivial_maximization() {
    // max x1 + x2  s.t.  x1 + x2 <= 1,  x >= 0
    // Optimal objective 1 on the face x1 + x2 = 1.
    let lp = build_lp(
        Sense::Maximize,
        &[1.0, 1.0],
        &[(0.0, INF), (0.0, INF)],
        &[(&[(0, 1.0), (1, 1.0)], f64::NEG_INFINITY, 1.0)],
    );
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    assert!((kernel.value() - 1.0).abs() < 1e-6, "value {}", kernel.value());

    let mut x = vec![0.0; 2];
    kernel.get_primal(&mut x);
    assert!((x[0] + x[1] - 1.0).abs() < 1e-6, "x = {x:?}");
    assert!(x[0] >= -1e-9 && x[1] >= -1e-9);

    let mut y = vec![0.0; 1];
    kernel.get_dual(&mut y);
    assert!((y[0] - 1.0).abs() < 1e-6, "dual {y:?}");
}

#[test]
fn test_all_mode_combinations() {
    // max 3 x1 + 2 x2
    // s.t. x1 + x2 <= 4, x1 + 3 x2 <= 6, x >= 0
    // Optimum at x = (4, 0) with value 12.
    for rep in [Representation::Column, Representation::Row] {
        for alg in [AlgoType::Enter, AlgoType::Leave] {
            let lp = build_lp(
                Sense::Maximize,
                &[3.0, 2.0],
                &[(0.0, INF), (0.0, INF)],
                &[
                    (&[(0, 1.0), (1, 1.0)][..], f64::NEG_INFINITY, 4.0),
                    (&[(0, 1.0), (1, 3.0)][..], f64::NEG_INFINITY, 6.0),
                ],
            );
            let settings = KernelSettings {
                representation: rep,
                algorithm: alg,
                ..Default::default()
            };
            let mut kernel = Kernel::new(lp, settings);
            let status = kernel.solve().unwrap();
            assert_eq!(status, SolverStatus::Optimal, "mode {rep:?}/{alg:?}");
            assert!(
                (kernel.value() - 12.0).abs() < 1e-5,
                "mode {rep:?}/{alg:?}: value {}",
                kernel.value()
            );
        }
    }
}

#[test]
fn test_minimization_sense() {
    // min x1 + 2 x2  s.t.  x1 + x2 >= 2, x in [0, 10]
    // Optimum x = (2, 0), value 2.
    let lp = build_lp(
        Sense::Minimize,
        &[1.0, 2.0],
        &[(0.0, 10.0), (0.0, 10.0)],
        &[(&[(0, 1.0), (1, 1.0)], 2.0, INF)],
    );
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    assert!((kernel.value() - 2.0).abs() < 1e-6, "value {}", kernel.value());
}

#[test]
fn test_degenerate_cycling_candidate() {
    // Beale's cycling example. The solver must terminate with value 1
    // after anti-cycling intervention.
    let lp = build_lp(
        Sense::Maximize,
        &[10.0, -57.0, -9.0, -24.0],
        &[(0.0, INF); 4],
        &[
            (
                &[(0, 0.5), (1, -5.5), (2, -2.5), (3, 9.0)][..],
                f64::NEG_INFINITY,
                0.0,
            ),
            (
                &[(0, 0.5), (1, -1.5), (2, -0.5), (3, 1.0)][..],
                f64::NEG_INFINITY,
                0.0,
            ),
            (&[(0, 1.0)][..], f64::NEG_INFINITY, 1.0),
        ],
    );
    let settings = KernelSettings {
        max_iters: Some(10_000),
        ..Default::default()
    };
    let mut kernel = Kernel::new(lp, settings);
    let status = kernel.solve().unwrap();
    assert_eq!(status, SolverStatus::Optimal);
    assert!((kernel.value() - 1.0).abs() < 1e-5, "value {}", kernel.value());
}

#[test]
fn test_unbounded_with_ray() {
    // max x  s.t.  x >= 0 (no constraints): unbounded along e1.
    let lp = build_lp(Sense::Maximize, &[1.0], &[(0.0, INF)], &[]);
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Unbounded);
    let ray = kernel.get_primal_ray().expect("primal ray");
    assert!(ray[0] > 0.0, "ray {ray:?}");
}

#[test]
fn test_infeasible_with_farkas() {
    // max 0  s.t.  x <= 0 and x >= 1: primal infeasible.
    let lp = build_lp(
        Sense::Maximize,
        &[0.0],
        &[(f64::NEG_INFINITY, INF)],
        &[
            (&[(0, 1.0)][..], f64::NEG_INFINITY, 0.0),
            (&[(0, 1.0)][..], 1.0, INF),
        ],
    );
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Infeasible);

    // Farkas certificate: y^T A = 0 and y+^T lhs - y-^T rhs > 0.
    let y = kernel.get_dual_farkas().expect("farkas ray").to_vec();
    let combo = y[0] + y[1];
    assert!(combo.abs() < 1e-6, "y^T A = {combo}");
    let mut gain = 0.0;
    let sides = [(f64::NEG_INFINITY, 0.0), (1.0, INF)];
    for (i, &yi) in y.iter().enumerate() {
        if yi > 0.0 {
            gain += yi * sides[i].0;
        } else {
            gain -= -yi * sides[i].1;
        }
    }
    assert!(gain > 1e-8, "certificate gain {gain}, y = {y:?}");
}

#[test]
fn test_ranged_rows_and_bounds() {
    // max x1 + x2
    // s.t. 1 <= x1 + x2 <= 3, 0 <= x1 - x2 <= 0.5
    // x1 in [0, 2], x2 in [0, 2]
    let lp = build_lp(
        Sense::Maximize,
        &[1.0, 1.0],
        &[(0.0, 2.0), (0.0, 2.0)],
        &[
            (&[(0, 1.0), (1, 1.0)][..], 1.0, 3.0),
            (&[(0, 1.0), (1, -1.0)][..], 0.0, 0.5),
        ],
    );
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    assert!((kernel.value() - 3.0).abs() < 1e-6, "value {}", kernel.value());

    let mut x = vec![0.0; 2];
    kernel.get_primal(&mut x);
    let mut s = vec![0.0; 2];
    kernel.get_slacks(&mut s);
    assert!((s[0] - (x[0] + x[1])).abs() < 1e-8);
    assert!(s[0] <= 3.0 + 1e-6 && s[0] >= 1.0 - 1e-6);
    assert!(s[1] <= 0.5 + 1e-6 && s[1] >= -1e-6);
}

#[test]
fn test_fixed_variable_stays_put() {
    // x2 is fixed at 1; optimum must have x2 = 1 exactly.
    let lp = build_lp(
        Sense::Maximize,
        &[1.0, 5.0],
        &[(0.0, INF), (1.0, 1.0)],
        &[(&[(0, 1.0), (1, 1.0)], f64::NEG_INFINITY, 4.0)],
    );
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    let mut x = vec![0.0; 2];
    kernel.get_primal(&mut x);
    assert!((x[1] - 1.0).abs() < 1e-9, "fixed var moved: {x:?}");
    assert!((kernel.value() - 8.0).abs() < 1e-6);
}

#[test]
fn test_free_row_contributes_no_dual() {
    // A row with both sides infinite must carry a zero multiplier.
    let lp = build_lp(
        Sense::Maximize,
        &[1.0],
        &[(0.0, 5.0)],
        &[
            (&[(0, 1.0)][..], f64::NEG_INFINITY, INF),
            (&[(0, 1.0)][..], f64::NEG_INFINITY, 3.0),
        ],
    );
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    assert!((kernel.value() - 3.0).abs() < 1e-6);
    let mut y = vec![0.0; 2];
    kernel.get_dual(&mut y);
    assert!(y[0].abs() < 1e-9, "free row dual {y:?}");
}

#[test]
fn test_basis_roundtrip() {
    let lp = build_lp(
        Sense::Maximize,
        &[3.0, 2.0],
        &[(0.0, INF), (0.0, INF)],
        &[
            (&[(0, 1.0), (1, 1.0)][..], f64::NEG_INFINITY, 4.0),
            (&[(0, 1.0), (1, 3.0)][..], f64::NEG_INFINITY, 6.0),
        ],
    );
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);

    let (rows, cols) = kernel.get_basis();
    kernel.set_basis(&rows, &cols).unwrap();
    let (rows2, cols2) = kernel.get_basis();
    assert_eq!(rows, rows2);
    assert_eq!(cols, cols2);

    // Warm-started resolve lands on the same optimum.
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    assert!((kernel.value() - 12.0).abs() < 1e-5);
}

#[test]
fn test_pricer_and_ratio_combinations() {
    let pricers = [
        PricerKind::Dantzig,
        PricerKind::Devex,
        PricerKind::SteepestEdge,
        PricerKind::Weight,
    ];
    let ratios = [RatioKind::Textbook, RatioKind::Harris];
    for pricer in pricers {
        for ratio in ratios {
            let lp = build_lp(
                Sense::Maximize,
                &[2.0, 3.0, 1.0],
                &[(0.0, INF), (0.0, INF), (0.0, INF)],
                &[
                    (&[(0, 1.0), (1, 2.0), (2, 1.0)][..], f64::NEG_INFINITY, 10.0),
                    (&[(0, 3.0), (1, 1.0)][..], f64::NEG_INFINITY, 15.0),
                ],
            );
            let settings = KernelSettings {
                pricer,
                ratio_tester: ratio,
                ..Default::default()
            };
            let mut kernel = Kernel::new(lp, settings);
            let status = kernel.solve().unwrap();
            assert_eq!(status, SolverStatus::Optimal, "{pricer:?}/{ratio:?}");
            // Optimum at x = (4, 3, 0) with value 17.
            assert!(
                (kernel.value() - 17.0).abs() < 1e-5,
                "{pricer:?}/{ratio:?}: {}",
                kernel.value()
            );
        }
    }
}

#[test]
fn test_partial_pricing() {
    let mut lp = LpProblem::new(Sense::Maximize);
    let n = 40;
    for j in 0..n {
        lp.add_col(&SparseVec::new(), 1.0 + (j as f64) * 0.01, 0.0, INF)
            .unwrap();
    }
    let coeffs: Vec<(usize, f64)> = (0..n).map(|j| (j, 1.0)).collect();
    lp.add_row(&SparseVec::from_pairs(&coeffs), f64::NEG_INFINITY, 1.0)
        .unwrap();

    let settings = KernelSettings {
        pricing: PricingMode::Partial,
        pricer: PricerKind::Dantzig,
        ..Default::default()
    };
    let mut kernel = Kernel::new(lp, settings);
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    // Best coefficient is on the last column.
    assert!((kernel.value() - (1.0 + 0.39)).abs() < 1e-6);
}

#[test]
fn test_eta_and_forrest_tomlin_agree() {
    for mode in [UpdateMode::Eta, UpdateMode::ForrestTomlin] {
        let lp = build_lp(
            Sense::Maximize,
            &[1.0, 2.0, 3.0, 1.0],
            &[(0.0, 10.0); 4],
            &[
                (&[(0, 1.0), (1, 1.0), (2, 1.0)][..], f64::NEG_INFINITY, 6.0),
                (&[(1, 1.0), (2, 2.0), (3, 1.0)][..], f64::NEG_INFINITY, 8.0),
                (&[(0, 1.0), (3, 1.0)][..], 1.0, 5.0),
            ],
        );
        let settings = KernelSettings {
            update_mode: mode,
            ..Default::default()
        };
        let mut kernel = Kernel::new(lp, settings);
        assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal, "{mode:?}");
        // Optimum at x = (2, 0, 4, 0) with value 14.
        assert!(
            (kernel.value() - 14.0).abs() < 1e-5,
            "{mode:?}: {}",
            kernel.value()
        );
    }
}

#[test]
fn test_iteration_limit_aborts() {
    let lp = build_lp(
        Sense::Maximize,
        &[1.0, 1.0],
        &[(0.0, INF), (0.0, INF)],
        &[(&[(0, 1.0), (1, 1.0)], f64::NEG_INFINITY, 1.0)],
    );
    let settings = KernelSettings {
        max_iters: Some(0),
        ..Default::default()
    };
    let mut kernel = Kernel::new(lp, settings);
    assert_eq!(kernel.solve().unwrap(), SolverStatus::AbortIter);
}

#[test]
fn test_empty_lp_is_optimal() {
    let lp = LpProblem::new(Sense::Maximize);
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    assert_eq!(kernel.value(), 0.0);
}

#[test]
fn test_mutation_invalidates_and_resolves() {
    let lp = build_lp(
        Sense::Maximize,
        &[1.0, 1.0],
        &[(0.0, INF), (0.0, INF)],
        &[(&[(0, 1.0), (1, 1.0)], f64::NEG_INFINITY, 1.0)],
    );
    let mut kernel = Kernel::new(lp, KernelSettings::default());
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    assert!((kernel.value() - 1.0).abs() < 1e-6);

    // Loosen the row and resolve.
    kernel.change_sides(0, f64::NEG_INFINITY, 5.0).unwrap();
    assert_eq!(kernel.solve().unwrap(), SolverStatus::Optimal);
    assert!((kernel.value() - 5.0).abs() < 1e-6, "value {}", kernel.value());
}
