//! Problem transforms and certification sub-problems.
//!
//! The equality transform, coefficient lifting, and the two auxiliary
//! LPs that certify unboundedness and infeasibility exactly. All
//! transforms mutate the rational LP and the kernel problem in lockstep
//! and undo themselves on exit.

use log::{info, warn};

use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use simplex_core::linalg::SparseVec;

use crate::error::RefineResult;
use crate::rational::{
    f64_from_rational, rational_from_f64, sparse_from_rational, OptRational,
};
use crate::refine::Refinement;
use crate::ExactStatus;

/// Outcome of the feasibility test LP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FeasOutcome {
    /// The original problem has a feasible point.
    Feasible,
    /// Certified infeasible; the Farkas certificate is installed.
    Infeasible,
    /// The auxiliary solve aborted.
    Aborted(ExactStatus),
}

// ---------------------------------------------------------------------
// Equality transform.

/// Saved state of the equality transform.
pub(crate) struct EqualityTransform {
    /// Per transformed row: (row index, original lhs, original rhs).
    rows: Vec<(usize, OptRational, OptRational)>,
    cols_before: usize,
}

/// Turn every inequality row into an equality with a slack column
/// bounded by `[-rhs, -lhs]`.
pub(crate) fn transform_equality(r: &mut Refinement) -> RefineResult<EqualityTransform> {
    info!("transforming rows into equality form");
    let cols_before = r.rational.num_cols();
    let mut saved = Vec::new();
    let zero = BigRational::zero();

    for i in 0..r.rational.num_rows() {
        let lhs = r.rational.lhs[i].clone();
        let rhs = r.rational.rhs[i].clone();
        // Equality rows stay; free rows carry no information to move.
        if lhs.is_some() && lhs == rhs {
            continue;
        }
        if lhs.is_none() && rhs.is_none() {
            continue;
        }
        let slack_lower = rhs.clone().map(|v| -v);
        let slack_upper = lhs.clone().map(|v| -v);

        let j = r.rational.add_col(
            vec![(i, BigRational::one())],
            zero.clone(),
            slack_lower.clone(),
            slack_upper.clone(),
        );
        r.kernel.add_col(
            &SparseVec::from_pairs(&[(i, 1.0)]),
            0.0,
            crate::rational::f64_from_bound(&slack_lower, true),
            crate::rational::f64_from_bound(&slack_upper, false),
        )?;
        debug_assert_eq!(j, r.kernel.lp.num_cols() - 1);

        r.rational
            .change_sides(i, Some(zero.clone()), Some(zero.clone()));
        r.kernel.change_sides(i, 0.0, 0.0)?;
        saved.push((i, lhs, rhs));
    }
    Ok(EqualityTransform { rows: saved, cols_before })
}

/// Undo the equality transform; the solution in the original variable
/// space is unchanged.
pub(crate) fn untransform_equality(
    r: &mut Refinement,
    t: EqualityTransform,
) -> RefineResult<()> {
    while r.rational.num_cols() > t.cols_before {
        let j = r.rational.num_cols() - 1;
        r.rational.pop_col();
        r.kernel.remove_col(j)?;
        if r.sol.primal.len() > j {
            r.sol.primal.truncate(j);
            r.sol.redcost.truncate(j);
        }
    }
    for (i, lhs, rhs) in t.rows {
        r.kernel.change_sides(
            i,
            crate::rational::f64_from_bound(&lhs, true),
            crate::rational::f64_from_bound(&rhs, false),
        )?;
        r.rational.change_sides(i, lhs, rhs);
    }
    r.sol.slacks.truncate(r.rational.num_rows());
    Ok(())
}

// ---------------------------------------------------------------------
// Lifting.

/// Undo log of the lifting transform.
pub(crate) struct LiftTransform {
    /// Matrix entries moved away: (row, col, original value).
    moved: Vec<(usize, usize, BigRational)>,
    rows_before: usize,
    cols_before: usize,
}

/// Replace matrix coefficients outside `[lift_min, lift_max]` in
/// magnitude by auxiliary columns tied to the original variable through
/// an equality row.
pub(crate) fn lift(r: &mut Refinement) -> RefineResult<LiftTransform> {
    info!("lifting extreme matrix coefficients");
    let rows_before = r.rational.num_rows();
    let cols_before = r.rational.num_cols();
    let mut moved = Vec::new();

    let max_val = rational_from_f64(r.settings.lift_max)?;
    let min_val = rational_from_f64(r.settings.lift_min)?;
    let zero = BigRational::zero();

    for scale_large in [true, false] {
        let scale = if scale_large { max_val.clone() } else { min_val.clone() };
        for j in 0..cols_before {
            // Entries to move for this column.
            let targets: Vec<(usize, BigRational)> = r.rational.cols[j]
                .iter()
                .filter(|(i, v)| {
                    *i < rows_before
                        && if scale_large {
                            v.abs() > max_val
                        } else {
                            !v.is_zero() && v.abs() < min_val
                        }
                })
                .map(|(i, v)| (*i, v.clone()))
                .collect();
            if targets.is_empty() {
                continue;
            }

            // Auxiliary column x' with scale * x_j - x' = 0.
            let lift_row = r.rational.num_rows();
            let lift_col = r.rational.num_cols();
            r.rational.add_row(
                vec![(j, scale.clone())],
                Some(zero.clone()),
                Some(zero.clone()),
            );
            r.kernel.add_row(
                &SparseVec::from_pairs(&[(j, f64_from_rational(&scale))]),
                0.0,
                0.0,
            )?;
            r.rational.add_col(Vec::new(), zero.clone(), None, None);
            r.kernel
                .add_col(&SparseVec::new(), 0.0, f64::NEG_INFINITY, f64::INFINITY)?;
            r.rational
                .change_element(lift_row, lift_col, -BigRational::one());
            r.kernel.change_element(lift_row, lift_col, -1.0)?;

            for (i, v) in targets {
                let new_val = &v / &scale;
                r.rational.change_element(i, j, BigRational::zero());
                r.kernel.change_element(i, j, 0.0)?;
                r.rational.change_element(i, lift_col, new_val.clone());
                r.kernel
                    .change_element(i, lift_col, f64_from_rational(&new_val))?;
                moved.push((i, j, v));
            }
        }
    }
    Ok(LiftTransform { moved, rows_before, cols_before })
}

/// Undo the lifting transform.
pub(crate) fn project(r: &mut Refinement, t: LiftTransform) -> RefineResult<()> {
    // Restore the moved coefficients first, then drop the auxiliary
    // rows and columns (always appended at the end).
    for (i, j, v) in t.moved.into_iter().rev() {
        r.kernel.change_element(i, j, f64_from_rational(&v))?;
        r.rational.change_element(i, j, v);
    }
    while r.rational.num_cols() > t.cols_before {
        let j = r.rational.num_cols() - 1;
        r.rational.pop_col();
        r.kernel.remove_col(j)?;
    }
    while r.rational.num_rows() > t.rows_before {
        let i = r.rational.num_rows() - 1;
        r.rational.pop_row();
        r.kernel.remove_row(i)?;
    }
    r.sol.primal.truncate(t.cols_before);
    r.sol.redcost.truncate(t.cols_before);
    r.sol.slacks.truncate(t.rows_before);
    r.sol.dual.truncate(t.rows_before);
    Ok(())
}

// ---------------------------------------------------------------------
// Unboundedness certification.

struct UnboundedTransform {
    obj: Vec<BigRational>,
    lower: Vec<OptRational>,
    upper: Vec<OptRational>,
    lhs: Vec<OptRational>,
    rhs: Vec<OptRational>,
}

/// Certify a machine unboundedness verdict exactly.
///
/// Builds `max tau` subject to the homogenized problem with the extra
/// row `c^T x - tau = 0`, `tau <= 1`. An optimum with `tau = 1` yields
/// an exact primal ray; `tau` near zero with dual feasibility rejects
/// the verdict.
pub(crate) fn test_unboundedness(r: &mut Refinement) -> RefineResult<(bool, ExactStatus)> {
    info!("setting up LP to compute primal unbounded ray");
    let n = r.rational.num_cols();
    let zero = BigRational::zero();
    let one = BigRational::one();

    let saved = UnboundedTransform {
        obj: r.rational.obj.clone(),
        lower: r.rational.lower.clone(),
        upper: r.rational.upper.clone(),
        lhs: r.rational.lhs.clone(),
        rhs: r.rational.rhs.clone(),
    };
    let saved_sol = r.sol.clone();

    // Zero out finite sides and bounds.
    for i in 0..r.rational.num_rows() {
        let lhs = r.rational.lhs[i].as_ref().map(|_| zero.clone());
        let rhs = r.rational.rhs[i].as_ref().map(|_| zero.clone());
        r.rational.change_sides(i, lhs, rhs);
    }
    for j in 0..n {
        let lo = r.rational.lower[j].as_ref().map(|_| zero.clone());
        let up = r.rational.upper[j].as_ref().map(|_| zero.clone());
        r.rational.change_bounds(j, lo, up);
    }

    // Objective row c^T x - tau = 0 and the auxiliary variable.
    let obj_row: Vec<(usize, BigRational)> = saved
        .obj
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_zero())
        .map(|(j, c)| (j, c.clone()))
        .collect();
    let aux_row = r
        .rational
        .add_row(obj_row.clone(), Some(zero.clone()), Some(zero.clone()));
    r.kernel.add_row(&sparse_from_rational(&obj_row), 0.0, 0.0)?;
    let tau_col = r.rational.add_col(
        vec![(aux_row, -one.clone())],
        one.clone(),
        None,
        Some(one.clone()),
    );
    r.kernel.add_col(
        &SparseVec::from_pairs(&[(aux_row, -1.0)]),
        1.0,
        f64::NEG_INFINITY,
        1.0,
    )?;
    debug_assert_eq!(tau_col, n);

    for j in 0..n {
        r.rational.change_obj(j, zero.clone());
    }

    // Refine the auxiliary LP.
    let status = r.perform_opt_ir()?;

    let mut certified = false;
    let mut verdict = ExactStatus::Unbounded;
    match status {
        ExactStatus::Optimal => {
            let tau = r.sol.primal[tau_col].clone();
            if tau >= one {
                certified = true;
                let ray: Vec<BigRational> = r.sol.primal[..n].to_vec();
                r.sol = saved_sol;
                r.sol.primal_ray = Some(ray);
            } else if tau.is_zero() || tau.abs() < crate::settings::ratio_pow10(-9) {
                info!("unboundedness rejected by certification LP (tau = 0)");
                r.sol = saved_sol;
                verdict = ExactStatus::Unknown;
            } else {
                warn!(
                    "certification LP inconclusive (tau = {})",
                    tau
                );
                r.sol = saved_sol;
                verdict = ExactStatus::Error;
            }
        }
        other => {
            r.sol = saved_sol;
            verdict = other;
        }
    }

    // Undo the transform.
    r.rational.pop_col();
    r.kernel.remove_col(tau_col)?;
    r.rational.pop_row();
    r.kernel.remove_row(aux_row)?;
    for j in 0..n {
        r.rational.change_obj(j, saved.obj[j].clone());
        r.rational
            .change_bounds(j, saved.lower[j].clone(), saved.upper[j].clone());
    }
    for i in 0..r.rational.num_rows() {
        r.rational
            .change_sides(i, saved.lhs[i].clone(), saved.rhs[i].clone());
    }
    r.sync_kernel_from_rational()?;

    Ok((certified, verdict))
}

// ---------------------------------------------------------------------
// Feasibility certification.

struct FeasibilityTransform {
    obj: Vec<BigRational>,
    lower: Vec<OptRational>,
    upper: Vec<OptRational>,
    lhs: Vec<OptRational>,
    rhs: Vec<OptRational>,
    /// Shift applied per column so zero lies inside the box.
    shift: Vec<BigRational>,
}

/// Certify a machine infeasibility verdict exactly.
///
/// Shifts the box so zero is feasible for the bounds, homogenizes the
/// sides, and maximizes an auxiliary `tau` in `[0, 1]` whose column
/// supplies the violated side values. `tau = 1` at the optimum means
/// the original problem is feasible; anything less certifies
/// infeasibility with the dual as Farkas certificate.
pub(crate) fn test_feasibility(r: &mut Refinement) -> RefineResult<FeasOutcome> {
    info!("setting up LP to test for feasibility");
    let n = r.rational.num_cols();
    let m = r.rational.num_rows();
    let zero = BigRational::zero();
    let one = BigRational::one();

    let saved = FeasibilityTransform {
        obj: r.rational.obj.clone(),
        lower: r.rational.lower.clone(),
        upper: r.rational.upper.clone(),
        lhs: r.rational.lhs.clone(),
        rhs: r.rational.rhs.clone(),
        shift: vec![BigRational::zero(); n],
    };
    let saved_sol = r.sol.clone();
    let mut shift = saved.shift.clone();

    // Drop the objective.
    for j in 0..n {
        r.rational.change_obj(j, zero.clone());
    }

    // Shift each column so zero is inside its box, folding the shift
    // into the sides.
    for j in 0..n {
        let s = match (&r.rational.lower[j], &r.rational.upper[j]) {
            (Some(lo), _) if lo.is_positive() => lo.clone(),
            (_, Some(up)) if up.is_negative() => up.clone(),
            _ => continue,
        };
        shift[j] = s.clone();
        let entries = r.rational.cols[j].clone();
        for (i, a) in entries {
            let delta = &a * &s;
            let lhs = r.rational.lhs[i].clone().map(|v| v - &delta);
            let rhs = r.rational.rhs[i].clone().map(|v| v - &delta);
            r.rational.change_sides(i, lhs, rhs);
        }
        let lo = r.rational.lower[j].clone().map(|v| v - &s);
        let up = r.rational.upper[j].clone().map(|v| v - &s);
        r.rational.change_bounds(j, lo, up);
    }

    // Homogenize the sides and collect the tau column: rows whose box
    // excludes zero contribute their blocking side.
    let mut tau_entries: Vec<(usize, BigRational)> = Vec::new();
    for i in 0..m {
        let lhs = r.rational.lhs[i].clone();
        let rhs = r.rational.rhs[i].clone();
        if let Some(lhs_v) = &lhs {
            if lhs_v.is_positive() {
                tau_entries.push((i, -lhs_v.clone()));
                let width = rhs.as_ref().map(|r_v| r_v - lhs_v);
                r.rational.change_sides(i, Some(zero.clone()), width);
                continue;
            }
        }
        if let Some(rhs_v) = &rhs {
            if rhs_v.is_negative() {
                tau_entries.push((i, -rhs_v.clone()));
                let width = lhs.as_ref().map(|l_v| l_v - rhs_v);
                r.rational.change_sides(i, width, Some(zero.clone()));
            }
        }
    }

    // tau in [0, 1], maximized.
    let tau_col = r
        .rational
        .add_col(tau_entries.clone(), one.clone(), Some(zero.clone()), Some(one.clone()));
    r.kernel.add_col(
        &sparse_from_rational(&tau_entries),
        1.0,
        0.0,
        1.0,
    )?;
    debug_assert_eq!(tau_col, n);

    let status = r.perform_opt_ir()?;

    let outcome = match status {
        ExactStatus::Optimal => {
            let tau = r.sol.primal[tau_col].clone();
            if tau >= one {
                FeasOutcome::Feasible
            } else {
                // Exact Farkas certificate from the auxiliary duals,
                // oriented so positive entries select left-hand sides.
                let farkas: Vec<BigRational> =
                    r.sol.dual.iter().map(|y| -y.clone()).collect();
                r.sol = saved_sol.clone();
                r.sol.dual_farkas = Some(farkas);
                FeasOutcome::Infeasible
            }
        }
        ExactStatus::Infeasible => {
            // The homogenized problem is feasible by construction; treat
            // an infeasible verdict here as numerical failure.
            warn!("feasibility test LP reported infeasible");
            FeasOutcome::Aborted(ExactStatus::Error)
        }
        other => FeasOutcome::Aborted(other),
    };

    if outcome == FeasOutcome::Feasible {
        // Keep the feasible point, translated back by the box shift.
        for j in 0..n {
            let v = r.sol.primal[j].clone() + &shift[j];
            r.sol.primal[j] = v;
        }
        r.sol.primal.truncate(n);
        r.sol.redcost.truncate(n);
    } else {
        let farkas = r.sol.dual_farkas.take();
        r.sol = saved_sol;
        if let Some(f) = farkas {
            r.sol.dual_farkas = Some(f);
        }
    }

    // Undo the transform.
    r.rational.pop_col();
    r.kernel.remove_col(tau_col)?;
    for j in 0..n {
        r.rational.change_obj(j, saved.obj[j].clone());
        r.rational
            .change_bounds(j, saved.lower[j].clone(), saved.upper[j].clone());
    }
    for i in 0..m {
        r.rational
            .change_sides(i, saved.lhs[i].clone(), saved.rhs[i].clone());
    }
    r.sync_kernel_from_rational()?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RefineSettings;
    use simplex_core::problem::LpProblem;
    use simplex_core::settings::{KernelSettings, Sense};

    fn snapshot(lp: &crate::rational::RationalLp) -> (usize, usize, Vec<String>) {
        let mut entries = Vec::new();
        for (i, row) in lp.rows.iter().enumerate() {
            let mut sorted = row.clone();
            sorted.sort_by_key(|(j, _)| *j);
            for (j, v) in sorted {
                entries.push(format!("{i},{j}:{v}"));
            }
        }
        for i in 0..lp.num_rows() {
            entries.push(format!("r{i}:{:?}/{:?}", lp.lhs[i], lp.rhs[i]));
        }
        for j in 0..lp.num_cols() {
            entries.push(format!(
                "c{j}:{:?}/{:?}/{}",
                lp.lower[j], lp.upper[j], lp.obj[j]
            ));
        }
        (lp.num_rows(), lp.num_cols(), entries)
    }

    fn refinement() -> Refinement {
        let mut lp = LpProblem::new(Sense::Maximize);
        lp.add_col(&SparseVec::new(), 1.0, 0.0, 2.0).unwrap();
        lp.add_col(&SparseVec::new(), 2.0, 0.0, f64::INFINITY).unwrap();
        lp.add_row(&SparseVec::from_pairs(&[(0, 1.0), (1, 2e9)]), 1.0, 4.0)
            .unwrap();
        lp.add_row(&SparseVec::from_pairs(&[(0, 1.0)]), f64::NEG_INFINITY, 2.0)
            .unwrap();
        Refinement::new(lp, KernelSettings::default(), RefineSettings::default()).unwrap()
    }

    #[test]
    fn test_equality_transform_roundtrip_on_lp_data() {
        let mut r = refinement();
        let before = snapshot(&r.rational);

        let t = transform_equality(&mut r).unwrap();
        // Both inequality rows became equalities with slack columns.
        assert_eq!(r.rational.num_cols(), 4);
        assert_eq!(r.rational.lhs[0], Some(BigRational::zero()));
        assert_eq!(r.rational.rhs[0], Some(BigRational::zero()));

        untransform_equality(&mut r, t).unwrap();
        assert_eq!(snapshot(&r.rational), before);
        assert_eq!(r.kernel.lp.num_cols(), 2);
    }

    #[test]
    fn test_lift_project_roundtrip_on_lp_data() {
        let mut r = refinement();
        let before = snapshot(&r.rational);

        let t = lift(&mut r).unwrap();
        // The 2e9 entry moved to an auxiliary column.
        assert!(r.rational.num_cols() > 2);
        assert!(r.rational.num_rows() > 2);
        let max_val = rational_from_f64(r.settings.lift_max).unwrap();
        for row in r.rational.rows.iter() {
            for (_, v) in row.iter() {
                assert!(v.abs() <= max_val, "entry {v} above ceiling");
            }
        }

        project(&mut r, t).unwrap();
        assert_eq!(snapshot(&r.rational), before);
        assert_eq!(r.kernel.lp.num_rows(), 2);
        assert_eq!(r.kernel.lp.num_cols(), 2);
    }
}
