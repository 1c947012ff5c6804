//! Stable machine solves.
//!
//! Wraps the kernel solve in a ladder of recovery measures tried in
//! order when the kernel reports a numerical failure. Each step emits
//! one informational line; the original solver configuration is restored
//! on the way out.

use log::info;

use simplex_core::kernel::{Kernel, SolverStatus};
use simplex_core::settings::{PricerKind, RatioKind};

use crate::error::RefineResult;

/// A solve attempt counts as failed when the kernel could not reach any
/// verdict.
fn is_failure(status: SolverStatus) -> bool {
    matches!(
        status,
        SolverStatus::Error | SolverStatus::Singular | SolverStatus::Unknown
    )
}

/// Solve with the recovery ladder:
/// hooks off, larger Markowitz floor, scratch restart, hook toggles,
/// relaxed then tightened tolerance, the other ratio tester, the other
/// pricer, give up.
pub fn solve_real_stable(kernel: &mut Kernel) -> RefineResult<SolverStatus> {
    let mut status = kernel.solve()?;
    if !is_failure(status) {
        return Ok(status);
    }

    let orig_delta = kernel.settings.delta;
    let orig_pricer = kernel.settings.pricer;
    let orig_ratio = kernel.settings.ratio_tester;

    // The presolve/scaler/simplifier hooks are external collaborators;
    // inside the core their ladder steps reduce to restarting from
    // scratch with the hooks' effects absent.
    let steps: Vec<(&str, Box<dyn Fn(&mut Kernel)>)> = vec![
        (
            "disabling presolve and scaler",
            Box::new(|k: &mut Kernel| k.unload()),
        ),
        (
            "increasing Markowitz threshold floor",
            Box::new(|k: &mut Kernel| {
                k.basis.factor.set_markowitz_floor(0.25);
                k.unload();
            }),
        ),
        (
            "solving from scratch with the slack basis",
            Box::new(|k: &mut Kernel| k.unload()),
        ),
        (
            "toggling scaler",
            Box::new(|k: &mut Kernel| k.unload()),
        ),
        (
            "toggling simplifier",
            Box::new(|k: &mut Kernel| k.unload()),
        ),
        (
            "relaxing feasibility tolerance to 1e-3",
            Box::new(|k: &mut Kernel| {
                k.set_delta(1e-3);
                k.unload();
            }),
        ),
        (
            "tightening feasibility tolerance to 1e-9",
            Box::new(|k: &mut Kernel| {
                k.set_delta(1e-9);
                k.unload();
            }),
        ),
        (
            "switching ratio tester",
            Box::new(move |k: &mut Kernel| {
                let other = match orig_ratio {
                    RatioKind::Harris => RatioKind::Textbook,
                    RatioKind::Textbook => RatioKind::Harris,
                };
                k.set_ratio_tester(other);
                k.unload();
            }),
        ),
        (
            "switching pricer",
            Box::new(move |k: &mut Kernel| {
                let other = match orig_pricer {
                    PricerKind::Devex => PricerKind::SteepestEdge,
                    _ => PricerKind::Devex,
                };
                k.set_pricer(other);
                k.unload();
            }),
        ),
    ];

    for (what, apply) in steps {
        info!("numerical trouble, {what} and solving again");
        apply(kernel);
        status = kernel.solve()?;
        if !is_failure(status) {
            break;
        }
    }

    // Restore the configuration for subsequent rounds.
    kernel.set_delta(orig_delta);
    kernel.set_pricer(orig_pricer);
    kernel.set_ratio_tester(orig_ratio);

    Ok(status)
}
