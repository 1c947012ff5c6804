//! Harris two-phase ratio test.
//!
//! Pass one determines the maximum step admitted when every bound is
//! relaxed by the feasibility tolerance. Pass two scans the candidates
//! whose strict ratio lies within that relaxed step and picks the one
//! with the largest pivot magnitude. Degenerate selections (strict ratio
//! below zero) are reported back so the caller can shift the blocking
//! bound.

use super::{RatioCandidate, RatioOutcome, RatioTester};

pub struct HarrisRatio;

impl HarrisRatio {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HarrisRatio {
    fn default() -> Self {
        Self::new()
    }
}

impl RatioTester for HarrisRatio {
    fn select(
        &mut self,
        cands: &[RatioCandidate],
        cap: f64,
        delta: f64,
        stab_eps: f64,
    ) -> RatioOutcome {
        // Pass 1: relaxed maximum step.
        let mut max_relaxed = cap;
        let mut any = false;
        for c in cands {
            if c.coeff.abs() <= stab_eps {
                continue;
            }
            let limit = c.limit(delta);
            if limit < max_relaxed {
                max_relaxed = limit;
            }
            if limit.is_finite() {
                any = true;
            }
        }
        if !any {
            return if cap.is_finite() {
                RatioOutcome::Cap { step: cap }
            } else {
                RatioOutcome::Unbounded
            };
        }

        // Pass 2: the biggest pivot whose strict ratio fits under the
        // relaxed step.
        let mut best: Option<(&RatioCandidate, f64)> = None;
        for c in cands {
            if c.coeff.abs() <= stab_eps {
                continue;
            }
            let strict = c.limit(0.0);
            if strict <= max_relaxed {
                let replace = match best {
                    None => true,
                    Some((b, _)) => c.coeff.abs() > b.coeff.abs(),
                };
                if replace {
                    best = Some((c, strict));
                }
            }
        }

        match best {
            Some((c, strict)) => {
                if cap < strict.max(0.0) {
                    return RatioOutcome::Cap { step: cap };
                }
                RatioOutcome::Pivot {
                    key: c.key,
                    step: strict.max(0.0),
                    coeff: c.coeff,
                    to_lower: c.blocks_at_lower(),
                    needs_shift: strict < 0.0,
                }
            }
            // Relaxation admitted a step but no strict candidate fit:
            // pure degeneracy, take the tightest relaxed blocker at step
            // zero and let the caller shift.
            None => {
                let mut tightest: Option<(&RatioCandidate, f64)> = None;
                for c in cands {
                    if c.coeff.abs() <= stab_eps {
                        continue;
                    }
                    let limit = c.limit(delta);
                    if limit.is_finite()
                        && tightest.map_or(true, |(_, l)| limit < l)
                    {
                        tightest = Some((c, limit));
                    }
                }
                match tightest {
                    Some((c, _)) => RatioOutcome::Pivot {
                        key: c.key,
                        step: 0.0,
                        coeff: c.coeff,
                        to_lower: c.blocks_at_lower(),
                        needs_shift: true,
                    },
                    None => {
                        if cap.is_finite() {
                            RatioOutcome::Cap { step: cap }
                        } else {
                            RatioOutcome::Unbounded
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(key: usize, coeff: f64, val: f64, lb: f64, ub: f64) -> RatioCandidate {
        RatioCandidate { key, coeff, val, lb, ub }
    }

    #[test]
    fn test_prefers_stable_pivot_within_tolerance() {
        // Both block near t = 1; the second has a far larger pivot.
        let delta = 1e-6;
        let cands = vec![
            cand(0, 1e-3, 1e-3, 0.0, f64::INFINITY),
            cand(1, 4.0, 4.0 + 2e-6, 0.0, f64::INFINITY),
        ];
        let mut rt = HarrisRatio::new();
        match rt.select(&cands, f64::INFINITY, delta, 1e-12) {
            RatioOutcome::Pivot { key, .. } => assert_eq!(key, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_degenerate_pick_requests_shift() {
        // Strict ratio negative for every candidate.
        let cands = vec![cand(0, 1.0, -1e-7, 0.0, f64::INFINITY)];
        let mut rt = HarrisRatio::new();
        match rt.select(&cands, f64::INFINITY, 1e-6, 1e-12) {
            RatioOutcome::Pivot { step, needs_shift, .. } => {
                assert_eq!(step, 0.0);
                assert!(needs_shift);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unbounded_direction() {
        let cands = vec![cand(0, -2.0, 0.0, -1.0, f64::INFINITY)];
        let mut rt = HarrisRatio::new();
        assert_eq!(
            rt.select(&cands, f64::INFINITY, 1e-6, 1e-12),
            RatioOutcome::Unbounded
        );
    }
}
