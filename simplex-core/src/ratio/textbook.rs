//! Textbook ratio test: first minimal ratio, pivot-magnitude tie-break.

use super::{RatioCandidate, RatioOutcome, RatioTester};

pub struct TextbookRatio;

impl TextbookRatio {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextbookRatio {
    fn default() -> Self {
        Self::new()
    }
}

impl RatioTester for TextbookRatio {
    fn select(
        &mut self,
        cands: &[RatioCandidate],
        cap: f64,
        delta: f64,
        stab_eps: f64,
    ) -> RatioOutcome {
        let mut best: Option<(&RatioCandidate, f64)> = None;
        for c in cands {
            if c.coeff.abs() <= stab_eps {
                continue;
            }
            let limit = c.limit(0.0);
            if limit.is_infinite() {
                continue;
            }
            let replace = match best {
                None => true,
                Some((b, bl)) => {
                    limit < bl - delta
                        || (limit < bl + delta && c.coeff.abs() > b.coeff.abs())
                }
            };
            if replace {
                best = Some((c, limit));
            }
        }

        match best {
            Some((c, limit)) if limit <= cap => RatioOutcome::Pivot {
                key: c.key,
                step: limit.max(0.0),
                coeff: c.coeff,
                to_lower: c.blocks_at_lower(),
                needs_shift: limit < 0.0,
            },
            Some(_) => RatioOutcome::Cap { step: cap },
            None if cap.is_finite() => RatioOutcome::Cap { step: cap },
            None => RatioOutcome::Unbounded,
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
    fn test_min_ratio_selected() {
        let cands = vec![
            cand(0, 1.0, 5.0, 0.0, f64::INFINITY),  // limit 5
            cand(1, 2.0, 4.0, 0.0, f64::INFINITY),  // limit 2
        ];
        let mut rt = TextbookRatio::new();
        match rt.select(&cands, f64::INFINITY, 1e-9, 1e-12) {
            RatioOutcome::Pivot { key, step, to_lower, .. } => {
                assert_eq!(key, 1);
                assert!((step - 2.0).abs() < 1e-12);
                assert!(to_lower);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tie_prefers_large_pivot() {
        let cands = vec![
            cand(0, 0.1, 0.2, 0.0, f64::INFINITY),  // limit 2
            cand(1, 5.0, 10.0, 0.0, f64::INFINITY), // limit 2, bigger pivot
        ];
        let mut rt = TextbookRatio::new();
        match rt.select(&cands, f64::INFINITY, 1e-9, 1e-12) {
            RatioOutcome::Pivot { key, .. } => assert_eq!(key, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unbounded_and_cap() {
        let cands = vec![cand(0, -1.0, 0.0, 0.0, f64::INFINITY)]; // moves up, no ub
        let mut rt = TextbookRatio::new();
        assert_eq!(
            rt.select(&cands, f64::INFINITY, 1e-9, 1e-12),
            RatioOutcome::Unbounded
        );
        assert_eq!(
            rt.select(&cands, 3.0, 1e-9, 1e-12),
            RatioOutcome::Cap { step: 3.0 }
        );
    }

    #[test]
    fn test_negative_ratio_requests_shift() {
        // Value already below its lower bound.
        let cands = vec![cand(0, 1.0, -0.5, 0.0, f64::INFINITY)];
        let mut rt = TextbookRatio::new();
        match rt.select(&cands, f64::INFINITY, 1e-9, 1e-12) {
            RatioOutcome::Pivot { step, needs_shift, .. } => {
                assert_eq!(step, 0.0);
                assert!(needs_shift);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
