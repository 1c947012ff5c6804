//! Rational reconstruction.
//!
//! Lifts floating-point values to nearby rationals with a bounded
//! denominator using the continued-fraction expansion. A coordinate
//! reconstructs when the best convergent within the denominator bound is
//! close enough to be the uniquely determined candidate; the caller
//! additionally verifies the reconstructed vector exactly against bounds
//! and sides before accepting it.

use num_bigint::BigInt;
use num_integer::{Integer, Roots};
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

/// Reconstruct `v` as `p/q` with `q^2 <= max_denom2`.
///
/// Returns `None` when no convergent within the bound approximates `v`
/// tightly enough.
pub fn reconstruct_value(v: &BigRational, max_denom2: &BigInt) -> Option<BigRational> {
    if v.denom() * v.denom() <= *max_denom2 {
        // Already within the bound.
        return Some(v.clone());
    }

    // Continued-fraction convergents h/k of v; floor division keeps the
    // expansion correct for negative values.
    let mut num = v.numer().clone();
    let mut den = v.denom().clone();
    let mut h_prev = BigInt::zero();
    let mut h = BigInt::one();
    let mut k_prev = BigInt::one();
    let mut k = BigInt::zero();
    let mut best: Option<BigRational> = None;

    while !den.is_zero() {
        let (a, rem) = num.div_mod_floor(&den);
        let h_next = &a * &h + &h_prev;
        let k_next = &a * &k + &k_prev;
        if &k_next * &k_next > *max_denom2 {
            break;
        }
        h_prev = std::mem::replace(&mut h, h_next);
        k_prev = std::mem::replace(&mut k, k_next);
        best = Some(BigRational::new(h.clone(), k.clone()));
        num = std::mem::replace(&mut den, rem);
    }

    let cand = best?;
    // Accept only a tight approximation: within half the resolution the
    // denominator bound can distinguish.
    let q = cand.denom().clone();
    let tol = BigRational::new(
        BigInt::one(),
        BigInt::from(2) * q * max_denom2.sqrt().max(BigInt::one()),
    );
    if (v - &cand).abs() <= tol {
        Some(cand)
    } else {
        None
    }
}

/// Reconstruct every coordinate of a vector under a common bound.
pub fn reconstruct_vector(
    values: &[BigRational],
    max_denom2: &BigInt,
) -> Option<Vec<BigRational>> {
    values
        .iter()
        .map(|v| reconstruct_value(v, max_denom2))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn test_recovers_simple_fraction_from_float() {
        // 1/3 as a double is not exactly 1/3; reconstruction finds it.
        let v = BigRational::from_float(1.0 / 3.0).unwrap();
        let bound = BigInt::from(1_000_000u64);
        let r = reconstruct_value(&v, &bound).unwrap();
        assert_eq!(r, rat(1, 3));
    }

    #[test]
    fn test_exact_value_passes_through() {
        let v = rat(7, 8);
        let bound = BigInt::from(1_000_000u64);
        assert_eq!(reconstruct_value(&v, &bound).unwrap(), rat(7, 8));
    }

    #[test]
    fn test_rejects_unreachable_denominator() {
        // A fraction with a large prime denominator cannot be
        // reconstructed under a tiny bound.
        let v = rat(355, 113_081);
        let bound = BigInt::from(4u64);
        assert!(reconstruct_value(&v, &bound).is_none());
    }

    #[test]
    fn test_vector_reconstruction_all_or_nothing() {
        let vals = vec![
            BigRational::from_float(0.5).unwrap(),
            BigRational::from_float(2.0 / 7.0).unwrap(),
        ];
        let bound = BigInt::from(10_000u64);
        let rec = reconstruct_vector(&vals, &bound).unwrap();
        assert_eq!(rec[0], rat(1, 2));
        assert_eq!(rec[1], rat(2, 7));
    }
}
