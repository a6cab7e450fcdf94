//! Relative discrete L2 error between a reference and an approximation.

use rustfft::num_complex::Complex64;

use crate::error::FlagsError;

/// `||reference - approx||_2 / ||reference||_2`.
///
/// Returns `NaN` when the reference has zero norm, so a degenerate reference
/// shows up as `nan` in the report instead of an infinite or zero error.
///
/// # Errors
/// [`FlagsError::LengthMismatch`] if the arrays differ in length.
pub fn relative_l2_error(reference: &[Complex64], approx: &[Complex64]) -> Result<f64, FlagsError> {
    if reference.len() != approx.len() {
        return Err(FlagsError::LengthMismatch {
            expected: reference.len(),
            actual: approx.len(),
        });
    }
    let (diff, norm) = reference
        .iter()
        .zip(approx.iter())
        .fold((0.0, 0.0), |(diff, norm), (r, a)| {
            (diff + (r - a).norm_sqr(), norm + r.norm_sqr())
        });
    if norm == 0.0 {
        return Ok(f64::NAN);
    }
    Ok(diff.sqrt() / norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn identical_arrays_have_zero_error() {
        let a = vec![c(1.0, 2.0), c(-0.5, 0.25), c(3.0, -1.0)];
        assert_eq!(relative_l2_error(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn zero_reference_yields_nan() {
        let zero = vec![c(0.0, 0.0); 4];
        let other = vec![c(1.0, 0.0); 4];
        assert!(relative_l2_error(&zero, &other).unwrap().is_nan());
    }

    #[test]
    fn known_error() {
        let reference = vec![c(3.0, 0.0), c(0.0, 4.0)];
        let approx = vec![c(3.0, 0.0), c(0.0, 3.0)];
        let err = relative_l2_error(&reference, &approx).unwrap();
        assert!((err - 0.2).abs() < 1e-15);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let a = vec![c(1.0, 0.0); 3];
        let b = vec![c(1.0, 0.0); 2];
        assert!(matches!(
            relative_l2_error(&a, &b),
            Err(FlagsError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    proptest! {
        #[test]
        fn prop_error_is_non_negative_and_scale_invariant(
            values in proptest::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 1..32),
            noise in -1.0f64..1.0,
            scale in 0.1f64..10.0,
        ) {
            let reference: Vec<Complex64> = values.iter().map(|&(re, im)| c(re, im)).collect();
            prop_assume!(reference.iter().any(|v| v.norm() > 1e-3));
            let approx: Vec<Complex64> = reference.iter().map(|v| *v + c(noise, 0.0)).collect();
            let err = relative_l2_error(&reference, &approx).unwrap();
            prop_assert!(err >= 0.0);
            let scaled_ref: Vec<Complex64> = reference.iter().map(|v| *v * scale).collect();
            let scaled_approx: Vec<Complex64> = approx.iter().map(|v| *v * scale).collect();
            let scaled = relative_l2_error(&scaled_ref, &scaled_approx).unwrap();
            prop_assert!((err - scaled).abs() <= 1e-9 * err.max(1.0));
        }
    }
}
