//! Small dense solves with an explicit conditioning check.
//!
//! Matrices here are at most `d × d` or `p × p`, so an SVD per solve is cheap.
//! Nearly singular systems are rejected instead of regularised.

use nalgebra::{DMatrix, DVector};

use crate::error::FitError;

/// Reciprocal condition number below which a matrix is treated as singular.
pub const RCOND_MIN: f64 = 1e-12;

/// Ratio of the smallest to the largest singular value (0 for empty/zero matrices).
pub fn rcond(m: &DMatrix<f64>) -> f64 {
    if m.is_empty() {
        return 0.0;
    }
    let sv = m.clone().svd(false, false).singular_values;
    let max = sv.iter().copied().fold(0.0_f64, f64::max);
    let min = sv.iter().copied().fold(f64::INFINITY, f64::min);
    if max > 0.0 && max.is_finite() { min / max } else { 0.0 }
}

/// Solve `m x = rhs` for a square `m`, failing on near-singularity.
pub fn solve_square(
    m: &DMatrix<f64>,
    rhs: &DMatrix<f64>,
    what: &str,
) -> Result<DMatrix<f64>, FitError> {
    if !m.is_square() || m.nrows() != rhs.nrows() {
        return Err(FitError::ShapeMismatch {
            expected: m.nrows(),
            found: rhs.nrows(),
            context: format!("{what} system"),
        });
    }
    if m.iter().chain(rhs.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::SingularSystem(format!("{what} has non-finite entries")));
    }
    let rc = rcond(m);
    if rc < RCOND_MIN {
        return Err(FitError::SingularSystem(format!(
            "{what} is singular (rcond = {rc:.3e})"
        )));
    }
    m.clone()
        .lu()
        .solve(rhs)
        .ok_or_else(|| FitError::SingularSystem(format!("{what}: LU solve failed")))
}

/// Vector right-hand-side convenience wrapper around [`solve_square`].
pub fn solve_square_vec(
    m: &DMatrix<f64>,
    rhs: &DVector<f64>,
    what: &str,
) -> Result<DVector<f64>, FitError> {
    let rhs = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
    let x = solve_square(m, &rhs, what)?;
    Ok(x.column(0).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_well_conditioned_system() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_row_slice(&[1.0, 2.0]);
        let x = solve_square_vec(&m, &b, "test").unwrap();
        let r = &m * &x - &b;
        assert!(r.norm() < 1e-12);
    }

    #[test]
    fn rejects_singular_system() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_row_slice(&[1.0, 2.0]);
        let err = solve_square_vec(&m, &b, "B").unwrap_err();
        assert!(matches!(err, FitError::SingularSystem(_)));
    }

    #[test]
    fn rcond_of_identity_is_one() {
        let m = DMatrix::<f64>::identity(3, 3);
        assert!((rcond(&m) - 1.0).abs() < 1e-12);
        assert_eq!(rcond(&DMatrix::<f64>::zeros(2, 2)), 0.0);
    }
}
