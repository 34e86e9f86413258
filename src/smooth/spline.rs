//! Penalised cubic regression spline with GCV-selected smoothing weight.
//!
//! Model: `f(t) = Σ_j c_j B_j(t)` with uniform cubic B-splines spanning the
//! whole grid domain and a second-order difference penalty on the coefficients:
//!
//! ```text
//! minimize ‖y − B c‖² + λ ‖D₂ c‖²
//! ```
//!
//! For each candidate `λ` (log-spaced, scaled by `tr(BᵀB)/tr(D₂ᵀD₂)`) we solve
//! the penalised normal equations and score
//!
//! ```text
//! GCV(λ) = n · RSS(λ) / (n − edf(λ))²,   edf = tr((BᵀB + λP)⁻¹ BᵀB)
//! ```
//!
//! The lowest score wins; ties go to the earlier (smaller) candidate. Where the
//! domain extends past the data, the difference penalty continues the fit
//! linearly.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::FitError;
use crate::fit::grid::log_space;

const DEGREE: usize = 3;
const MIN_SEGMENTS: usize = 4;
const MAX_SEGMENTS: usize = 40;
const LAMBDA_STEPS: usize = 49;

/// A fitted penalised spline.
#[derive(Debug, Clone)]
pub struct PenalizedSpline {
    lo: f64,
    h: f64,
    nseg: usize,
    coef: DVector<f64>,
    pub lambda: f64,
    pub edf: f64,
    pub gcv: f64,
}

impl PenalizedSpline {
    /// Fit to `(times, values)` with a basis spanning `domain`.
    ///
    /// Requires at least 4 distinct observation times, all inside `domain`.
    pub fn fit(variable: &str, times: &[f64], values: &[f64], domain: (f64, f64)) -> Result<Self, FitError> {
        let fail = |message: String| FitError::Smoothing {
            variable: variable.to_string(),
            message,
        };

        let n = times.len();
        let distinct = 1 + times.windows(2).filter(|w| w[1] > w[0]).count();
        if n < 4 || distinct < 4 {
            return Err(fail(format!(
                "spline smoothing needs at least 4 distinct time points, got {distinct}"
            )));
        }
        let (lo, hi) = domain;
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return Err(fail(format!("invalid spline domain [{lo}, {hi}]")));
        }

        let nseg = distinct.clamp(MIN_SEGMENTS, MAX_SEGMENTS);
        let h = (hi - lo) / nseg as f64;
        let k = nseg + DEGREE;

        let mut skeleton = Self {
            lo,
            h,
            nseg,
            coef: DVector::zeros(k),
            lambda: 0.0,
            edf: 0.0,
            gcv: f64::INFINITY,
        };

        let mut basis = DMatrix::<f64>::zeros(n, k);
        for (r, &t) in times.iter().enumerate() {
            let (first, row) = skeleton.basis_row(t);
            for (j, v) in row.iter().enumerate() {
                basis[(r, first + j)] = *v;
            }
        }
        let y = DVector::from_column_slice(values);
        let penalty = difference_penalty(k);

        let btb = basis.transpose() * &basis;
        let bty = basis.transpose() * &y;
        let scale = btb.trace() / penalty.trace();

        let mut best: Option<(usize, f64, f64, f64, DVector<f64>)> = None;
        for (idx, rel) in log_space(1e-8, 1e6, LAMBDA_STEPS)?.into_iter().enumerate() {
            let lambda = rel * scale;
            let Some(chol) = (&btb + &penalty * lambda).cholesky() else {
                continue;
            };
            let coef = chol.solve(&bty);
            let edf = chol.solve(&btb).trace();
            let resid = &y - &basis * &coef;
            let rss = resid.norm_squared();
            let denom = n as f64 - edf;
            if !(denom > 1e-8 * n as f64) || !rss.is_finite() {
                continue;
            }
            let gcv = n as f64 * rss / (denom * denom);
            if best.as_ref().is_none_or(|b| gcv < b.3) {
                best = Some((idx, lambda, edf, gcv, coef));
            }
        }

        let Some((idx, lambda, edf, gcv, coef)) = best else {
            return Err(fail("no admissible smoothing weight".to_string()));
        };
        debug!(
            "spline smoothing '{variable}': lambda={lambda:.3e} (candidate {idx}), edf={edf:.2}, gcv={gcv:.4e}"
        );

        skeleton.coef = coef;
        skeleton.lambda = lambda;
        skeleton.edf = edf;
        skeleton.gcv = gcv;
        Ok(skeleton)
    }

    pub fn value(&self, t: f64) -> f64 {
        let (first, row) = self.basis_row(t);
        row.iter()
            .enumerate()
            .map(|(j, b)| b * self.coef[first + j])
            .sum()
    }

    pub fn values(&self, ts: &[f64]) -> Vec<f64> {
        ts.iter().map(|&t| self.value(t)).collect()
    }

    fn knot(&self, i: usize) -> f64 {
        self.lo + (i as f64 - DEGREE as f64) * self.h
    }

    /// Non-zero basis values at `t` and the index of the first one.
    fn basis_row(&self, t: f64) -> (usize, [f64; DEGREE + 1]) {
        let hi = self.lo + self.nseg as f64 * self.h;
        let t = t.clamp(self.lo, hi);
        let seg = (((t - self.lo) / self.h).floor() as usize).min(self.nseg - 1);
        let span = seg + DEGREE;

        let mut n = [0.0; DEGREE + 1];
        let mut left = [0.0; DEGREE + 1];
        let mut right = [0.0; DEGREE + 1];
        n[0] = 1.0;
        for j in 1..=DEGREE {
            left[j] = t - self.knot(span + 1 - j);
            right[j] = self.knot(span + j) - t;
            let mut saved = 0.0;
            for r in 0..j {
                let temp = n[r] / (right[r + 1] + left[j - r]);
                n[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            n[j] = saved;
        }
        (span - DEGREE, n)
    }
}

/// `D₂ᵀ D₂` for second-order differences of `k` coefficients.
fn difference_penalty(k: usize) -> DMatrix<f64> {
    let mut d = DMatrix::<f64>::zeros(k.saturating_sub(2), k);
    for r in 0..k.saturating_sub(2) {
        d[(r, r)] = 1.0;
        d[(r, r + 1)] = -2.0;
        d[(r, r + 2)] = 1.0;
    }
    d.transpose() * d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_is_a_partition_of_unity() {
        let s = PenalizedSpline {
            lo: 0.0,
            h: 0.5,
            nseg: 6,
            coef: DVector::zeros(9),
            lambda: 0.0,
            edf: 0.0,
            gcv: 0.0,
        };
        for k in 0..=30 {
            let t = k as f64 * 0.1;
            let (_, row) = s.basis_row(t);
            let total: f64 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "t={t}");
        }
    }

    #[test]
    fn straight_lines_are_unpenalised() {
        let times: Vec<f64> = (0..15).map(|i| i as f64 * 0.2).collect();
        let values: Vec<f64> = times.iter().map(|t| 1.0 + 2.0 * t).collect();
        let s = PenalizedSpline::fit("x", &times, &values, (0.0, 2.8)).unwrap();
        for &t in &times {
            assert!((s.value(t) - (1.0 + 2.0 * t)).abs() < 1e-6);
        }
    }

    #[test]
    fn smooth_curve_is_tracked() {
        let times: Vec<f64> = (0..40).map(|i| i as f64 * 0.1).collect();
        let values: Vec<f64> = times.iter().map(|t| t.sin()).collect();
        let s = PenalizedSpline::fit("x", &times, &values, (0.0, 3.9)).unwrap();
        for &t in &times {
            assert!((s.value(t) - t.sin()).abs() < 1e-3, "t={t}");
        }
    }

    #[test]
    fn too_few_points_fail() {
        let err = PenalizedSpline::fit("x", &[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0], (0.0, 2.0)).unwrap_err();
        assert!(matches!(err, FitError::Smoothing { .. }));
    }
}
