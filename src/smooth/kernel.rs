//! Local-linear kernel regression.
//!
//! At each evaluation point `t0` the observations get weights
//! `K((t_i − t0)/h)` with the Epanechnikov kernel `K(u) = 0.75 (1 − u²)` on
//! `|u| < 1`. With design rows `[1, u_i]` the local-linear fit at `t0` is
//!
//! ```text
//! ŷ(t0) = e1ᵀ (Xᵀ W X)⁻¹ Xᵀ W y
//! ```
//!
//! which is a weighted sum of the observations. The 2×2 matrix is inverted
//! directly; a (near-)zero determinant means fewer than two effective points
//! and fails the fit.

use tracing::debug;

use crate::error::FitError;

/// Epanechnikov kernel.
pub fn epanechnikov(u: f64) -> f64 {
    if u.abs() < 1.0 { 0.75 * (1.0 - u * u) } else { 0.0 }
}

/// Bandwidth: `max(1, bw_factor)` times the largest gap between consecutive times.
pub fn bandwidth(times: &[f64], bw_factor: f64) -> f64 {
    let max_gap = times
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(0.0_f64, f64::max);
    bw_factor.max(1.0) * max_gap
}

/// Smooth `(times, values)` and evaluate at every point of `at`.
pub fn local_linear(
    variable: &str,
    times: &[f64],
    values: &[f64],
    at: &[f64],
    bw_factor: f64,
) -> Result<Vec<f64>, FitError> {
    let fail = |message: String| FitError::Smoothing {
        variable: variable.to_string(),
        message,
    };

    let h = bandwidth(times, bw_factor);
    if !(h.is_finite() && h > 0.0) {
        return Err(fail(format!("degenerate bandwidth {h}")));
    }
    debug!("kernel smoothing '{variable}': bandwidth={h:.6e}, n={}", times.len());

    let mut out = Vec::with_capacity(at.len());
    let mut weights = vec![0.0; times.len()];

    for &t0 in at {
        // Weighted moments of the design [1, u].
        let (mut s0, mut s1, mut s2) = (0.0, 0.0, 0.0);
        for (w, &ti) in weights.iter_mut().zip(times) {
            let u = (ti - t0) / h;
            *w = epanechnikov(u);
            s0 += *w;
            s1 += *w * u;
            s2 += *w * u * u;
        }

        let det = s0 * s2 - s1 * s1;
        // det >= 0 with equality iff a single effective point (Cauchy–Schwarz).
        if !(det.is_finite() && det > 1e-12 * s0 * s2) {
            return Err(fail(format!(
                "singular local design at t={t0} (fewer than 2 points within the bandwidth)"
            )));
        }

        // First row of the inverse: [s2, -s1] / det.
        let mut fitted = 0.0;
        for ((&w, &ti), &yi) in weights.iter().zip(times).zip(values) {
            if w == 0.0 {
                continue;
            }
            let u = (ti - t0) / h;
            fitted += (s2 - s1 * u) / det * w * yi;
        }
        out.push(fitted);
    }

    Ok(out)
}
