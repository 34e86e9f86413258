//! Trapezoidal integration on a uniform grid.
//!
//! Both routines integrate with unit spacing and scale the result by `dt`, so
//! callers pass the grid step once.

/// Running integral; `out[0] = 0`, `out[k] ≈ ∫_{t_0}^{t_k} f`.
pub fn cumulative_trapezoid(values: &[f64], dt: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    let mut acc = 0.0;
    out.push(0.0);
    for k in 1..values.len() {
        acc += 0.5 * (values[k - 1] + values[k]);
        out.push(acc * dt);
    }
    out
}

/// Definite integral over the whole grid.
pub fn trapezoid(values: &[f64], dt: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let interior: f64 = values[1..values.len() - 1].iter().sum();
    (0.5 * (values[0] + values[values.len() - 1]) + interior) * dt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_functions_integrate_exactly() {
        // f(t) = 2t on t = 0, 0.5, 1.0, 1.5, 2.0
        let dt = 0.5;
        let f: Vec<f64> = (0..5).map(|k| 2.0 * k as f64 * dt).collect();
        let cum = cumulative_trapezoid(&f, dt);
        for (k, v) in cum.iter().enumerate() {
            let t = k as f64 * dt;
            assert!((v - t * t).abs() < 1e-12);
        }
        assert!((trapezoid(&f, dt) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn cumulative_ends_at_definite_integral() {
        let f = [1.0, 3.0, 2.0, 5.0, 4.0];
        let cum = cumulative_trapezoid(&f, 0.1);
        assert!((cum[4] - trapezoid(&f, 0.1)).abs() < 1e-12);
        assert_eq!(cum[0], 0.0);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(cumulative_trapezoid(&[], 1.0).is_empty());
        assert_eq!(trapezoid(&[3.0], 1.0), 0.0);
    }
}
