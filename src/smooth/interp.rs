//! Interpolating cubic spline (Forsythe–Malcolm–Moler end conditions).
//!
//! The end conditions match the third derivative of the cubic through the
//! first (last) four points, so cubic data are reproduced exactly. With two
//! points the spline is the straight line; with three it is the parabola.
//! Queries outside the data range extend the end polynomial pieces.

use crate::error::FitError;

/// Piecewise cubic `y_i + b_i dx + c_i dx² + d_i dx³` on `[x_i, x_{i+1})`.
#[derive(Debug, Clone)]
pub struct CubicInterpolant {
    x: Vec<f64>,
    y: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl CubicInterpolant {
    /// `x` must be strictly increasing with at least two points.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, FitError> {
        let n = x.len();
        if n != y.len() {
            return Err(FitError::ShapeMismatch {
                expected: n,
                found: y.len(),
                context: "interpolation nodes".to_string(),
            });
        }
        if n < 2 {
            return Err(FitError::InvalidInput(
                "cubic interpolation needs at least 2 points".to_string(),
            ));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(FitError::InvalidInput(
                "interpolation abscissae must be strictly increasing".to_string(),
            ));
        }

        let mut b = vec![0.0; n];
        let mut c = vec![0.0; n];
        let mut d = vec![0.0; n];

        if n == 2 {
            let slope = (y[1] - y[0]) / (x[1] - x[0]);
            b[0] = slope;
            b[1] = slope;
            return Ok(Self {
                x: x.to_vec(),
                y: y.to_vec(),
                b,
                c,
                d,
            });
        }

        let nm1 = n - 1;

        // Tridiagonal system: d = off-diagonal (interval widths), b = diagonal,
        // c = right-hand side (second divided differences).
        d[0] = x[1] - x[0];
        c[1] = (y[1] - y[0]) / d[0];
        for i in 1..nm1 {
            d[i] = x[i + 1] - x[i];
            b[i] = 2.0 * (d[i - 1] + d[i]);
            c[i + 1] = (y[i + 1] - y[i]) / d[i];
            c[i] = c[i + 1] - c[i];
        }

        // End conditions: third derivatives from divided differences.
        b[0] = -d[0];
        b[nm1] = -d[n - 2];
        c[0] = 0.0;
        c[nm1] = 0.0;
        if n > 3 {
            c[0] = c[2] / (x[3] - x[1]) - c[1] / (x[2] - x[0]);
            c[nm1] = c[n - 2] / (x[nm1] - x[n - 3]) - c[n - 3] / (x[n - 2] - x[n - 4]);
            c[0] = c[0] * d[0] * d[0] / (x[3] - x[0]);
            c[nm1] = -c[nm1] * d[n - 2] * d[n - 2] / (x[nm1] - x[n - 4]);
        }

        // Forward elimination.
        for i in 1..=nm1 {
            let t = d[i - 1] / b[i - 1];
            b[i] -= t * d[i - 1];
            c[i] -= t * c[i - 1];
        }

        // Back substitution.
        c[nm1] /= b[nm1];
        for i in (0..nm1).rev() {
            c[i] = (c[i] - d[i] * c[i + 1]) / b[i];
        }

        // Polynomial coefficients.
        b[nm1] = (y[nm1] - y[n - 2]) / d[n - 2] + d[n - 2] * (c[n - 2] + 2.0 * c[nm1]);
        for i in 0..nm1 {
            b[i] = (y[i + 1] - y[i]) / d[i] - d[i] * (c[i + 1] + 2.0 * c[i]);
            d[i] = (c[i + 1] - c[i]) / d[i];
            c[i] *= 3.0;
        }
        c[nm1] *= 3.0;
        d[nm1] = d[n - 2];

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            b,
            c,
            d,
        })
    }

    /// Evaluate at `u`.
    pub fn value(&self, u: f64) -> f64 {
        let i = self.segment(u);
        let dx = u - self.x[i];
        self.y[i] + dx * (self.b[i] + dx * (self.c[i] + dx * self.d[i]))
    }

    pub fn values(&self, us: &[f64]) -> Vec<f64> {
        us.iter().map(|&u| self.value(u)).collect()
    }

    /// Index of the piece used for `u` (first piece left of the data).
    fn segment(&self, u: f64) -> usize {
        // partition_point: number of nodes <= u
        let k = self.x.partition_point(|&xi| xi <= u);
        k.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_nodes_exactly() {
        let x = [0.0, 0.3, 1.1, 1.7, 2.0, 3.5];
        let y = [1.0, -2.0, 0.5, 4.0, 3.0, 3.3];
        let s = CubicInterpolant::new(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            assert_eq!(s.value(*xi), *yi);
        }
    }

    #[test]
    fn reproduces_cubic_polynomials() {
        let f = |t: f64| 1.0 - 2.0 * t + 0.5 * t * t - 0.25 * t * t * t;
        let x: Vec<f64> = (0..7).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|&t| f(t)).collect();
        let s = CubicInterpolant::new(&x, &y).unwrap();
        for k in 0..31 {
            let t = k as f64 * 0.1;
            assert!((s.value(t) - f(t)).abs() < 1e-10, "t={t}");
        }
    }

    #[test]
    fn two_points_give_a_line() {
        let s = CubicInterpolant::new(&[0.0, 2.0], &[1.0, 5.0]).unwrap();
        assert!((s.value(1.0) - 3.0).abs() < 1e-12);
        assert!((s.value(3.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_unsorted_or_duplicate_nodes() {
        assert!(CubicInterpolant::new(&[0.0, 0.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(CubicInterpolant::new(&[1.0], &[1.0]).is_err());
    }
}
