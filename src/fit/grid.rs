//! Evaluation grids.
//!
//! - `Grid`: the uniform time grid shared by every variable in one fitting call.
//! - `log_space`: log-spaced candidate values (smoothing weights for the spline search).

use tracing::debug;

use crate::domain::{Series, SmoothingKind};
use crate::error::FitError;

/// Uniform time grid over `[min_time, max_time]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub times: Vec<f64>,
    pub dt: f64,
}

impl Grid {
    /// Build the grid over the union of all observation times.
    ///
    /// - kernel smoothing: step = half the smallest positive observation gap
    /// - otherwise: `grid_size` points, or the largest series length when 0
    pub fn build(series: &[&Series], smoothing: SmoothingKind, grid_size: usize) -> Result<Self, FitError> {
        let min_time = series
            .iter()
            .flat_map(|s| s.times.first().copied())
            .fold(f64::INFINITY, f64::min);
        let max_time = series
            .iter()
            .flat_map(|s| s.times.last().copied())
            .fold(f64::NEG_INFINITY, f64::max);

        if !(min_time.is_finite() && max_time.is_finite() && max_time > min_time) {
            return Err(FitError::InvalidInput(
                "observations must span at least two distinct time points".to_string(),
            ));
        }
        let span = max_time - min_time;

        let n = match smoothing {
            SmoothingKind::Kernel => {
                let min_gap = series
                    .iter()
                    .flat_map(|s| s.gaps())
                    .fold(f64::INFINITY, f64::min);
                let step = min_gap / 2.0;
                if !(step.is_finite() && step > 0.0) {
                    return Err(FitError::InvalidInput(
                        "cannot derive kernel grid step from observation times".to_string(),
                    ));
                }
                // Tolerate round-off so an exact multiple does not add a point.
                (span / step - 1e-9).ceil() as usize + 1
            }
            SmoothingKind::Spline | SmoothingKind::None => {
                if grid_size > 0 {
                    grid_size
                } else {
                    series.iter().map(|s| s.len()).max().unwrap_or(0)
                }
            }
        };

        Self::uniform(min_time, max_time, n)
    }

    /// `n` equally spaced points from `min_time` to `max_time` inclusive.
    pub fn uniform(min_time: f64, max_time: f64, n: usize) -> Result<Self, FitError> {
        if n < 2 {
            return Err(FitError::InvalidInput(format!("grid needs at least 2 points, got {n}")));
        }
        if !(min_time.is_finite() && max_time.is_finite() && max_time > min_time) {
            return Err(FitError::InvalidInput(format!(
                "invalid grid range [{min_time}, {max_time}]"
            )));
        }
        let dt = (max_time - min_time) / (n as f64 - 1.0);
        let mut times: Vec<f64> = (0..n).map(|k| min_time + k as f64 * dt).collect();
        times[n - 1] = max_time;
        debug!("grid: n={n}, dt={dt:.6e}, range=[{min_time}, {max_time}]");
        Ok(Self { times, dt })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn min_time(&self) -> f64 {
        self.times[0]
    }

    pub fn max_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Length of the integration domain, `∫ 1 dt` over the grid.
    pub fn span(&self) -> f64 {
        self.dt * (self.times.len() as f64 - 1.0)
    }
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, FitError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(FitError::InvalidInput(format!(
            "invalid log-space range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(FitError::InvalidInput("log-space steps must be >= 2".to_string()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}
