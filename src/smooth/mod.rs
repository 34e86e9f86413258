//! Smoothing engine: raw observations → trajectories on the common grid.
//!
//! Three interchangeable strategies (`SmoothingKind`):
//!
//! - `spline`: penalised cubic spline, GCV-selected smoothing weight
//! - `kernel`: local-linear Epanechnikov regression
//! - `none`: cubic interpolation, exact at the observations

pub mod interp;
pub mod kernel;
pub mod spline;

pub use interp::CubicInterpolant;
pub use kernel::local_linear;
pub use spline::PenalizedSpline;

use crate::domain::{Series, SmoothingKind};
use crate::error::FitError;
use crate::fit::grid::Grid;

/// Smooth one series and evaluate it on the grid.
pub fn smooth_series(
    series: &Series,
    grid: &Grid,
    kind: SmoothingKind,
    bw_factor: f64,
) -> Result<Vec<f64>, FitError> {
    match kind {
        SmoothingKind::Spline => {
            let fit = PenalizedSpline::fit(
                &series.name,
                &series.times,
                &series.values,
                (grid.min_time(), grid.max_time()),
            )?;
            Ok(fit.values(&grid.times))
        }
        SmoothingKind::Kernel => {
            local_linear(&series.name, &series.times, &series.values, &grid.times, bw_factor)
        }
        SmoothingKind::None => {
            let (times, values) = collapse_ties(&series.times, &series.values);
            if times.len() < 2 {
                return Err(FitError::Smoothing {
                    variable: series.name.clone(),
                    message: "interpolation needs at least 2 distinct time points".to_string(),
                });
            }
            Ok(CubicInterpolant::new(&times, &values)?.values(&grid.times))
        }
    }
}

/// Average values observed at identical (sorted) times.
pub fn collapse_ties(times: &[f64], values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut out_t: Vec<f64> = Vec::with_capacity(times.len());
    let mut out_v: Vec<f64> = Vec::with_capacity(times.len());
    let mut count = 0usize;

    for (&t, &v) in times.iter().zip(values) {
        match (out_t.last(), out_v.last_mut()) {
            (Some(&last), Some(mean)) if last == t => {
                count += 1;
                *mean += (v - *mean) / count as f64;
            }
            _ => {
                out_t.push(t);
                out_v.push(v);
                count = 1;
            }
        }
    }
    (out_t, out_v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_are_averaged() {
        let (t, v) = collapse_ties(&[0.0, 1.0, 1.0, 1.0, 2.0], &[0.0, 1.0, 2.0, 6.0, 4.0]);
        assert_eq!(t, vec![0.0, 1.0, 2.0]);
        assert_eq!(v, vec![0.0, 3.0, 4.0]);
    }

    #[test]
    fn interpolation_hits_observations_on_the_grid() {
        let times: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let values = vec![1.0, 3.0, 2.0, 5.0, 4.0, 4.5];
        let s = Series::new("x", times, values.clone()).unwrap();
        let grid = Grid::uniform(0.0, 5.0, 6).unwrap();
        let out = smooth_series(&s, &grid, SmoothingKind::None, 1.0).unwrap();
        for (a, b) in out.iter().zip(values.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn every_strategy_returns_one_value_per_grid_point() {
        let times: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        let values: Vec<f64> = times.iter().map(|t| (0.3 * t).exp()).collect();
        let s = Series::new("x", times, values).unwrap();
        for kind in [SmoothingKind::Spline, SmoothingKind::Kernel, SmoothingKind::None] {
            let grid = Grid::build(&[&s], kind, 0).unwrap();
            let out = smooth_series(&s, &grid, kind, 1.5).unwrap();
            assert_eq!(out.len(), grid.len());
            assert!(out.iter().all(|v| v.is_finite()));
        }
    }
}
