//! One integral-matching fit.
//!
//! Given an `OdeSystem`, observations of every state variable and optionally
//! known initial conditions, the fit:
//!
//! - builds the shared grid and smooths each variable onto it
//! - integrates the free term (`Z`) and the sensitivities (`G_i`)
//! - forms the residual `Q = smoothed − Z`
//! - estimates unknown initial conditions in closed form (when needed)
//! - solves the box-constrained linear least-squares problem for θ
//!
//! The call is synchronous and deterministic. Every intermediate matrix is kept
//! in the returned `IntegralFit`, which doubles as the cache for
//! `refit_integral_matching`.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{FitOptions, InitialConditions, Observations, SmoothingKind};
use crate::error::FitError;
use crate::fit::cache::{check_compatible, update_mask};
use crate::fit::grid::Grid;
use crate::fit::initial::{a_row, estimate_x0, gram_and_cross, residual_integrals};
use crate::fit::integrals::{column, free_term_integral, sensitivity_integrals, symbol_table};
use crate::fit::solve::{resolve_bounds, solve_parameters};
use crate::math::bvls::BoundState;
use crate::models::OdeSystem;
use crate::smooth::smooth_series;

/// Estimates plus every intermediate quantity of one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegralFit {
    pub variables: Vec<String>,
    pub parameters: Vec<String>,
    pub smoothing: SmoothingKind,
    pub grid: Grid,
    /// `N × d` smoothed trajectories.
    pub smoothed: DMatrix<f64>,
    /// `N × d` free-term integrals.
    pub z: DMatrix<f64>,
    /// `N × d` residual `smoothed − Z`.
    pub q: DMatrix<f64>,
    /// One `N × p` sensitivity-integral matrix per variable.
    pub g: Vec<DMatrix<f64>>,
    /// `d × p`; only when some initial condition was estimated.
    pub a: Option<DMatrix<f64>>,
    /// `p × p`; only when some initial condition was estimated.
    pub b: Option<DMatrix<f64>>,
    pub theta: DVector<f64>,
    pub x0: DVector<f64>,
    /// True where the initial condition was estimated rather than given.
    pub x0_estimated: Vec<bool>,
    pub bound_state: Vec<BoundState>,
}

impl IntegralFit {
    pub fn n(&self) -> usize {
        self.grid.len()
    }

    pub fn theta_of(&self, parameter: &str) -> Option<f64> {
        self.parameters
            .iter()
            .position(|p| p == parameter)
            .map(|j| self.theta[j])
    }

    /// `x0_i + Z_i + G_i θ` on the grid, the integral-form model trajectory.
    pub fn matched_trajectory(&self, i: usize) -> DVector<f64> {
        let mut out = &self.g[i] * &self.theta;
        out.add_scalar_mut(self.x0[i]);
        out + DVector::from_column_slice(column(&self.z, i))
    }

    /// Per-variable RMSE of `Q − x0 − Gθ` over the grid.
    pub fn residual_rmse(&self) -> Vec<f64> {
        (0..self.variables.len())
            .map(|i| {
                let fitted = &self.g[i] * &self.theta;
                let q = column(&self.q, i);
                let sse: f64 = q
                    .iter()
                    .zip(fitted.iter())
                    .map(|(qk, gk)| {
                        let r = qk - self.x0[i] - gk;
                        r * r
                    })
                    .sum();
                (sse / q.len().max(1) as f64).sqrt()
            })
            .collect()
    }
}

/// Fit θ (and unknown initial conditions) from scratch.
pub fn fit_integral_matching(
    system: &OdeSystem,
    observations: &Observations,
    x0: &InitialConditions,
    options: &FitOptions,
) -> Result<IntegralFit, FitError> {
    run(system, observations, x0, options, None)
}

/// Recompute only `vars_to_update`, copying the rest from `previous`.
///
/// Passing every variable index gives the same result as a fresh fit.
pub fn refit_integral_matching(
    system: &OdeSystem,
    observations: &Observations,
    x0: &InitialConditions,
    options: &FitOptions,
    previous: &IntegralFit,
    vars_to_update: &[usize],
) -> Result<IntegralFit, FitError> {
    run(system, observations, x0, options, Some((previous, vars_to_update)))
}

fn run(
    system: &OdeSystem,
    observations: &Observations,
    x0: &InitialConditions,
    options: &FitOptions,
    cache: Option<(&IntegralFit, &[usize])>,
) -> Result<IntegralFit, FitError> {
    let variables = system.variables();
    let parameters = system.parameters();
    let d = system.dim();
    let p = system.n_params();

    if x0.len() != d {
        return Err(FitError::ShapeMismatch {
            expected: d,
            found: x0.len(),
            context: "initial conditions".to_string(),
        });
    }
    system.check_fixed(&options.fixed)?;
    let (lower, upper) = resolve_bounds(parameters, &options.lower, &options.upper)?;

    let series = observations.ordered(variables)?;
    let grid = Grid::build(&series, options.smoothing, options.grid_size)?;
    let n = grid.len();

    let mask = match cache {
        Some((previous, subset)) => {
            check_compatible(previous, variables, parameters, n)?;
            update_mask(subset, d)?
        }
        None => vec![true; d],
    };
    let previous = cache.map(|(prev, _)| prev);

    // Smoothing first: every equation may read every trajectory.
    let mut smoothed = DMatrix::<f64>::zeros(n, d);
    for i in 0..d {
        match previous {
            Some(prev) if !mask[i] => smoothed.set_column(i, &prev.smoothed.column(i)),
            _ => {
                let col = smooth_series(series[i], &grid, options.smoothing, options.bw_factor)?;
                smoothed.column_mut(i).copy_from_slice(&col);
            }
        }
    }

    let table = symbol_table(system, &grid, &smoothed, &options.fixed);
    let mut z = DMatrix::<f64>::zeros(n, d);
    let mut g = Vec::with_capacity(d);
    for (i, eq) in system.equations().iter().enumerate() {
        match previous {
            Some(prev) if !mask[i] => {
                z.set_column(i, &prev.z.column(i));
                g.push(prev.g[i].clone());
            }
            _ => {
                let zi = free_term_integral(eq, &table, &grid)?;
                z.column_mut(i).copy_from_slice(&zi);
                g.push(sensitivity_integrals(eq, &table, &grid)?);
            }
        }
    }

    let q = &smoothed - &z;

    let (x0_full, a, b) = if x0.any_unknown() {
        let mut a = DMatrix::<f64>::zeros(d, p);
        for i in 0..d {
            let cached = previous
                .filter(|_| !mask[i])
                .and_then(|prev| prev.a.as_ref())
                .map(|prev_a| prev_a.row(i).into_owned());
            match cached {
                Some(row) => a.set_row(i, &row),
                None => {
                    for (j, v) in a_row(&g[i], grid.dt).into_iter().enumerate() {
                        a[(i, j)] = v;
                    }
                }
            }
        }
        let (b, gtx) = gram_and_cross(&g, &q, grid.dt);
        let estimate = estimate_x0(&a, &b, &residual_integrals(&q, grid.dt), &gtx, grid.span())?;
        (x0.merge(estimate.as_slice()), Some(a), Some(b))
    } else {
        (x0.merge(&vec![0.0; d]), None, None)
    };
    let x0_vec = DVector::from_vec(x0_full);

    let solution = solve_parameters(&g, &q, &x0_vec, &lower, &upper)?;
    debug!(
        "integral matching: d={d}, p={p}, N={n}, recomputed {}/{d} variables, theta={:?}",
        mask.iter().filter(|m| **m).count(),
        solution.theta.as_slice()
    );

    Ok(IntegralFit {
        variables: variables.to_vec(),
        parameters: parameters.to_vec(),
        smoothing: options.smoothing,
        grid,
        smoothed,
        z,
        q,
        g,
        a,
        b,
        theta: solution.theta,
        x0: x0_vec,
        x0_estimated: (0..d).map(|i| x0.get(i).is_none()).collect(),
        bound_state: solution.state,
    })
}
