//! Free-term and sensitivity integrals.
//!
//! For one variable with RHS `f(t, x; θ) = f₀(t, x) + Σ_j θ_j g_j(t, x)`:
//!
//! ```text
//! Z(t_k)     = ∫_{t_0}^{t_k} f₀ dt      (column of the free-term matrix)
//! G_j(t_k)   = ∫_{t_0}^{t_k} g_j dt     (column j of the variable's sensitivity matrix)
//! ```
//!
//! Both integrands are evaluated on the grid with the smoothed trajectories
//! bound to the variable symbols and integrated with the cumulative trapezoid
//! rule.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::error::FitError;
use crate::expr::{eval, Expr, SymbolTable};
use crate::fit::grid::Grid;
use crate::math::cumulative_trapezoid;
use crate::models::{Equation, OdeSystem};

/// Column `i` of a column-major matrix as a slice.
pub(crate) fn column(m: &DMatrix<f64>, i: usize) -> &[f64] {
    let n = m.nrows();
    &m.as_slice()[i * n..(i + 1) * n]
}

/// Bind time, every variable's smoothed trajectory and the fixed values.
pub fn symbol_table<'a>(
    system: &OdeSystem,
    grid: &'a Grid,
    smoothed: &'a DMatrix<f64>,
    fixed: &BTreeMap<String, f64>,
) -> SymbolTable<'a> {
    let mut table = SymbolTable::new();
    for (name, value) in fixed {
        table.bind_scalar(name.clone(), *value);
    }
    table.bind_series(system.time_symbol(), &grid.times);
    for (i, name) in system.variables().iter().enumerate() {
        table.bind_series(name.clone(), column(smoothed, i));
    }
    table
}

/// `∫ f₀ dt` on the grid for one equation.
pub fn free_term_integral(eq: &Equation, table: &SymbolTable<'_>, grid: &Grid) -> Result<Vec<f64>, FitError> {
    integrate_expr(&eq.free_term, table, grid, &eq.variable, "free term")
}

/// `N × p` matrix of `∫ ∂f/∂θ_j dt` for one equation.
pub fn sensitivity_integrals(
    eq: &Equation,
    table: &SymbolTable<'_>,
    grid: &Grid,
) -> Result<DMatrix<f64>, FitError> {
    let n = grid.len();
    let mut g = DMatrix::<f64>::zeros(n, eq.sensitivities.len());
    for (j, sens) in eq.sensitivities.iter().enumerate() {
        let col = integrate_expr(sens, table, grid, &eq.variable, "sensitivity")?;
        g.column_mut(j).copy_from_slice(&col);
    }
    Ok(g)
}

fn integrate_expr(
    expr: &Expr,
    table: &SymbolTable<'_>,
    grid: &Grid,
    variable: &str,
    what: &str,
) -> Result<Vec<f64>, FitError> {
    let values = eval(expr, table)?.into_series(grid.len())?;
    if let Some(k) = values.iter().position(|v| !v.is_finite()) {
        return Err(FitError::InvalidInput(format!(
            "{what} of '{variable}' is not finite at t={}",
            grid.times[k]
        )));
    }
    Ok(cumulative_trapezoid(&values, grid.dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_rhs_integrates_linearly() {
        let sys = OdeSystem::new(&[("x", "2 + k*x")], &["k"]).unwrap();
        let grid = Grid::uniform(0.0, 1.0, 11).unwrap();
        let smoothed = DMatrix::from_element(11, 1, 3.0);
        let table = symbol_table(&sys, &grid, &smoothed, &BTreeMap::new());

        let z = free_term_integral(&sys.equations()[0], &table, &grid).unwrap();
        let g = sensitivity_integrals(&sys.equations()[0], &table, &grid).unwrap();
        for (k, t) in grid.times.iter().enumerate() {
            assert!((z[k] - 2.0 * t).abs() < 1e-12);
            assert!((g[(k, 0)] - 3.0 * t).abs() < 1e-12);
        }
    }

    #[test]
    fn time_and_fixed_symbols_are_bound() {
        let sys = OdeSystem::new(&[("x", "c*t")], &[] as &[&str]).unwrap();
        let grid = Grid::uniform(0.0, 2.0, 3).unwrap();
        let smoothed = DMatrix::zeros(3, 1);
        let mut fixed = BTreeMap::new();
        fixed.insert("c".to_string(), 4.0);
        let table = symbol_table(&sys, &grid, &smoothed, &fixed);
        let z = free_term_integral(&sys.equations()[0], &table, &grid).unwrap();
        // trapezoid of 4t on {0, 1, 2}
        assert_eq!(z, vec![0.0, 2.0, 8.0]);
    }

    #[test]
    fn non_finite_integrand_is_reported() {
        let sys = OdeSystem::new(&[("x", "log(x)")], &[] as &[&str]).unwrap();
        let grid = Grid::uniform(0.0, 1.0, 3).unwrap();
        let smoothed = DMatrix::from_column_slice(3, 1, &[1.0, -1.0, 2.0]);
        let table = symbol_table(&sys, &grid, &smoothed, &BTreeMap::new());
        assert!(free_term_integral(&sys.equations()[0], &table, &grid).is_err());
    }
}
