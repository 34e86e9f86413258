//! Linear-parameter solve.
//!
//! Every variable contributes `N` rows: its sensitivity integrals `G_i` against
//! the target `Q_i − x0_i`. The stacked `(N·d) × p` problem is handed to the
//! bounded least-squares solver with the per-parameter box.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::FitError;
use crate::math::bvls::{solve_bounded_least_squares, BoundedSolution, UNBOUNDED};

/// Per-parameter bounds in parameter order; absent or infinite sides map to the sentinel.
pub fn resolve_bounds(
    parameters: &[String],
    lower: &BTreeMap<String, f64>,
    upper: &BTreeMap<String, f64>,
) -> Result<(Vec<f64>, Vec<f64>), FitError> {
    for name in lower.keys().chain(upper.keys()) {
        if !parameters.contains(name) {
            return Err(FitError::InvalidInput(format!(
                "bound given for '{name}', which is not a linear parameter"
            )));
        }
    }

    let side = |map: &BTreeMap<String, f64>, name: &str, default: f64| -> Result<f64, FitError> {
        match map.get(name) {
            None => Ok(default),
            Some(v) if v.is_nan() => Err(FitError::InvalidInput(format!("bound for '{name}' is NaN"))),
            Some(v) => Ok(v.clamp(-UNBOUNDED, UNBOUNDED)),
        }
    };

    let mut lb = Vec::with_capacity(parameters.len());
    let mut ub = Vec::with_capacity(parameters.len());
    for name in parameters {
        lb.push(side(lower, name, -UNBOUNDED)?);
        ub.push(side(upper, name, UNBOUNDED)?);
    }
    Ok((lb, ub))
}

/// Stack `G_i` and `Q_i − x0_i` variable by variable.
pub fn stack_problem(g: &[DMatrix<f64>], q: &DMatrix<f64>, x0: &DVector<f64>, p: usize) -> (DMatrix<f64>, DVector<f64>) {
    let n = q.nrows();
    let d = q.ncols();
    let mut design = DMatrix::<f64>::zeros(n * d, p);
    let mut target = DVector::<f64>::zeros(n * d);
    for (i, gi) in g.iter().enumerate() {
        design.view_mut((i * n, 0), (n, p)).copy_from(gi);
        for k in 0..n {
            target[i * n + k] = q[(k, i)] - x0[i];
        }
    }
    (design, target)
}

/// Estimate θ under the box.
pub fn solve_parameters(
    g: &[DMatrix<f64>],
    q: &DMatrix<f64>,
    x0: &DVector<f64>,
    lower: &[f64],
    upper: &[f64],
) -> Result<BoundedSolution, FitError> {
    let (design, target) = stack_problem(g, q, x0, lower.len());
    let sol = solve_bounded_least_squares(&design, &target, lower, upper)?;
    debug!(
        "parameter solve: {} rows, {} parameters, {} active-set iterations",
        design.nrows(),
        design.ncols(),
        sol.iterations
    );
    Ok(sol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bounds_follow_parameter_order() {
        let params = names(&["a", "b", "c"]);
        let mut lower = BTreeMap::new();
        lower.insert("c".to_string(), 0.0);
        let mut upper = BTreeMap::new();
        upper.insert("a".to_string(), f64::INFINITY);
        upper.insert("b".to_string(), 2.0);
        let (lb, ub) = resolve_bounds(&params, &lower, &upper).unwrap();
        assert_eq!(lb, vec![-UNBOUNDED, -UNBOUNDED, 0.0]);
        assert_eq!(ub, vec![UNBOUNDED, 2.0, UNBOUNDED]);
    }

    #[test]
    fn bounds_on_unknown_parameters_are_rejected() {
        let mut lower = BTreeMap::new();
        lower.insert("z".to_string(), 0.0);
        assert!(resolve_bounds(&names(&["a"]), &lower, &BTreeMap::new()).is_err());
    }

    #[test]
    fn rows_are_stacked_per_variable() {
        let g = vec![
            DMatrix::from_column_slice(2, 1, &[1.0, 2.0]),
            DMatrix::from_column_slice(2, 1, &[3.0, 4.0]),
        ];
        let q = DMatrix::from_column_slice(2, 2, &[10.0, 11.0, 20.0, 21.0]);
        let x0 = DVector::from_column_slice(&[1.0, 2.0]);
        let (design, target) = stack_problem(&g, &q, &x0, 1);
        assert_eq!(design.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(target.as_slice(), &[9.0, 10.0, 18.0, 19.0]);
    }
}
