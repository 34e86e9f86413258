//! Reuse of a previous fit for partial recomputation.
//!
//! An optimiser that perturbs only some fixed symbols can pass the previous
//! `IntegralFit` together with the variables whose equations changed
//! (see `OdeSystem::affected_variables`). Smoothed trajectories, free-term
//! columns, sensitivity matrices and `A` rows of the other variables are copied;
//! everything that couples variables (`B`, x0, θ) is always recomputed.
//!
//! Mismatched variable/parameter lists or grid sizes are caller bugs and are
//! reported as `FitError::InconsistentCache`.

use crate::error::FitError;
use crate::fit::fitter::IntegralFit;

/// Check that `previous` was produced for the same problem shape.
pub fn check_compatible(
    previous: &IntegralFit,
    variables: &[String],
    parameters: &[String],
    n: usize,
) -> Result<(), FitError> {
    if previous.variables != variables {
        return Err(FitError::InconsistentCache(format!(
            "cached variables {:?} differ from {:?}",
            previous.variables, variables
        )));
    }
    if previous.parameters != parameters {
        return Err(FitError::InconsistentCache(format!(
            "cached parameters {:?} differ from {:?}",
            previous.parameters, parameters
        )));
    }
    if previous.grid.len() != n {
        return Err(FitError::InconsistentCache(format!(
            "cached grid has {} points, current grid has {n}",
            previous.grid.len()
        )));
    }

    let d = variables.len();
    let p = parameters.len();
    let shapes_ok = previous.smoothed.shape() == (n, d)
        && previous.z.shape() == (n, d)
        && previous.g.len() == d
        && previous.g.iter().all(|g| g.shape() == (n, p))
        && previous.a.as_ref().is_none_or(|a| a.shape() == (d, p));
    if !shapes_ok {
        return Err(FitError::InconsistentCache(
            "cached matrices do not match the cached dimensions".to_string(),
        ));
    }
    Ok(())
}

/// `mask[i]` is true when variable `i` must be recomputed.
pub fn update_mask(vars_to_update: &[usize], d: usize) -> Result<Vec<bool>, FitError> {
    let mut mask = vec![false; d];
    for &i in vars_to_update {
        if i >= d {
            return Err(FitError::InvalidInput(format!(
                "variable index {i} out of range for {d} variables"
            )));
        }
        mask[i] = true;
    }
    Ok(mask)
}
