//! Profile estimate of unknown initial conditions.
//!
//! The integral-matching criterion
//!
//! ```text
//! J(x0, θ) = Σ_i ∫ (Q_i(t) − x0_i − G_i(t) θ)² dt
//! ```
//!
//! is quadratic in both unknowns. Setting its gradient to zero and eliminating
//! θ gives a `d × d` system for x0:
//!
//! ```text
//! (T·I − A B⁻¹ Aᵀ) x0 = ∫Q dt − A B⁻¹ ∫Gᵀq dt
//! A[i, :] = ∫ G_i dt,   B = Σ_i ∫ G_iᵀ G_i dt,   T = ∫ 1 dt
//! ```
//!
//! All integrals use the trapezoid rule on the shared grid. Both `B` and the
//! `d × d` matrix are checked for conditioning; a near-singular system fails
//! instead of being regularised.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::FitError;
use crate::fit::integrals::column;
use crate::math::linalg::{solve_square, solve_square_vec};
use crate::math::trapezoid;

/// `∫ G_i dt`: one row of `A`.
pub fn a_row(g: &DMatrix<f64>, dt: f64) -> Vec<f64> {
    (0..g.ncols()).map(|j| trapezoid(column(g, j), dt)).collect()
}

/// `B = Σ_i ∫ G_iᵀ G_i dt` and `∫ Gtx dt` with `Gtx(t_k) = Σ_i G_i(t_k)ᵀ Q_i(t_k)`.
pub fn gram_and_cross(g: &[DMatrix<f64>], q: &DMatrix<f64>, dt: f64) -> (DMatrix<f64>, DVector<f64>) {
    let n = q.nrows();
    let p = g.first().map_or(0, |gi| gi.ncols());
    let mut b = DMatrix::<f64>::zeros(p, p);
    let mut gtx = DVector::<f64>::zeros(p);

    for k in 0..n {
        let w = if k == 0 || k + 1 == n { 0.5 * dt } else { dt };
        for (i, gi) in g.iter().enumerate() {
            let qk = q[(k, i)];
            for a in 0..p {
                let ga = gi[(k, a)];
                if ga == 0.0 {
                    continue;
                }
                gtx[a] += w * ga * qk;
                for c in 0..p {
                    b[(a, c)] += w * ga * gi[(k, c)];
                }
            }
        }
    }
    (b, gtx)
}

/// `∫ Q_i dt` per variable.
pub fn residual_integrals(q: &DMatrix<f64>, dt: f64) -> DVector<f64> {
    DVector::from_iterator(q.ncols(), (0..q.ncols()).map(|i| trapezoid(column(q, i), dt)))
}

/// Solve for the initial conditions of every variable.
///
/// With no parameters this reduces to `x0 = ∫Q dt / T`.
pub fn estimate_x0(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q_int: &DVector<f64>,
    gtx_int: &DVector<f64>,
    span: f64,
) -> Result<DVector<f64>, FitError> {
    let d = a.nrows();
    let p = a.ncols();
    if !(span.is_finite() && span > 0.0) {
        return Err(FitError::SingularSystem(format!("integration span {span} is not positive")));
    }
    if p == 0 {
        return Ok(q_int / span);
    }

    // B⁻¹ [Aᵀ | ∫Gtx] in one solve.
    let mut rhs = DMatrix::<f64>::zeros(p, d + 1);
    rhs.view_mut((0, 0), (p, d)).copy_from(&a.transpose());
    rhs.column_mut(d).copy_from(gtx_int);
    let sol = solve_square(b, &rhs, "sensitivity Gram matrix B")?;
    let binv_at = sol.columns(0, d);
    let binv_gtx = sol.column(d);

    let m = DMatrix::<f64>::identity(d, d) * span - a * binv_at;
    let target = q_int - a * binv_gtx;
    let x0 = solve_square_vec(&m, &target, "initial-condition system")?;
    debug!("initial conditions estimated: {:?}", x0.as_slice());
    Ok(x0)
}
