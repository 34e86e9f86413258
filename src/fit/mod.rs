//! Integral-matching fit.
//!
//! Responsibilities:
//!
//! - build the shared evaluation grid
//! - integrate free terms and sensitivities of every equation
//! - estimate unknown initial conditions
//! - solve the box-constrained problem for the linear parameters
//! - reuse a previous fit for partial recomputation

pub mod cache;
pub mod fitter;
pub mod grid;
pub mod initial;
pub mod integrals;
pub mod solve;

pub use fitter::*;
pub use grid::*;
