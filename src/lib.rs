//! `integral-match` library crate.
//!
//! Initial estimates for ODE systems that are linear in a subset of their
//! parameters, computed by integral matching instead of solving the ODE.
//!
//! The binary (`imfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - an outer optimiser can call the fit (and its incremental variant) directly

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod expr;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod smooth;

pub use domain::{FitOptions, InitialConditions, Observations, Series, SmoothingKind};
pub use error::FitError;
pub use fit::{IntegralFit, fit_integral_matching, refit_integral_matching};
pub use models::OdeSystem;
