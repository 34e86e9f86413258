//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observation containers (`Series`, `Observations`)
//! - partially known initial conditions (`InitialConditions`)
//! - per-call settings (`FitOptions`, `SmoothingKind`)

pub mod types;

pub use types::*;
