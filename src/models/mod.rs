//! ODE model definitions.
//!
//! A model is a set of `d variable / dt = rhs` equations that are affine in a
//! designated list of parameters. Everything the fitter evaluates is derived
//! from the parsed right-hand sides when the model is built.

pub mod system;

pub use system::*;
