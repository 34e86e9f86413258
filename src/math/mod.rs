//! Mathematical utilities: trapezoid integration, conditioned dense solves and
//! bounded least squares.

pub mod bvls;
pub mod integrate;
pub mod linalg;

pub use bvls::*;
pub use integrate::*;
pub use linalg::*;
