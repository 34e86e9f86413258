//! Input/output helpers.
//!
//! - observation CSV ingest + validation (`ingest`)
//! - model JSON files (`model`)
//! - result JSON and trajectory CSV exports (`export`)

pub mod export;
pub mod ingest;
pub mod model;

pub use export::*;
pub use ingest::*;
pub use model::*;
