//! Reporting utilities: run summaries and model checks for the terminal.

pub mod format;

pub use format::*;
