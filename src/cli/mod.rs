//! Command-line parsing for the integral-matching estimator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::SmoothingKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "imfit",
    version,
    about = "Integral-matching initial estimates for ODE systems linear in their parameters"
)]
pub struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimate parameters (and unknown initial conditions) for every observation set.
    Fit(FitArgs),
    /// Parse a model and print its free terms, sensitivities and parameter dependencies.
    Check(CheckArgs),
}

/// Options for fitting.
///
/// Flags left unset fall back to the model file, then to built-in defaults.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Model JSON (equations, parameters, initial conditions, bounds, ...).
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Observation CSV in long format (`[set,]variable,time,value`).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Smoothing strategy.
    #[arg(long, value_enum)]
    pub smoothing: Option<SmoothingKind>,

    /// Number of grid points (0 = largest series length). Ignored by kernel smoothing.
    #[arg(long)]
    pub grid_size: Option<usize>,

    /// Kernel bandwidth as a multiple of the largest observation gap.
    #[arg(long)]
    pub bw_factor: Option<f64>,

    /// Write per-set estimates to a JSON file.
    #[arg(long, value_name = "JSON")]
    pub output: Option<PathBuf>,

    /// Write smoothed trajectories to a CSV file.
    #[arg(long, value_name = "CSV")]
    pub trajectories: Option<PathBuf>,
}

/// Options for model checking.
#[derive(Debug, Parser, Clone)]
pub struct CheckArgs {
    /// Model JSON to check.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,
}
