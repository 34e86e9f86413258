//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the log subscriber
//! - runs the fit pipeline or the model check
//! - prints reports and writes optional exports

use clap::Parser;

use crate::cli::{CheckArgs, Cli, Command, FitArgs};
use crate::error::{AppError, EXIT_FIT};

pub mod pipeline;

use pipeline::RunConfig;

/// Entry point for the `imfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Check(args) => handle_check(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    println!("{}", crate::report::format_run_summary(&run));

    if let Some(path) = &config.output {
        crate::io::export::write_results_json(path, &run.outcomes)?;
    }
    if let Some(path) = &config.trajectories {
        crate::io::export::write_trajectories_csv(path, run.system.variables(), &run.outcomes)?;
    }

    if run.n_ok() == 0 {
        return Err(AppError::new(EXIT_FIT, "No observation set produced an estimate."));
    }
    Ok(())
}

fn handle_check(args: CheckArgs) -> Result<(), AppError> {
    let (_, system) = pipeline::load_system(&args.model)?;
    println!("{}", crate::report::format_check(&system));
    Ok(())
}

pub fn run_config_from_args(args: &FitArgs) -> RunConfig {
    RunConfig {
        model_path: args.model.clone(),
        data_path: args.data.clone(),
        smoothing: args.smoothing,
        grid_size: args.grid_size,
        bw_factor: args.bw_factor,
        output: args.output.clone(),
        trajectories: args.trajectories.clone(),
    }
}
