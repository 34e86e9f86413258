//! Shared "fit pipeline" logic used by the CLI.
//!
//! Keeping this in one place avoids mixing the workflow with presentation:
//! model JSON -> observation CSV -> per-set fits (parallel) -> outcomes
//!
//! Configuration is layered: built-in defaults, then the model file, then
//! whatever the command line overrides.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{FitOptions, InitialConditions, SmoothingKind};
use crate::error::{AppError, EXIT_MODEL, FitError};
use crate::fit::solve::resolve_bounds;
use crate::fit::{IntegralFit, fit_integral_matching};
use crate::io::ingest::{IngestedData, load_observations};
use crate::io::model::ModelFile;
use crate::models::OdeSystem;

/// Resolved settings of one `imfit fit` run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub model_path: PathBuf,
    pub data_path: PathBuf,
    pub smoothing: Option<SmoothingKind>,
    pub grid_size: Option<usize>,
    pub bw_factor: Option<f64>,
    pub output: Option<PathBuf>,
    pub trajectories: Option<PathBuf>,
}

/// Result of fitting one observation set.
#[derive(Debug, Clone)]
pub struct SetOutcome {
    pub set: String,
    pub result: Result<IntegralFit, FitError>,
}

/// All computed outputs of a single `imfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub system: OdeSystem,
    pub options: FitOptions,
    pub initial: InitialConditions,
    pub ingest: IngestedData,
    pub outcomes: Vec<SetOutcome>,
}

impl RunOutput {
    pub fn n_ok(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// Load the model and build the system it describes.
pub fn load_system(model_path: &std::path::Path) -> Result<(ModelFile, OdeSystem), AppError> {
    let model = ModelFile::load(model_path)?;
    let system = model
        .build_system()
        .map_err(|e| AppError::new(EXIT_MODEL, format!("Invalid model '{}': {e}", model_path.display())))?;
    Ok((model, system))
}

/// Apply command-line overrides on top of the model file options.
pub fn resolve_options(model: &ModelFile, config: &RunConfig) -> FitOptions {
    let mut opts = model.fit_options();
    if let Some(kind) = config.smoothing {
        opts.smoothing = kind;
    }
    if let Some(n) = config.grid_size {
        opts.grid_size = n;
    }
    if let Some(bw) = config.bw_factor {
        opts.bw_factor = bw;
    }
    opts
}

/// Execute the full pipeline and return the per-set outcomes.
///
/// A set without an estimate does not stop the others; a contract violation
/// aborts the run.
pub fn run_fit(config: &RunConfig) -> Result<RunOutput, AppError> {
    let (model, system) = load_system(&config.model_path)?;
    let options = resolve_options(&model, config);
    let initial = model.initial_conditions(&system).map_err(AppError::from)?;
    // Problems shared by every set are reported once, before any fitting.
    system.check_fixed(&options.fixed).map_err(AppError::from)?;
    resolve_bounds(system.parameters(), &options.lower, &options.upper).map_err(AppError::from)?;
    info!(
        "model: {} equations, {} linear parameters, smoothing={}",
        system.dim(),
        system.n_params(),
        options.smoothing.display_name()
    );

    let ingest = load_observations(&config.data_path)?;
    for e in &ingest.row_errors {
        debug!("skipped CSV line {}: {}", e.line, e.message);
    }
    if !ingest.row_errors.is_empty() {
        warn!("{} CSV rows skipped", ingest.row_errors.len());
    }

    let outcomes = fit_sets(&system, &ingest, &initial, &options);

    if let Some(violation) = outcomes
        .iter()
        .find_map(|o| o.result.as_ref().err().filter(|e| e.is_contract_violation()))
    {
        return Err(AppError::from(violation.clone()));
    }

    Ok(RunOutput {
        system,
        options,
        initial,
        ingest,
        outcomes,
    })
}

/// Fit every set independently; outcomes keep the input order.
pub fn fit_sets(
    system: &OdeSystem,
    ingest: &IngestedData,
    initial: &InitialConditions,
    options: &FitOptions,
) -> Vec<SetOutcome> {
    ingest
        .sets
        .par_iter()
        .map(|set| {
            let result = fit_integral_matching(system, &set.observations, initial, options);
            match &result {
                Ok(fit) => info!(
                    "set '{}': theta={:?}",
                    set.name,
                    fit.theta.as_slice()
                ),
                Err(e) if e.is_numerical() => warn!("set '{}': no estimate ({e})", set.name),
                Err(e) => warn!("set '{}': {e}", set.name),
            }
            SetOutcome {
                set: set.name.clone(),
                result,
            }
        })
        .collect()
}
