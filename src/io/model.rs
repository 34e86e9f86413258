//! Model JSON files.
//!
//! A model file carries everything about the ODE system plus the per-model
//! fitting defaults:
//!
//! ```json
//! {
//!   "equations": [
//!     { "variable": "x", "rhs": "a*x - b*x*y" },
//!     { "variable": "y", "rhs": "c*x*y - d*y" }
//!   ],
//!   "parameters": ["a", "b", "c", "d"],
//!   "initial": { "x": 10.0, "y": null },
//!   "bounds": { "b": { "min": 0.0 } },
//!   "smoothing": "spline"
//! }
//! ```
//!
//! Optional keys: `time` (default `t`), `initial`, `bounds`, `fixed`,
//! `smoothing`, `grid_size`, `bw_factor`. Unknown keys are rejected so typos
//! surface instead of being ignored.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FitOptions, InitialConditions, SmoothingKind};
use crate::error::{AppError, EXIT_INPUT, FitError};
use crate::models::{DEFAULT_TIME_SYMBOL, OdeSystem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EquationEntry {
    pub variable: String,
    pub rhs: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundEntry {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    pub equations: Vec<EquationEntry>,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default)]
    pub initial: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub bounds: BTreeMap<String, BoundEntry>,
    #[serde(default)]
    pub fixed: BTreeMap<String, f64>,
    #[serde(default)]
    pub smoothing: Option<SmoothingKind>,
    #[serde(default)]
    pub grid_size: Option<usize>,
    #[serde(default)]
    pub bw_factor: Option<f64>,
}

fn default_time() -> String {
    DEFAULT_TIME_SYMBOL.to_string()
}

impl ModelFile {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to open model JSON '{}': {e}", path.display())))?;
        serde_json::from_reader(file)
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Invalid model JSON '{}': {e}", path.display())))
    }

    pub fn from_json(text: &str) -> Result<Self, AppError> {
        serde_json::from_str(text).map_err(|e| AppError::new(EXIT_INPUT, format!("Invalid model JSON: {e}")))
    }

    /// Parse and validate the equations.
    pub fn build_system(&self) -> Result<OdeSystem, FitError> {
        let equations: Vec<(&str, &str)> = self
            .equations
            .iter()
            .map(|e| (e.variable.as_str(), e.rhs.as_str()))
            .collect();
        OdeSystem::new(&equations, &self.parameters)?.with_time_symbol(&self.time)
    }

    /// Initial conditions merged by variable name.
    pub fn initial_conditions(&self, system: &OdeSystem) -> Result<InitialConditions, FitError> {
        InitialConditions::by_name(system.variables(), &self.initial)
    }

    /// File-level fitting options on top of the built-in defaults.
    pub fn fit_options(&self) -> FitOptions {
        let mut opts = FitOptions::default();
        if let Some(kind) = self.smoothing {
            opts.smoothing = kind;
        }
        if let Some(n) = self.grid_size {
            opts.grid_size = n;
        }
        if let Some(bw) = self.bw_factor {
            opts.bw_factor = bw;
        }
        for (name, bound) in &self.bounds {
            opts = opts.with_bounds(name, bound.min, bound.max);
        }
        for (name, value) in &self.fixed {
            opts = opts.with_fixed(name, *value);
        }
        opts
    }
}
