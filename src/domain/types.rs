//! Shared domain types.
//!
//! These are the inputs of one integral-matching call:
//!
//! - observations per state variable (`Series`, `Observations`)
//! - partially known initial conditions (`InitialConditions`)
//! - per-call settings (`FitOptions`, `SmoothingKind`)

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// How raw observations are turned into trajectories on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingKind {
    /// Penalised cubic spline, smoothing weight chosen by generalised cross-validation.
    #[default]
    Spline,
    /// Local-linear regression with an Epanechnikov kernel.
    Kernel,
    /// Cubic interpolation through the observations (no smoothing).
    None,
}

impl SmoothingKind {
    pub fn display_name(self) -> &'static str {
        match self {
            SmoothingKind::Spline => "spline",
            SmoothingKind::Kernel => "kernel",
            SmoothingKind::None => "none",
        }
    }
}

/// Observations of one state variable, sorted by time.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Series {
    /// Build a series; pairs are sorted by time and non-finite pairs rejected.
    pub fn new(name: impl Into<String>, times: Vec<f64>, values: Vec<f64>) -> Result<Self, FitError> {
        let name = name.into();
        if times.len() != values.len() {
            return Err(FitError::ShapeMismatch {
                expected: times.len(),
                found: values.len(),
                context: format!("observations of '{name}'"),
            });
        }
        if times.iter().chain(values.iter()).any(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput(format!(
                "observations of '{name}' contain non-finite values"
            )));
        }

        let mut pairs: Vec<(f64, f64)> = times.into_iter().zip(values).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (times, values) = pairs.into_iter().unzip();
        Ok(Self {
            name,
            times,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Positive gaps between consecutive observation times.
    pub fn gaps(&self) -> impl Iterator<Item = f64> + '_ {
        self.times.windows(2).map(|w| w[1] - w[0]).filter(|g| *g > 0.0)
    }
}

/// One observation set: a series per state variable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observations {
    series: Vec<Series>,
}

impl Observations {
    pub fn new(series: Vec<Series>) -> Self {
        Self { series }
    }

    pub fn get(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// Series ordered like `variables`; every variable must be observed.
    pub fn ordered<'a>(&'a self, variables: &[String]) -> Result<Vec<&'a Series>, FitError> {
        variables
            .iter()
            .map(|v| {
                let s = self
                    .get(v)
                    .ok_or_else(|| FitError::InvalidInput(format!("no observations for '{v}'")))?;
                if s.is_empty() {
                    return Err(FitError::InvalidInput(format!("no observations for '{v}'")));
                }
                Ok(s)
            })
            .collect()
    }
}

/// Initial conditions with individually unknown entries.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialConditions {
    values: Vec<Option<f64>>,
}

impl InitialConditions {
    /// All `d` entries unknown.
    pub fn unknown(d: usize) -> Self {
        Self {
            values: vec![None; d],
        }
    }

    /// All entries known.
    pub fn known(values: &[f64]) -> Self {
        Self {
            values: values.iter().map(|&v| Some(v)).collect(),
        }
    }

    /// Index-based; non-finite entries count as unknown.
    pub fn from_options(values: Vec<Option<f64>>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect(),
        }
    }

    /// Name-based merge against the variable order. Unlisted variables are unknown.
    pub fn by_name(variables: &[String], given: &BTreeMap<String, Option<f64>>) -> Result<Self, FitError> {
        if let Some(extra) = given.keys().find(|k| !variables.contains(k)) {
            return Err(FitError::InvalidInput(format!(
                "initial condition given for unknown variable '{extra}'"
            )));
        }
        Ok(Self::from_options(
            variables
                .iter()
                .map(|v| given.get(v).copied().flatten())
                .collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied().flatten()
    }

    pub fn any_unknown(&self) -> bool {
        self.values.iter().any(Option::is_none)
    }

    /// Known entries kept, unknown ones taken from `estimate`.
    pub fn merge(&self, estimate: &[f64]) -> Vec<f64> {
        self.values
            .iter()
            .zip(estimate)
            .map(|(given, &est)| given.unwrap_or(est))
            .collect()
    }
}

/// Per-call fitting settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub smoothing: SmoothingKind,
    /// Grid size; 0 means "largest number of observations of any variable".
    /// Ignored by kernel smoothing, which derives the grid from the sampling.
    pub grid_size: usize,
    /// Kernel bandwidth multiplier on the largest observation gap (floored at 1).
    pub bw_factor: f64,
    /// Lower bounds by parameter name; absent means unbounded.
    pub lower: BTreeMap<String, f64>,
    /// Upper bounds by parameter name; absent means unbounded.
    pub upper: BTreeMap<String, f64>,
    /// Values for symbols that are neither variables nor linear parameters.
    pub fixed: BTreeMap<String, f64>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            smoothing: SmoothingKind::Spline,
            grid_size: 0,
            bw_factor: 1.5,
            lower: BTreeMap::new(),
            upper: BTreeMap::new(),
            fixed: BTreeMap::new(),
        }
    }
}

impl FitOptions {
    pub fn with_smoothing(mut self, smoothing: SmoothingKind) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_bounds(mut self, parameter: &str, lower: Option<f64>, upper: Option<f64>) -> Self {
        if let Some(lb) = lower {
            self.lower.insert(parameter.to_string(), lb);
        }
        if let Some(ub) = upper {
            self.upper.insert(parameter.to_string(), ub);
        }
        self
    }

    pub fn with_fixed(mut self, name: &str, value: f64) -> Self {
        self.fixed.insert(name.to_string(), value);
        self
    }
}
