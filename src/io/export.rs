//! Result exports.
//!
//! - result JSON: one entry per observation set with the estimates, the grid
//!   summary and the aggregate matrices (or the reason no estimate exists)
//! - trajectories CSV: smoothed values per set on each set's grid, meant for
//!   spreadsheets or quick plots

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app::pipeline::SetOutcome;
use crate::error::{AppError, EXIT_INPUT};
use crate::fit::IntegralFit;
use crate::math::bvls::BoundState;

/// Top-level result JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub tool: String,
    pub sets: Vec<SetResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetResult {
    pub set: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<Estimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub smoothing: String,
    pub grid: GridSummary,
    pub theta: Vec<ParameterEstimate>,
    pub x0: Vec<InitialEstimate>,
    pub rmse: Vec<f64>,
    /// Row-major `d × p`, present when some initial condition was estimated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<Vec<Vec<f64>>>,
    /// Row-major `p × p`, present when some initial condition was estimated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub n: usize,
    pub dt: f64,
    pub min_time: f64,
    pub max_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEstimate {
    pub name: String,
    pub value: f64,
    /// `free`, `lower` or `upper`.
    pub bound: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialEstimate {
    pub variable: String,
    pub value: f64,
    pub estimated: bool,
}

pub fn bound_label(state: BoundState) -> &'static str {
    match state {
        BoundState::Free => "free",
        BoundState::AtLower => "lower",
        BoundState::AtUpper => "upper",
    }
}

fn rows(m: &nalgebra::DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

impl Estimate {
    pub fn from_fit(fit: &IntegralFit) -> Self {
        Self {
            smoothing: fit.smoothing.display_name().to_string(),
            grid: GridSummary {
                n: fit.grid.len(),
                dt: fit.grid.dt,
                min_time: fit.grid.min_time(),
                max_time: fit.grid.max_time(),
            },
            theta: fit
                .parameters
                .iter()
                .zip(fit.theta.iter())
                .zip(&fit.bound_state)
                .map(|((name, value), state)| ParameterEstimate {
                    name: name.clone(),
                    value: *value,
                    bound: bound_label(*state).to_string(),
                })
                .collect(),
            x0: fit
                .variables
                .iter()
                .zip(fit.x0.iter())
                .zip(&fit.x0_estimated)
                .map(|((variable, value), estimated)| InitialEstimate {
                    variable: variable.clone(),
                    value: *value,
                    estimated: *estimated,
                })
                .collect(),
            rmse: fit.residual_rmse(),
            a: fit.a.as_ref().map(rows),
            b: fit.b.as_ref().map(rows),
        }
    }
}

impl ResultFile {
    pub fn from_outcomes(outcomes: &[SetOutcome]) -> Self {
        let sets = outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(fit) => SetResult {
                    set: o.set.clone(),
                    estimate: Some(Estimate::from_fit(fit)),
                    error: None,
                },
                Err(e) => SetResult {
                    set: o.set.clone(),
                    estimate: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        Self {
            tool: "imfit".to_string(),
            sets,
        }
    }
}

/// Write the result JSON.
pub fn write_results_json(path: &Path, outcomes: &[SetOutcome]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create result JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &ResultFile::from_outcomes(outcomes))
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write result JSON: {e}")))
}

/// Write `set,time,<variable>...` rows of the smoothed trajectories.
///
/// Sets without an estimate contribute no rows.
pub fn write_trajectories_csv(path: &Path, variables: &[String], outcomes: &[SetOutcome]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create trajectories CSV '{}': {e}", path.display())))?;
    write_trajectories(&mut writer, variables, outcomes)?;
    writer
        .flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write trajectories CSV: {e}")))
}

fn write_trajectories<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    variables: &[String],
    outcomes: &[SetOutcome],
) -> Result<(), AppError> {
    let write_err = |e: csv::Error| AppError::new(EXIT_INPUT, format!("Failed to write trajectories CSV: {e}"));

    let mut header = vec!["set".to_string(), "time".to_string()];
    header.extend(variables.iter().cloned());
    writer.write_record(&header).map_err(write_err)?;

    for outcome in outcomes {
        let Ok(fit) = &outcome.result else {
            continue;
        };
        for (k, t) in fit.grid.times.iter().enumerate() {
            let mut record = Vec::with_capacity(variables.len() + 2);
            record.push(outcome.set.clone());
            record.push(format!("{t}"));
            for i in 0..variables.len() {
                record.push(format!("{}", fit.smoothed[(k, i)]));
            }
            writer.write_record(&record).map_err(write_err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitOptions, InitialConditions, Observations, Series, SmoothingKind};
    use crate::error::FitError;
    use crate::fit::fit_integral_matching;
    use crate::models::OdeSystem;

    fn outcomes() -> (Vec<String>, Vec<SetOutcome>) {
        let system = OdeSystem::new(&[("x", "-k*x")], &["k"]).unwrap();
        let times: Vec<f64> = (0..5).map(|i| i as f64 * 0.5).collect();
        let values: Vec<f64> = times.iter().map(|t| (-0.5 * t).exp()).collect();
        let obs = Observations::new(vec![Series::new("x", times, values).unwrap()]);
        let opts = FitOptions::default().with_smoothing(SmoothingKind::None);
        let fit = fit_integral_matching(&system, &obs, &InitialConditions::known(&[1.0]), &opts);
        (
            system.variables().to_vec(),
            vec![
                SetOutcome {
                    set: "ok".to_string(),
                    result: fit,
                },
                SetOutcome {
                    set: "bad".to_string(),
                    result: Err(FitError::SingularSystem("B".to_string())),
                },
            ],
        )
    }

    #[test]
    fn result_file_keeps_failures() {
        let (_, outcomes) = outcomes();
        let file = ResultFile::from_outcomes(&outcomes);
        assert_eq!(file.sets.len(), 2);
        let ok = file.sets[0].estimate.as_ref().unwrap();
        assert_eq!(ok.theta[0].name, "k");
        assert_eq!(ok.theta[0].bound, "free");
        assert!(!ok.x0[0].estimated);
        assert!(ok.a.is_none());
        assert!(file.sets[1].estimate.is_none());
        assert!(file.sets[1].error.as_deref().unwrap().contains("singular"));

        let json = serde_json::to_string(&file).unwrap();
        let back: ResultFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sets.len(), 2);
        assert_eq!(back.sets[1].error, file.sets[1].error);
        assert!(!json.contains("\"a\""));
    }

    #[test]
    fn trajectories_skip_failed_sets() {
        let (vars, outcomes) = outcomes();
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_trajectories(&mut writer, &vars, &outcomes).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "set,time,x");
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("ok,0,1"));
    }
}
