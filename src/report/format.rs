//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::{RunOutput, SetOutcome};
use crate::fit::IntegralFit;
use crate::io::export::bound_label;
use crate::math::bvls::BoundState;
use crate::models::OdeSystem;

/// Format the full run summary (model, data, one block per set).
pub fn format_run_summary(run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== imfit - integral-matching initial estimates ===\n");
    out.push_str(&format!(
        "Model: d={} variables [{}] | p={} parameters [{}]\n",
        run.system.dim(),
        run.system.variables().join(", "),
        run.system.n_params(),
        run.system.parameters().join(", "),
    ));
    out.push_str(&format!(
        "Smoothing: {} | grid size: {} | bw factor: {}\n",
        run.options.smoothing.display_name(),
        if run.options.grid_size == 0 {
            "auto".to_string()
        } else {
            run.options.grid_size.to_string()
        },
        run.options.bw_factor,
    ));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={} | sets={}\n",
        run.ingest.rows_read,
        run.ingest.rows_used,
        run.ingest.row_errors.len(),
        run.ingest.sets.len(),
    ));

    for outcome in &run.outcomes {
        out.push('\n');
        out.push_str(&format_set(outcome));
    }

    out.push_str(&format!(
        "\n{} of {} sets produced an estimate.\n",
        run.n_ok(),
        run.outcomes.len()
    ));
    out
}

/// One set: either the estimate tables or the reason there is none.
pub fn format_set(outcome: &SetOutcome) -> String {
    match &outcome.result {
        Ok(fit) => format!("Set '{}':\n{}", outcome.set, format_fit(fit)),
        Err(e) => format!("Set '{}': no estimate ({e})\n", outcome.set),
    }
}

/// Grid line plus the parameter and initial-condition tables.
pub fn format_fit(fit: &IntegralFit) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  grid: N={} dt={:.6} range=[{}, {}]\n",
        fit.grid.len(),
        fit.grid.dt,
        fit.grid.min_time(),
        fit.grid.max_time(),
    ));

    if fit.parameters.is_empty() {
        out.push_str("  (no linear parameters)\n");
    } else {
        out.push_str(&format!("  {:<16} {:>14} {:<6}\n", "parameter", "estimate", "bound").trim_end());
        out.push('\n');
        out.push_str(&format!("  {:-<16} {:->14} {:-<6}\n", "", "", ""));
        for ((name, value), state) in fit.parameters.iter().zip(fit.theta.iter()).zip(&fit.bound_state) {
            let marker = match state {
                BoundState::Free => "",
                _ => bound_label(*state),
            };
            out.push_str(format!("  {:<16} {:>14.6e} {:<6}", truncate(name, 16), value, marker).trim_end());
            out.push('\n');
        }
    }

    out.push_str(&format!("  {:<16} {:>14} {:<9} {:>12}\n", "variable", "x0", "source", "rmse"));
    out.push_str(&format!("  {:-<16} {:->14} {:-<9} {:->12}\n", "", "", "", ""));
    let rmse = fit.residual_rmse();
    for (i, name) in fit.variables.iter().enumerate() {
        let source = if fit.x0_estimated[i] { "estimated" } else { "known" };
        out.push_str(&format!(
            "  {:<16} {:>14.6e} {:<9} {:>12.4e}\n",
            truncate(name, 16),
            fit.x0[i],
            source,
            rmse[i]
        ));
    }
    out
}

/// `imfit check` output: derived expressions and the dependency map.
pub fn format_check(system: &OdeSystem) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "time symbol: {} | variables: [{}] | parameters: [{}]\n",
        system.time_symbol(),
        system.variables().join(", "),
        system.parameters().join(", "),
    ));

    for eq in system.equations() {
        out.push_str(&format!("\nd{}/d{} = {}\n", eq.variable, system.time_symbol(), eq.text.trim()));
        out.push_str(&format!("  parsed: {}\n", eq.rhs));
        out.push_str(&format!("  free term: {}\n", eq.free_term));
        for (param, sens) in system.parameters().iter().zip(&eq.sensitivities) {
            out.push_str(&format!("  d/d{param}: {sens}\n"));
        }
    }

    out.push_str("\nSymbol -> variables:\n");
    for (symbol, idx) in system.affected_variables() {
        let names: Vec<&str> = idx.iter().map(|&i| system.variables()[i].as_str()).collect();
        out.push_str(&format!("  {symbol}: [{}]\n", names.join(", ")));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitOptions, InitialConditions, Observations, Series, SmoothingKind};
    use crate::fit::fit_integral_matching;

    #[test]
    fn check_lists_sensitivities_and_dependencies() {
        let sys = OdeSystem::new(&[("x", "-a*x"), ("y", "a*x   - b*y")], &["a", "b"]).unwrap();
        let text = format_check(&sys);
        assert!(text.contains("dy/dt = a*x   - b*y"));
        assert!(text.contains("parsed: a*x - b*y"));
        assert!(text.contains("d/db: -y"));
        assert!(text.contains("a: [x, y]"));
        assert!(text.contains("b: [y]"));
    }

    #[test]
    fn bound_marker_is_shown() {
        let sys = OdeSystem::new(&[("x", "-k*x")], &["k"]).unwrap();
        let times: Vec<f64> = (0..11).map(|i| i as f64 * 0.1).collect();
        let values: Vec<f64> = times.iter().map(|t| (-t).exp()).collect();
        let obs = Observations::new(vec![Series::new("x", times, values).unwrap()]);
        let opts = FitOptions::default()
            .with_smoothing(SmoothingKind::None)
            .with_bounds("k", None, Some(0.5));
        let fit = fit_integral_matching(&sys, &obs, &InitialConditions::known(&[1.0]), &opts).unwrap();
        let text = format_fit(&fit);
        assert!(text.contains("upper"), "{text}");
        assert!(text.contains("known"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
