//! ODE systems that are linear in a designated parameter subset.
//!
//! An `OdeSystem` owns the parsed right-hand sides and derives, once at
//! construction, the two expression families the integral-matching fit needs:
//!
//! - the free term: RHS with every linear parameter set to 0
//! - the sensitivities: ∂RHS/∂θ_j for every linear parameter
//!
//! A sensitivity that still mentions any linear parameter means the RHS is not
//! affine in that parameter; such systems are rejected here rather than
//! producing silently wrong design matrices later.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::FitError;
use crate::expr::{derivative, parse_expr, zero_out, Expr};

/// Default name of the independent variable.
pub const DEFAULT_TIME_SYMBOL: &str = "t";

/// Symbols bound implicitly during evaluation.
const BUILTIN_SYMBOLS: [&str; 1] = ["pi"];

/// One `d variable / dt = rhs` equation with its derived expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub variable: String,
    /// Source text as given by the caller.
    pub text: String,
    pub rhs: Expr,
    pub free_term: Expr,
    /// One entry per linear parameter, in parameter order.
    pub sensitivities: Vec<Expr>,
}

/// Equation set plus the ordered list of linear parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OdeSystem {
    equations: Vec<Equation>,
    variables: Vec<String>,
    parameters: Vec<String>,
    time: String,
}

impl OdeSystem {
    /// Parse and validate `(variable, rhs)` pairs against the linear `parameters`.
    pub fn new<V, R, P>(equations: &[(V, R)], parameters: &[P]) -> Result<Self, FitError>
    where
        V: AsRef<str>,
        R: AsRef<str>,
        P: AsRef<str>,
    {
        if equations.is_empty() {
            return Err(FitError::InvalidInput("model has no equations".to_string()));
        }

        let variables: Vec<String> = equations.iter().map(|(v, _)| v.as_ref().trim().to_string()).collect();
        let parameters: Vec<String> = parameters.iter().map(|p| p.as_ref().trim().to_string()).collect();

        check_names("variable", &variables)?;
        check_names("parameter", &parameters)?;
        if let Some(clash) = parameters.iter().find(|p| variables.contains(p)) {
            return Err(FitError::InvalidInput(format!(
                "'{clash}' is declared both as a variable and as a parameter"
            )));
        }

        let mut parsed = Vec::with_capacity(equations.len());
        for (variable, (_, text)) in variables.iter().zip(equations) {
            let text = text.as_ref().to_string();
            let rhs = parse_expr(&text).map_err(|message| FitError::Parse {
                variable: variable.clone(),
                message,
            })?;
            parsed.push(derive_equation(variable, text, rhs, &parameters)?);
        }

        let system = Self {
            equations: parsed,
            variables,
            parameters,
            time: DEFAULT_TIME_SYMBOL.to_string(),
        };
        system.check_time_symbol()?;
        Ok(system)
    }

    /// Use `name` instead of `t` for the independent variable.
    pub fn with_time_symbol(mut self, name: &str) -> Result<Self, FitError> {
        self.time = name.trim().to_string();
        self.check_time_symbol()?;
        Ok(self)
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn time_symbol(&self) -> &str {
        &self.time
    }

    pub fn dim(&self) -> usize {
        self.variables.len()
    }

    pub fn n_params(&self) -> usize {
        self.parameters.len()
    }

    /// Symbol → indices of the variables whose equation mentions it.
    ///
    /// Covers the linear parameters (an unused one maps to an empty list) and
    /// every other non-variable symbol, i.e. the values an outer optimiser may
    /// hold fixed and perturb between calls.
    pub fn affected_variables(&self) -> BTreeMap<String, Vec<usize>> {
        let mut map: BTreeMap<String, Vec<usize>> =
            self.parameters.iter().map(|p| (p.clone(), Vec::new())).collect();
        for (i, eq) in self.equations.iter().enumerate() {
            for sym in eq.rhs.symbols() {
                if self.variables.contains(&sym) || sym == self.time || BUILTIN_SYMBOLS.contains(&sym.as_str()) {
                    continue;
                }
                map.entry(sym).or_default().push(i);
            }
        }
        map
    }

    /// Symbols that would be unbound when evaluating with the given fixed values.
    pub fn unresolved_symbols(&self, fixed: &BTreeMap<String, f64>) -> Vec<String> {
        let mut all = BTreeSet::new();
        for eq in &self.equations {
            all.extend(eq.rhs.symbols());
        }
        all.into_iter()
            .filter(|s| {
                !self.variables.contains(s)
                    && !self.parameters.contains(s)
                    && *s != self.time
                    && !fixed.contains_key(s)
                    && !BUILTIN_SYMBOLS.contains(&s.as_str())
            })
            .collect()
    }

    /// Fixed values must not shadow a variable, parameter or the time symbol.
    pub fn check_fixed(&self, fixed: &BTreeMap<String, f64>) -> Result<(), FitError> {
        for (name, value) in fixed {
            if self.variables.contains(name) || self.parameters.contains(name) || *name == self.time {
                return Err(FitError::InvalidInput(format!(
                    "fixed value given for '{name}', which is a variable, parameter or the time symbol"
                )));
            }
            if !value.is_finite() {
                return Err(FitError::InvalidInput(format!("fixed value for '{name}' is not finite")));
            }
        }
        if let Some(missing) = self.unresolved_symbols(fixed).into_iter().next() {
            return Err(FitError::UnknownSymbol(missing));
        }
        Ok(())
    }

    fn check_time_symbol(&self) -> Result<(), FitError> {
        if !is_identifier(&self.time) {
            return Err(FitError::InvalidInput(format!("invalid time symbol '{}'", self.time)));
        }
        if self.variables.contains(&self.time) || self.parameters.contains(&self.time) {
            return Err(FitError::InvalidInput(format!(
                "time symbol '{}' collides with a variable or parameter",
                self.time
            )));
        }
        Ok(())
    }
}

fn derive_equation(variable: &str, text: String, rhs: Expr, parameters: &[String]) -> Result<Equation, FitError> {
    let free_term = zero_out(&rhs, parameters);
    let mut sensitivities = Vec::with_capacity(parameters.len());
    for param in parameters {
        let d = derivative(&rhs, param);
        if parameters.iter().any(|q| d.contains(q)) {
            return Err(FitError::NotLinear {
                variable: variable.to_string(),
                parameter: param.clone(),
            });
        }
        sensitivities.push(d);
    }
    Ok(Equation {
        variable: variable.to_string(),
        text,
        rhs,
        free_term,
        sensitivities,
    })
}

fn check_names(kind: &str, names: &[String]) -> Result<(), FitError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !is_identifier(name) {
            return Err(FitError::InvalidInput(format!("invalid {kind} name '{name}'")));
        }
        if BUILTIN_SYMBOLS.contains(&name.as_str()) {
            return Err(FitError::InvalidInput(format!("{kind} name '{name}' is reserved")));
        }
        if !seen.insert(name.as_str()) {
            return Err(FitError::InvalidInput(format!("duplicate {kind} '{name}'")));
        }
    }
    Ok(())
}

/// Same lexical rule as the expression parser: a letter or `_`, then
/// alphanumerics, `_` or `.`.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lotka_volterra() -> OdeSystem {
        OdeSystem::new(
            &[("x", "a*x - b*x*y"), ("y", "c*x*y - d*y")],
            &["a", "b", "c", "d"],
        )
        .unwrap()
    }

    #[test]
    fn free_term_and_sensitivities_are_derived() {
        let sys = lotka_volterra();
        let x = &sys.equations()[0];
        assert_eq!(x.free_term, Expr::Num(0.0));
        let sens: Vec<String> = x.sensitivities.iter().map(|e| e.to_string()).collect();
        assert_eq!(sens, vec!["x", "-(x*y)", "0", "0"]);
    }

    #[test]
    fn non_linear_parameter_is_rejected() {
        let err = OdeSystem::new(&[("x", "-k^2*x")], &["k"]).unwrap_err();
        assert_eq!(
            err,
            FitError::NotLinear {
                variable: "x".into(),
                parameter: "k".into()
            }
        );

        // Products of two linear parameters are not affine either.
        assert!(OdeSystem::new(&[("x", "a*b*x")], &["a", "b"]).is_err());
    }

    #[test]
    fn parse_errors_name_the_variable() {
        let err = OdeSystem::new(&[("x", "-k*")], &["k"]).unwrap_err();
        assert!(matches!(err, FitError::Parse { ref variable, .. } if variable == "x"));
    }

    #[test]
    fn names_are_validated() {
        assert!(OdeSystem::new(&[("x", "1"), ("x", "2")], &[] as &[&str]).is_err());
        assert!(OdeSystem::new(&[("x", "k*x")], &["x"]).is_err());
        assert!(OdeSystem::new(&[("t", "1")], &[] as &[&str]).is_err());
        assert!(OdeSystem::new(&[("2x", "1")], &[] as &[&str]).is_err());
    }

    #[test]
    fn time_symbol_can_be_renamed() {
        let sys = OdeSystem::new(&[("x", "-k*x + tau")], &["k"]).unwrap();
        assert_eq!(sys.unresolved_symbols(&BTreeMap::new()), vec!["tau".to_string()]);

        let sys = sys.with_time_symbol("tau").unwrap();
        assert_eq!(sys.time_symbol(), "tau");
        assert!(sys.unresolved_symbols(&BTreeMap::new()).is_empty());

        let sys = OdeSystem::new(&[("x", "-k*x")], &["k"]).unwrap();
        assert!(sys.with_time_symbol("x").is_err());
    }

    #[test]
    fn dependency_map_lists_variables_per_parameter() {
        let sys = OdeSystem::new(&[("x", "-a*x"), ("y", "a*x - b*y"), ("z", "K*t")], &["a", "b", "c"]).unwrap();
        let map = sys.affected_variables();
        assert_eq!(map["a"], vec![0, 1]);
        assert_eq!(map["b"], vec![1]);
        assert!(map["c"].is_empty());
        assert_eq!(map["K"], vec![2]);
        assert!(!map.contains_key("t"));
    }

    #[test]
    fn fixed_symbols_resolve_the_rest() {
        let sys = OdeSystem::new(&[("x", "-k*x/(1 + K)")], &["k"]).unwrap();
        let mut fixed = BTreeMap::new();
        assert_eq!(sys.unresolved_symbols(&fixed), vec!["K".to_string()]);
        assert!(matches!(sys.check_fixed(&fixed), Err(FitError::UnknownSymbol(_))));
        fixed.insert("K".to_string(), 2.0);
        assert!(sys.check_fixed(&fixed).is_ok());
        fixed.insert("x".to_string(), 1.0);
        assert!(sys.check_fixed(&fixed).is_err());
    }
}
