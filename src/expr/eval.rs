//! Vectorised evaluation against an explicit symbol table.
//!
//! Symbols bind either to a scalar or to a series (one value per grid point).
//! Binary operations broadcast scalars against series; two series must have the
//! same length. Results that stay scalar are broadcast by the caller.

use std::collections::HashMap;

use crate::error::FitError;
use crate::expr::ast::Expr;

/// A value bound to a symbol.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
    Scalar(f64),
    Series(&'a [f64]),
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Series(Vec<f64>),
}

impl Value {
    /// Materialise as a vector of length `n`, broadcasting scalars.
    pub fn into_series(self, n: usize) -> Result<Vec<f64>, FitError> {
        match self {
            Value::Scalar(v) => Ok(vec![v; n]),
            Value::Series(v) if v.len() == n => Ok(v),
            Value::Series(v) => Err(FitError::ShapeMismatch {
                expected: n,
                found: v.len(),
                context: "evaluated series".to_string(),
            }),
        }
    }

    fn map(self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(v)),
            Value::Series(mut v) => {
                v.iter_mut().for_each(|x| *x = f(*x));
                Value::Series(v)
            }
        }
    }

    fn zip(self, other: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, FitError> {
        Ok(match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(f(a, b)),
            (Value::Scalar(a), Value::Series(mut b)) => {
                b.iter_mut().for_each(|x| *x = f(a, *x));
                Value::Series(b)
            }
            (Value::Series(mut a), Value::Scalar(b)) => {
                a.iter_mut().for_each(|x| *x = f(*x, b));
                Value::Series(a)
            }
            (Value::Series(mut a), Value::Series(b)) => {
                if a.len() != b.len() {
                    return Err(FitError::ShapeMismatch {
                        expected: a.len(),
                        found: b.len(),
                        context: "binary operation on series".to_string(),
                    });
                }
                a.iter_mut().zip(b.iter()).for_each(|(x, &y)| *x = f(*x, y));
                Value::Series(a)
            }
        })
    }
}

/// Name → value bindings used for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable<'a> {
    bindings: HashMap<String, Binding<'a>>,
}

impl<'a> SymbolTable<'a> {
    /// Empty table with `pi` predefined.
    pub fn new() -> Self {
        let mut table = Self::default();
        table.bind_scalar("pi", std::f64::consts::PI);
        table
    }

    pub fn bind_scalar(&mut self, name: impl Into<String>, value: f64) {
        self.bindings.insert(name.into(), Binding::Scalar(value));
    }

    pub fn bind_series(&mut self, name: impl Into<String>, values: &'a [f64]) {
        self.bindings.insert(name.into(), Binding::Series(values));
    }

    pub fn get(&self, name: &str) -> Option<Binding<'a>> {
        self.bindings.get(name).copied()
    }
}

/// Evaluate `expr` elementwise.
pub fn eval(expr: &Expr, table: &SymbolTable<'_>) -> Result<Value, FitError> {
    match expr {
        Expr::Num(v) => Ok(Value::Scalar(*v)),
        Expr::Sym(name) => match table.get(name) {
            Some(Binding::Scalar(v)) => Ok(Value::Scalar(v)),
            Some(Binding::Series(v)) => Ok(Value::Series(v.to_vec())),
            None => Err(FitError::UnknownSymbol(name.clone())),
        },
        Expr::Neg(a) => Ok(eval(a, table)?.map(|x| -x)),
        Expr::Add(a, b) => eval(a, table)?.zip(eval(b, table)?, |x, y| x + y),
        Expr::Sub(a, b) => eval(a, table)?.zip(eval(b, table)?, |x, y| x - y),
        Expr::Mul(a, b) => eval(a, table)?.zip(eval(b, table)?, |x, y| x * y),
        Expr::Div(a, b) => eval(a, table)?.zip(eval(b, table)?, |x, y| x / y),
        Expr::Pow(a, b) => eval(a, table)?.zip(eval(b, table)?, pow),
        Expr::Call(f, a) => Ok(eval(a, table)?.map(|x| f.apply(x))),
    }
}

/// Integer exponents use `powi` so negative bases stay finite.
fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        base.powi(exponent as i32)
    } else {
        base.powf(exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse::parse_expr;

    #[test]
    fn scalars_broadcast_against_series() {
        let x = [1.0, 2.0, 3.0];
        let mut table = SymbolTable::new();
        table.bind_series("x", &x);
        table.bind_scalar("k", 2.0);

        let v = eval(&parse_expr("k*x + 1").unwrap(), &table).unwrap();
        assert_eq!(v, Value::Series(vec![3.0, 5.0, 7.0]));

        let v = eval(&parse_expr("k^2").unwrap(), &table).unwrap();
        assert_eq!(v.into_series(3).unwrap(), vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn unknown_symbol_is_reported() {
        let table = SymbolTable::new();
        let err = eval(&parse_expr("2*q").unwrap(), &table).unwrap_err();
        assert_eq!(err, FitError::UnknownSymbol("q".to_string()));
    }

    #[test]
    fn negative_base_integer_power() {
        let table = SymbolTable::new();
        let v = eval(&parse_expr("(-2)^3").unwrap(), &table).unwrap();
        assert_eq!(v, Value::Scalar(-8.0));
    }

    #[test]
    fn series_length_mismatch_is_an_error() {
        let a = [1.0, 2.0];
        let b = [1.0, 2.0, 3.0];
        let mut table = SymbolTable::new();
        table.bind_series("a", &a);
        table.bind_series("b", &b);
        assert!(eval(&parse_expr("a + b").unwrap(), &table).is_err());
    }
}
