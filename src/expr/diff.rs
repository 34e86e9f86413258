//! Structural transformations: substitution, differentiation, simplification.

use std::collections::HashMap;

use crate::expr::ast::{Expr, Func};

fn num(v: f64) -> Expr {
    Expr::Num(v)
}

fn add(a: Expr, b: Expr) -> Expr {
    Expr::Add(Box::new(a), Box::new(b))
}

fn sub(a: Expr, b: Expr) -> Expr {
    Expr::Sub(Box::new(a), Box::new(b))
}

fn mul(a: Expr, b: Expr) -> Expr {
    Expr::Mul(Box::new(a), Box::new(b))
}

fn div(a: Expr, b: Expr) -> Expr {
    Expr::Div(Box::new(a), Box::new(b))
}

fn pow(a: Expr, b: Expr) -> Expr {
    Expr::Pow(Box::new(a), Box::new(b))
}

fn call(f: Func, a: Expr) -> Expr {
    Expr::Call(f, Box::new(a))
}

/// Replace symbols by expressions. Symbols absent from `with` are kept.
pub fn substitute(expr: &Expr, with: &HashMap<&str, Expr>) -> Expr {
    let rec = |e: &Expr| Box::new(substitute(e, with));
    match expr {
        Expr::Num(v) => Expr::Num(*v),
        Expr::Sym(s) => with.get(s.as_str()).cloned().unwrap_or_else(|| expr.clone()),
        Expr::Neg(a) => Expr::Neg(rec(a)),
        Expr::Add(a, b) => Expr::Add(rec(a), rec(b)),
        Expr::Sub(a, b) => Expr::Sub(rec(a), rec(b)),
        Expr::Mul(a, b) => Expr::Mul(rec(a), rec(b)),
        Expr::Div(a, b) => Expr::Div(rec(a), rec(b)),
        Expr::Pow(a, b) => Expr::Pow(rec(a), rec(b)),
        Expr::Call(f, a) => Expr::Call(*f, rec(a)),
    }
}

/// Set every symbol in `names` to the literal 0 and simplify.
pub fn zero_out(expr: &Expr, names: &[String]) -> Expr {
    let with: HashMap<&str, Expr> = names.iter().map(|n| (n.as_str(), num(0.0))).collect();
    simplify(&substitute(expr, &with))
}

/// Partial derivative of `expr` with respect to `var`, simplified.
pub fn derivative(expr: &Expr, var: &str) -> Expr {
    simplify(&raw_derivative(expr, var))
}

fn raw_derivative(expr: &Expr, var: &str) -> Expr {
    // Subtrees that do not mention `var` contribute nothing.
    if !expr.contains(var) {
        return num(0.0);
    }
    let d = |e: &Expr| raw_derivative(e, var);

    match expr {
        Expr::Num(_) => num(0.0),
        Expr::Sym(s) => num(if s == var { 1.0 } else { 0.0 }),
        Expr::Neg(a) => Expr::Neg(Box::new(d(a))),
        Expr::Add(a, b) => add(d(a), d(b)),
        Expr::Sub(a, b) => sub(d(a), d(b)),
        Expr::Mul(a, b) => add(mul(d(a), (**b).clone()), mul((**a).clone(), d(b))),
        Expr::Div(a, b) => div(
            sub(mul(d(a), (**b).clone()), mul((**a).clone(), d(b))),
            pow((**b).clone(), num(2.0)),
        ),
        Expr::Pow(a, b) => {
            let (a, b) = (&**a, &**b);
            if !b.contains(var) {
                // d(a^c) = c * a^(c-1) * a'
                mul(
                    mul(b.clone(), pow(a.clone(), sub(b.clone(), num(1.0)))),
                    d(a),
                )
            } else if !a.contains(var) {
                // d(c^b) = c^b * ln(c) * b'
                mul(mul(expr.clone(), call(Func::Log, a.clone())), d(b))
            } else {
                // d(a^b) = a^b * (b' ln(a) + b a'/a)
                mul(
                    expr.clone(),
                    add(
                        mul(d(b), call(Func::Log, a.clone())),
                        div(mul(b.clone(), d(a)), a.clone()),
                    ),
                )
            }
        }
        Expr::Call(f, a) => {
            let a = &**a;
            let outer = match f {
                Func::Exp => call(Func::Exp, a.clone()),
                Func::Log => div(num(1.0), a.clone()),
                Func::Sqrt => div(num(0.5), call(Func::Sqrt, a.clone())),
                Func::Sin => call(Func::Cos, a.clone()),
                Func::Cos => Expr::Neg(Box::new(call(Func::Sin, a.clone()))),
                Func::Tan => div(num(1.0), pow(call(Func::Cos, a.clone()), num(2.0))),
                Func::Abs => div(a.clone(), call(Func::Abs, a.clone())),
            };
            mul(outer, d(a))
        }
    }
}

/// Bottom-up constant folding and identity elimination.
///
/// `0 * x` folds to `0` regardless of `x`; evaluation of the folded tree may
/// therefore differ from the raw tree where `x` is non-finite.
pub fn simplify(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Sym(_) => expr.clone(),
        Expr::Neg(a) => match simplify(a) {
            Expr::Num(v) => num(-v),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        },
        Expr::Add(a, b) => match (simplify(a), simplify(b)) {
            (Expr::Num(x), Expr::Num(y)) => num(x + y),
            (Expr::Num(z), e) | (e, Expr::Num(z)) if z == 0.0 => e,
            (x, Expr::Neg(y)) => sub(x, *y),
            (x, y) => add(x, y),
        },
        Expr::Sub(a, b) => match (simplify(a), simplify(b)) {
            (Expr::Num(x), Expr::Num(y)) => num(x - y),
            (e, Expr::Num(z)) if z == 0.0 => e,
            (Expr::Num(z), e) if z == 0.0 => simplify(&Expr::Neg(Box::new(e))),
            (x, Expr::Neg(y)) => add(x, *y),
            (x, y) => sub(x, y),
        },
        Expr::Mul(a, b) => match (simplify(a), simplify(b)) {
            (Expr::Num(x), Expr::Num(y)) => num(x * y),
            (Expr::Num(z), _) | (_, Expr::Num(z)) if z == 0.0 => num(0.0),
            (Expr::Num(o), e) | (e, Expr::Num(o)) if o == 1.0 => e,
            (Expr::Num(m), e) | (e, Expr::Num(m)) if m == -1.0 => {
                simplify(&Expr::Neg(Box::new(e)))
            }
            (Expr::Neg(x), Expr::Neg(y)) => mul(*x, *y),
            (Expr::Neg(x), y) | (y, Expr::Neg(x)) => {
                simplify(&Expr::Neg(Box::new(mul(*x, y))))
            }
            (x, y) => mul(x, y),
        },
        Expr::Div(a, b) => match (simplify(a), simplify(b)) {
            (Expr::Num(x), Expr::Num(y)) if y != 0.0 => num(x / y),
            (Expr::Num(z), _) if z == 0.0 => num(0.0),
            (e, Expr::Num(o)) if o == 1.0 => e,
            (x, y) => div(x, y),
        },
        Expr::Pow(a, b) => match (simplify(a), simplify(b)) {
            (Expr::Num(x), Expr::Num(y)) => num(x.powf(y)),
            (_, Expr::Num(z)) if z == 0.0 => num(1.0),
            (e, Expr::Num(o)) if o == 1.0 => e,
            (x, y) => pow(x, y),
        },
        Expr::Call(f, a) => match simplify(a) {
            Expr::Num(v) => num(f.apply(v)),
            other => call(*f, other),
        },
    }
}
