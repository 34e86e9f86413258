//! Expression tree.

use std::collections::BTreeSet;
use std::fmt;

/// Elementary functions understood by the parser, differentiator and evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Abs,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "exp" => Some(Func::Exp),
            "log" | "ln" => Some(Func::Log),
            "sqrt" => Some(Func::Sqrt),
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "tan" => Some(Func::Tan),
            "abs" => Some(Func::Abs),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Sqrt => "sqrt",
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Abs => "abs",
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Exp => x.exp(),
            Func::Log => x.ln(),
            Func::Sqrt => x.sqrt(),
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Abs => x.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Sym(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Sym(name.into())
    }

    /// True if `name` occurs anywhere in the tree.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Sym(s) => s == name,
            Expr::Neg(a) | Expr::Call(_, a) => a.contains(name),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => a.contains(name) || b.contains(name),
        }
    }

    /// All symbol names in the tree.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Neg(a) | Expr::Call(_, a) => a.collect_symbols(out),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Pow(..) => 4,
            Expr::Num(v) if *v < 0.0 => 3,
            Expr::Num(_) | Expr::Sym(_) | Expr::Call(..) => 5,
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, e: &Expr, min_prec: u8) -> fmt::Result {
    if e.precedence() < min_prec {
        write!(f, "({e})")
    } else {
        write!(f, "{e}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(v) => write!(f, "{v}"),
            Expr::Sym(s) => write!(f, "{s}"),
            Expr::Neg(a) => {
                write!(f, "-")?;
                write_operand(f, a, 4)
            }
            Expr::Add(a, b) => {
                write_operand(f, a, 1)?;
                write!(f, " + ")?;
                write_operand(f, b, 2)
            }
            Expr::Sub(a, b) => {
                write_operand(f, a, 1)?;
                write!(f, " - ")?;
                write_operand(f, b, 2)
            }
            Expr::Mul(a, b) => {
                write_operand(f, a, 2)?;
                write!(f, "*")?;
                write_operand(f, b, 3)
            }
            Expr::Div(a, b) => {
                write_operand(f, a, 2)?;
                write!(f, "/")?;
                write_operand(f, b, 4)
            }
            Expr::Pow(a, b) => {
                write_operand(f, a, 5)?;
                write!(f, "^")?;
                write_operand(f, b, 4)
            }
            Expr::Call(func, a) => write!(f, "{}({a})", func.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_collected_once() {
        let e = Expr::Add(
            Box::new(Expr::Mul(Box::new(Expr::sym("k")), Box::new(Expr::sym("x")))),
            Box::new(Expr::Call(Func::Exp, Box::new(Expr::sym("x")))),
        );
        let syms: Vec<String> = e.symbols().into_iter().collect();
        assert_eq!(syms, vec!["k".to_string(), "x".to_string()]);
        assert!(e.contains("k"));
        assert!(!e.contains("kx"));
    }

    #[test]
    fn display_keeps_grouping() {
        let e = Expr::Mul(
            Box::new(Expr::Sub(Box::new(Expr::sym("a")), Box::new(Expr::sym("b")))),
            Box::new(Expr::sym("x")),
        );
        assert_eq!(e.to_string(), "(a - b)*x");
    }
}
