//! Recursive-descent parser for equation right-hand sides.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := ('-' | '+') unary | power
//! power  := atom (('^' | '**') unary)?
//! atom   := number | name | name '(' expr ')' | '(' expr ')'
//! ```
//!
//! `^` is right-associative and binds tighter than unary minus, so `-x^2`
//! parses as `-(x^2)`. Names may contain letters, digits, `_` and `.`.

use crate::expr::ast::{Expr, Func};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                out.push(Token::Plus);
                i += 1;
            }
            '-' => {
                out.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    out.push(Token::Caret);
                    i += 2;
                } else {
                    out.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                out.push(Token::Slash);
                i += 1;
            }
            '^' => {
                out.push(Token::Caret);
                i += 1;
            }
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || (c == '.' && next_is_digit(&chars, i)) => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Optional exponent: 1e-3, 2.5E+4
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value: f64 = text
                    .parse()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                out.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                out.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}' at position {i}")),
        }
    }

    Ok(out)
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Token) -> Result<(), String> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(format!("expected {want:?}, found {tok:?}")),
            None => Err(format!("expected {want:?}, found end of input")),
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let inner = self.unary()?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, String> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Num(v)) => Ok(Expr::Num(v)),
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    let func = Func::from_name(&name)
                        .ok_or_else(|| format!("unknown function '{name}'"))?;
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::Call(func, Box::new(arg)))
                } else {
                    Ok(Expr::Sym(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(tok) => Err(format!("unexpected token {tok:?}")),
            None => Err("unexpected end of input".to_string()),
        }
    }
}

/// Parse an equation right-hand side.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("trailing input starting at {tok:?}"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Box<Expr> {
        Box::new(Expr::sym(s))
    }

    #[test]
    fn precedence_and_associativity() {
        let e = parse_expr("a - b - c").unwrap();
        assert_eq!(
            e,
            Expr::Sub(Box::new(Expr::Sub(sym("a"), sym("b"))), sym("c"))
        );

        let e = parse_expr("-x^2").unwrap();
        assert_eq!(e, Expr::Neg(Box::new(Expr::Pow(sym("x"), Box::new(Expr::Num(2.0))))));

        let e = parse_expr("2^3^2").unwrap();
        assert_eq!(
            e,
            Expr::Pow(
                Box::new(Expr::Num(2.0)),
                Box::new(Expr::Pow(Box::new(Expr::Num(3.0)), Box::new(Expr::Num(2.0))))
            )
        );
    }

    #[test]
    fn names_numbers_and_calls() {
        let e = parse_expr("k.1*exp(-x_2) + 1.5e-3").unwrap();
        let syms: Vec<String> = e.symbols().into_iter().collect();
        assert_eq!(syms, vec!["k.1".to_string(), "x_2".to_string()]);
        assert!(e.to_string().contains("exp("));
    }

    #[test]
    fn double_star_is_power() {
        assert_eq!(parse_expr("x**2").unwrap(), parse_expr("x^2").unwrap());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_expr("").is_err());
        assert!(parse_expr("a +").is_err());
        assert!(parse_expr("(a").is_err());
        assert!(parse_expr("foo(x)").is_err());
        assert!(parse_expr("a b").is_err());
        assert!(parse_expr("a # b").is_err());
    }
}
