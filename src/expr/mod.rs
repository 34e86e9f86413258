//! Right-hand-side expressions.
//!
//! Equations are parsed once into an [`Expr`] tree. Everything the fitter needs
//! is a structural operation on that tree:
//!
//! - parameter substitution (free term = RHS with every linear parameter set to 0)
//! - symbolic differentiation with respect to one parameter (sensitivities)
//! - vectorised evaluation against an explicit [`SymbolTable`]

pub mod ast;
pub mod diff;
pub mod eval;
pub mod parse;

pub use ast::*;
pub use diff::*;
pub use eval::*;
pub use parse::*;
