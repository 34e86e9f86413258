//! Error types.
//!
//! - `FitError` is returned by the library (expression handling, smoothing,
//!   integral matching).
//! - `AppError` is the binary-level error: a message plus the process exit code.

use thiserror::Error;

/// Exit code for unreadable/invalid inputs and configuration.
pub const EXIT_INPUT: u8 = 2;
/// Exit code for model definition problems (parse errors, non-linear parameters).
pub const EXIT_MODEL: u8 = 3;
/// Exit code when no observation set produced an estimate.
pub const EXIT_FIT: u8 = 4;
/// Exit code for programming-contract violations (inconsistent cache).
pub const EXIT_CONTRACT: u8 = 5;

/// Failure of a single integral-matching call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot parse equation for '{variable}': {message}")]
    Parse { variable: String, message: String },

    #[error("unknown symbol '{0}' (not a variable, parameter, time or fixed value)")]
    UnknownSymbol(String),

    #[error("equation for '{variable}' is not linear in parameter '{parameter}'")]
    NotLinear { variable: String, parameter: String },

    #[error("length mismatch: expected {expected}, got {found} ({context})")]
    ShapeMismatch {
        expected: usize,
        found: usize,
        context: String,
    },

    #[error("smoothing failed for '{variable}': {message}")]
    Smoothing { variable: String, message: String },

    #[error("singular system: {0}")]
    SingularSystem(String),

    #[error("bounded least squares failed: {0}")]
    LeastSquares(String),

    #[error("inconsistent cache: {0}")]
    InconsistentCache(String),
}

impl FitError {
    /// True when the error is caller misuse rather than a property of the data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, FitError::InconsistentCache(_))
    }

    /// True for numerical failures that mean "no estimate for this data set".
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            FitError::Smoothing { .. } | FitError::SingularSystem(_) | FitError::LeastSquares(_)
        )
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match &err {
            FitError::InconsistentCache(_) => EXIT_CONTRACT,
            FitError::Parse { .. } | FitError::NotLinear { .. } | FitError::UnknownSymbol(_) => {
                EXIT_MODEL
            }
            FitError::InvalidInput(_) | FitError::ShapeMismatch { .. } => EXIT_INPUT,
            FitError::Smoothing { .. } | FitError::SingularSystem(_) | FitError::LeastSquares(_) => {
                EXIT_FIT
            }
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
