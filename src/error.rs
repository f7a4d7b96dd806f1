//! Error types shared by every model in the crate.
//!
//! Input problems are rejected before any numerical work starts. Integration
//! failures are fatal for the simulation call that hit them. A promoter fit
//! that does not converge is not an error; the fitter returns `Ok(None)`.

use thiserror::Error;

/// Errors raised by the library
#[derive(Error, Debug)]
pub enum GlufireError {
    /// Too few distinct data points for a reliable fit
    #[error("insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Malformed grid, mismatched lengths, non-finite values or invalid parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The ODE solver could not reach the end of the horizon
    #[error("integration failed at t = {t:.4}: {message}")]
    Integration { t: f64, message: String },

    /// A named calibration entry was requested but is not present
    #[error("missing parameter set: {0}")]
    MissingParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, GlufireError>;

impl GlufireError {
    /// Shorthand for [`GlufireError::InvalidInput`]
    pub fn invalid(message: impl Into<String>) -> Self {
        GlufireError::InvalidInput(message.into())
    }

    /// Shorthand for [`GlufireError::Integration`]
    pub fn integration(t: f64, message: impl Into<String>) -> Self {
        GlufireError::Integration {
            t,
            message: message.into(),
        }
    }
}
