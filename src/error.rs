// src/error.rs

use thiserror::Error;

/// Failures while turning a feature row into a score.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Nothing numeric survived preprocessing (or no rows were supplied).
    #[error("no numeric features after preprocessing; check inputs")]
    EmptyFeatureSet,

    #[error("model `{model}` is not fitted; retrain and save a fitted model")]
    ModelNotFitted { model: String },

    #[error("model `{model}` exposes neither probability output nor plain prediction")]
    NoScoringCapability { model: String },

    #[error("invalid model name: {0}")]
    UnknownModel(String),

    #[error("model `{model}` failed to score: {reason}")]
    Scoring { model: String, reason: String },
}

impl InferenceError {
    /// Whether the caller sent something unusable (400-class) rather than
    /// the service holding a broken artifact.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InferenceError::EmptyFeatureSet | InferenceError::UnknownModel(_)
        )
    }
}

/// Errors raised by a model's own scoring routine.
#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("model has not been fitted")]
    NotFitted,

    #[error("expected {expected} columns, got {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("{0}")]
    Malformed(String),
}

/// Validation failures on a request payload.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Invalid subcounty: {given}. Must be one of {valid:?}")]
    InvalidSubcounty {
        given: String,
        valid: &'static [&'static str],
    },

    #[error("field `{0}` must be a finite number")]
    NonFinite(&'static str),
}

/// Failures resolving a map prediction against the reference table.
#[derive(Debug, Error, PartialEq)]
pub enum LookupError {
    #[error("Subcounty '{0}' not supported")]
    UnsupportedSubcounty(String),

    #[error("No reference data for subcounty '{0}'")]
    NoReferenceData(String),

    #[error("No yearly data for subcounty '{0}'")]
    NoYearlyData(String),

    #[error("Year {year} not available for subcounty '{subcounty}'")]
    YearUnavailable { year: i32, subcounty: String },
}
