//! Error types for Eisen Layout

use thiserror::Error;

/// Errors surfaced by the JSON entry points and the bias learner.
///
/// The normalizer itself never fails: malformed coordinates are clamped.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid layout options: {0}")]
    InvalidOptions(String),

    #[error("No adjustment samples supplied for user {0}")]
    EmptySamples(String),

    #[error("Bias store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
