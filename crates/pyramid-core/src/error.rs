use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the pyramid-score crates.
#[derive(Error, Debug)]
pub enum PyramidError {
    /// A required column is missing from the input records.
    #[error("Data error: {0}")]
    Data(String),

    /// A surviving value could not be converted to the type its column needs.
    #[error("Cannot coerce {field} value {value}: {reason}")]
    Coercion {
        field: String,
        value: String,
        reason: String,
    },

    /// The input is empty or too small for the requested computation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A customer or segment lookup found nothing in scope.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The classifier or its feature scaler failed to fit.
    #[error("Model error: {0}")]
    Model(String),

    /// A prediction was requested before the model was fitted.
    #[error("Model has not been trained; call train() before predicting")]
    NotTrained,

    /// A ledger or config file could not be opened.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `.json` ledger is not valid JSON.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The schema or config lacks a column the operation needs.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure while streaming an already-open ledger.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything else, wrapped from `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PyramidError {
    /// Build a [`PyramidError::Coercion`] for `field` holding `value`.
    pub fn coercion(
        field: impl Into<String>,
        value: &serde_json::Value,
        reason: impl Into<String>,
    ) -> Self {
        PyramidError::Coercion {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the pyramid crates.
pub type Result<T> = std::result::Result<T, PyramidError>;
