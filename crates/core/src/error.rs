use thiserror::Error;

/// Rejected input. Raised synchronously before any state is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("category must not be empty")]
    EmptyCategory,

    #[error("invalid category '{0}' (use letters, digits, '-' or '_')")]
    InvalidCategory(String),

    #[error("observation value must be finite, got {0}")]
    NonFiniteValue(f64),

    #[error("invalid calendar date '{input}' (expected YYYY-MM-DD)")]
    InvalidDate { input: String },

    #[error("{field} must be finite, got {value}")]
    NonFiniteThreshold { field: &'static str, value: f64 },

    #[error("min threshold {min} exceeds max threshold {max}")]
    ThresholdOrder { min: f64, max: f64 },

    #[error("percent change limit must be > 0, got {0}")]
    NonPositiveChangeLimit(f64),

    #[error("{field} must be > 0, got {value}")]
    NonPositiveFactor { field: &'static str, value: f64 },

    #[error("{field} must be >= 0, got {value}")]
    NegativeRatio { field: &'static str, value: f64 },
}

/// The injected key-value backend failed to read or write.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage backend error on '{key}': {message}")]
    Backend { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Top-level error for the in-process API.
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
