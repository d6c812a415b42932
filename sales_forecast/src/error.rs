//! Error types for the sales_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the sales_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A required input column is missing or malformed. Fatal for the whole run.
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Insufficient or degenerate data for one entity
    #[error("Fit error: {0}")]
    FitError(String),

    /// Regressor frames and date indexes do not line up
    #[error("Alignment error: {0}")]
    AlignmentError(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from mathematical operations
    #[error("Math error: {0}")]
    MathError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error reading or writing CSV tables
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error writing JSON reports
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error loading configuration
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

impl ForecastError {
    /// Short label used in failure summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::SchemaError(_) => "schema",
            ForecastError::FitError(_) => "fit",
            ForecastError::AlignmentError(_) => "alignment",
            ForecastError::DataError(_) => "data",
            ForecastError::InvalidParameter(_) => "invalid_parameter",
            ForecastError::MathError(_) => "math",
            ForecastError::IoError(_) => "io",
            ForecastError::CsvError(_) => "csv",
            ForecastError::JsonError(_) => "json",
            ForecastError::ConfigError(_) => "config",
            ForecastError::PolarsError(_) => "polars",
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<figment::Error> for ForecastError {
    fn from(err: figment::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}
