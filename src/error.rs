// Error types for table loading and configuration

use thiserror::Error;

/// Failures while loading raw input tables. The pipeline itself never fails;
/// these only come from the I/O edge.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read data file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV input has no header row")]
    MissingHeader,
    #[error("Input data must be a JSON array of objects")]
    NotAnArray,
    #[error("Item {index} in array is not an object")]
    NotAnObject { index: usize },
    #[error("Unsupported value type for field '{field}'")]
    UnsupportedValue { field: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Bandwidth factor must be a positive finite number, got {value}")]
    InvalidBandwidth { value: f64 },
    #[error("Minimum sample size must be at least 1")]
    ZeroSampleSize,
    #[error("Year window {min}..={max} must use four-digit years")]
    InvalidWindow { min: i32, max: i32 },
}
