//! Error types for abtest-stats
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// abtest-stats error types
#[derive(Error, Debug)]
pub enum Error {
    /// Statistical design parameters out of range
    #[error("Invalid test design: {0}")]
    InvalidDesign(String),

    /// Dataset does not have the shape an A/B comparison needs
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// Rate outside [0, 1] or combined variance not positive (strict variance policy only)
    #[error(
        "Degenerate variance for {metric}: control rate {control_rate}, treatment rate {treatment_rate}\n\
         Strict testing needs both rates in [0, 1] and a positive combined variance"
    )]
    DegenerateVariance {
        /// Metric being tested (`cr` or `ctr`)
        metric: String,
        /// Control arm rate
        control_rate: f64,
        /// Treatment arm rate
        treatment_rate: f64,
    },

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
