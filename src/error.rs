//! Error types for the SOM training engine.

use thiserror::Error;

/// The main error type for SOM operations.
#[derive(Error, Debug)]
pub enum SomError {
    /// Invalid or unsupported configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operand dimensions do not line up.
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Operation that detected the mismatch.
        context: &'static str,
        /// The expected size.
        expected: usize,
        /// The size that was supplied.
        found: usize,
    },

    /// Empty or otherwise unusable input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error raised while training a map.
    #[error("Training error: {0}")]
    Training(String),

    /// Error while loading or parsing a data set.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid model file.
    #[error("Invalid model format: {0}")]
    InvalidModelFormat(String),

    /// Failure while drawing a plot.
    #[error("Rendering error: {0}")]
    Render(String),
}

/// Result type alias for SOM operations.
pub type Result<T> = std::result::Result<T, SomError>;

impl From<bincode::Error> for SomError {
    fn from(err: bincode::Error) -> Self {
        SomError::Serialization(err.to_string())
    }
}

impl SomError {
    /// Returns true for errors raised by configuration validation.
    pub fn is_config(&self) -> bool {
        matches!(self, SomError::Config(_))
    }
}
