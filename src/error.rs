//! Error types for splitwatch
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::definition::LoadError;

/// All error types that can occur while loading or driving a run
#[derive(Debug, Error)]
pub enum SplitError {
    /// Processor definition could not be generated
    #[error("Definition error: {0}")]
    Definition(#[from] LoadError),

    /// Route file is missing, malformed or fails validation
    #[error("Route error: {0}")]
    Route(String),

    /// Frame source is gone or a region lies outside the frame
    #[error("Capture error: {0}")]
    Capture(String),

    /// Timer client could not be reached
    #[error("Timer error: {0}")]
    Timer(String),

    /// Perception model rejected its input
    #[error("Model error: {0}")]
    Model(String),

    /// Settings are inconsistent
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl SplitError {
    /// Capture failures are the only category that stops the main loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, SplitError::Capture(_))
    }
}

/// Result type alias for splitwatch operations
pub type Result<T> = std::result::Result<T, SplitError>;
