//! Model Layer Error Types

use thiserror::Error;

/// Result type for stock-model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Model layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Unknown warehouse code
    #[error("Unknown warehouse code: {0}")]
    UnknownWarehouse(String),

    /// Document root is not a JSON object
    #[error("Document root must be a JSON object, found {0}")]
    InvalidDocument(String),

    /// Section exists but is not a map of records
    #[error("Section '{0}' is not a map of records")]
    InvalidSection(String),

    /// Assignment policy cannot place stock
    #[error("Invalid assignment policy: {0}")]
    InvalidPolicy(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

// Helper methods
impl ModelError {
    pub fn policy(msg: impl Into<String>) -> Self {
        ModelError::InvalidPolicy(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ModelError::Validation(msg.into())
    }
}
