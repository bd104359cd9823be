//! Error types for resource validation

use thiserror::Error;

/// Errors that can occur when validating or converting resources
#[derive(Debug, Error)]
pub enum CrdError {
    /// Invalid MAC address format
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    /// Invalid IP address format
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Invalid field value
    #[error("invalid value for field '{field}': {message}")]
    InvalidFieldValue { field: String, message: String },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, CrdError>;
