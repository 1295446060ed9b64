//! Storage error types.
//!
//! One taxonomy for every backend: transport failures are wrapped into [`StorageError::Backend`]
//! at the backend boundary, never leaked as driver-specific errors.

use thiserror::Error;

/// Errors that can occur when using FSM storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connectivity, protocol or driver failure.
    #[error("Backend error: {0}")]
    Backend(String),
    /// The record does not exist or has expired.
    #[error("State not found: {0}")]
    StateNotFound(String),
    /// Malformed caller input: empty key or state, non-mapping data, oversized data.
    #[error("State validation failed: {0}")]
    StateValidation(String),
    /// Persisted data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn not_found(key: &str) -> Self {
        StorageError::StateNotFound(format!("State with key '{}' not found", key))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StorageError::StateValidation(msg.into())
    }

    pub fn backend(msg: impl std::fmt::Display) -> Self {
        StorageError::Backend(msg.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::StateNotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StorageError::StateValidation(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
