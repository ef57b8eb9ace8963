//! Error types for store operations
//!
//! This module defines the error kinds surfaced by the privilege store.
//! Everything except `StoreUnavailable` is an expected, recoverable outcome
//! that callers receive verbatim.

use thiserror::Error;
use warden_model::ModelError;

use crate::config::ConfigError;

/// Privilege store error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The role (or other named object) already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The role, group or privilege does not exist
    #[error("No such object: {0}")]
    NoSuchObject(String),

    /// The grantor holds no privilege allowing the grant or revoke
    #[error("Grant denied: {0}")]
    GrantDenied(String),

    /// A required field is missing or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The resource path cannot be represented for the component
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The backing store could not open or commit the transaction
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Check if the error is an expected outcome the caller can act on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StoreError::StoreUnavailable(_))
    }

    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, StoreError::StoreUnavailable(_))
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::AlreadyExists(_) => "ALREADY_EXISTS",
            StoreError::NoSuchObject(_) => "NO_SUCH_OBJECT",
            StoreError::GrantDenied(_) => "GRANT_DENIED",
            StoreError::InvalidInput(_) => "INVALID_INPUT",
            StoreError::Unsupported(_) => "UNSUPPORTED",
            StoreError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl From<ModelError> for StoreError {
    fn from(err: ModelError) -> Self {
        if err.is_unsupported_resource() {
            StoreError::Unsupported(err.to_string())
        } else {
            StoreError::InvalidInput(err.to_string())
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(err: ConfigError) -> Self {
        StoreError::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_mapping() {
        let err: StoreError = ModelError::TooDeep(5).into();
        assert!(matches!(err, StoreError::Unsupported(_)));

        let err: StoreError = ModelError::InvalidHierarchy {
            component: "solr".to_string(),
            types: "Partition".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "UNSUPPORTED");

        let err: StoreError = ModelError::UnknownComponent("sqoop".to_string()).into();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err: StoreError = ModelError::MissingField("service").into();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err: StoreError = ModelError::InvalidResourceName("Collection".to_string()).into();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn test_recoverable() {
        assert!(StoreError::NoSuchObject("r1".to_string()).is_recoverable());
        assert!(StoreError::GrantDenied("u1".to_string()).is_recoverable());
        assert!(!StoreError::StoreUnavailable("timeout".to_string()).is_recoverable());
        assert!(StoreError::StoreUnavailable("timeout".to_string()).is_server_error());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            StoreError::AlreadyExists("role r1".to_string()).to_string(),
            "Already exists: role r1"
        );
    }
}
