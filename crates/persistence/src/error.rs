//! Error types for the persistence layer.
//!
//! Storage errors are split between backend failures (connections, schema,
//! queries) and rule errors (records that cannot be stored as given).

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Rule validation errors
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },
}

/// Errors about the content of a rule.
#[derive(Error, Debug)]
pub enum RuleError {
    /// A rule must name a user.
    #[error("rule has an empty user id")]
    EmptyUserId,

    /// A rule must name a field.
    #[error("rule for user {user_id} has an empty field name")]
    EmptyField { user_id: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = StorageError::from(BackendError::ConnectionFailed {
            backend_name: "sqlite".to_string(),
            message: "disk full".to_string(),
        });
        assert_eq!(err.to_string(), "connection failed to sqlite: disk full");
    }

    #[test]
    fn test_rule_error_display() {
        let err = StorageError::from(RuleError::EmptyField {
            user_id: "9".to_string(),
        });
        assert!(err.to_string().contains("user 9"));
    }
}
