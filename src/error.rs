//! Error types for cluster lifecycle management
//!
//! Provides structured error types for the aggregate store, the lifecycle
//! manager, inventory derivation, and the REST surface.

use crate::domain::ports::RecordKind;
use thiserror::Error;

/// Unified error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Record already exists: {kind}/{name}")]
    Conflict { kind: RecordKind, name: String },

    #[error("Record not found: {kind}/{id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Store failure: {0}")]
    Store(String),

    // =========================================================================
    // Ownership Errors
    // =========================================================================
    #[error("Host {host} is already assigned to cluster {cluster}")]
    HostOwned { host: String, cluster: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a missing record
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable code for this error
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Internal(_) => "internal_error",
            Error::Configuration(_) => "configuration_error",
            Error::Validation(_) => "validation_failed",
            Error::Conflict { .. } => "conflict",
            Error::NotFound { .. } => "not_found",
            Error::Store(_) => "store_failure",
            Error::HostOwned { .. } => "host_owned",
            Error::JsonParse(_) | Error::YamlParse(_) => "parse_error",
            Error::Io(_) => "io_error",
        }
    }

    /// Check if the caller may retry the failed operation unchanged
    ///
    /// The lifecycle manager never retries on its own.
    pub fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Io(_))
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = Error::Conflict {
            kind: RecordKind::Cluster,
            name: "prod".into(),
        };
        assert_eq!(err.kind(), "conflict");
        assert_eq!(err.to_string(), "Record already exists: cluster/prod");

        let err = Error::not_found(RecordKind::Host, "h-1");
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "Record not found: host/h-1");
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::Store("connection reset".into());
        assert!(transient.is_retryable());
        assert!(transient.is_transient());

        let conflict = Error::Conflict {
            kind: RecordKind::Cluster,
            name: "prod".into(),
        };
        assert!(!conflict.is_retryable());

        let owned = Error::HostOwned {
            host: "h-1".into(),
            cluster: "c-1".into(),
        };
        assert!(!owned.is_transient());
    }
}
