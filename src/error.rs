//! Error types for live projections.

use thiserror::Error;

/// Main error type for synchronous projection operations.
///
/// Subscription failures are never returned through this type; they are
/// surfaced as readable state on the projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    ConfigFormat(String),
}

impl From<serde_json::Error> for ProjectionError {
    fn from(e: serde_json::Error) -> Self {
        ProjectionError::ConfigFormat(e.to_string())
    }
}

/// A raw record that could not be turned into a domain record.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Record {record_id} is missing field '{field}'")]
    MissingField { record_id: String, field: String },

    #[error("Record {record_id} field '{field}' is not a {expected}")]
    WrongType {
        record_id: String,
        field: String,
        expected: &'static str,
    },

    #[error("Record {record_id} field '{field}' has no resolvable timestamp")]
    UnresolvedTimestamp { record_id: String, field: String },
}

impl MappingError {
    /// Identifier of the offending record.
    pub fn record_id(&self) -> &str {
        match self {
            MappingError::MissingField { record_id, .. }
            | MappingError::WrongType { record_id, .. }
            | MappingError::UnresolvedTimestamp { record_id, .. } => record_id,
        }
    }
}

/// Failure reported by a remote-procedure proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Cannot encode request for '{method}': {message}")]
    Encode { method: String, message: String },

    #[error("Call to '{method}' rejected: {message}")]
    Rejected { method: String, message: String },

    #[error("Malformed reply from '{method}': {message}")]
    MalformedReply { method: String, message: String },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
