//! Errors raised by cluster and schema-registry connections

use thiserror::Error;
use topicmesh_core::Error as CoreError;

/// Errors from a [`ClusterAdmin`](crate::ClusterAdmin) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete in time
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The named topic does not exist
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Create was issued for an existing topic
    #[error("topic already exists: {0}")]
    TopicAlreadyExists(String),

    /// The broker refused the request (authorization, policy, invalid argument)
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Result type for cluster admin calls
pub type AdminResult<T> = std::result::Result<T, AdminError>;

impl AdminError {
    /// Whether the error says the resource is absent rather than unreachable
    pub fn is_absent(&self) -> bool {
        matches!(self, AdminError::UnknownTopic(_))
    }

    /// Lift into the shared error type as `ClusterUnavailable`
    pub fn unavailable(self, operation: &str, resource: &str) -> CoreError {
        CoreError::unavailable(operation, resource, self)
    }
}

/// Errors from a [`SchemaRegistryClient`](crate::SchemaRegistryClient)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("registry error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("subject not found: {0}")]
    SubjectNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for schema registry calls
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    pub fn unavailable(self, operation: &str, subject: &str) -> CoreError {
        CoreError::unavailable(operation, subject, self)
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RegistryError::Serialization(err.to_string())
        } else {
            RegistryError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unknown_topic_is_absence() {
        assert!(AdminError::UnknownTopic("t".to_string()).is_absent());
        assert!(!AdminError::Transport("reset".to_string()).is_absent());
        assert!(!AdminError::Timeout("slow".to_string()).is_absent());
    }

    #[test]
    fn test_unavailable_keeps_context() {
        let err = AdminError::Transport("broken pipe".to_string())
            .unavailable("list_topics", "cluster");
        assert!(matches!(err, CoreError::ClusterUnavailable { .. }));
        assert!(err.to_string().contains("broken pipe"));
        assert!(err.to_string().contains("list_topics"));
    }
}
