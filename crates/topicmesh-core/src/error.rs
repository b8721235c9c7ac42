//! Error types shared by every topicmesh crate

use std::path::PathBuf;
use thiserror::Error;

/// Why a channel could not be turned into a unique canonical topic name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// Two channels resolve to the same cluster topic
    #[error("channels '{first}' and '{second}' both resolve to topic '{topic}'")]
    Collision {
        topic: String,
        first: String,
        second: String,
    },

    /// A rooted channel name does not belong to any known domain
    #[error("channel '{channel}' is absolute but matches no known domain root")]
    UnknownDomainRoot { channel: String },

    /// The channel already carries the owning domain's prefix
    #[error("channel '{channel}' is already qualified with domain '{domain}'")]
    AlreadyQualified { channel: String, domain: String },

    /// Empty name or empty path segment
    #[error("invalid channel name '{channel}': {reason}")]
    InvalidChannelName { channel: String, reason: String },

    /// Malformed domain identifier
    #[error("invalid domain id '{id}': {reason}")]
    InvalidDomainId { id: String, reason: String },
}

/// Errors surfaced by topicmesh operations
#[derive(Error, Debug)]
pub enum Error {
    /// The input document is missing or unreadable
    #[error("spec resource not found: {}", path.display())]
    SpecResourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input document was readable but is not a valid spec
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// Canonicalization produced an ambiguous or illegal topic name
    #[error("naming collision: {0}")]
    NamingCollision(#[from] NamingError),

    /// Transport or query failure against the cluster or schema registry
    #[error("cluster unavailable during {operation} on '{resource}': {reason}")]
    ClusterUnavailable {
        operation: String,
        resource: String,
        reason: String,
    },

    /// A telemetry query named a topic the cluster does not have
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    /// Some plan operations failed while others were applied
    #[error("{} of {total} operations failed: {}", failures.len(), failures.join("; "))]
    PartialReconciliationFailure { total: usize, failures: Vec<String> },
}

/// Result type for topicmesh operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a `ClusterUnavailable` error with operation and resource context
    pub fn unavailable(
        operation: impl Into<String>,
        resource: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Error::ClusterUnavailable {
            operation: operation.into(),
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a later attempt with the same input may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ClusterUnavailable { .. } | Error::PartialReconciliationFailure { .. }
        )
    }

    /// Whether the error was raised before any cluster call could be made
    pub fn is_spec_error(&self) -> bool {
        matches!(
            self,
            Error::SpecResourceNotFound { .. } | Error::InvalidSpec(_) | Error::NamingCollision(_)
        )
    }
}
