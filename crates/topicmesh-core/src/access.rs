//! Access bindings derived from a resolved domain model

use crate::domain::{DomainId, Namespace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path segment marking a channel readable by every principal
pub const PUBLIC_SEGMENT: &str = "_public";

/// Who a binding applies to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Principal {
    /// Principal authenticated as the given domain
    Domain(DomainId),
    /// Wildcard principal
    Anyone,
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Domain(domain) => write!(f, "User:{domain}"),
            Principal::Anyone => write!(f, "User:*"),
        }
    }
}

/// Which topics a binding covers
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum ResourcePattern {
    Literal(String),
    Prefixed(String),
}

impl ResourcePattern {
    pub fn name(&self) -> &str {
        match self {
            ResourcePattern::Literal(name) | ResourcePattern::Prefixed(name) => name,
        }
    }

    /// Whether this pattern covers the given topic
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            ResourcePattern::Literal(name) => name == topic,
            ResourcePattern::Prefixed(prefix) => topic.starts_with(prefix.as_str()),
        }
    }

    /// Whether the pattern's resource lies inside `namespace`
    pub fn within(&self, namespace: &Namespace) -> bool {
        match self {
            ResourcePattern::Literal(name) => namespace.contains(name),
            ResourcePattern::Prefixed(prefix) => namespace.contains_prefix(prefix),
        }
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePattern::Literal(name) => write!(f, "topic:{name}"),
            ResourcePattern::Prefixed(prefix) => write!(f, "topic:{prefix}*"),
        }
    }
}

/// Operation granted by a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclOperation {
    Read,
    Write,
    Describe,
}

impl AclOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AclOperation::Read => "READ",
            AclOperation::Write => "WRITE",
            AclOperation::Describe => "DESCRIBE",
        }
    }
}

impl fmt::Display for AclOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allow-rule granting `principal` an operation on topics matching `pattern`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessBinding {
    pub principal: Principal,
    pub pattern: ResourcePattern,
    pub operation: AclOperation,
}

impl AccessBinding {
    pub fn new(principal: Principal, pattern: ResourcePattern, operation: AclOperation) -> Self {
        Self {
            principal,
            pattern,
            operation,
        }
    }

    /// Full rights for `domain` over its own namespace
    pub fn owner_rights(domain: &DomainId) -> [AccessBinding; 3] {
        let pattern = ResourcePattern::Prefixed(domain.namespace_prefix());
        let principal = Principal::Domain(domain.clone());
        [AclOperation::Read, AclOperation::Write, AclOperation::Describe].map(|operation| {
            AccessBinding::new(principal.clone(), pattern.clone(), operation)
        })
    }

    /// Full rights for `domain` over a single topic. Used instead of the
    /// prefixed form when nested domains share the namespace prefix.
    pub fn topic_owner_rights(domain: &DomainId, topic: &str) -> [AccessBinding; 3] {
        let pattern = ResourcePattern::Literal(topic.to_string());
        let principal = Principal::Domain(domain.clone());
        [AclOperation::Read, AclOperation::Write, AclOperation::Describe].map(|operation| {
            AccessBinding::new(principal.clone(), pattern.clone(), operation)
        })
    }

    pub fn read(principal: Principal, topic: impl Into<String>) -> Self {
        Self::new(
            principal,
            ResourcePattern::Literal(topic.into()),
            AclOperation::Read,
        )
    }

    pub fn write(principal: Principal, topic: impl Into<String>) -> Self {
        Self::new(
            principal,
            ResourcePattern::Literal(topic.into()),
            AclOperation::Write,
        )
    }

    pub fn within(&self, namespace: &Namespace) -> bool {
        self.pattern.within(namespace)
    }
}

impl fmt::Display for AccessBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.principal, self.operation, self.pattern)
    }
}

/// Whether a canonical topic carries the public visibility segment
pub fn is_public(topic: &str) -> bool {
    topic.split('.').any(|segment| segment == PUBLIC_SEGMENT)
}
