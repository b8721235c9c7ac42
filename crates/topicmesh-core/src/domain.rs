//! Domain identifiers and the catalog of known domain roots

use crate::error::NamingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// URN scheme accepted on document ids (`urn:simple:streetlights`)
const URN_SCHEME: &str = "urn:";

/// Hierarchical, dot-delimited tenant identifier (e.g. `simple.streetlights`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainId(String);

impl DomainId {
    /// Parse a domain id, accepting both dotted and URN forms
    pub fn parse(raw: &str) -> Result<Self, NamingError> {
        let trimmed = raw.trim();
        let dotted = match trimmed.strip_prefix(URN_SCHEME) {
            Some(rest) => rest.replace(':', "."),
            None => trimmed.to_string(),
        };

        let invalid = |reason: &str| NamingError::InvalidDomainId {
            id: raw.to_string(),
            reason: reason.to_string(),
        };

        if dotted.is_empty() {
            return Err(invalid("empty"));
        }
        for segment in dotted.split('.') {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(invalid("segments may only contain [A-Za-z0-9_-]"));
            }
        }

        Ok(Self(dotted))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every topic this domain owns (`<id>.`)
    pub fn namespace_prefix(&self) -> String {
        format!("{}.", self.0)
    }

    /// Whether `name` is this domain's id or lies inside its namespace
    pub fn owns(&self, name: &str) -> bool {
        name == self.0
            || name
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DomainId {
    type Error = NamingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DomainId> for String {
    fn from(id: DomainId) -> Self {
        id.0
    }
}

/// Set of domain roots an absolute channel reference may point into
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainCatalog {
    roots: BTreeSet<DomainId>,
}

impl DomainCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog containing only the given domain
    pub fn for_domain(domain: &DomainId) -> Self {
        let mut catalog = Self::new();
        catalog.insert(domain.clone());
        catalog
    }

    pub fn with_domain(mut self, domain: DomainId) -> Self {
        self.insert(domain);
        self
    }

    pub fn insert(&mut self, domain: DomainId) -> bool {
        self.roots.insert(domain)
    }

    pub fn contains(&self, domain: &DomainId) -> bool {
        self.roots.contains(domain)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainId> {
        self.roots.iter()
    }

    /// Longest known root that owns `name`
    pub fn root_of(&self, name: &str) -> Option<&DomainId> {
        self.roots
            .iter()
            .filter(|root| root.owns(name))
            .max_by_key(|root| root.as_str().len())
    }

    /// `domain`'s namespace with every known root nested under it carved out
    pub fn namespace_of(&self, domain: &DomainId) -> Namespace {
        self.roots
            .iter()
            .fold(Namespace::new(domain.clone()), |namespace, root| {
                namespace.with_nested(root.clone())
            })
    }
}

/// Names a domain may treat as its own: everything under its prefix except
/// what belongs to a nested domain (`london.hammersmith.transport` inside
/// `london`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    domain: DomainId,
    nested: BTreeSet<DomainId>,
}

impl Namespace {
    pub fn new(domain: DomainId) -> Self {
        Self {
            domain,
            nested: BTreeSet::new(),
        }
    }

    /// Carve `nested` out of the namespace. Roots outside it are ignored.
    pub fn with_nested(mut self, nested: DomainId) -> Self {
        if nested != self.domain && self.domain.owns(nested.as_str()) {
            self.nested.insert(nested);
        }
        self
    }

    pub fn domain(&self) -> &DomainId {
        &self.domain
    }

    pub fn nested(&self) -> impl Iterator<Item = &DomainId> {
        self.nested.iter()
    }

    pub fn has_nested(&self) -> bool {
        !self.nested.is_empty()
    }

    /// Whether `name` belongs to this domain and to none of the nested ones
    pub fn contains(&self, name: &str) -> bool {
        self.domain.owns(name) && !self.nested.iter().any(|nested| nested.owns(name))
    }

    /// Whether a topic prefix selects only names inside the namespace
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        prefix.starts_with(&self.domain.namespace_prefix())
            && !self
                .nested
                .iter()
                .any(|nested| prefix.starts_with(&nested.namespace_prefix()))
    }
}

impl From<DomainId> for Namespace {
    fn from(domain: DomainId) -> Self {
        Self::new(domain)
    }
}

impl FromIterator<DomainId> for DomainCatalog {
    fn from_iter<T: IntoIterator<Item = DomainId>>(iter: T) -> Self {
        Self {
            roots: iter.into_iter().collect(),
        }
    }
}
