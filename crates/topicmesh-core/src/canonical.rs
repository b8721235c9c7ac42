//! Channel canonicalization
//!
//! Every declared channel name is classified exactly once into a
//! [`ChannelRef`]; callers act on the classification rather than on the raw
//! string.
//!
//! | written as | classification | canonical topic |
//! |------------|----------------|-----------------|
//! | `public/light.measured` | relative | `<domain>.public.light.measured` |
//! | `/london/hammersmith/transport/public/tube` | absolute | `london.hammersmith.transport.public.tube` |
//! | `london.hammersmith.transport.public.tube` | absolute (known foreign root) | unchanged |
//! | `<domain>.public.x` | rejected, already qualified | - |
//! | `/unknown/topic` | rejected, unknown root | - |
//! | `<nested>.x` (known root under `<domain>`) | absolute, owned by the nested root | unchanged |

use crate::domain::{DomainCatalog, DomainId};
use crate::error::NamingError;

const PATH_SEPARATOR: char = '/';
const SEGMENT_SEPARATOR: char = '.';

/// Classification of a declared channel name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// Name inside the owning domain's namespace, without the domain prefix
    Relative(String),
    /// Fully qualified name belonging to `root`
    Absolute { root: DomainId, topic: String },
}

impl ChannelRef {
    /// Canonical cluster topic name for this reference
    pub fn topic(&self, domain: &DomainId) -> String {
        match self {
            ChannelRef::Relative(path) => format!("{domain}{SEGMENT_SEPARATOR}{path}"),
            ChannelRef::Absolute { topic, .. } => topic.clone(),
        }
    }

    /// Domain that owns the resolved topic
    pub fn owner<'a>(&'a self, domain: &'a DomainId) -> &'a DomainId {
        match self {
            ChannelRef::Relative(_) => domain,
            ChannelRef::Absolute { root, .. } => root,
        }
    }

    pub fn is_owned_by(&self, domain: &DomainId) -> bool {
        self.owner(domain) == domain
    }
}

/// Normalize separators and reject empty names or segments
fn normalize(channel: &str) -> Result<(bool, String), NamingError> {
    let invalid = |reason: &str| NamingError::InvalidChannelName {
        channel: channel.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = channel.trim();
    let rooted = trimmed.starts_with(PATH_SEPARATOR);
    let path = trimmed
        .trim_start_matches(PATH_SEPARATOR)
        .replace(PATH_SEPARATOR, ".");

    if path.is_empty() {
        return Err(invalid("empty"));
    }
    if path.split(SEGMENT_SEPARATOR).any(str::is_empty) {
        return Err(invalid("empty path segment"));
    }
    if path.chars().any(char::is_whitespace) {
        return Err(invalid("whitespace"));
    }

    Ok((rooted, path))
}

/// Longest known root owning `name` that is not `domain` itself.
///
/// Inside `domain`'s namespace only a strictly longer (nested) root counts,
/// so an ancestor listed in the catalog never claims the domain's topics.
fn foreign_root<'a>(
    domain: &DomainId,
    catalog: &'a DomainCatalog,
    name: &str,
) -> Option<&'a DomainId> {
    catalog
        .root_of(name)
        .filter(|root| !domain.owns(name) || root.as_str().len() > domain.as_str().len())
}

/// Classify a declared channel name relative to its owning domain
pub fn classify(
    domain: &DomainId,
    catalog: &DomainCatalog,
    channel: &str,
) -> Result<ChannelRef, NamingError> {
    let (rooted, path) = normalize(channel)?;

    if let Some(root) = foreign_root(domain, catalog, &path) {
        return Ok(ChannelRef::Absolute {
            root: root.clone(),
            topic: path,
        });
    }

    if domain.owns(&path) {
        if !rooted {
            return Err(NamingError::AlreadyQualified {
                channel: channel.to_string(),
                domain: domain.to_string(),
            });
        }
        return Ok(ChannelRef::Absolute {
            root: domain.clone(),
            topic: path,
        });
    }

    if rooted {
        return Err(NamingError::UnknownDomainRoot {
            channel: channel.to_string(),
        });
    }

    // a relative name can still land inside a nested domain's namespace
    let topic = format!("{domain}{SEGMENT_SEPARATOR}{path}");
    match foreign_root(domain, catalog, &topic) {
        Some(root) => Ok(ChannelRef::Absolute {
            root: root.clone(),
            topic,
        }),
        None => Ok(ChannelRef::Relative(path)),
    }
}

/// Canonical topic name for `channel` declared by `domain`
pub fn canonicalize(
    domain: &DomainId,
    catalog: &DomainCatalog,
    channel: &str,
) -> Result<String, NamingError> {
    classify(domain, catalog, channel).map(|reference| reference.topic(domain))
}
