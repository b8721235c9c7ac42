//! Cluster state reader
//!
//! Builds a [`ClusterSnapshot`] of the topics, ACL bindings and schema
//! subjects that fall inside a [`SnapshotScope`]. Every read goes to the
//! cluster; nothing is cached between calls.

use crate::admin::{SharedAdmin, TopicConfigs, TopicDescription};
use crate::config::AdminConfig;
use crate::error::AdminResult;
use crate::registry::{subject_topic, RegisteredSchema, SharedRegistry};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use topicmesh_core::{AccessBinding, DomainId, Error, Namespace, ResourcePattern, Result};

/// Which resources a snapshot covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotScope {
    prefix: Option<String>,
    /// Prefixes of nested domains carved out of `prefix`
    excluded: BTreeSet<String>,
    topics: BTreeSet<String>,
}

impl SnapshotScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything under `domain`'s namespace prefix
    pub fn namespace(domain: &DomainId) -> Self {
        Self {
            prefix: Some(domain.namespace_prefix()),
            ..Self::default()
        }
    }

    /// Everything in `namespace`, nested domains excluded
    pub fn for_namespace(namespace: &Namespace) -> Self {
        Self::namespace(namespace.domain()).excluding(namespace.nested())
    }

    /// Leave the namespaces of `domains` out of the prefix match
    pub fn excluding<'a, I>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = &'a DomainId>,
    {
        self.excluded
            .extend(domains.into_iter().map(DomainId::namespace_prefix));
        self
    }

    /// Add explicitly named topics (e.g. cross-domain references)
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn in_prefix(&self, name: &str) -> bool {
        self.prefix
            .as_deref()
            .is_some_and(|prefix| name.starts_with(prefix))
            && !self.excluded.iter().any(|excluded| name.starts_with(excluded.as_str()))
    }

    pub fn includes(&self, topic: &str) -> bool {
        self.topics.contains(topic) || self.in_prefix(topic)
    }

    /// Whether a binding on `pattern` concerns an in-scope resource.
    ///
    /// Prefixed patterns count only when they sit inside the namespace prefix.
    pub fn includes_pattern(&self, pattern: &ResourcePattern) -> bool {
        match pattern {
            ResourcePattern::Literal(topic) => self.includes(topic),
            ResourcePattern::Prefixed(pattern_prefix) => self.in_prefix(pattern_prefix),
        }
    }
}

/// Layout and config of a topic as it exists on the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTopic {
    pub partitions: u32,
    pub replication_factor: u16,
    pub configs: TopicConfigs,
}

impl ObservedTopic {
    fn from_description(description: &TopicDescription, configs: TopicConfigs) -> Self {
        Self {
            partitions: description.partitions.len() as u32,
            replication_factor: description.replication_factor(),
            configs,
        }
    }
}

/// Actual state of the in-scope resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub topics: BTreeMap<String, ObservedTopic>,
    pub grants: BTreeSet<AccessBinding>,
    /// Subject → latest registered schema
    pub schemas: BTreeMap<String, RegisteredSchema>,
}

impl ClusterSnapshot {
    pub fn topic(&self, name: &str) -> Option<&ObservedTopic> {
        self.topics.get(name)
    }

    pub fn has_grant(&self, binding: &AccessBinding) -> bool {
        self.grants.contains(binding)
    }
}

/// Reads live cluster state through the admin (and optional registry) handles
#[derive(Clone)]
pub struct ClusterStateReader {
    admin: SharedAdmin,
    registry: Option<SharedRegistry>,
    config: AdminConfig,
}

impl ClusterStateReader {
    pub fn new(admin: SharedAdmin, config: AdminConfig) -> Self {
        Self {
            admin,
            registry: None,
            config,
        }
    }

    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn has_registry(&self) -> bool {
        self.registry.is_some()
    }

    /// Snapshot every resource in `scope`.
    ///
    /// Topics that do not exist are simply absent from the result. Any other
    /// failure is `ClusterUnavailable`.
    pub async fn read(&self, scope: &SnapshotScope) -> Result<ClusterSnapshot> {
        let (topics, grants, schemas) = futures::try_join!(
            self.read_topics(scope),
            self.read_grants(scope),
            self.read_schemas(scope),
        )?;

        info!(
            topics = topics.len(),
            grants = grants.len(),
            schemas = schemas.len(),
            "Read cluster snapshot"
        );

        Ok(ClusterSnapshot {
            topics,
            grants,
            schemas,
        })
    }

    async fn read_topics(&self, scope: &SnapshotScope) -> Result<BTreeMap<String, ObservedTopic>> {
        let listed = self
            .config
            .bounded("list_topics", self.admin.list_topics())
            .await
            .map_err(|e| e.unavailable("list_topics", "cluster"))?;

        let in_scope: Vec<String> = listed.into_iter().filter(|t| scope.includes(t)).collect();

        let observed: Vec<(String, Option<ObservedTopic>)> = stream::iter(in_scope)
            .map(|name| async move {
                let topic = self.describe(&name).await?;
                Ok::<_, Error>((name, topic))
            })
            .buffer_unordered(self.config.max_in_flight.max(1))
            .try_collect()
            .await?;

        Ok(observed
            .into_iter()
            .filter_map(|(name, topic)| topic.map(|t| (name, t)))
            .collect())
    }

    async fn describe(&self, name: &str) -> Result<Option<ObservedTopic>> {
        let names = [name.to_string()];
        let (layout, configs) = futures::join!(
            self.config
                .bounded("describe_topics", self.admin.describe_topics(&names)),
            self.config
                .bounded("describe_configs", self.admin.describe_configs(&names)),
        );

        let Some((layout, mut configs)) = join_describe(name, layout, configs)? else {
            return Ok(None);
        };

        Ok(layout.first().map(|description| {
            ObservedTopic::from_description(description, configs.remove(name).unwrap_or_default())
        }))
    }

    async fn read_grants(&self, scope: &SnapshotScope) -> Result<BTreeSet<AccessBinding>> {
        let bindings = self
            .config
            .bounded("describe_acls", self.admin.describe_acls())
            .await
            .map_err(|e| e.unavailable("describe_acls", "cluster"))?;

        Ok(bindings
            .into_iter()
            .filter(|binding| scope.includes_pattern(&binding.pattern))
            .collect())
    }

    async fn read_schemas(&self, scope: &SnapshotScope) -> Result<BTreeMap<String, RegisteredSchema>> {
        let Some(registry) = &self.registry else {
            return Ok(BTreeMap::new());
        };

        let subjects = self
            .config
            .bounded_registry("list_subjects", registry.list_subjects())
            .await
            .map_err(|e| e.unavailable("list_subjects", "schema registry"))?;

        let latest: Vec<Option<RegisteredSchema>> = stream::iter(
            subjects
                .into_iter()
                .filter(|subject| subject_topic(subject).is_some_and(|t| scope.includes(t))),
        )
        .map(|subject| async move {
            self.config
                .bounded_registry("latest_schema", registry.latest(&subject))
                .await
                .map_err(|e| e.unavailable("latest_schema", &subject))
        })
        .buffer_unordered(self.config.max_in_flight.max(1))
        .try_collect()
        .await?;

        Ok(latest
            .into_iter()
            .flatten()
            .map(|schema| (schema.subject.clone(), schema))
            .collect())
    }
}

/// Join the two halves of a topic describe. The topic counts as absent only
/// when every failed half reports absence.
fn join_describe<L, C>(
    name: &str,
    layout: AdminResult<L>,
    configs: AdminResult<C>,
) -> Result<Option<(L, C)>> {
    match (layout, configs) {
        (Ok(layout), Ok(configs)) => Ok(Some((layout, configs))),
        (layout, configs) => {
            let failure = [layout.err(), configs.err()]
                .into_iter()
                .flatten()
                .find(|e| !e.is_absent());
            match failure {
                Some(e) => Err(e.unavailable("describe_topic", name)),
                None => {
                    debug!(topic = %name, "Topic deleted while reading snapshot");
                    Ok(None)
                }
            }
        }
    }
}
