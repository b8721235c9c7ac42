//! Classification of desired vs observed resources into a plan

use crate::desired::DesiredState;
use crate::plan::{Classification, Operation, ReconciliationPlan, ResourceKind, ResourceState};
use topicmesh_admin::{subject_topic, ClusterSnapshot, TopicConfigs};
use topicmesh_core::{AccessBinding, Namespace, Principal};
use tracing::warn;

/// Compare `desired` against `snapshot` for the domain owning `namespace`.
///
/// Orphans are only ever looked for inside the namespace (nested domains
/// excluded), and destructive operations are only planned when
/// `clean_unspecified` is set.
pub fn diff(
    namespace: &Namespace,
    desired: &DesiredState,
    snapshot: &ClusterSnapshot,
    clean_unspecified: bool,
) -> ReconciliationPlan {
    let mut operations = Vec::new();
    let mut classifications = Vec::new();

    diff_topics(
        namespace,
        desired,
        snapshot,
        clean_unspecified,
        &mut operations,
        &mut classifications,
    );
    diff_grants(
        namespace,
        desired,
        snapshot,
        clean_unspecified,
        &mut operations,
        &mut classifications,
    );
    diff_schemas(namespace, desired, snapshot, &mut operations, &mut classifications);

    ReconciliationPlan::new(operations, classifications)
}

fn diff_topics(
    namespace: &Namespace,
    desired: &DesiredState,
    snapshot: &ClusterSnapshot,
    clean_unspecified: bool,
    operations: &mut Vec<Operation>,
    classifications: &mut Vec<Classification>,
) {
    for (name, topic) in &desired.topics {
        let Some(observed) = snapshot.topic(name) else {
            classifications.push(Classification::new(ResourceKind::Topic, name, ResourceState::Missing));
            operations.push(Operation::CreateTopic(topic.clone()));
            continue;
        };

        if observed.partitions != topic.partitions
            || observed.replication_factor != topic.replication_factor
        {
            warn!(
                topic = %name,
                declared_partitions = topic.partitions,
                actual_partitions = observed.partitions,
                declared_replication = topic.replication_factor,
                actual_replication = observed.replication_factor,
                "Topic layout differs from declaration, leaving unchanged"
            );
        }

        let changed: TopicConfigs = topic
            .configs
            .iter()
            .filter(|(key, value)| observed.configs.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if changed.is_empty() {
            classifications.push(Classification::new(ResourceKind::Topic, name, ResourceState::Matching));
        } else {
            classifications.push(Classification::new(ResourceKind::Topic, name, ResourceState::Divergent));
            operations.push(Operation::UpdateTopicConfig {
                topic: name.clone(),
                configs: changed,
            });
        }
    }

    for name in snapshot.topics.keys() {
        if namespace.contains(name) && !desired.topics.contains_key(name) {
            classifications.push(Classification::new(ResourceKind::Topic, name, ResourceState::Orphaned));
            if clean_unspecified {
                operations.push(Operation::DeleteTopic { topic: name.clone() });
            }
        }
    }
}

/// Grants the domain may revoke: inside its namespace and held by itself or
/// the wildcard principal. Grants other domains hold on owned topics are
/// never revoked here.
fn revocable(namespace: &Namespace, binding: &AccessBinding) -> bool {
    binding.within(namespace)
        && match &binding.principal {
            Principal::Domain(holder) => holder == namespace.domain(),
            Principal::Anyone => true,
        }
}

fn diff_grants(
    namespace: &Namespace,
    desired: &DesiredState,
    snapshot: &ClusterSnapshot,
    clean_unspecified: bool,
    operations: &mut Vec<Operation>,
    classifications: &mut Vec<Classification>,
) {
    for binding in &desired.grants {
        let state = if snapshot.has_grant(binding) {
            ResourceState::Matching
        } else {
            operations.push(Operation::Grant(binding.clone()));
            ResourceState::Missing
        };
        classifications.push(Classification::new(ResourceKind::Grant, binding.to_string(), state));
    }

    for binding in &snapshot.grants {
        if !desired.grants.contains(binding) && revocable(namespace, binding) {
            classifications.push(Classification::new(
                ResourceKind::Grant,
                binding.to_string(),
                ResourceState::Orphaned,
            ));
            if clean_unspecified {
                operations.push(Operation::Revoke(binding.clone()));
            }
        }
    }
}

fn diff_schemas(
    namespace: &Namespace,
    desired: &DesiredState,
    snapshot: &ClusterSnapshot,
    operations: &mut Vec<Operation>,
    classifications: &mut Vec<Classification>,
) {
    for (subject, schema) in &desired.schemas {
        let state = match snapshot.schemas.get(subject) {
            None => ResourceState::Missing,
            Some(latest)
                if latest.format == schema.format
                    && latest.schema.trim() == schema.schema.trim() =>
            {
                ResourceState::Matching
            }
            Some(_) => ResourceState::Divergent,
        };

        if state != ResourceState::Matching {
            operations.push(Operation::RegisterSchema {
                subject: subject.clone(),
                format: schema.format,
                schema: schema.schema.clone(),
            });
        }
        classifications.push(Classification::new(ResourceKind::Schema, subject, state));
    }

    // registry subjects are reported but never deleted
    for subject in snapshot.schemas.keys() {
        let owned = subject_topic(subject).is_some_and(|topic| namespace.contains(topic));
        if owned && !desired.schemas.contains_key(subject) {
            classifications.push(Classification::new(
                ResourceKind::Schema,
                subject,
                ResourceState::Orphaned,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::DesiredSchema;
    use crate::plan::OperationKind;
    use topicmesh_admin::{NewTopic, ObservedTopic, RegisteredSchema};
    use topicmesh_core::{DomainId, SchemaFormat};

    fn domain() -> DomainId {
        DomainId::parse("acme.sales").unwrap()
    }

    fn namespace() -> Namespace {
        Namespace::new(domain())
    }

    fn configs(pairs: &[(&str, &str)]) -> TopicConfigs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn desired() -> DesiredState {
        let mut desired = DesiredState::default();
        desired.topics.insert(
            "acme.sales.orders".to_string(),
            NewTopic {
                name: "acme.sales.orders".to_string(),
                partitions: 3,
                replication_factor: 1,
                configs: configs(&[("retention.ms", "1000")]),
            },
        );
        desired
            .grants
            .extend(AccessBinding::owner_rights(&domain()));
        desired
    }

    fn observed(partitions: u32, pairs: &[(&str, &str)]) -> ObservedTopic {
        ObservedTopic {
            partitions,
            replication_factor: 1,
            configs: configs(pairs),
        }
    }

    #[test]
    fn test_empty_cluster_needs_everything() {
        let plan = diff(&namespace(), &desired(), &ClusterSnapshot::default(), false);
        assert_eq!(plan.count(OperationKind::CreateTopic), 1);
        assert_eq!(plan.count(OperationKind::Grant), 3);
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_only_declared_config_keys_are_compared() {
        let mut snapshot = ClusterSnapshot::default();
        snapshot.topics.insert(
            "acme.sales.orders".to_string(),
            observed(3, &[("retention.ms", "1000"), ("cleanup.policy", "compact")]),
        );
        snapshot.grants.extend(AccessBinding::owner_rights(&domain()));

        let plan = diff(&namespace(), &desired(), &snapshot, true);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_config_drift_is_divergent() {
        let mut snapshot = ClusterSnapshot::default();
        snapshot.topics.insert(
            "acme.sales.orders".to_string(),
            observed(3, &[("retention.ms", "5000")]),
        );
        snapshot.grants.extend(AccessBinding::owner_rights(&domain()));

        let plan = diff(&namespace(), &desired(), &snapshot, false);
        assert_eq!(
            plan.operations(),
            &[Operation::UpdateTopicConfig {
                topic: "acme.sales.orders".to_string(),
                configs: configs(&[("retention.ms", "1000")]),
            }]
        );
        assert_eq!(plan.in_state(ResourceState::Divergent).count(), 1);
    }

    #[test]
    fn test_partition_drift_is_not_an_operation() {
        let mut snapshot = ClusterSnapshot::default();
        snapshot.topics.insert(
            "acme.sales.orders".to_string(),
            observed(12, &[("retention.ms", "1000")]),
        );
        snapshot.grants.extend(AccessBinding::owner_rights(&domain()));

        assert!(diff(&namespace(), &desired(), &snapshot, false).is_empty());
    }

    #[test]
    fn test_orphans_need_clean_flag() {
        let mut snapshot = ClusterSnapshot::default();
        snapshot
            .topics
            .insert("acme.sales.legacy".to_string(), observed(1, &[]));
        snapshot
            .topics
            .insert("acme.salesforce.leads".to_string(), observed(1, &[]));
        snapshot.grants.insert(AccessBinding::write(
            Principal::Domain(domain()),
            "acme.sales.legacy",
        ));

        let plan = diff(&namespace(), &desired(), &snapshot, false);
        assert_eq!(plan.count(OperationKind::DeleteTopic), 0);
        assert_eq!(plan.count(OperationKind::Revoke), 0);
        assert_eq!(plan.in_state(ResourceState::Orphaned).count(), 2);

        let plan = diff(&namespace(), &desired(), &snapshot, true);
        assert_eq!(plan.count(OperationKind::DeleteTopic), 1);
        assert_eq!(plan.count(OperationKind::Revoke), 1);
        assert_eq!(
            plan.operations().last(),
            Some(&Operation::DeleteTopic {
                topic: "acme.sales.legacy".to_string()
            })
        );
    }

    #[test]
    fn test_foreign_grants_are_never_revoked() {
        let consumer = DomainId::parse("acme.billing").unwrap();
        let mut snapshot = ClusterSnapshot::default();
        snapshot.grants.insert(AccessBinding::read(
            Principal::Domain(consumer),
            "acme.sales.orders",
        ));

        let plan = diff(&namespace(), &desired(), &snapshot, true);
        assert_eq!(plan.count(OperationKind::Revoke), 0);
    }

    #[test]
    fn test_nested_domain_resources_are_not_orphans() {
        let acme = DomainId::parse("acme").unwrap();
        let namespace = Namespace::new(acme).with_nested(domain());

        let mut snapshot = ClusterSnapshot::default();
        snapshot
            .topics
            .insert("acme.sales._public.orders".to_string(), observed(1, &[]));
        snapshot
            .topics
            .insert("acme.hr.legacy".to_string(), observed(1, &[]));
        snapshot.grants.insert(AccessBinding::read(
            Principal::Anyone,
            "acme.sales._public.orders",
        ));
        snapshot.grants.extend(AccessBinding::owner_rights(&domain()));
        snapshot.schemas.insert(
            "acme.sales._public.orders-value".to_string(),
            RegisteredSchema {
                subject: "acme.sales._public.orders-value".to_string(),
                id: 1,
                version: 1,
                format: SchemaFormat::Avro,
                schema: r#"{"type":"string"}"#.to_string(),
            },
        );

        let plan = diff(&namespace, &DesiredState::default(), &snapshot, true);
        assert_eq!(
            plan.operations(),
            &[Operation::DeleteTopic {
                topic: "acme.hr.legacy".to_string()
            }]
        );
        assert!(plan
            .classifications()
            .iter()
            .all(|c| !c.resource.contains("acme.sales")));
    }

    #[test]
    fn test_schema_states() {
        let mut desired = desired();
        desired.schemas.insert(
            "acme.sales.orders-value".to_string(),
            DesiredSchema {
                format: SchemaFormat::Avro,
                schema: r#"{"type":"string"}"#.to_string(),
            },
        );

        let mut snapshot = ClusterSnapshot::default();
        snapshot.schemas.insert(
            "acme.sales.orders-value".to_string(),
            RegisteredSchema {
                subject: "acme.sales.orders-value".to_string(),
                id: 1,
                version: 1,
                format: SchemaFormat::Avro,
                schema: r#"{"type":"string"}"#.to_string(),
            },
        );
        snapshot.schemas.insert(
            "acme.sales.legacy-value".to_string(),
            RegisteredSchema {
                subject: "acme.sales.legacy-value".to_string(),
                id: 2,
                version: 3,
                format: SchemaFormat::Avro,
                schema: r#"{"type":"long"}"#.to_string(),
            },
        );

        let plan = diff(&namespace(), &desired, &snapshot, true);
        assert_eq!(plan.count(OperationKind::RegisterSchema), 0);
        let orphaned: Vec<&str> = plan
            .in_state(ResourceState::Orphaned)
            .filter(|c| c.kind == ResourceKind::Schema)
            .map(|c| c.resource.as_str())
            .collect();
        assert_eq!(orphaned, vec!["acme.sales.legacy-value"]);

        desired
            .schemas
            .get_mut("acme.sales.orders-value")
            .unwrap()
            .schema = r#"{"type":"bytes"}"#.to_string();
        let plan = diff(&namespace(), &desired, &snapshot, false);
        assert_eq!(plan.count(OperationKind::RegisterSchema), 1);
        assert_eq!(plan.operations()[0].kind(), OperationKind::RegisterSchema);
    }
}
