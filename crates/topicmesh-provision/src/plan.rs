//! Reconciliation plan: classified resources and the ordered operations
//! that converge them

use serde::{Deserialize, Serialize};
use std::fmt;
use topicmesh_admin::{NewTopic, TopicConfigs};
use topicmesh_core::{AccessBinding, SchemaFormat};

/// Managed resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Topic,
    Grant,
    Schema,
}

/// Desired vs observed state of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// Desired but absent on the cluster
    Missing,
    /// Present on both sides with differing attributes
    Divergent,
    Matching,
    /// Present on the cluster, no longer desired
    Orphaned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: ResourceKind,
    pub resource: String,
    pub state: ResourceState,
}

impl Classification {
    pub fn new(kind: ResourceKind, resource: impl Into<String>, state: ResourceState) -> Self {
        Self {
            kind,
            resource: resource.into(),
            state,
        }
    }
}

/// Operation kind; declaration order is execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    RegisterSchema,
    CreateTopic,
    UpdateTopicConfig,
    Grant,
    Revoke,
    DeleteTopic,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::RegisterSchema => "register-schema",
            OperationKind::CreateTopic => "create-topic",
            OperationKind::UpdateTopicConfig => "update-topic-config",
            OperationKind::Grant => "grant",
            OperationKind::Revoke => "revoke",
            OperationKind::DeleteTopic => "delete-topic",
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(self, OperationKind::Revoke | OperationKind::DeleteTopic)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cluster mutation, with everything needed to run or print it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Operation {
    RegisterSchema {
        subject: String,
        format: SchemaFormat,
        schema: String,
    },
    CreateTopic(NewTopic),
    /// Set only the listed keys; other topic configs are left alone
    UpdateTopicConfig { topic: String, configs: TopicConfigs },
    Grant(AccessBinding),
    Revoke(AccessBinding),
    DeleteTopic { topic: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::RegisterSchema { .. } => OperationKind::RegisterSchema,
            Operation::CreateTopic(_) => OperationKind::CreateTopic,
            Operation::UpdateTopicConfig { .. } => OperationKind::UpdateTopicConfig,
            Operation::Grant(_) => OperationKind::Grant,
            Operation::Revoke(_) => OperationKind::Revoke,
            Operation::DeleteTopic { .. } => OperationKind::DeleteTopic,
        }
    }

    /// Name of the resource the operation acts on
    pub fn target(&self) -> String {
        match self {
            Operation::RegisterSchema { subject, .. } => subject.clone(),
            Operation::CreateTopic(topic) => topic.name.clone(),
            Operation::UpdateTopicConfig { topic, .. } | Operation::DeleteTopic { topic } => {
                topic.clone()
            }
            Operation::Grant(binding) | Operation::Revoke(binding) => binding.to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::RegisterSchema {
                subject, format, ..
            } => write!(f, "{} {subject} ({format})", self.kind()),
            Operation::CreateTopic(topic) => write!(
                f,
                "{} {} (partitions={}, replication={})",
                self.kind(),
                topic.name,
                topic.partitions,
                topic.replication_factor
            ),
            Operation::UpdateTopicConfig { topic, configs } => {
                let pairs: Vec<String> = configs.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{} {topic} ({})", self.kind(), pairs.join(", "))
            }
            _ => write!(f, "{} {}", self.kind(), self.target()),
        }
    }
}

/// Ordered operations plus the classification they were derived from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    operations: Vec<Operation>,
    classifications: Vec<Classification>,
}

impl ReconciliationPlan {
    /// Sort `operations` into stage order, then by target within a stage
    pub fn new(mut operations: Vec<Operation>, classifications: Vec<Classification>) -> Self {
        operations.sort_by_cached_key(|op| (op.kind(), op.target()));
        Self {
            operations,
            classifications,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn classifications(&self) -> &[Classification] {
        &self.classifications
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }

    /// Classifications in `state`
    pub fn in_state(&self, state: ResourceState) -> impl Iterator<Item = &Classification> {
        self.classifications
            .iter()
            .filter(move |c| c.state == state)
    }

    /// Operations grouped by kind, in execution order
    pub fn stages(&self) -> Vec<(OperationKind, &[Operation])> {
        let mut stages = Vec::new();
        let mut start = 0;
        while start < self.operations.len() {
            let kind = self.operations[start].kind();
            let end = self.operations[start..]
                .iter()
                .position(|op| op.kind() != kind)
                .map_or(self.operations.len(), |offset| start + offset);
            stages.push((kind, &self.operations[start..end]));
            start = end;
        }
        stages
    }

    pub(crate) fn into_parts(self) -> (Vec<Operation>, Vec<Classification>) {
        (self.operations, self.classifications)
    }
}

impl fmt::Display for ReconciliationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operations.is_empty() {
            return writeln!(f, "no changes");
        }
        for operation in &self.operations {
            writeln!(f, "{operation}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicmesh_core::{DomainId, Principal};

    fn create(name: &str) -> Operation {
        Operation::CreateTopic(NewTopic {
            name: name.to_string(),
            partitions: 3,
            replication_factor: 1,
            configs: TopicConfigs::new(),
        })
    }

    #[test]
    fn test_plan_is_ordered_by_stage() {
        let domain = DomainId::parse("acme.sales").unwrap();
        let principal = Principal::Domain(domain);
        let plan = ReconciliationPlan::new(
            vec![
                Operation::DeleteTopic {
                    topic: "acme.sales.old".to_string(),
                },
                Operation::Grant(AccessBinding::read(principal.clone(), "acme.sales.b")),
                create("acme.sales.b"),
                Operation::Revoke(AccessBinding::write(principal, "acme.sales.old")),
                create("acme.sales.a"),
                Operation::RegisterSchema {
                    subject: "acme.sales.a-value".to_string(),
                    format: SchemaFormat::Avro,
                    schema: "{}".to_string(),
                },
            ],
            Vec::new(),
        );

        let kinds: Vec<OperationKind> = plan.operations().iter().map(Operation::kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::RegisterSchema,
                OperationKind::CreateTopic,
                OperationKind::CreateTopic,
                OperationKind::Grant,
                OperationKind::Revoke,
                OperationKind::DeleteTopic,
            ]
        );
        assert_eq!(plan.operations()[1].target(), "acme.sales.a");

        let stages = plan.stages();
        assert_eq!(stages.len(), 5);
        assert_eq!(stages[1].0, OperationKind::CreateTopic);
        assert_eq!(stages[1].1.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            create("acme.sales.orders").to_string(),
            "create-topic acme.sales.orders (partitions=3, replication=1)"
        );
        let update = Operation::UpdateTopicConfig {
            topic: "acme.sales.orders".to_string(),
            configs: TopicConfigs::from([("retention.ms".to_string(), "1000".to_string())]),
        };
        assert_eq!(
            update.to_string(),
            "update-topic-config acme.sales.orders (retention.ms=1000)"
        );
        assert_eq!(ReconciliationPlan::default().to_string(), "no changes\n");
    }

    #[test]
    fn test_destructive_kinds() {
        assert!(OperationKind::DeleteTopic.is_destructive());
        assert!(OperationKind::Revoke.is_destructive());
        assert!(!OperationKind::UpdateTopicConfig.is_destructive());
    }
}
