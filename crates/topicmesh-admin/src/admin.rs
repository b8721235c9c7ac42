//! Administrative capability interface to a broker cluster

use crate::error::AdminResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use topicmesh_core::AccessBinding;

/// Broker node identifier
pub type BrokerId = i32;

/// Topic config key → value
pub type TopicConfigs = BTreeMap<String, String>;

/// A single partition of a topic
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Topic to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopic {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u16,
    #[serde(default)]
    pub configs: TopicConfigs,
}

/// Placement of one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescription {
    pub partition: u32,
    pub leader: Option<BrokerId>,
    pub replicas: Vec<BrokerId>,
}

/// Layout of an existing topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescription {
    pub name: String,
    pub partitions: Vec<PartitionDescription>,
}

impl TopicDescription {
    /// Replica count of the first partition (0 for a partitionless topic)
    pub fn replication_factor(&self) -> u16 {
        self.partitions
            .first()
            .map(|p| p.replicas.len() as u16)
            .unwrap_or(0)
    }

    pub fn topic_partitions(&self) -> Vec<TopicPartition> {
        self.partitions
            .iter()
            .map(|p| TopicPartition::new(self.name.clone(), p.partition))
            .collect()
    }
}

/// Bytes a broker holds for one partition replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaLogInfo {
    pub topic: String,
    pub partition: u32,
    pub size_bytes: u64,
}

/// One on-disk log directory of a broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDirDescription {
    pub path: String,
    pub replicas: Vec<ReplicaLogInfo>,
}

/// Consumer group lifecycle state as reported by the group coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupState {
    Stable,
    PreparingRebalance,
    CompletingRebalance,
    Empty,
    Dead,
}

impl GroupState {
    /// Whether the group has live members
    pub fn is_active(&self) -> bool {
        !matches!(self, GroupState::Empty | GroupState::Dead)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerGroupListing {
    pub group_id: String,
    pub state: GroupState,
}

/// Query and mutation operations against one broker cluster.
///
/// Implementations perform no implicit retries. Describing a topic that does
/// not exist must fail with [`AdminError::UnknownTopic`](crate::AdminError::UnknownTopic);
/// any other error means the cluster could not answer.
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Names of every topic on the cluster
    async fn list_topics(&self) -> AdminResult<Vec<String>>;

    /// Partition layout of the named topics
    async fn describe_topics(&self, names: &[String]) -> AdminResult<Vec<TopicDescription>>;

    /// Current configs of the named topics
    async fn describe_configs(&self, names: &[String])
        -> AdminResult<BTreeMap<String, TopicConfigs>>;

    async fn create_topic(&self, topic: &NewTopic) -> AdminResult<()>;

    /// Set (incrementally) the given config keys on a topic
    async fn alter_configs(&self, topic: &str, configs: &TopicConfigs) -> AdminResult<()>;

    async fn delete_topic(&self, topic: &str) -> AdminResult<()>;

    /// Every ACL binding on the cluster
    async fn describe_acls(&self) -> AdminResult<Vec<AccessBinding>>;

    async fn create_acl(&self, binding: &AccessBinding) -> AdminResult<()>;

    async fn delete_acl(&self, binding: &AccessBinding) -> AdminResult<()>;

    /// Log directories of one broker and the replicas stored in them
    async fn describe_log_dirs(&self, broker: BrokerId) -> AdminResult<Vec<LogDirDescription>>;

    /// Current end offset (high-watermark) of each partition
    async fn list_end_offsets(
        &self,
        partitions: &[TopicPartition],
    ) -> AdminResult<BTreeMap<TopicPartition, i64>>;

    async fn list_consumer_groups(&self) -> AdminResult<Vec<ConsumerGroupListing>>;

    /// Committed offsets of one consumer group
    async fn list_group_offsets(&self, group_id: &str)
        -> AdminResult<BTreeMap<TopicPartition, i64>>;
}

/// Shared handle to the process-wide admin connection
pub type SharedAdmin = Arc<dyn ClusterAdmin>;
