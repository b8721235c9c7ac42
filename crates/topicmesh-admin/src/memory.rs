//! In-memory cluster for testing and development
//!
//! Tracks topics with replica placement, per-replica log bytes, end offsets,
//! ACL bindings and consumer-group offsets. Faults (outage, per-operation
//! rejection, latency) can be injected to exercise error paths.

use crate::admin::{
    BrokerId, ClusterAdmin, ConsumerGroupListing, GroupState, LogDirDescription, NewTopic,
    PartitionDescription, ReplicaLogInfo, TopicConfigs, TopicDescription, TopicPartition,
};
use crate::error::{AdminError, AdminResult};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use topicmesh_core::AccessBinding;

/// Wildcard target for [`MemoryCluster::fail_operation`]
pub const ANY_TARGET: &str = "*";

#[derive(Default)]
struct ClusterState {
    topics: BTreeMap<String, TopicState>,
    acls: BTreeSet<AccessBinding>,
    groups: BTreeMap<String, GroupEntry>,
}

struct TopicState {
    partitions: Vec<PartitionState>,
    configs: TopicConfigs,
}

struct PartitionState {
    replicas: Vec<BrokerId>,
    end_offset: i64,
    replica_bytes: BTreeMap<BrokerId, u64>,
}

struct GroupEntry {
    state: GroupState,
    offsets: BTreeMap<TopicPartition, i64>,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    /// (operation, target) -> rejection reason
    failing: BTreeMap<(String, String), String>,
    latency: Option<Duration>,
}

/// In-memory [`ClusterAdmin`]
pub struct MemoryCluster {
    brokers: Vec<BrokerId>,
    state: RwLock<ClusterState>,
    faults: Mutex<Faults>,
    calls: AtomicU64,
    mutations: AtomicU64,
}

impl MemoryCluster {
    /// Cluster with brokers `1..=broker_count`
    pub fn new(broker_count: u32) -> Self {
        Self {
            brokers: (1..=broker_count as BrokerId).collect(),
            state: RwLock::new(ClusterState::default()),
            faults: Mutex::new(Faults::default()),
            calls: AtomicU64::new(0),
            mutations: AtomicU64::new(0),
        }
    }

    pub fn brokers(&self) -> &[BrokerId] {
        &self.brokers
    }

    /// Make every subsequent call fail with a transport error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unavailable = unavailable;
    }

    /// Reject `operation` on `target` (or on every target with [`ANY_TARGET`])
    pub fn fail_operation(&self, operation: &str, target: &str, reason: &str) {
        self.faults.lock().failing.insert(
            (operation.to_string(), target.to_string()),
            reason.to_string(),
        );
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.faults.lock().latency = Some(latency);
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// Number of admin calls received, including failed ones
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of mutating calls that changed state
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn topic_names(&self) -> Vec<String> {
        self.state.read().topics.keys().cloned().collect()
    }

    pub fn topic_configs(&self, topic: &str) -> Option<TopicConfigs> {
        self.state.read().topics.get(topic).map(|t| t.configs.clone())
    }

    pub fn acls(&self) -> Vec<AccessBinding> {
        self.state.read().acls.iter().cloned().collect()
    }

    /// Append one record, choosing the partition from the key hash.
    ///
    /// Every replica of the chosen partition grows by `value_bytes`.
    /// Returns the partition and the offset assigned to the record.
    pub fn produce(&self, topic: &str, key: &[u8], value_bytes: u64) -> AdminResult<(u32, i64)> {
        let mut state = self.state.write();
        let topic_state = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| AdminError::UnknownTopic(topic.to_string()))?;

        if topic_state.partitions.is_empty() {
            return Err(AdminError::Rejected(format!("topic {topic} has no partitions")));
        }

        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % topic_state.partitions.len() as u64) as usize;

        let partition = &mut topic_state.partitions[index];
        let offset = partition.end_offset;
        partition.end_offset += 1;
        for broker in partition.replicas.clone() {
            *partition.replica_bytes.entry(broker).or_insert(0) += value_bytes;
        }

        Ok((index as u32, offset))
    }

    /// Overwrite the on-disk size of one partition replica
    pub fn set_replica_bytes(
        &self,
        topic: &str,
        partition: u32,
        broker: BrokerId,
        bytes: u64,
    ) -> AdminResult<()> {
        let mut state = self.state.write();
        let partition_state = state
            .topics
            .get_mut(topic)
            .and_then(|t| t.partitions.get_mut(partition as usize))
            .ok_or_else(|| AdminError::UnknownTopic(format!("{topic}-{partition}")))?;

        if !partition_state.replicas.contains(&broker) {
            return Err(AdminError::Rejected(format!(
                "broker {broker} holds no replica of {topic}-{partition}"
            )));
        }
        partition_state.replica_bytes.insert(broker, bytes);
        Ok(())
    }

    /// Record a committed offset for `group`, creating it as `Stable`
    pub fn commit_offset(&self, group_id: &str, partition: TopicPartition, offset: i64) {
        let mut state = self.state.write();
        state
            .groups
            .entry(group_id.to_string())
            .or_insert_with(|| GroupEntry {
                state: GroupState::Stable,
                offsets: BTreeMap::new(),
            })
            .offsets
            .insert(partition, offset);
    }

    pub fn set_group_state(&self, group_id: &str, group_state: GroupState) {
        if let Some(group) = self.state.write().groups.get_mut(group_id) {
            group.state = group_state;
        }
    }

    /// Count the call, apply latency, then any injected fault
    async fn enter(&self, operation: &str, target: &str) -> AdminResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.faults.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let faults = self.faults.lock();
        if faults.unavailable {
            return Err(AdminError::Transport(format!(
                "{operation}: cluster unreachable"
            )));
        }
        for key in [
            (operation.to_string(), target.to_string()),
            (operation.to_string(), ANY_TARGET.to_string()),
        ] {
            if let Some(reason) = faults.failing.get(&key) {
                return Err(AdminError::Rejected(reason.clone()));
            }
        }
        Ok(())
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl ClusterAdmin for MemoryCluster {
    async fn list_topics(&self) -> AdminResult<Vec<String>> {
        self.enter("list_topics", ANY_TARGET).await?;
        Ok(self.topic_names())
    }

    async fn describe_topics(&self, names: &[String]) -> AdminResult<Vec<TopicDescription>> {
        self.enter("describe_topics", ANY_TARGET).await?;
        let state = self.state.read();

        names
            .iter()
            .map(|name| {
                let topic = state
                    .topics
                    .get(name)
                    .ok_or_else(|| AdminError::UnknownTopic(name.clone()))?;
                Ok(TopicDescription {
                    name: name.clone(),
                    partitions: topic
                        .partitions
                        .iter()
                        .enumerate()
                        .map(|(index, p)| PartitionDescription {
                            partition: index as u32,
                            leader: p.replicas.first().copied(),
                            replicas: p.replicas.clone(),
                        })
                        .collect(),
                })
            })
            .collect()
    }

    async fn describe_configs(
        &self,
        names: &[String],
    ) -> AdminResult<BTreeMap<String, TopicConfigs>> {
        self.enter("describe_configs", ANY_TARGET).await?;
        let state = self.state.read();

        names
            .iter()
            .map(|name| {
                state
                    .topics
                    .get(name)
                    .map(|t| (name.clone(), t.configs.clone()))
                    .ok_or_else(|| AdminError::UnknownTopic(name.clone()))
            })
            .collect()
    }

    async fn create_topic(&self, topic: &NewTopic) -> AdminResult<()> {
        self.enter("create_topic", &topic.name).await?;

        let replication = topic.replication_factor as usize;
        if replication == 0 || replication > self.brokers.len() {
            return Err(AdminError::Rejected(format!(
                "replication factor {} invalid for {} brokers",
                topic.replication_factor,
                self.brokers.len()
            )));
        }

        let mut state = self.state.write();
        if state.topics.contains_key(&topic.name) {
            return Err(AdminError::TopicAlreadyExists(topic.name.clone()));
        }

        let partitions = (0..topic.partitions as usize)
            .map(|p| PartitionState {
                replicas: (0..replication)
                    .map(|r| self.brokers[(p + r) % self.brokers.len()])
                    .collect(),
                end_offset: 0,
                replica_bytes: BTreeMap::new(),
            })
            .collect();

        state.topics.insert(
            topic.name.clone(),
            TopicState {
                partitions,
                configs: topic.configs.clone(),
            },
        );
        self.mutated();
        Ok(())
    }

    async fn alter_configs(&self, topic: &str, configs: &TopicConfigs) -> AdminResult<()> {
        self.enter("alter_configs", topic).await?;
        let mut state = self.state.write();
        let topic_state = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| AdminError::UnknownTopic(topic.to_string()))?;
        topic_state
            .configs
            .extend(configs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.mutated();
        Ok(())
    }

    async fn delete_topic(&self, topic: &str) -> AdminResult<()> {
        self.enter("delete_topic", topic).await?;
        let mut state = self.state.write();
        state
            .topics
            .remove(topic)
            .ok_or_else(|| AdminError::UnknownTopic(topic.to_string()))?;
        for group in state.groups.values_mut() {
            group.offsets.retain(|tp, _| tp.topic != topic);
        }
        self.mutated();
        Ok(())
    }

    async fn describe_acls(&self) -> AdminResult<Vec<AccessBinding>> {
        self.enter("describe_acls", ANY_TARGET).await?;
        Ok(self.acls())
    }

    async fn create_acl(&self, binding: &AccessBinding) -> AdminResult<()> {
        self.enter("create_acl", &binding.principal.to_string())
            .await?;
        if self.state.write().acls.insert(binding.clone()) {
            self.mutated();
        }
        Ok(())
    }

    async fn delete_acl(&self, binding: &AccessBinding) -> AdminResult<()> {
        self.enter("delete_acl", &binding.principal.to_string())
            .await?;
        if self.state.write().acls.remove(binding) {
            self.mutated();
        }
        Ok(())
    }

    async fn describe_log_dirs(&self, broker: BrokerId) -> AdminResult<Vec<LogDirDescription>> {
        self.enter("describe_log_dirs", &broker.to_string()).await?;
        if !self.brokers.contains(&broker) {
            return Err(AdminError::Rejected(format!("unknown broker {broker}")));
        }

        let state = self.state.read();
        let replicas = state
            .topics
            .iter()
            .flat_map(|(name, topic)| {
                topic
                    .partitions
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.replicas.contains(&broker))
                    .map(move |(index, p)| ReplicaLogInfo {
                        topic: name.clone(),
                        partition: index as u32,
                        size_bytes: p.replica_bytes.get(&broker).copied().unwrap_or(0),
                    })
            })
            .collect();

        Ok(vec![LogDirDescription {
            path: format!("/var/lib/broker-{broker}/data"),
            replicas,
        }])
    }

    async fn list_end_offsets(
        &self,
        partitions: &[TopicPartition],
    ) -> AdminResult<BTreeMap<TopicPartition, i64>> {
        self.enter("list_end_offsets", ANY_TARGET).await?;
        let state = self.state.read();

        partitions
            .iter()
            .map(|tp| {
                state
                    .topics
                    .get(&tp.topic)
                    .and_then(|t| t.partitions.get(tp.partition as usize))
                    .map(|p| (tp.clone(), p.end_offset))
                    .ok_or_else(|| AdminError::UnknownTopic(tp.to_string()))
            })
            .collect()
    }

    async fn list_consumer_groups(&self) -> AdminResult<Vec<ConsumerGroupListing>> {
        self.enter("list_consumer_groups", ANY_TARGET).await?;
        Ok(self
            .state
            .read()
            .groups
            .iter()
            .map(|(id, group)| ConsumerGroupListing {
                group_id: id.clone(),
                state: group.state,
            })
            .collect())
    }

    async fn list_group_offsets(
        &self,
        group_id: &str,
    ) -> AdminResult<BTreeMap<TopicPartition, i64>> {
        self.enter("list_group_offsets", group_id).await?;
        Ok(self
            .state
            .read()
            .groups
            .get(group_id)
            .map(|g| g.offsets.clone())
            .unwrap_or_default())
    }
}
