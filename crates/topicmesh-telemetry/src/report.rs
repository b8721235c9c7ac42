//! Telemetry report types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use topicmesh_admin::BrokerId;

/// On-disk bytes per (partition, broker) replica of one topic
pub type StorageBreakdown = BTreeMap<(u32, BrokerId), u64>;

/// Storage and offset totals for one topic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicUsage {
    /// Bytes across every replica of every partition
    #[serde(rename = "storage")]
    pub storage_bytes: u64,
    /// Sum of partition end offsets
    #[serde(rename = "offset-total")]
    pub offset_total: i64,
}

/// Committed progress of one active consumer group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOffsets {
    pub group_id: String,
    pub offset_total: i64,
    /// Number of matching partitions the total covers
    pub partitions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub topics: BTreeMap<String, TopicUsage>,
    /// Ordered by group id
    pub groups: Vec<GroupOffsets>,
}

impl TelemetryReport {
    pub fn total_storage_bytes(&self) -> u64 {
        self.topics.values().map(|usage| usage.storage_bytes).sum()
    }
}
