//! Telemetry aggregator
//!
//! Every call fans out to per-broker or per-group sub-queries, each bounded
//! by the configured operation timeout, and joins the answers. There is no
//! partial result: any failed sub-query fails the call.

use crate::report::{GroupOffsets, StorageBreakdown, TelemetryReport, TopicUsage};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, BTreeSet};
use topicmesh_admin::{AdminConfig, AdminError, BrokerId, SharedAdmin, TopicDescription};
use topicmesh_core::{Error, Result};
use tracing::{debug, instrument};

/// Computes storage and offset figures from cluster queries
#[derive(Clone)]
pub struct TelemetryAggregator {
    admin: SharedAdmin,
    config: AdminConfig,
}

impl TelemetryAggregator {
    pub fn new(admin: SharedAdmin, config: AdminConfig) -> Self {
        Self { admin, config }
    }

    fn concurrency(&self) -> usize {
        self.config.max_in_flight.max(1)
    }

    async fn describe(&self, topic: &str) -> Result<TopicDescription> {
        let names = [topic.to_string()];
        let described = self
            .config
            .bounded("describe_topics", self.admin.describe_topics(&names))
            .await
            .map_err(|e| match e {
                AdminError::UnknownTopic(_) => Error::TopicNotFound(topic.to_string()),
                other => other.unavailable("describe_topics", topic),
            })?;

        described
            .into_iter()
            .next()
            .ok_or_else(|| Error::TopicNotFound(topic.to_string()))
    }

    /// Bytes held by each partition replica of `topic`, as reported by the
    /// log directories of the brokers hosting it
    #[instrument(skip(self))]
    pub async fn storage_breakdown(&self, topic: &str) -> Result<StorageBreakdown> {
        let description = self.describe(topic).await?;

        let mut breakdown: StorageBreakdown = description
            .partitions
            .iter()
            .flat_map(|p| p.replicas.iter().map(move |broker| ((p.partition, *broker), 0)))
            .collect();

        let brokers: BTreeSet<BrokerId> = breakdown.keys().map(|(_, broker)| *broker).collect();

        let per_broker: Vec<(BrokerId, Vec<(u32, u64)>)> = stream::iter(brokers)
            .map(|broker| async move {
                let dirs = self
                    .config
                    .bounded("describe_log_dirs", self.admin.describe_log_dirs(broker))
                    .await
                    .map_err(|e| e.unavailable("describe_log_dirs", &format!("broker {broker}")))?;

                let sizes: Vec<(u32, u64)> = dirs
                    .into_iter()
                    .flat_map(|dir| dir.replicas)
                    .filter(|replica| replica.topic == topic)
                    .map(|replica| (replica.partition, replica.size_bytes))
                    .collect();
                Ok::<_, Error>((broker, sizes))
            })
            .buffer_unordered(self.concurrency())
            .try_collect()
            .await?;

        for (broker, sizes) in per_broker {
            for (partition, bytes) in sizes {
                // only replicas in the current assignment count
                if let Some(total) = breakdown.get_mut(&(partition, broker)) {
                    *total += bytes;
                }
            }
        }

        debug!(topic = %topic, replicas = breakdown.len(), "Collected storage breakdown");
        Ok(breakdown)
    }

    /// Raw storage footprint of `topic`, replication included
    pub async fn storage_bytes(&self, topic: &str) -> Result<u64> {
        Ok(self.storage_breakdown(topic).await?.values().sum())
    }

    /// Sum of the end offsets of every partition of `topic`
    #[instrument(skip(self))]
    pub async fn total_offset(&self, topic: &str) -> Result<i64> {
        let description = self.describe(topic).await?;
        let partitions = description.topic_partitions();
        if partitions.is_empty() {
            return Ok(0);
        }

        let offsets = self
            .config
            .bounded("list_end_offsets", self.admin.list_end_offsets(&partitions))
            .await
            .map_err(|e| match e {
                AdminError::UnknownTopic(_) => Error::TopicNotFound(topic.to_string()),
                other => other.unavailable("list_end_offsets", topic),
            })?;

        Ok(offsets.values().sum())
    }

    pub async fn topic_usage(&self, topic: &str) -> Result<TopicUsage> {
        let (storage_bytes, offset_total) =
            tokio::try_join!(self.storage_bytes(topic), self.total_offset(topic))?;
        Ok(TopicUsage {
            storage_bytes,
            offset_total,
        })
    }

    /// Committed-offset totals of every active consumer group with
    /// partitions on topics starting with `topic_prefix`, ordered by group id
    #[instrument(skip(self))]
    pub async fn group_offsets(&self, topic_prefix: &str) -> Result<Vec<GroupOffsets>> {
        let listings = self
            .config
            .bounded("list_consumer_groups", self.admin.list_consumer_groups())
            .await
            .map_err(|e| e.unavailable("list_consumer_groups", "cluster"))?;

        let active: Vec<String> = listings
            .into_iter()
            .filter(|listing| listing.state.is_active())
            .map(|listing| listing.group_id)
            .collect();

        let mut groups: Vec<GroupOffsets> = stream::iter(active)
            .map(|group_id| async move {
                let committed = self
                    .config
                    .bounded("list_group_offsets", self.admin.list_group_offsets(&group_id))
                    .await
                    .map_err(|e| e.unavailable("list_group_offsets", &group_id))?;

                let matching: Vec<i64> = committed
                    .iter()
                    .filter(|(tp, _)| tp.topic.starts_with(topic_prefix))
                    .map(|(_, offset)| *offset)
                    .collect();

                Ok::<_, Error>((!matching.is_empty()).then(|| GroupOffsets {
                    group_id,
                    offset_total: matching.iter().sum(),
                    partitions: matching.len(),
                }))
            })
            .buffer_unordered(self.concurrency())
            .try_filter_map(|group| async move { Ok(group) })
            .try_collect()
            .await?;

        groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(groups)
    }

    /// Usage of every topic in `topics` plus group progress under `group_prefix`
    pub async fn report(&self, topics: &[String], group_prefix: &str) -> Result<TelemetryReport> {
        let usage = async {
            stream::iter(topics)
                .map(|topic| async move {
                    let usage = self.topic_usage(topic).await?;
                    Ok::<_, Error>((topic.clone(), usage))
                })
                .buffer_unordered(self.concurrency())
                .try_collect::<BTreeMap<String, TopicUsage>>()
                .await
        };

        let (topics, groups) = tokio::try_join!(usage, self.group_offsets(group_prefix))?;
        Ok(TelemetryReport { topics, groups })
    }
}
