//! Telemetry aggregation against the in-memory cluster

use std::sync::Arc;
use std::time::Duration;
use topicmesh_admin::{
    AdminConfig, ClusterAdmin, GroupState, MemoryCluster, NewTopic, TopicConfigs, TopicPartition,
    ANY_TARGET,
};
use topicmesh_core::Error;
use topicmesh_telemetry::TelemetryAggregator;

const TOPIC: &str = "simple.streetlights.public.light.measured";

async fn cluster_with_topic(partitions: u32, replication_factor: u16) -> Arc<MemoryCluster> {
    let cluster = Arc::new(MemoryCluster::new(3));
    cluster
        .create_topic(&NewTopic {
            name: TOPIC.to_string(),
            partitions,
            replication_factor,
            configs: TopicConfigs::new(),
        })
        .await
        .unwrap();
    cluster
}

fn aggregator(cluster: &Arc<MemoryCluster>) -> TelemetryAggregator {
    TelemetryAggregator::new(cluster.clone(), AdminConfig::default())
}

#[tokio::test]
async fn test_storage_counts_every_replica() {
    let cluster = cluster_with_topic(10, 2).await;
    let layout = cluster.describe_topics(&[TOPIC.to_string()]).await.unwrap();
    for partition in &layout[0].partitions {
        for broker in &partition.replicas {
            cluster
                .set_replica_bytes(TOPIC, partition.partition, *broker, 56_000)
                .unwrap();
        }
    }

    let telemetry = aggregator(&cluster);
    let breakdown = telemetry.storage_breakdown(TOPIC).await.unwrap();
    assert_eq!(breakdown.len(), 20);
    assert!(breakdown.values().all(|bytes| *bytes == 56_000));
    assert_eq!(telemetry.storage_bytes(TOPIC).await.unwrap(), 1_120_000);
}

#[tokio::test]
async fn test_other_topics_do_not_count() {
    let cluster = cluster_with_topic(2, 1).await;
    cluster
        .create_topic(&NewTopic {
            name: "simple.streetlights.other".to_string(),
            partitions: 2,
            replication_factor: 3,
            configs: TopicConfigs::new(),
        })
        .await
        .unwrap();
    cluster.produce("simple.streetlights.other", b"k", 4_096).unwrap();
    cluster.produce(TOPIC, b"k", 100).unwrap();

    assert_eq!(aggregator(&cluster).storage_bytes(TOPIC).await.unwrap(), 100);
}

#[tokio::test]
async fn test_total_offset_equals_records_produced() {
    let cluster = cluster_with_topic(10, 2).await;
    for i in 0..10_000u32 {
        cluster.produce(TOPIC, &i.to_be_bytes(), 64).unwrap();
    }

    let telemetry = aggregator(&cluster);
    assert_eq!(telemetry.total_offset(TOPIC).await.unwrap(), 10_000);

    let usage = telemetry.topic_usage(TOPIC).await.unwrap();
    assert_eq!(usage.offset_total, 10_000);
    assert_eq!(usage.storage_bytes, 10_000 * 64 * 2);
}

#[tokio::test]
async fn test_zero_partitions_is_zero() {
    let cluster = cluster_with_topic(0, 1).await;
    let telemetry = aggregator(&cluster);

    assert_eq!(telemetry.total_offset(TOPIC).await.unwrap(), 0);
    assert_eq!(telemetry.storage_bytes(TOPIC).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_topic_is_not_zero_usage() {
    let cluster = Arc::new(MemoryCluster::new(1));
    let err = aggregator(&cluster).storage_bytes("missing").await.unwrap_err();
    assert!(matches!(err, Error::TopicNotFound(topic) if topic == "missing"));
}

#[tokio::test]
async fn test_unreachable_cluster() {
    let cluster = cluster_with_topic(3, 1).await;
    cluster.set_unavailable(true);

    let telemetry = aggregator(&cluster);
    assert!(matches!(
        telemetry.storage_bytes(TOPIC).await,
        Err(Error::ClusterUnavailable { .. })
    ));
    assert!(matches!(
        telemetry.total_offset(TOPIC).await,
        Err(Error::ClusterUnavailable { .. })
    ));
    assert!(matches!(
        telemetry.group_offsets("simple.streetlights.").await,
        Err(Error::ClusterUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_one_failed_broker_fails_the_call() {
    let cluster = cluster_with_topic(6, 3).await;
    cluster.fail_operation("describe_log_dirs", "2", "log dir offline");

    let err = aggregator(&cluster).storage_bytes(TOPIC).await.unwrap_err();
    match err {
        Error::ClusterUnavailable {
            operation, resource, ..
        } => {
            assert_eq!(operation, "describe_log_dirs");
            assert_eq!(resource, "broker 2");
        }
        other => panic!("expected ClusterUnavailable, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_sub_query_timeout() {
    let cluster = cluster_with_topic(3, 1).await;
    cluster.set_latency(Duration::from_secs(120));

    let telemetry = TelemetryAggregator::new(
        cluster.clone(),
        AdminConfig::default().with_operation_timeout(Duration::from_millis(500)),
    );
    assert!(matches!(
        telemetry.total_offset(TOPIC).await,
        Err(Error::ClusterUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_group_offsets_are_filtered_and_ordered() {
    let cluster = Arc::new(MemoryCluster::new(1));
    cluster.commit_offset("zeta", TopicPartition::new(TOPIC, 0), 10);
    cluster.commit_offset("zeta", TopicPartition::new(TOPIC, 1), 5);
    cluster.commit_offset("alpha", TopicPartition::new(TOPIC, 0), 7);
    cluster.commit_offset("alpha", TopicPartition::new("unrelated.payments", 0), 1_000);
    cluster.commit_offset("payments", TopicPartition::new("unrelated.payments", 0), 3);
    cluster.commit_offset("idle", TopicPartition::new(TOPIC, 0), 99);
    cluster.set_group_state("idle", GroupState::Empty);

    let groups = aggregator(&cluster)
        .group_offsets("simple.streetlights.")
        .await
        .unwrap();

    let summary: Vec<(&str, i64, usize)> = groups
        .iter()
        .map(|g| (g.group_id.as_str(), g.offset_total, g.partitions))
        .collect();
    assert_eq!(summary, vec![("alpha", 7, 1), ("zeta", 15, 2)]);
}

#[tokio::test]
async fn test_report() {
    let cluster = cluster_with_topic(4, 2).await;
    for i in 0..100u32 {
        cluster.produce(TOPIC, &i.to_le_bytes(), 10).unwrap();
    }
    cluster.commit_offset("dashboard", TopicPartition::new(TOPIC, 0), 12);

    let report = aggregator(&cluster)
        .report(&[TOPIC.to_string()], "simple.streetlights.")
        .await
        .unwrap();

    assert_eq!(report.topics[TOPIC].offset_total, 100);
    assert_eq!(report.topics[TOPIC].storage_bytes, 2_000);
    assert_eq!(report.total_storage_bytes(), 2_000);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].group_id, "dashboard");

    cluster.fail_operation("list_consumer_groups", ANY_TARGET, "coordinator not available");
    assert!(aggregator(&cluster)
        .report(&[TOPIC.to_string()], "simple.streetlights.")
        .await
        .is_err());
}
