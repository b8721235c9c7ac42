//! # topicmesh telemetry
//!
//! Storage, offset and consumer-group accounting for provisioned topics.
//!
//! - **storage**: bytes on disk summed over every replica of every
//!   partition, as reported by broker log directories. Replicas are not
//!   de-duplicated, so the figure includes replication overhead.
//! - **offset total**: sum of partition end offsets; equals the number of
//!   records produced while retention has deleted nothing.
//! - **group offsets**: committed offsets of active consumer groups, summed
//!   over partitions of topics under a prefix.
//!
//! A topic with zero partitions reports zero. An unknown topic is
//! [`Error::TopicNotFound`](topicmesh_core::Error::TopicNotFound) and an
//! unreachable cluster is
//! [`Error::ClusterUnavailable`](topicmesh_core::Error::ClusterUnavailable).

pub mod aggregator;
pub mod report;

pub use aggregator::TelemetryAggregator;
pub use report::{GroupOffsets, StorageBreakdown, TelemetryReport, TopicUsage};
