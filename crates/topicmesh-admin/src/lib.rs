//! # topicmesh admin
//!
//! Capability interfaces to a broker cluster and a schema registry, plus the
//! cluster state reader built on top of them.
//!
//! ## Backends
//!
//! - [`MemoryCluster`] / [`MemoryRegistry`]: in-memory, with fault injection
//! - [`ConfluentRegistry`]: HTTP client for Confluent-compatible registries
//!
//! A production cluster binding implements [`ClusterAdmin`] and is shared as
//! a [`SharedAdmin`] by every caller in the process.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use topicmesh_admin::prelude::*;
//!
//! let admin: SharedAdmin = Arc::new(MemoryCluster::new(3));
//! let reader = ClusterStateReader::new(admin, AdminConfig::default());
//! let snapshot = reader.read(&SnapshotScope::namespace(&domain)).await?;
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod memory;
pub mod registry;
pub mod snapshot;

pub use admin::{
    BrokerId, ClusterAdmin, ConsumerGroupListing, GroupState, LogDirDescription, NewTopic,
    PartitionDescription, ReplicaLogInfo, SharedAdmin, TopicConfigs, TopicDescription,
    TopicPartition,
};
pub use config::{with_timeout, AdminConfig};
pub use error::{AdminError, AdminResult, RegistryError, RegistryResult};
pub use memory::{MemoryCluster, ANY_TARGET};
pub use registry::{
    subject_topic, value_subject, ConfluentConfig, ConfluentRegistry, MemoryRegistry,
    RegisteredSchema, SchemaRegistryClient, SharedRegistry,
};
pub use snapshot::{ClusterSnapshot, ClusterStateReader, ObservedTopic, SnapshotScope};

pub mod prelude {
    //! Re-exports for convenient usage
    pub use crate::admin::{ClusterAdmin, NewTopic, SharedAdmin, TopicPartition};
    pub use crate::config::AdminConfig;
    pub use crate::error::{AdminError, RegistryError};
    pub use crate::memory::MemoryCluster;
    pub use crate::registry::{MemoryRegistry, SchemaRegistryClient, SharedRegistry};
    pub use crate::snapshot::{ClusterSnapshot, ClusterStateReader, SnapshotScope};
}
