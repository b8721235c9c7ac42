//! Desired cluster state derived from a resolved domain model

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use topicmesh_admin::{value_subject, NewTopic};
use topicmesh_core::{AccessBinding, DomainModel, Error, Result, SchemaFormat};
use tracing::debug;

/// Schema to be registered under a subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredSchema {
    pub format: SchemaFormat,
    pub schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    /// Owned topics only
    pub topics: BTreeMap<String, NewTopic>,
    pub grants: BTreeSet<AccessBinding>,
    /// Subject → schema
    pub schemas: BTreeMap<String, DesiredSchema>,
}

impl DesiredState {
    /// Collect owned topics, derived grants and schema texts.
    ///
    /// Schema files are read relative to `schema_base_path`; a missing file
    /// fails the whole build before anything is sent to the cluster.
    pub async fn build(model: &DomainModel, schema_base_path: &Path) -> Result<Self> {
        let mut desired = DesiredState {
            grants: model.access_bindings().iter().cloned().collect(),
            ..Default::default()
        };

        for channel in model.owned_channels() {
            desired.topics.insert(
                channel.topic.clone(),
                NewTopic {
                    name: channel.topic.clone(),
                    partitions: channel.spec.partitions,
                    replication_factor: channel.spec.replication_factor,
                    configs: channel.spec.topic_configs(),
                },
            );

            if let Some(schema_ref) = &channel.spec.schema {
                let format = schema_ref.format()?;
                let path = schema_base_path.join(&schema_ref.path);
                let schema = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| Error::SpecResourceNotFound {
                        path: path.clone(),
                        source,
                    })?;

                debug!(topic = %channel.topic, path = %path.display(), "Loaded schema");
                desired
                    .schemas
                    .insert(value_subject(&channel.topic), DesiredSchema { format, schema });
            }
        }

        Ok(desired)
    }
}
