//! Typed document tree consumed by the resolver
//!
//! The shape mirrors what the external document parser produces: a domain id
//! plus a map of logical channel names to their Kafka-level parameters.

use crate::domain::DomainId;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use validator::{Validate, ValidationError};

/// Topic config key carrying a channel's retention
pub const RETENTION_MS_CONFIG: &str = "retention.ms";

/// A parsed API-description document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    /// Owning domain (dotted or `urn:` form)
    pub id: DomainId,

    /// Logical channel name → channel definition
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelSpec>,
}

impl ApiSpec {
    pub fn new(id: DomainId) -> Self {
        Self {
            id,
            channels: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, channel: ChannelSpec) -> Self {
        self.channels.insert(name.into(), channel);
        self
    }

    /// Validate every channel, collecting all problems into one error
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (name, channel) in &self.channels {
            if let Err(errors) = channel.validate() {
                problems.extend(errors.field_errors().iter().flat_map(|(field, errs)| {
                    errs.iter().map(move |e| match &e.message {
                        Some(message) => format!("{name}.{field}: {message}"),
                        None => format!("{name}.{field}: {}", e.code),
                    })
                }));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidSpec(problems.join("; ")))
        }
    }
}

/// Which side of the channel the owning domain is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The domain writes records to the channel
    #[serde(alias = "publish")]
    Produce,
    /// The domain reads records from the channel
    #[serde(alias = "subscribe")]
    Consume,
}

/// One declared channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChannelSpec {
    pub direction: Direction,

    #[serde(default = "default_partitions")]
    #[validate(range(
        min = 1,
        max = 10000,
        message = "partitions must be between 1 and 10000"
    ))]
    pub partitions: u32,

    #[serde(default = "default_replication_factor")]
    #[validate(range(
        min = 1,
        max = 10,
        message = "replication factor must be between 1 and 10"
    ))]
    pub replication_factor: u16,

    #[serde(default)]
    #[validate(range(min = 1, message = "retention must be positive"))]
    pub retention_ms: Option<u64>,

    /// Extra topic configs (`cleanup.policy`, `min.insync.replicas`, ...)
    #[serde(default)]
    #[validate(custom(function = "validate_config_keys"))]
    pub configs: BTreeMap<String, String>,

    #[serde(default)]
    pub schema: Option<SchemaRef>,

    /// Other domains allowed to consume this channel
    #[serde(default)]
    pub grant_access: Vec<DomainId>,
}

fn default_partitions() -> u32 {
    3
}

fn default_replication_factor() -> u16 {
    1
}

fn validate_config_keys(configs: &BTreeMap<String, String>) -> std::result::Result<(), ValidationError> {
    for key in configs.keys() {
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(ValidationError::new("invalid_config_key")
                .with_message(format!("invalid topic config key '{key}'").into()));
        }
        if key == RETENTION_MS_CONFIG {
            return Err(ValidationError::new("duplicate_retention")
                .with_message("use retention_ms instead of configs.retention.ms".into()));
        }
    }
    Ok(())
}

impl ChannelSpec {
    /// Channel with default sizing: 3 partitions, replication 1
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            partitions: default_partitions(),
            replication_factor: default_replication_factor(),
            retention_ms: None,
            configs: BTreeMap::new(),
            schema: None,
            grant_access: Vec::new(),
        }
    }

    pub fn produced() -> Self {
        Self::new(Direction::Produce)
    }

    pub fn consumed() -> Self {
        Self::new(Direction::Consume)
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: u16) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_retention_ms(mut self, retention_ms: u64) -> Self {
        self.retention_ms = Some(retention_ms);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configs.insert(key.into(), value.into());
        self
    }

    pub fn with_schema(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_grant(mut self, domain: DomainId) -> Self {
        self.grant_access.push(domain);
        self
    }

    /// Full topic config map the cluster should hold for this channel
    pub fn topic_configs(&self) -> BTreeMap<String, String> {
        let mut configs = self.configs.clone();
        if let Some(retention) = self.retention_ms {
            configs.insert(RETENTION_MS_CONFIG.to_string(), retention.to_string());
        }
        configs
    }
}

/// Serialization format of a referenced schema file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaFormat {
    #[serde(alias = "AVRO")]
    Avro,
    #[serde(alias = "JSON")]
    Json,
    #[serde(alias = "PROTOBUF")]
    Protobuf,
}

impl SchemaFormat {
    /// Guess the format from a schema file extension
    pub fn from_path(path: &str) -> Option<Self> {
        match Path::new(path).extension()?.to_str()? {
            "avsc" | "avro" => Some(Self::Avro),
            "json" => Some(Self::Json),
            "proto" => Some(Self::Protobuf),
            _ => None,
        }
    }
}

impl std::fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaFormat::Avro => write!(f, "AVRO"),
            SchemaFormat::Json => write!(f, "JSON"),
            SchemaFormat::Protobuf => write!(f, "PROTOBUF"),
        }
    }
}

/// Reference from a channel to a schema file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    /// Path relative to the provisioning schema base path
    pub path: String,

    /// Explicit format; inferred from the extension when absent
    #[serde(default)]
    pub format: Option<SchemaFormat>,
}

impl SchemaRef {
    pub fn new(path: impl Into<String>, format: SchemaFormat) -> Self {
        Self {
            path: path.into(),
            format: Some(format),
        }
    }

    pub fn format(&self) -> Result<SchemaFormat> {
        self.format
            .or_else(|| SchemaFormat::from_path(&self.path))
            .ok_or_else(|| {
                Error::InvalidSpec(format!(
                    "schema '{}' has no format and an unrecognised extension",
                    self.path
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_defaults() {
        let channel: ChannelSpec = serde_yaml::from_str("direction: publish").unwrap();
        assert_eq!(channel.direction, Direction::Produce);
        assert_eq!(channel.partitions, 3);
        assert_eq!(channel.replication_factor, 1);
        assert!(channel.topic_configs().is_empty());
    }

    #[test]
    fn test_topic_configs_include_retention() {
        let channel = ChannelSpec::produced()
            .with_retention_ms(86_400_000)
            .with_config("cleanup.policy", "compact");
        let configs = channel.topic_configs();
        assert_eq!(configs.get("retention.ms").unwrap(), "86400000");
        assert_eq!(configs.get("cleanup.policy").unwrap(), "compact");
    }

    #[test]
    fn test_validate_collects_channel_errors() {
        let spec = ApiSpec::new(DomainId::parse("acme.sales").unwrap())
            .with_channel("orders", ChannelSpec::produced().with_partitions(0))
            .with_channel(
                "refunds",
                ChannelSpec::produced().with_config("retention.ms", "1"),
            );

        let err = spec.validate().unwrap_err().to_string();
        assert!(err.contains("orders.partitions"));
        assert!(err.contains("refunds.configs"));
    }

    #[test]
    fn test_schema_format_inference() {
        assert_eq!(
            SchemaRef {
                path: "schema/user.avsc".to_string(),
                format: None
            }
            .format()
            .unwrap(),
            SchemaFormat::Avro
        );
        assert!(SchemaRef {
            path: "schema/user.txt".to_string(),
            format: None
        }
        .format()
        .is_err());
        assert_eq!(SchemaFormat::Protobuf.to_string(), "PROTOBUF");
    }
}
