//! Schema registry capability interface
//!
//! - **Memory**: in-memory registry for development and testing
//! - **Confluent**: HTTP client for Confluent-compatible registries

mod confluent;
mod memory;

pub use confluent::{ConfluentConfig, ConfluentRegistry};
pub use memory::MemoryRegistry;

use crate::error::RegistryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use topicmesh_core::SchemaFormat;

const VALUE_SUFFIX: &str = "-value";
const KEY_SUFFIX: &str = "-key";

/// Value subject for a topic (`<topic>-value`)
pub fn value_subject(topic: &str) -> String {
    format!("{topic}{VALUE_SUFFIX}")
}

/// Topic a `-value` or `-key` subject belongs to
pub fn subject_topic(subject: &str) -> Option<&str> {
    subject
        .strip_suffix(VALUE_SUFFIX)
        .or_else(|| subject.strip_suffix(KEY_SUFFIX))
}

/// Latest schema registered under a subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredSchema {
    pub subject: String,
    pub id: u32,
    pub version: u32,
    pub format: SchemaFormat,
    pub schema: String,
}

/// Operations the reconciler needs from a schema registry.
///
/// Compatibility checking is left to the registry itself.
#[async_trait]
pub trait SchemaRegistryClient: Send + Sync {
    async fn list_subjects(&self) -> RegistryResult<Vec<String>>;

    /// Latest version of `subject`, `None` if the subject does not exist
    async fn latest(&self, subject: &str) -> RegistryResult<Option<RegisteredSchema>>;

    /// Register `schema` under `subject`, returning the schema id
    async fn register(
        &self,
        subject: &str,
        format: SchemaFormat,
        schema: &str,
    ) -> RegistryResult<u32>;
}

/// Shared handle to a schema registry connection
pub type SharedRegistry = Arc<dyn SchemaRegistryClient>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_naming() {
        assert_eq!(value_subject("acme.sales.orders"), "acme.sales.orders-value");
        assert_eq!(subject_topic("acme.sales.orders-value"), Some("acme.sales.orders"));
        assert_eq!(subject_topic("acme.sales.orders-key"), Some("acme.sales.orders"));
        assert_eq!(subject_topic("acme.sales.orders"), None);
    }
}
