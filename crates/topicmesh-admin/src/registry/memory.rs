//! In-memory schema registry for testing and development

use super::{RegisteredSchema, SchemaRegistryClient};
use crate::error::{RegistryError, RegistryResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use topicmesh_core::SchemaFormat;

#[derive(Clone)]
struct VersionEntry {
    id: u32,
    format: SchemaFormat,
    schema: String,
}

/// In-memory [`SchemaRegistryClient`]; identical schema text reuses its id
pub struct MemoryRegistry {
    next_id: AtomicU32,
    /// schema text -> id
    ids: DashMap<String, u32>,
    /// subject -> versions (index + 1 is the version number)
    subjects: DashMap<String, Vec<VersionEntry>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            ids: DashMap::new(),
            subjects: DashMap::new(),
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn versions(&self, subject: &str) -> usize {
        self.subjects.get(subject).map(|v| v.len()).unwrap_or(0)
    }

    async fn check(&self) -> RegistryResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Network("registry unreachable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemaRegistryClient for MemoryRegistry {
    async fn list_subjects(&self) -> RegistryResult<Vec<String>> {
        self.check().await?;
        let mut subjects: Vec<String> = self.subjects.iter().map(|e| e.key().clone()).collect();
        subjects.sort();
        Ok(subjects)
    }

    async fn latest(&self, subject: &str) -> RegistryResult<Option<RegisteredSchema>> {
        self.check().await?;
        Ok(self.subjects.get(subject).and_then(|versions| {
            versions.last().map(|entry| RegisteredSchema {
                subject: subject.to_string(),
                id: entry.id,
                version: versions.len() as u32,
                format: entry.format,
                schema: entry.schema.clone(),
            })
        }))
    }

    async fn register(
        &self,
        subject: &str,
        format: SchemaFormat,
        schema: &str,
    ) -> RegistryResult<u32> {
        self.check().await?;

        let id = *self
            .ids
            .entry(schema.to_string())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::SeqCst));

        let mut versions = self.subjects.entry(subject.to_string()).or_default();
        if versions.last().map(|v| v.id) != Some(id) {
            versions.push(VersionEntry {
                id,
                format,
                schema: schema.to_string(),
            });
        }
        Ok(id)
    }
}
