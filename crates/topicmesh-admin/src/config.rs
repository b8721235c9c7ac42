//! Admin connection configuration

use crate::error::{AdminError, AdminResult, RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Default bound on a single cluster sub-query
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;

/// Default number of sub-queries issued concurrently by one call
const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Settings applied to every call issued through the admin connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bound on each individual sub-query, in milliseconds
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Fan-out cap for per-topic / per-broker queries
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl AdminConfig {
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Run `fut` bounded by the configured operation timeout
    pub async fn bounded<T, F>(&self, operation: &str, fut: F) -> AdminResult<T>
    where
        F: Future<Output = AdminResult<T>>,
    {
        with_timeout(self.operation_timeout(), operation, fut).await
    }

    /// Run a schema registry call bounded by the same timeout; elapsing is
    /// reported as a network failure
    pub async fn bounded_registry<T, F>(&self, operation: &str, fut: F) -> RegistryResult<T>
    where
        F: Future<Output = RegistryResult<T>>,
    {
        let limit = self.operation_timeout();
        tokio::time::timeout(limit, fut).await.map_err(|_| {
            RegistryError::Network(format!("{operation} exceeded {}ms", limit.as_millis()))
        })?
    }
}

/// Bound `fut` by `limit`; elapsing yields [`AdminError::Timeout`]
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> AdminResult<T>
where
    F: Future<Output = AdminResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AdminError::Timeout(format!("{operation} exceeded {}ms", limit.as_millis())))?
}
