//! Reconciler: converge the cluster towards a resolved domain model

use crate::desired::DesiredState;
use crate::diff::diff;
use crate::metrics::ProvisionMetrics;
use crate::plan::{Operation, ReconciliationPlan};
use crate::report::{OperationReport, Outcome, ProvisionReport};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use topicmesh_admin::{
    AdminConfig, AdminError, ClusterStateReader, SharedAdmin, SharedRegistry, SnapshotScope,
};
use topicmesh_core::{DomainModel, Result};
use tracing::{debug, info, instrument, warn};

const DRY_RUN: &str = "dry run";
const NO_REGISTRY: &str = "no schema registry configured";

/// Invocation parameters of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Delete orphaned topics and revoke orphaned grants in the namespace
    pub clean_unspecified: bool,
    /// Plan only; nothing is sent to the cluster
    pub dry_run: bool,
    /// Directory schema paths are resolved against
    pub schema_base_path: PathBuf,
}

impl ProvisionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clean_unspecified(mut self, clean_unspecified: bool) -> Self {
        self.clean_unspecified = clean_unspecified;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_schema_base_path(mut self, path: impl AsRef<Path>) -> Self {
        self.schema_base_path = path.as_ref().to_path_buf();
        self
    }
}

/// Diffs a domain model against the cluster and applies the difference.
///
/// The reconciler holds no locks. Callers running passes concurrently for
/// the same domain must serialize them.
#[derive(Clone)]
pub struct Reconciler {
    admin: SharedAdmin,
    registry: Option<SharedRegistry>,
    config: AdminConfig,
    metrics: Option<ProvisionMetrics>,
}

impl Reconciler {
    pub fn new(admin: SharedAdmin, config: AdminConfig) -> Self {
        Self {
            admin,
            registry: None,
            config,
            metrics: None,
        }
    }

    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_metrics(mut self, metrics: ProvisionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn reader(&self) -> ClusterStateReader {
        let reader = ClusterStateReader::new(self.admin.clone(), self.config.clone());
        match &self.registry {
            Some(registry) => reader.with_registry(registry.clone()),
            None => reader,
        }
    }

    /// Compute the plan without executing it.
    ///
    /// Schema files are loaded first, so a missing file fails before any
    /// cluster call is made.
    #[instrument(skip(self, model, options), fields(domain = %model.domain()))]
    pub async fn plan(
        &self,
        model: &DomainModel,
        options: &ProvisionOptions,
    ) -> Result<ReconciliationPlan> {
        let mut desired = DesiredState::build(model, &options.schema_base_path).await?;
        if self.registry.is_none() && !desired.schemas.is_empty() {
            warn!(
                schemas = desired.schemas.len(),
                "No schema registry configured, declared schemas are not provisioned"
            );
            desired.schemas.clear();
        }

        let scope = SnapshotScope::for_namespace(model.namespace()).with_topics(model.topics());
        let snapshot = self.reader().read(&scope).await?;

        for topic in model.referenced_topics() {
            if snapshot.topic(&topic).is_none() {
                warn!(topic = %topic, "Referenced topic does not exist on the cluster");
            }
        }

        let plan = diff(
            model.namespace(),
            &desired,
            &snapshot,
            options.clean_unspecified,
        );
        info!(
            domain = %model.domain(),
            operations = plan.len(),
            clean_unspecified = options.clean_unspecified,
            "Computed reconciliation plan"
        );
        Ok(plan)
    }

    /// Plan and (unless dry-run) apply.
    ///
    /// Naming, document and cluster-read failures are returned as errors.
    /// Failures of individual operations are recorded in the report and do
    /// not stop independent operations.
    #[instrument(skip(self, model, options), fields(domain = %model.domain(), dry_run = options.dry_run))]
    pub async fn reconcile(
        &self,
        model: &DomainModel,
        options: &ProvisionOptions,
    ) -> Result<ProvisionReport> {
        let started_at = Utc::now();
        let plan = self.plan(model, options).await?;
        let (operations, classifications) = plan.into_parts();

        let operations = if options.dry_run {
            operations
                .into_iter()
                .map(|operation| OperationReport {
                    operation,
                    outcome: Outcome::skipped(DRY_RUN),
                })
                .collect()
        } else {
            self.execute(operations).await
        };

        let report = ProvisionReport {
            dry_run: options.dry_run,
            started_at,
            finished_at: Utc::now(),
            operations,
            classifications,
        };

        if let Some(ref metrics) = self.metrics {
            metrics.record(&report);
        }

        if report.success() {
            info!(domain = %model.domain(), operations = report.operations.len(), "Reconciliation complete");
        } else {
            warn!(
                domain = %model.domain(),
                failed = report.failures().count(),
                "Reconciliation finished with failures"
            );
        }
        Ok(report)
    }

    /// Run stage by stage; operations inside one stage run concurrently
    async fn execute(&self, operations: Vec<Operation>) -> Vec<OperationReport> {
        let mut reports = Vec::with_capacity(operations.len());
        let mut remaining = operations.into_iter().peekable();

        while let Some(first) = remaining.next() {
            let kind = first.kind();
            let mut stage = vec![first];
            while let Some(next) = remaining.next_if(|op| op.kind() == kind) {
                stage.push(next);
            }

            debug!(stage = %kind, operations = stage.len(), "Executing stage");
            let outcomes: Vec<OperationReport> = stream::iter(stage)
                .map(|operation| async move {
                    let outcome = self.apply(&operation).await;
                    OperationReport { operation, outcome }
                })
                .buffered(self.config.max_in_flight.max(1))
                .collect()
                .await;
            reports.extend(outcomes);
        }

        reports
    }

    async fn apply(&self, operation: &Operation) -> Outcome {
        let result = match operation {
            Operation::RegisterSchema {
                subject,
                format,
                schema,
            } => {
                let Some(registry) = &self.registry else {
                    return Outcome::skipped(NO_REGISTRY);
                };
                self.config
                    .bounded_registry(
                        "register_schema",
                        registry.register(subject, *format, schema),
                    )
                    .await
                    .map(|id| debug!(subject = %subject, schema_id = id, "Schema registered"))
                    .map_err(|e| e.to_string())
            }
            Operation::CreateTopic(topic) => {
                match self
                    .config
                    .bounded("create_topic", self.admin.create_topic(topic))
                    .await
                {
                    // created concurrently by someone else; the next pass compares configs
                    Err(AdminError::TopicAlreadyExists(_)) => Ok(()),
                    other => other.map_err(|e| e.to_string()),
                }
            }
            Operation::UpdateTopicConfig { topic, configs } => self
                .config
                .bounded("alter_configs", self.admin.alter_configs(topic, configs))
                .await
                .map_err(|e| e.to_string()),
            Operation::Grant(binding) => self
                .config
                .bounded("create_acl", self.admin.create_acl(binding))
                .await
                .map_err(|e| e.to_string()),
            Operation::Revoke(binding) => self
                .config
                .bounded("delete_acl", self.admin.delete_acl(binding))
                .await
                .map_err(|e| e.to_string()),
            Operation::DeleteTopic { topic } => self
                .config
                .bounded("delete_topic", self.admin.delete_topic(topic))
                .await
                .map_err(|e| e.to_string()),
        };

        match result {
            Ok(()) => {
                info!(operation = %operation, "Applied");
                Outcome::Applied
            }
            Err(reason) => {
                warn!(operation = %operation, error = %reason, "Operation failed");
                Outcome::Failed { reason }
            }
        }
    }
}
