//! # topicmesh provision
//!
//! Reconciles a resolved [`DomainModel`](topicmesh_core::DomainModel)
//! against the live cluster.
//!
//! Each pass:
//!
//! 1. builds the desired state (owned topics, derived grants, schema texts)
//! 2. snapshots the domain's namespace on the cluster
//! 3. classifies every resource as missing, divergent, matching or orphaned
//! 4. emits a [`ReconciliationPlan`] in fixed stage order
//! 5. executes it (unless dry-run), recording an [`Outcome`] per operation
//!
//! Stage order is register-schema, create-topic, update-topic-config, grant,
//! then revoke and delete-topic. The last two are only planned with
//! `clean_unspecified` and only for resources inside the domain's namespace.
//!
//! ```rust,ignore
//! use topicmesh_provision::prelude::*;
//!
//! let reconciler = Reconciler::new(admin, AdminConfig::default())
//!     .with_registry(registry)
//!     .with_metrics(ProvisionMetrics::new());
//! let report = reconciler
//!     .reconcile(&model, &ProvisionOptions::new().with_schema_base_path("schemas"))
//!     .await?
//!     .into_result()?;
//! ```

pub mod desired;
pub mod diff;
pub mod metrics;
pub mod plan;
pub mod reconciler;
pub mod report;

pub use desired::{DesiredSchema, DesiredState};
pub use diff::diff;
pub use crate::metrics::ProvisionMetrics;
pub use plan::{
    Classification, Operation, OperationKind, ReconciliationPlan, ResourceKind, ResourceState,
};
pub use reconciler::{ProvisionOptions, Reconciler};
pub use report::{OperationReport, Outcome, ProvisionReport};

pub mod prelude {
    //! Re-exports for convenient usage
    pub use crate::metrics::ProvisionMetrics;
    pub use crate::plan::{
        Operation, OperationKind, ReconciliationPlan, ResourceKind, ResourceState,
    };
    pub use crate::reconciler::{ProvisionOptions, Reconciler};
    pub use crate::report::{Outcome, ProvisionReport};
    pub use topicmesh_admin::AdminConfig;
}
