//! Per-operation outcomes of a reconciliation pass

use crate::plan::{Classification, Operation, OperationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use topicmesh_core::{Error, Result};

/// What happened to one planned operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    Failed { reason: String },
    Skipped { reason: String },
}

impl Outcome {
    pub fn failed(reason: impl fmt::Display) -> Self {
        Outcome::Failed {
            reason: reason.to_string(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied => f.write_str("applied"),
            Outcome::Failed { reason } => write!(f, "failed: {reason}"),
            Outcome::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReport {
    pub operation: Operation,
    pub outcome: Outcome,
}

/// The full plan annotated with outcomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub operations: Vec<OperationReport>,
    pub classifications: Vec<Classification>,
}

impl ProvisionReport {
    /// True when no operation failed
    pub fn success(&self) -> bool {
        !self.operations.iter().any(|r| r.outcome.is_failed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationReport> {
        self.operations.iter().filter(|r| r.outcome.is_failed())
    }

    pub fn applied(&self) -> impl Iterator<Item = &OperationReport> {
        self.operations
            .iter()
            .filter(|r| r.outcome == Outcome::Applied)
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations
            .iter()
            .filter(|r| r.operation.kind() == kind)
            .count()
    }

    /// Outcome recorded for the operation of `kind` on `target`
    pub fn outcome(&self, kind: OperationKind, target: &str) -> Option<&Outcome> {
        self.operations
            .iter()
            .find(|r| r.operation.kind() == kind && r.operation.target() == target)
            .map(|r| &r.outcome)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Turn a report with failed operations into `PartialReconciliationFailure`
    pub fn into_result(self) -> Result<Self> {
        let failures: Vec<String> = self
            .failures()
            .map(|r| format!("{}: {}", r.operation, r.outcome))
            .collect();

        if failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::PartialReconciliationFailure {
                total: self.operations.len(),
                failures,
            })
        }
    }
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "dry run")?;
        }
        for report in &self.operations {
            writeln!(f, "{} => {}", report.operation, report.outcome)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<Outcome>) -> ProvisionReport {
        let now = Utc::now();
        ProvisionReport {
            dry_run: false,
            started_at: now,
            finished_at: now,
            operations: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| OperationReport {
                    operation: Operation::DeleteTopic {
                        topic: format!("acme.sales.t{i}"),
                    },
                    outcome,
                })
                .collect(),
            classifications: Vec::new(),
        }
    }

    #[test]
    fn test_skipped_is_not_failure() {
        let report = report(vec![Outcome::Applied, Outcome::skipped("dry run")]);
        assert!(report.success());
        assert_eq!(report.applied().count(), 1);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_into_result_lists_failures() {
        let report = report(vec![
            Outcome::Applied,
            Outcome::failed("request rejected: not authorized"),
        ]);
        assert!(!report.success());

        match report.into_result() {
            Err(Error::PartialReconciliationFailure { total, failures }) => {
                assert_eq!(total, 2);
                assert_eq!(
                    failures,
                    vec!["delete-topic acme.sales.t1: failed: request rejected: not authorized"]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&Outcome::skipped("dry run")).unwrap();
        assert_eq!(json, r#"{"status":"skipped","reason":"dry run"}"#);
    }
}
