//! Sync Service
//!
//! Drives one reconciliation pass for one account: resolve timestamp
//! collisions, snapshot the remote state, plan the delta and apply it through
//! the gateway. Per-operation failures are isolated so one bad row or one
//! flaky call never blocks the rest of the account; only an authorization
//! failure aborts the pass, since every later call would fail the same way.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::entities::transaction::CanonicalTransaction;
use crate::domain::errors::SyncError;
use crate::domain::repositories::ledger_gateway::LedgerGateway;
use crate::domain::services::collision::resolve_collisions;
use crate::domain::services::delta::{plan_sync, SyncOperation};

/// Outcome of one pass over one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Matching source keys whose fields were already identical.
    pub unchanged: usize,
    /// Operations (or the whole snapshot) deferred to the next pass because
    /// of transient failures or an open circuit.
    pub deferred: usize,
    /// Operations the remote rejected as malformed.
    pub failed: usize,
    /// Local transactions with no remote mutation for their kind.
    pub unsupported: usize,
    /// False when the pass could not even snapshot the remote state.
    pub completed: bool,
}

impl PassReport {
    fn deferred_pass() -> Self {
        Self::default()
    }

    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_noop(&self) -> bool {
        self.completed && self.mutations() == 0 && self.deferred == 0 && self.failed == 0
    }
}

pub struct SyncService {
    gateway: Arc<dyn LedgerGateway>,
}

impl SyncService {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { gateway }
    }

    /// Run one full reconciliation pass for `account_id`.
    ///
    /// Partial application is acceptable: the next scheduled pass re-derives
    /// the full delta from the observed remote state, so skipped operations
    /// are retried naturally and a crash mid-pass needs no recovery log.
    pub async fn sync_account(
        &self,
        account_id: &str,
        transactions: Vec<CanonicalTransaction>,
    ) -> Result<PassReport, SyncError> {
        let transactions = resolve_collisions(transactions);

        let remote = match self.gateway.fetch_activities(account_id).await {
            Ok(Some(activities)) => activities,
            Ok(None) => {
                warn!(account_id, "circuit open while fetching remote state, pass deferred");
                return Ok(PassReport::deferred_pass());
            }
            Err(err) if err.is_authorization() => {
                error!(account_id, %err, "authorization failure before delta computation");
                return Err(SyncError::Authorization(err));
            }
            Err(err) => {
                warn!(account_id, %err, "could not snapshot remote state, pass deferred");
                return Ok(PassReport::deferred_pass());
            }
        };

        let plan = plan_sync(&transactions, &remote);
        let mut report = PassReport {
            unchanged: plan.unchanged,
            completed: true,
            ..Default::default()
        };

        for (kind, source_key) in &plan.unsupported {
            let err = SyncError::UnsupportedKind {
                kind: *kind,
                source_key: source_key.clone(),
            };
            error!(account_id, %err, "transaction has no remote mutation, skipped");
            report.unsupported += 1;
        }

        for operation in &plan.operations {
            let (op_kind, source_key) = operation.describe();
            let outcome = match operation {
                SyncOperation::Create(tx) => self.gateway.create_activity(account_id, tx).await,
                SyncOperation::Update {
                    remote_id,
                    transaction,
                } => self.gateway.update_activity(remote_id, transaction).await,
                SyncOperation::Delete { remote_id, .. } => {
                    self.gateway.delete_activity(remote_id).await
                }
            };

            match outcome {
                Ok(Some(())) => {
                    debug!(account_id, operation = op_kind, %source_key, "operation applied");
                    match operation {
                        SyncOperation::Create(_) => report.created += 1,
                        SyncOperation::Update { .. } => report.updated += 1,
                        SyncOperation::Delete { .. } => report.deleted += 1,
                    }
                }
                Ok(None) => {
                    warn!(
                        account_id, operation = op_kind, %source_key,
                        "circuit open, operation deferred to next pass"
                    );
                    report.deferred += 1;
                }
                Err(err) if err.is_authorization() => {
                    error!(
                        account_id, operation = op_kind, %source_key, %err,
                        "authorization failure, aborting pass"
                    );
                    return Err(SyncError::Authorization(err));
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        account_id, operation = op_kind, %source_key, %err,
                        "transient failure, operation deferred to next pass"
                    );
                    report.deferred += 1;
                }
                Err(err) => {
                    error!(
                        account_id, operation = op_kind, %source_key, %err,
                        "operation rejected by remote, skipped"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            account_id,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            deferred = report.deferred,
            failed = report.failed,
            unsupported = report.unsupported,
            "sync pass finished"
        );
        Ok(report)
    }
}
