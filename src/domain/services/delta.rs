//! Sync Delta Planner
//!
//! Pure computation of the minimal mutation set that makes the remote
//! ledger's activities for one account match the canonical local set. The
//! planner never touches the network; the application layer drives the
//! resulting plan through the gateway.

use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::domain::entities::activity::RemoteActivity;
use crate::domain::entities::transaction::{CanonicalTransaction, SourceKey, TransactionKind};

/// One remote mutation the engine intends to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOperation {
    Create(CanonicalTransaction),
    Update {
        remote_id: String,
        transaction: CanonicalTransaction,
    },
    Delete {
        remote_id: String,
        source_key: SourceKey,
    },
}

impl SyncOperation {
    pub fn describe(&self) -> (&'static str, &SourceKey) {
        match self {
            SyncOperation::Create(tx) => ("create", &tx.source_key),
            SyncOperation::Update { transaction, .. } => ("update", &transaction.source_key),
            SyncOperation::Delete { source_key, .. } => ("delete", source_key),
        }
    }
}

/// Planned pass for one account: operations already ordered for application
/// (creates, then updates, then deletes), plus bookkeeping for reporting.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub operations: Vec<SyncOperation>,
    /// Matching source keys with identical semantic fields; skipped.
    pub unchanged: usize,
    /// Local transactions with no corresponding remote mutation.
    pub unsupported: Vec<(TransactionKind, SourceKey)>,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Compute the delta between the canonical local set and the remote snapshot.
///
/// Both sets are indexed by source key. Local-only keys become creates, keys
/// present on both sides with drifted semantic fields become updates against
/// the existing remote identifier, and remote-only keys become deletes. Keys
/// whose fields match are counted as unchanged, which is what makes a repeat
/// pass over the same input a no-op.
///
/// Creates are ordered before updates before deletes so an instrument never
/// passes through an empty-but-expected timeline mid-pass. Within each class
/// operations are ordered by (timestamp, source key) for determinism.
pub fn plan_sync(local: &[CanonicalTransaction], remote: &[RemoteActivity]) -> SyncPlan {
    let remote_by_key: HashMap<&SourceKey, &RemoteActivity> =
        remote.iter().map(|a| (&a.source_key, a)).collect();

    let mut ordered_local: Vec<&CanonicalTransaction> = local.iter().collect();
    ordered_local.sort_by(|a, b| {
        (a.timestamp, &a.source_key).cmp(&(b.timestamp, &b.source_key))
    });

    let mut plan = SyncPlan::default();
    let mut creates = Vec::new();
    let mut updates = Vec::new();
    let mut seen_local: HashSet<&SourceKey> = HashSet::new();

    for tx in ordered_local {
        if !seen_local.insert(&tx.source_key) {
            warn!(
                source_key = %tx.source_key,
                "duplicate source key in local set, keeping first occurrence"
            );
            continue;
        }
        if tx.kind.remote_type().is_none() {
            plan.unsupported.push((tx.kind, tx.source_key.clone()));
            continue;
        }
        match remote_by_key.get(&tx.source_key) {
            None => creates.push(SyncOperation::Create(tx.clone())),
            Some(activity) => {
                if tx.semantically_eq(activity) {
                    plan.unchanged += 1;
                } else {
                    updates.push(SyncOperation::Update {
                        remote_id: activity.id.clone(),
                        transaction: tx.clone(),
                    });
                }
            }
        }
    }

    let mut orphans: Vec<&RemoteActivity> = remote
        .iter()
        .filter(|a| !seen_local.contains(&a.source_key))
        .collect();
    orphans.sort_by(|a, b| (a.timestamp, &a.source_key).cmp(&(b.timestamp, &b.source_key)));

    plan.operations = creates;
    plan.operations.extend(updates);
    plan.operations
        .extend(orphans.into_iter().map(|a| SyncOperation::Delete {
            remote_id: a.id.clone(),
            source_key: a.source_key.clone(),
        }));

    plan
}
