//! Ledger Gateway Trait
//!
//! Single interface through which the reconciliation engine talks to the
//! remote portfolio ledger. Abstracting the gateway decouples the engine from
//! the HTTP implementation and lets tests inject a scripted fake.
//!
//! Every method returns `Ok(None)` when the gateway's circuit breaker is open:
//! the call was not attempted and the caller should defer that unit of work to
//! the next scheduled pass instead of treating it as an error.

use async_trait::async_trait;

use crate::domain::entities::activity::RemoteActivity;
use crate::domain::entities::transaction::CanonicalTransaction;
use crate::domain::errors::GatewayError;

/// Common result type for gateway operations. `Ok(None)` means "circuit open,
/// defer"; `Err` carries the classified failure.
pub type GatewayResult<T> = Result<Option<T>, GatewayError>;

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Snapshot of all activities this sidecar manages for one account.
    async fn fetch_activities(&self, account_id: &str) -> GatewayResult<Vec<RemoteActivity>>;

    /// Create a new remote activity from a canonical transaction.
    async fn create_activity(
        &self,
        account_id: &str,
        transaction: &CanonicalTransaction,
    ) -> GatewayResult<()>;

    /// Replace the semantic fields of an existing remote activity.
    async fn update_activity(
        &self,
        remote_id: &str,
        transaction: &CanonicalTransaction,
    ) -> GatewayResult<()>;

    /// Remove a remote activity that no longer has a local counterpart.
    async fn delete_activity(&self, remote_id: &str) -> GatewayResult<()>;
}
