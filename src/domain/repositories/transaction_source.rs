//! Transaction Source Trait
//!
//! Inbound seam of the core: a producer of canonical transactions for one
//! account, already keyed and currency-normalized by the external parser and
//! mapping collaborators.

use async_trait::async_trait;

use crate::domain::entities::transaction::CanonicalTransaction;
use crate::domain::errors::SourceError;

#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn load(&self, account_id: &str) -> Result<Vec<CanonicalTransaction>, SourceError>;
}
