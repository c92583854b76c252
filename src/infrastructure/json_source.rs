//! File-backed transaction source.
//!
//! The broker parsers run upstream and drop one JSON file of canonical
//! transactions per account; this source just loads them. Keeping the file
//! format canonical (not broker-specific) is what keeps parsing concerns out
//! of the sync core.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::entities::transaction::CanonicalTransaction;
use crate::domain::errors::SourceError;
use crate::domain::repositories::transaction_source::TransactionSource;

pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, account_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", account_id))
    }
}

#[async_trait]
impl TransactionSource for JsonFileSource {
    async fn load(&self, account_id: &str) -> Result<Vec<CanonicalTransaction>, SourceError> {
        let path = self.path_for(account_id);
        let path_str = path.display().to_string();

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::Unreadable {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;

        let transactions: Vec<CanonicalTransaction> =
            serde_json::from_str(&raw).map_err(|e| SourceError::Malformed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            account_id,
            count = transactions.len(),
            path = %path_str,
            "loaded canonical transactions"
        );
        Ok(transactions)
    }
}
