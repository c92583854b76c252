//! Remote Activity Entity
//!
//! Read-only mirror of a transaction already stored on the remote ledger. The
//! remote system owns these records; the core only observes them and issues
//! create/update/delete requests through the gateway.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::entities::transaction::{InstrumentRef, SourceKey};

/// Activity categories the remote ledger accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteActivityType {
    Buy,
    Sell,
    Dividend,
    Interest,
    Fee,
}

impl std::fmt::Display for RemoteActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RemoteActivityType::Buy => "BUY",
            RemoteActivityType::Sell => "SELL",
            RemoteActivityType::Dividend => "DIVIDEND",
            RemoteActivityType::Interest => "INTEREST",
            RemoteActivityType::Fee => "FEE",
        };
        write!(f, "{}", s)
    }
}

/// One activity as currently stored on the remote ledger.
///
/// `source_key` round-trips through the remote free-text comment field, which
/// is what lets successive passes recognize their own records.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteActivity {
    pub id: String,
    pub account_id: String,
    pub activity_type: RemoteActivityType,
    pub timestamp: DateTime<Utc>,
    pub currency: String,
    pub instrument: InstrumentRef,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub source_key: SourceKey,
}
