//! Canonical Transaction Entity
//!
//! The broker-agnostic representation of one financial event, produced by the
//! per-broker file parsers after currency and symbol normalization. Immutable
//! once created; it exists only for the duration of a single sync pass.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::entities::activity::{RemoteActivity, RemoteActivityType};

/// Category of a canonical transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Buy,
    Sell,
    Dividend,
    Interest,
    Fee,
    Tax,
    CashDeposit,
    CashWithdrawal,
    Send,
    Receive,
    StakingReward,
    Gift,
    CurrencyConvert,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::Dividend => "DIVIDEND",
            TransactionKind::Interest => "INTEREST",
            TransactionKind::Fee => "FEE",
            TransactionKind::Tax => "TAX",
            TransactionKind::CashDeposit => "CASH_DEPOSIT",
            TransactionKind::CashWithdrawal => "CASH_WITHDRAWAL",
            TransactionKind::Send => "SEND",
            TransactionKind::Receive => "RECEIVE",
            TransactionKind::StakingReward => "STAKING_REWARD",
            TransactionKind::Gift => "GIFT",
            TransactionKind::CurrencyConvert => "CURRENCY_CONVERT",
        }
    }

    /// Map to the activity type understood by the remote ledger.
    ///
    /// Returns `None` for pure cash movements, which the remote ledger tracks
    /// through account balances rather than activities. Those transactions are
    /// surfaced as unsupported instead of being silently dropped.
    pub fn remote_type(&self) -> Option<RemoteActivityType> {
        match self {
            TransactionKind::Buy | TransactionKind::Receive | TransactionKind::Gift => {
                Some(RemoteActivityType::Buy)
            }
            TransactionKind::Sell | TransactionKind::Send => Some(RemoteActivityType::Sell),
            TransactionKind::Dividend | TransactionKind::StakingReward => {
                Some(RemoteActivityType::Dividend)
            }
            TransactionKind::Interest => Some(RemoteActivityType::Interest),
            TransactionKind::Fee | TransactionKind::Tax => Some(RemoteActivityType::Fee),
            TransactionKind::CashDeposit
            | TransactionKind::CashWithdrawal
            | TransactionKind::CurrencyConvert => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered set of (scheme, identifier) pairs resolving a remote instrument.
///
/// Examples: `("ISIN", "US0378331005")`, `("TICKER", "AAPL")`. Empty for pure
/// cash movements. Pairs are sorted and de-duplicated on construction so that
/// two refs built from the same identifiers in any order compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InstrumentRef {
    identifiers: Vec<(String, String)>,
}

impl InstrumentRef {
    pub fn new(mut identifiers: Vec<(String, String)>) -> Self {
        identifiers.sort();
        identifiers.dedup();
        Self { identifiers }
    }

    pub fn single(scheme: &str, identifier: &str) -> Self {
        Self::new(vec![(scheme.to_string(), identifier.to_string())])
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// First identifier pair, used as the (data source, symbol) sent remotely.
    pub fn primary(&self) -> Option<(&str, &str)> {
        self.identifiers
            .first()
            .map(|(scheme, id)| (scheme.as_str(), id.as_str()))
    }

    /// Stable key grouping transactions of the same instrument together for
    /// collision resolution. `None` for cash-only movements, which are exempt.
    pub fn grouping_key(&self) -> Option<String> {
        if self.identifiers.is_empty() {
            return None;
        }
        Some(
            self.identifiers
                .iter()
                .map(|(scheme, id)| format!("{}:{}", scheme, id))
                .collect::<Vec<_>>()
                .join("|"),
        )
    }
}

/// Deterministic idempotency key identifying "the same underlying transaction"
/// across repeated parses of the same source row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey(String);

impl SourceKey {
    /// Key from a broker-native transaction id, when the export carries one.
    pub fn native(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Composite fallback key derived from the semantically relevant fields.
    /// Changes if and only if kind, instrument, date, amount or currency change.
    pub fn derive(
        kind: TransactionKind,
        instrument: &InstrumentRef,
        timestamp: DateTime<Utc>,
        total_amount: Decimal,
        currency: &str,
    ) -> Self {
        Self(format!(
            "{}|{}|{}|{}|{}",
            kind.as_str(),
            instrument.grouping_key().unwrap_or_default(),
            timestamp.format("%Y-%m-%d"),
            total_amount.normalize(),
            currency
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One canonical financial event headed for the remote ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub kind: TransactionKind,
    /// UTC, second resolution. Truncated on construction.
    pub timestamp: DateTime<Utc>,
    pub currency: String,
    pub instrument: InstrumentRef,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub source_key: SourceKey,
    pub account_id: String,
}

impl CanonicalTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TransactionKind,
        timestamp: DateTime<Utc>,
        currency: impl Into<String>,
        instrument: InstrumentRef,
        quantity: Decimal,
        unit_price: Decimal,
        total_amount: Decimal,
        source_key: SourceKey,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            timestamp: truncate_to_second(timestamp),
            currency: currency.into(),
            instrument,
            quantity,
            unit_price,
            total_amount,
            source_key,
            account_id: account_id.into(),
        }
    }

    /// Pure cash movement: no instrument, only a total amount.
    pub fn cash(
        kind: TransactionKind,
        timestamp: DateTime<Utc>,
        currency: impl Into<String>,
        total_amount: Decimal,
        source_key: SourceKey,
        account_id: impl Into<String>,
    ) -> Self {
        Self::new(
            kind,
            timestamp,
            currency,
            InstrumentRef::empty(),
            Decimal::ZERO,
            Decimal::ZERO,
            total_amount,
            source_key,
            account_id,
        )
    }

    /// True when the remote record already carries the same semantics, i.e.
    /// replaying this transaction would be a no-op.
    pub fn semantically_eq(&self, remote: &RemoteActivity) -> bool {
        self.kind.remote_type() == Some(remote.activity_type)
            && self.timestamp == remote.timestamp
            && self.currency == remote.currency
            && self.instrument.primary() == remote.instrument.primary()
            && self.quantity == remote.quantity
            && self.unit_price == remote.unit_price
            && self.total_amount == remote.total_amount
    }
}

/// The remote ledger orders activities at second resolution; finer precision
/// would defeat the collision resolver's `+1s` reassignment.
pub fn truncate_to_second(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.timestamp(), 0).unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn ts(secs: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(secs, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    fn buy(amount: Decimal) -> CanonicalTransaction {
        let instrument = InstrumentRef::single("TICKER", "AAPL");
        let key = SourceKey::derive(
            TransactionKind::Buy,
            &instrument,
            ts("2024-03-01 10:00:00"),
            amount,
            "USD",
        );
        CanonicalTransaction::new(
            TransactionKind::Buy,
            ts("2024-03-01 10:00:00"),
            "USD",
            instrument,
            dec!(2),
            amount / dec!(2),
            amount,
            key,
            "acct-1",
        )
    }

    #[test]
    fn test_source_key_stable_across_reparses() {
        let a = buy(dec!(350.00));
        let b = buy(dec!(350.000));
        assert_eq!(a.source_key, b.source_key);
    }

    #[test]
    fn test_source_key_changes_when_amount_changes() {
        let a = buy(dec!(350));
        let b = buy(dec!(351));
        assert_ne!(a.source_key, b.source_key);
    }

    #[test]
    fn test_source_key_changes_when_kind_changes() {
        let instrument = InstrumentRef::single("TICKER", "AAPL");
        let when = ts("2024-03-01 10:00:00");
        let a = SourceKey::derive(TransactionKind::Buy, &instrument, when, dec!(10), "USD");
        let b = SourceKey::derive(TransactionKind::Sell, &instrument, when, dec!(10), "USD");
        assert_ne!(a, b);
    }

    #[test]
    fn test_instrument_ref_order_insensitive() {
        let a = InstrumentRef::new(vec![
            ("TICKER".to_string(), "AAPL".to_string()),
            ("ISIN".to_string(), "US0378331005".to_string()),
        ]);
        let b = InstrumentRef::new(vec![
            ("ISIN".to_string(), "US0378331005".to_string()),
            ("TICKER".to_string(), "AAPL".to_string()),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.grouping_key(), b.grouping_key());
    }

    #[test]
    fn test_cash_movement_has_no_grouping_key() {
        let tx = CanonicalTransaction::cash(
            TransactionKind::CashDeposit,
            ts("2024-03-01 09:00:00"),
            "EUR",
            dec!(1000),
            SourceKey::native("bank-42"),
            "acct-1",
        );
        assert!(tx.instrument.is_empty());
        assert_eq!(tx.instrument.grouping_key(), None);
    }

    #[test]
    fn test_timestamp_truncated_to_second() {
        let precise = ts("2024-03-01 10:00:00") + chrono::Duration::milliseconds(750);
        let tx = buy(dec!(1));
        assert_eq!(tx.timestamp.timestamp_subsec_millis(), 0);
        let truncated = truncate_to_second(precise);
        assert_eq!(truncated, ts("2024-03-01 10:00:00"));
    }

    #[test]
    fn test_cash_kinds_have_no_remote_type() {
        assert_eq!(TransactionKind::CashDeposit.remote_type(), None);
        assert_eq!(TransactionKind::CashWithdrawal.remote_type(), None);
        assert_eq!(TransactionKind::CurrencyConvert.remote_type(), None);
        assert_eq!(
            TransactionKind::Gift.remote_type(),
            Some(RemoteActivityType::Buy)
        );
        assert_eq!(
            TransactionKind::Tax.remote_type(),
            Some(RemoteActivityType::Fee)
        );
    }
}
