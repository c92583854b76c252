//! Timestamp Collision Resolver
//!
//! The remote ledger requires strictly increasing timestamps per instrument to
//! compute historical returns. Broker exports frequently stamp several fills
//! of the same order with the identical second, so colliding transactions are
//! shifted forward deterministically before they are compared or sent.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::domain::entities::transaction::CanonicalTransaction;

/// Enforce strictly increasing timestamps within each instrument.
///
/// Transactions of one instrument are visited in (timestamp, source key)
/// order; any timestamp at or below the previously accepted one is reassigned
/// to one second past it. A single collision therefore cascades: every
/// same-instant or near-future transaction behind it shifts by one second.
/// Note that ties are broken by source key, not by input position, so the
/// assignment does not depend on the order the parser happened to emit rows
/// in. Different instruments never affect each other, and cash-only movements
/// (no instrument) pass through untouched because remote return computation
/// is instrument-scoped.
///
/// Idempotent: input that is already strictly increasing per instrument comes
/// back unchanged. The position of every transaction in the returned vector
/// is the same as in the input.
pub fn resolve_collisions(
    mut transactions: Vec<CanonicalTransaction>,
) -> Vec<CanonicalTransaction> {
    let mut by_instrument: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, tx) in transactions.iter().enumerate() {
        if let Some(key) = tx.instrument.grouping_key() {
            by_instrument.entry(key).or_default().push(idx);
        }
    }

    for indices in by_instrument.values_mut() {
        indices.sort_by(|&a, &b| {
            (transactions[a].timestamp, &transactions[a].source_key)
                .cmp(&(transactions[b].timestamp, &transactions[b].source_key))
        });

        let mut last: Option<DateTime<Utc>> = None;
        for &idx in indices.iter() {
            let timestamp = transactions[idx].timestamp;
            let assigned = match last {
                Some(prev) if timestamp <= prev => prev + Duration::seconds(1),
                _ => timestamp,
            };
            transactions[idx].timestamp = assigned;
            last = Some(assigned);
        }
    }

    transactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::transaction::{InstrumentRef, SourceKey, TransactionKind};
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn ts(secs: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(secs, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    fn tx(symbol: &str, when: &str, key: &str) -> CanonicalTransaction {
        CanonicalTransaction::new(
            TransactionKind::Buy,
            ts(when),
            "USD",
            InstrumentRef::single("TICKER", symbol),
            dec!(1),
            dec!(100),
            dec!(100),
            SourceKey::native(key),
            "acct-1",
        )
    }

    fn cash(when: &str, key: &str) -> CanonicalTransaction {
        CanonicalTransaction::cash(
            TransactionKind::CashDeposit,
            ts(when),
            "USD",
            dec!(500),
            SourceKey::native(key),
            "acct-1",
        )
    }

    #[test]
    fn test_empty_input_is_noop() {
        assert!(resolve_collisions(Vec::new()).is_empty());
    }

    #[test]
    fn test_single_element_is_noop() {
        let input = vec![tx("AAPL", "2024-03-01 10:00:00", "k1")];
        let output = resolve_collisions(input.clone());
        assert_eq!(output, input);
    }

    #[test]
    fn test_triple_collision_cascades() {
        // t, t, t+1 becomes t, t+1, t+2 in original order
        let input = vec![
            tx("AAPL", "2024-03-01 10:00:00", "k1"),
            tx("AAPL", "2024-03-01 10:00:00", "k2"),
            tx("AAPL", "2024-03-01 10:00:01", "k3"),
        ];
        let output = resolve_collisions(input);

        assert_eq!(output[0].timestamp, ts("2024-03-01 10:00:00"));
        assert_eq!(output[1].timestamp, ts("2024-03-01 10:00:01"));
        assert_eq!(output[2].timestamp, ts("2024-03-01 10:00:02"));
        assert_eq!(output[0].source_key, SourceKey::native("k1"));
        assert_eq!(output[1].source_key, SourceKey::native("k2"));
        assert_eq!(output[2].source_key, SourceKey::native("k3"));
    }

    #[test]
    fn test_instruments_do_not_affect_each_other() {
        let input = vec![
            tx("AAPL", "2024-03-01 10:00:00", "k1"),
            tx("MSFT", "2024-03-01 10:00:00", "k2"),
        ];
        let output = resolve_collisions(input);
        assert_eq!(output[0].timestamp, ts("2024-03-01 10:00:00"));
        assert_eq!(output[1].timestamp, ts("2024-03-01 10:00:00"));
    }

    #[test]
    fn test_cash_movements_exempt() {
        let input = vec![
            cash("2024-03-01 09:00:00", "c1"),
            cash("2024-03-01 09:00:00", "c2"),
        ];
        let output = resolve_collisions(input.clone());
        assert_eq!(output, input);
    }

    #[test]
    fn test_idempotent_on_distinct_input() {
        let input = vec![
            tx("AAPL", "2024-03-01 10:00:00", "k1"),
            tx("AAPL", "2024-03-01 10:00:00", "k2"),
            tx("AAPL", "2024-03-01 10:00:05", "k3"),
        ];
        let once = resolve_collisions(input);
        let twice = resolve_collisions(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_strictly_increasing_per_instrument() {
        let input = vec![
            tx("AAPL", "2024-03-01 10:00:00", "k1"),
            tx("AAPL", "2024-03-01 10:00:00", "k2"),
            tx("AAPL", "2024-03-01 10:00:00", "k3"),
            tx("AAPL", "2024-03-01 10:00:02", "k4"),
        ];
        let output = resolve_collisions(input);
        let mut timestamps: Vec<_> = output.iter().map(|t| t.timestamp).collect();
        let sorted = {
            let mut s = timestamps.clone();
            s.sort();
            s
        };
        assert_eq!(timestamps, sorted);
        timestamps.dedup();
        assert_eq!(timestamps.len(), output.len());
    }

    #[test]
    fn test_original_vector_order_preserved() {
        // Later file position but earlier timestamp; positions must not move.
        let input = vec![
            tx("AAPL", "2024-03-01 11:00:00", "k-late"),
            tx("AAPL", "2024-03-01 10:00:00", "k-early"),
        ];
        let output = resolve_collisions(input);
        assert_eq!(output[0].source_key, SourceKey::native("k-late"));
        assert_eq!(output[1].source_key, SourceKey::native("k-early"));
    }
}
