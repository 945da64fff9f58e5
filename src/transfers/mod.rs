//! Cross-file transfer reconciliation
//!
//! A single real-world transfer is often reported by both sides: the
//! withdrawing exchange's export and the receiving exchange's export.
//! Posting both would double-count the movement, so every transfer-flagged
//! transaction is registered here first. Registration matches it against
//! unmatched prior registrations carrying the same normalized fingerprint
//! from a *different* source file, searched over the transfer's own UTC
//! calendar day and both adjacent days to tolerate clock and timezone skew
//! between exchanges. The matched side is suppressed from ledger posting.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::debug;

/// A registered transfer and its reconciliation state.
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: String,
    pub date: NaiveDateTime,
    pub fingerprint: String,
    pub source: String,
    /// Id of the counterpart registration, once matched.
    pub matched_with: Option<String>,
}

#[derive(Debug, Default)]
pub struct TransferRegistry {
    registrations: HashMap<String, Registration>,
    /// Unmatched candidate ids bucketed by UTC calendar day.
    unmatched: HashMap<i32, Vec<String>>,
    /// Registration order, for reporting.
    order: Vec<String>,
}

/// Direction-normalized fingerprint: absolute amount rounded to 5 decimal
/// places, account names ordered by the sign of the original amount so
/// both reported directions of one transfer produce the same string.
pub fn fingerprint(amount: Decimal, account1: &str, account2: &str) -> String {
    let (from, to) = if amount >= Decimal::ZERO {
        (account1, account2)
    } else {
        (account2, account1)
    };
    format!("{:.5} {} -> {}", amount.abs().round_dp(5), from, to)
}

fn day_key(date: &NaiveDateTime) -> i32 {
    date.date().num_days_from_ce()
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transfer and try to reconcile it.
    ///
    /// Returns the id of the counterpart when this registration is the
    /// duplicate side of an already-registered transfer; the caller must
    /// then skip ledger posting. Otherwise the transfer is indexed as an
    /// unmatched candidate under its own day key.
    pub fn register(
        &mut self,
        id: String,
        date: NaiveDateTime,
        amount: Decimal,
        account1: &str,
        account2: &str,
        source: &str,
    ) -> Option<String> {
        let fingerprint = fingerprint(amount, account1, account2);
        let day = day_key(&date);

        let mut matched_with = None;
        for key in day - 1..=day + 1 {
            let registrations = &self.registrations;
            let Some(bucket) = self.unmatched.get_mut(&key) else {
                continue;
            };
            let found = bucket.iter().position(|candidate_id| {
                let candidate = &registrations[candidate_id];
                candidate.fingerprint == fingerprint && candidate.source != source
            });
            if let Some(pos) = found {
                matched_with = Some(bucket.remove(pos));
                break;
            }
        }

        if let Some(ref partner) = matched_with {
            debug!(
                "transfer {} from '{}' matches {} ({})",
                id, source, partner, fingerprint
            );
            if let Some(partner_reg) = self.registrations.get_mut(partner) {
                partner_reg.matched_with = Some(id.clone());
            }
        } else {
            self.unmatched.entry(day).or_default().push(id.clone());
        }

        self.registrations.insert(
            id.clone(),
            Registration {
                id: id.clone(),
                date,
                fingerprint,
                source: source.to_string(),
                matched_with: matched_with.clone(),
            },
        );
        self.order.push(id);
        matched_with
    }

    /// Every registration in registration order, for the reconciliation
    /// report.
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.order.iter().map(|id| &self.registrations[id])
    }

    pub fn is_matched(&self, id: &str) -> bool {
        self.registrations
            .get(id)
            .map(|reg| reg.matched_with.is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(text: &str) -> NaiveDateTime {
        crate::model::parse_ledger_datetime(text).unwrap()
    }

    #[test]
    fn test_fingerprint_symmetry() {
        // +100 from X to Y and -100 from Y to X are the same transfer.
        let forward = fingerprint(dec!(100), "X", "Y");
        let backward = fingerprint(dec!(-100), "Y", "X");
        assert_eq!(forward, backward);
        assert_eq!(forward, "100.00000 X -> Y");
    }

    #[test]
    fn test_fingerprint_rounds_to_five_places() {
        assert_eq!(
            fingerprint(dec!(0.123456789), "A", "B"),
            fingerprint(dec!(0.123460001), "A", "B"),
        );
        assert_ne!(
            fingerprint(dec!(0.12345), "A", "B"),
            fingerprint(dec!(0.12346), "A", "B"),
        );
    }

    #[test]
    fn test_duplicate_from_other_file_is_matched() {
        let mut registry = TransferRegistry::new();
        let first = registry.register(
            "t1".to_string(),
            date("2017-03-01-10-00"),
            dec!(2.5),
            "BTC",
            "krakenBTC",
            "raw.csv",
        );
        assert!(first.is_none());

        // Same transfer reported next day by the other exchange's export.
        let second = registry.register(
            "t2".to_string(),
            date("2017-03-02-09-00"),
            dec!(-2.5),
            "krakenBTC",
            "BTC",
            "kraken-ledgers.csv",
        );
        assert_eq!(second.as_deref(), Some("t1"));
        assert!(registry.is_matched("t1"));
        assert!(registry.is_matched("t2"));
    }

    #[test]
    fn test_same_file_never_matches() {
        let mut registry = TransferRegistry::new();
        registry.register(
            "t1".to_string(),
            date("2017-03-01-10-00"),
            dec!(2.5),
            "BTC",
            "krakenBTC",
            "raw.csv",
        );
        let second = registry.register(
            "t2".to_string(),
            date("2017-03-01-11-00"),
            dec!(2.5),
            "BTC",
            "krakenBTC",
            "raw.csv",
        );
        assert!(second.is_none());
        assert!(!registry.is_matched("t1"));
    }

    #[test]
    fn test_window_excludes_distant_days() {
        let mut registry = TransferRegistry::new();
        registry.register(
            "t1".to_string(),
            date("2017-03-01-10-00"),
            dec!(2.5),
            "BTC",
            "krakenBTC",
            "a.csv",
        );
        let second = registry.register(
            "t2".to_string(),
            date("2017-03-03-10-00"),
            dec!(2.5),
            "BTC",
            "krakenBTC",
            "b.csv",
        );
        assert!(second.is_none());
    }

    #[test]
    fn test_matching_is_order_independent() {
        // Whichever file is read first, exactly one side ends up matched
        // against the other and exactly one posting survives.
        for flip in [false, true] {
            let mut registry = TransferRegistry::new();
            let mut sides = vec![
                ("t1", "a.csv", dec!(1.25), "poloniexBTC", "BTC"),
                ("t2", "b.csv", dec!(-1.25), "BTC", "poloniexBTC"),
            ];
            if flip {
                sides.reverse();
            }
            let mut suppressed = 0;
            for (id, source, amount, from, to) in sides {
                if registry
                    .register(
                        id.to_string(),
                        date("2017-03-01-10-00"),
                        amount,
                        from,
                        to,
                        source,
                    )
                    .is_some()
                {
                    suppressed += 1;
                }
            }
            assert_eq!(suppressed, 1);
            assert_eq!(registry.len(), 2);
        }
    }

    #[test]
    fn test_matched_candidate_leaves_unmatched_index() {
        let mut registry = TransferRegistry::new();
        registry.register(
            "t1".to_string(),
            date("2017-03-01-10-00"),
            dec!(5),
            "A",
            "B",
            "a.csv",
        );
        registry.register(
            "t2".to_string(),
            date("2017-03-01-10-30"),
            dec!(5),
            "A",
            "B",
            "b.csv",
        );
        // A third report of the same fingerprint finds no candidate left.
        let third = registry.register(
            "t3".to_string(),
            date("2017-03-01-11-00"),
            dec!(5),
            "A",
            "B",
            "c.csv",
        );
        assert!(third.is_none());
    }
}
