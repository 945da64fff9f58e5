//! Canonical transaction records
//!
//! Every importer lowers its source format into `Transaction`; the ledger
//! layer never sees exchange-specific fields. Dates are UTC at minute
//! precision throughout.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::Result;

/// Ledger date format used by raw files, CLI arguments, and reports.
pub const DATE_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Parse a ledger datetime (`YYYY-MM-DD-HH-MM`, UTC).
pub fn parse_ledger_datetime(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid date '{}': {}", text.trim(), e))
}

/// Format a datetime in the ledger date format.
pub fn format_ledger_datetime(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// A parsed two-legged transaction: trade, deposit, or transfer.
///
/// `amount1 * amount2 <= 0` is required (negative marks the from-currency
/// leg); a same-direction pair is rejected as corrupt input at posting.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub date: NaiveDateTime,
    pub currency1: String,
    pub amount1: Decimal,
    pub currency2: String,
    pub amount2: Decimal,
    /// Account receiving leg 1; defaults to the leg's currency name.
    pub account1: String,
    /// Account receiving leg 2; defaults to the leg's currency name.
    pub account2: String,
    pub is_transfer: bool,
    /// Exchange prefix derived from the source file stem, applied to
    /// non-base, non-transfer legs at posting. Empty for unknown sources.
    pub prefix: String,
    /// Source file name, used for transfer deduplication and error context.
    pub source: String,
    /// Line number in the source file.
    pub line: usize,
}

impl Transaction {
    pub fn new(
        date: NaiveDateTime,
        currency1: impl Into<String>,
        amount1: Decimal,
        currency2: impl Into<String>,
        amount2: Decimal,
    ) -> Self {
        let currency1 = currency1.into();
        let currency2 = currency2.into();
        Self {
            date,
            account1: currency1.clone(),
            account2: currency2.clone(),
            currency1,
            amount1,
            currency2,
            amount2,
            is_transfer: false,
            prefix: String::new(),
            source: String::new(),
            line: 0,
        }
    }

    pub fn flag_as_transfer(&mut self) {
        self.is_transfer = true;
    }

    /// Both native amounts negligible; such rows carry no information.
    pub fn is_empty(&self) -> bool {
        let threshold = Decimal::new(1, 8);
        self.amount1.abs() < threshold && self.amount2.abs() < threshold
    }
}

/// A pre-ledger account state from the bootstrap file: an opening position
/// of `amount` units carried at `value` base-currency cost.
#[derive(Debug, Clone)]
pub struct AccountOpening {
    /// Account name; empty means "use the currency name".
    pub account: String,
    pub currency: String,
    pub amount: Decimal,
    pub value: Decimal,
}

impl AccountOpening {
    pub fn account_name(&self) -> &str {
        if self.account.is_empty() {
            &self.currency
        } else {
            &self.account
        }
    }
}
