//! Error handling for the capital gains calculator
//!
//! Defines the fatal error taxonomy and establishes a unified Result type
//! using anyhow for context chaining and error propagation. Every variant
//! here aborts the whole run: later totals depend on full, ordered
//! processing, so a partial report is never trustworthy.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;

/// Fatal error conditions for ledger processing
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A lot was asked to absorb a quantity it cannot (wrong sign or excess
    /// magnitude). Signals a matching-algorithm defect, never recovered.
    #[error(
        "invalid lot adjustment: outstanding quantity {outstanding}, adjustment {adjustment}"
    )]
    InvalidAdjustment {
        outstanding: Decimal,
        adjustment: Decimal,
    },

    /// A required currency conversion is missing for the given hour bucket.
    #[error("no conversion rate available for {from} -> {to} at {date}")]
    NoRateAvailable {
        date: NaiveDateTime,
        from: String,
        to: String,
    },

    /// Both legs of a trade move in the same direction; the input data is
    /// corrupt.
    #[error(
        "invalid fund exchange: {amount1} {currency1} and {amount2} {currency2} move in the same direction"
    )]
    InvalidExchange {
        currency1: String,
        amount1: Decimal,
        currency2: String,
        amount2: Decimal,
    },

    /// Wrong field count or unparseable field in an input file.
    #[error("{file}:{line}: {reason}")]
    MalformedRecord {
        file: String,
        line: usize,
        reason: String,
    },
}

impl LedgerError {
    pub fn malformed(file: &str, line: usize, reason: impl Into<String>) -> Self {
        LedgerError::MalformedRecord {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }
}

/// Result type alias for ledger operations
pub type Result<T> = anyhow::Result<T>;
