// Ledger module - tax lots, per-account matching/pooling, orchestration

pub mod account;
pub mod lot;
pub mod portfolio;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

pub use account::{AccountLedger, LotRow};
pub use lot::TaxLot;
pub use portfolio::Portfolio;

/// Quantities below this are treated as zero (no-op consumption, zero rate).
pub(crate) static QUANTITY_EPSILON: Lazy<Decimal> = Lazy::new(|| Decimal::new(1, 9));

/// Threshold for the one-shot disposal-of-unowned-assets warning.
pub(crate) static DEBT_TOLERANCE: Lazy<Decimal> = Lazy::new(|| Decimal::new(1, 6));

/// Base-currency values below this are noise; rows where both legs fall
/// under it are skipped entirely.
pub(crate) static VALUE_THRESHOLD: Lazy<Decimal> = Lazy::new(|| Decimal::new(1, 3));

/// Calendar-day window for bed-and-breakfast matching.
pub(crate) const MATCH_WINDOW_DAYS: i64 = 30;
