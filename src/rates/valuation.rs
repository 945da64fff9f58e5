//! Trade valuation and priority-leg selection
//!
//! Every trade gets a canonical base-currency value before posting. For a
//! two-currency trade only one leg is valued directly: the one whose
//! currency ranks higher. The base currency sits above everything, then the
//! configured priority table, then currencies that at least have rate data
//! for the trade's hour, then unknown currencies. The other leg is the
//! negation, so the two legs of one trade always cancel in base terms.

use rust_decimal::Decimal;
use tracing::warn;

use super::CurrencyConverter;
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::model::Transaction;

/// Relative disagreement between two independent conversions of the same
/// amount that triggers a warning (fee/rounding mismatch tolerance).
static MISMATCH_WARN_RATIO: once_cell::sync::Lazy<Decimal> =
    once_cell::sync::Lazy::new(|| Decimal::new(5, 2));

/// Priority rank of a currency for valuation-leg selection.
///
/// Compared lexicographically: base currency first, then the configured
/// table value, then whether any rate data exists for this hour.
fn priority(
    currency: &str,
    config: &Config,
    converter: &CurrencyConverter,
    tx: &Transaction,
) -> (bool, i32, bool) {
    (
        currency == config.base_currency,
        config.priority(currency),
        converter.has_rate_data(&tx.date, currency, &config.base_currency),
    )
}

/// Compute the base-currency values of both legs of a transaction.
pub fn value_trade(
    tx: &Transaction,
    config: &Config,
    converter: &CurrencyConverter,
) -> Result<(Decimal, Decimal)> {
    if tx.amount1 * tx.amount2 > Decimal::ZERO {
        return Err(LedgerError::InvalidExchange {
            currency1: tx.currency1.clone(),
            amount1: tx.amount1,
            currency2: tx.currency2.clone(),
            amount2: tx.amount2,
        }
        .into());
    }

    if tx.currency1 == tx.currency2 {
        return value_same_currency(tx, config, converter);
    }

    let leg1 = priority(&tx.currency1, config, converter, tx);
    let leg2 = priority(&tx.currency2, config, converter, tx);

    let (currency, amount, swapped) = if leg1 >= leg2 {
        (&tx.currency1, tx.amount1, false)
    } else {
        (&tx.currency2, tx.amount2, true)
    };

    let value = if *currency == config.base_currency {
        amount
    } else {
        converter.convert(&tx.date, currency, &config.base_currency, amount)?
    };

    if swapped {
        Ok((-value, value))
    } else {
        Ok((value, -value))
    }
}

/// Both legs share one currency (transfers, deposits): they value
/// identically up to sign. Non-base legs are converted independently and
/// the larger magnitude wins, tolerating small fee/rounding mismatch
/// between the two reported amounts.
fn value_same_currency(
    tx: &Transaction,
    config: &Config,
    converter: &CurrencyConverter,
) -> Result<(Decimal, Decimal)> {
    if tx.currency1 == config.base_currency {
        return Ok((tx.amount1, tx.amount2));
    }

    let value1 = converter.convert(&tx.date, &tx.currency1, &config.base_currency, tx.amount1)?;
    let value2 = converter.convert(&tx.date, &tx.currency2, &config.base_currency, tx.amount2)?;

    let magnitude = value1.abs().max(value2.abs());
    let smaller = value1.abs().min(value2.abs());
    if !magnitude.is_zero() && (magnitude - smaller) / magnitude > *MISMATCH_WARN_RATIO {
        warn!(
            "transfer legs disagree on {}: {} vs {} {} at {}",
            tx.currency1, value1, value2, config.base_currency, tx.date
        );
    }

    let value = if tx.amount1 < Decimal::ZERO {
        -magnitude
    } else {
        magnitude
    };
    Ok((value, -value))
}
