//! Poloniex exports
//!
//! Trade history rows carry both legs net of fees; margin activity is
//! tracked under a suffixed currency so borrowed positions pool apart from
//! spot holdings. Deposit/withdrawal history files share one header, so
//! the direction comes from the file stem.

use std::path::Path;

use anyhow::anyhow;
use rust_decimal::Decimal;
use tracing::warn;

use super::{csv_records, expect_fields, parse_datetime, parse_decimal};
use crate::error::{LedgerError, Result};
use crate::model::Transaction;
use crate::rates::converter::hour_bucket;

pub fn parse_trades(text: &str, source: &str) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 11, source, line)?;

        let date = parse_datetime(&record[0], "%Y-%m-%d %H:%M:%S", source, line)?;
        let (currency1, currency2) = record[1].split_once('/').ok_or_else(|| {
            LedgerError::malformed(source, line, format!("bad market '{}'", &record[1]))
        })?;
        let mut currency1 = currency1.to_string();
        let currency2 = currency2.to_string();

        let mut amount1 = parse_decimal(&record[10], source, line)?;
        let amount2 = parse_decimal(&record[9], source, line)?;

        match &record[2] {
            "Exchange" => {}
            "Margin trade" => currency1.push_str("margin"),
            "Settlement" => {
                // Settlements pay off lending fees; the position leg is
                // burned with no quantity received.
                currency1.push_str("margin");
                amount1 = Decimal::ZERO;
            }
            other => {
                return Err(LedgerError::malformed(
                    source,
                    line,
                    format!("unknown trade category '{}'", other),
                )
                .into());
            }
        }

        match &record[3] {
            "Buy" => {
                if amount1 < Decimal::ZERO || amount2 > Decimal::ZERO {
                    return Err(LedgerError::malformed(
                        source,
                        line,
                        format!(
                            "inconsistent Buy: {} {} <> {} {}",
                            amount1, currency1, amount2, currency2
                        ),
                    )
                    .into());
                }
            }
            "Sell" => {
                if amount1 > Decimal::ZERO || amount2 < Decimal::ZERO {
                    return Err(LedgerError::malformed(
                        source,
                        line,
                        format!(
                            "inconsistent Sell: {} {} <> {} {}",
                            amount1, currency1, amount2, currency2
                        ),
                    )
                    .into());
                }
            }
            other => {
                return Err(LedgerError::malformed(
                    source,
                    line,
                    format!("unknown trade type '{}'", other),
                )
                .into());
            }
        }

        let mut tx = Transaction::new(date, currency1, amount1, currency2, amount2);
        tx.line = line;
        transactions.push(tx);
    }
    Ok(transactions)
}

pub fn parse_transfers(text: &str, source: &str, path: &Path) -> Result<Vec<Transaction>> {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .to_lowercase();
    let is_deposit = if stem.contains("deposit") {
        true
    } else if stem.contains("withdraw") {
        false
    } else {
        return Err(anyhow!(
            "{}: cannot tell deposits from withdrawals; name the file accordingly",
            source
        ));
    };

    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 5, source, line)?;

        let status = &record[4];
        if !status.contains("COMPLETE") || status.contains("ERROR") {
            warn!(
                "transfer not marked COMPLETE (or marked ERROR) on line {} in '{}'",
                line, source
            );
            continue;
        }

        let date = hour_bucket(&parse_datetime(
            &record[0],
            "%Y-%m-%d %H:%M:%S",
            source,
            line,
        )?);
        let currency = record[1].to_string();
        let amount = parse_decimal(&record[2], source, line)?;

        let mut tx = Transaction::new(date, currency.clone(), -amount, currency.clone(), amount);
        if is_deposit {
            tx.account2 = format!("poloniex{}", currency);
        } else {
            tx.account1 = format!("poloniex{}", currency);
        }
        tx.flag_as_transfer();
        tx.line = line;
        transactions.push(tx);
    }
    Ok(transactions)
}
