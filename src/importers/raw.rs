//! Raw and basic ledger formats
//!
//! The raw format is this tool's own interchange layout: one row per
//! transaction with explicit base/trade legs, optional blank values
//! inferred through the conversion tables, and an `A->B` transfer tag.
//! The basic format is the minimal five-column trade list.

use super::{csv_records, expect_fields, parse_datetime, parse_decimal};
use crate::error::{LedgerError, Result};
use crate::model::{parse_ledger_datetime, Transaction};
use crate::rates::CurrencyConverter;

pub fn parse_basic(text: &str, source: &str) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 5, source, line)?;
        let date = parse_datetime(&record[0], "%d/%m/%Y %H:%M:%S", source, line)?;
        let amount1 = parse_decimal(&record[2], source, line)?;
        let amount2 = parse_decimal(&record[4], source, line)?;
        let mut tx = Transaction::new(date, &record[1], amount1, &record[3], amount2);
        tx.line = line;
        transactions.push(tx);
    }
    Ok(transactions)
}

pub fn parse_raw(
    text: &str,
    source: &str,
    converter: &CurrencyConverter,
) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 6, source, line)?;

        let date = parse_ledger_datetime(&record[0])
            .map_err(|e| LedgerError::malformed(source, line, e.to_string()))?;
        let currency1 = record[1].to_string();
        let currency2 = record[3].to_string();

        let value1 = if record[2].is_empty() {
            None
        } else {
            Some(parse_decimal(&record[2], source, line)?)
        };
        let value2 = if record[4].is_empty() {
            None
        } else {
            Some(parse_decimal(&record[4], source, line)?)
        };

        // A blank value is inferred through the conversion tables from the
        // other leg.
        let (amount1, amount2) = match (value1, value2) {
            (None, None) => {
                return Err(LedgerError::malformed(
                    source,
                    line,
                    "no values for transaction",
                )
                .into());
            }
            (Some(amount1), Some(amount2)) => (amount1, amount2),
            (None, Some(amount2)) => {
                let amount1 = -converter.convert(&date, &currency2, &currency1, amount2)?;
                (amount1, amount2)
            }
            (Some(amount1), None) => {
                let amount2 = -converter.convert(&date, &currency1, &currency2, amount1)?;
                (amount1, amount2)
            }
        };

        let mut tx = Transaction::new(date, currency1, amount1, currency2, amount2);
        tx.line = line;

        let transfer_info = record[5].to_string();
        if !transfer_info.is_empty() {
            if amount1 != -amount2 || tx.currency1 != tx.currency2 {
                return Err(LedgerError::malformed(
                    source,
                    line,
                    format!(
                        "invalid account transfer '{}': {} {} -> {} {}",
                        transfer_info, amount1, tx.currency1, amount2, tx.currency2
                    ),
                )
                .into());
            }
            let (from, to) = transfer_info.split_once("->").ok_or_else(|| {
                LedgerError::malformed(
                    source,
                    line,
                    format!("invalid transfer info '{}'", transfer_info),
                )
            })?;
            tx.account1 = format!("{}{}", from, tx.currency1);
            tx.account2 = format!("{}{}", to, tx.currency2);
            tx.flag_as_transfer();
        }

        transactions.push(tx);
    }
    Ok(transactions)
}
