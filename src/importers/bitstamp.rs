//! Bitstamp account export
//!
//! One file mixes market trades with deposits and withdrawals. Amounts are
//! written as `"0.5 BTC"` value-with-unit pairs; fees name their own
//! currency and are netted into the matching leg.

use rust_decimal::Decimal;

use super::{csv_records, expect_fields, parse_datetime, parse_decimal};
use crate::error::{LedgerError, Result};
use crate::model::Transaction;

/// Split a `"12.5 BTC"` style field into amount and currency.
fn split_amount<'a>(
    text: &'a str,
    source: &str,
    line: usize,
) -> Result<(Decimal, &'a str)> {
    let (amount, currency) = text.trim().split_once(' ').ok_or_else(|| {
        LedgerError::malformed(source, line, format!("bad amount field '{}'", text))
    })?;
    Ok((parse_decimal(amount, source, line)?, currency))
}

pub fn parse(text: &str, source: &str) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 8, source, line)?;

        let category = &record[0];
        if !matches!(category, "Market" | "Deposit" | "Withdrawal") {
            continue;
        }

        // e.g. "Sep. 13, 2014, 08:25 AM"
        let date = parse_datetime(&record[1], "%b. %d, %Y, %I:%M %p", source, line)?;
        let (mut amount1, currency1) = split_amount(&record[3], source, line)?;
        let currency1 = currency1.to_string();

        let mut tx = match category {
            "Market" => {
                let (mut amount2, currency2) = split_amount(&record[4], source, line)?;
                let currency2 = currency2.to_string();

                if !record[6].is_empty() {
                    let (fee, fee_currency) = split_amount(&record[6], source, line)?;
                    if fee_currency == currency1 {
                        amount1 -= fee;
                    } else if fee_currency == currency2 {
                        amount2 -= fee;
                    } else {
                        return Err(LedgerError::malformed(
                            source,
                            line,
                            format!("unexpected fee currency '{}'", fee_currency),
                        )
                        .into());
                    }
                }

                match &record[7] {
                    "Sell" => amount1 = -amount1,
                    "Buy" => amount2 = -amount2,
                    other => {
                        return Err(LedgerError::malformed(
                            source,
                            line,
                            format!("unexpected trade type '{}'", other),
                        )
                        .into());
                    }
                }
                Transaction::new(date, currency1, amount1, currency2, amount2)
            }
            "Deposit" => {
                let mut tx =
                    Transaction::new(date, currency1.clone(), amount1, currency1.clone(), -amount1);
                tx.account1 = format!("bitstamp{}", currency1);
                tx.flag_as_transfer();
                tx
            }
            _ => {
                // Withdrawal: funds leave the exchange-side account.
                let mut tx = Transaction::new(
                    date,
                    currency1.clone(),
                    -amount1,
                    currency1.clone(),
                    amount1,
                );
                tx.account1 = format!("bitstamp{}", currency1);
                tx.flag_as_transfer();
                tx
            }
        };
        tx.line = line;
        transactions.push(tx);
    }
    Ok(transactions)
}
