//! Kraken exports
//!
//! Two layouts: the trade history (13 columns, one row per fill) and the
//! account ledger (9 columns), whose deposit/withdrawal rows become
//! transfer-flagged records against the external account and whose fee
//! rows become zero-base-valued entries.

use rust_decimal::Decimal;

use super::{csv_records, expect_fields, parse_datetime, parse_decimal};
use crate::error::{LedgerError, Result};
use crate::model::Transaction;
use crate::rates::converter::hour_bucket;

/// Kraken pair codes to currency legs.
fn translate_pair(pair: &str) -> Option<(&'static str, &'static str)> {
    match pair {
        "XXBTZEUR" => Some(("BTC", "EUR")),
        "XXBTZUSD" => Some(("BTC", "USD")),
        "XXBTZGBP" => Some(("BTC", "GBP")),
        "XETHZEUR" => Some(("ETH", "EUR")),
        "XETHZUSD" => Some(("ETH", "USD")),
        "XETHZGBP" => Some(("ETH", "GBP")),
        "XETHXXBT" => Some(("ETH", "BTC")),
        "XETCZEUR" => Some(("ETC", "EUR")),
        "XETCXXBT" => Some(("ETC", "BTC")),
        "XETCXETH" => Some(("ETC", "ETH")),
        _ => None,
    }
}

/// Kraken asset codes to currency names.
fn translate_asset(asset: &str) -> Option<&'static str> {
    match asset {
        "ZEUR" => Some("EUR"),
        "ZUSD" => Some("USD"),
        "ZGBP" => Some("GBP"),
        "XETH" => Some("ETH"),
        "XXBT" => Some("BTC"),
        "XETC" => Some("ETC"),
        "XXLM" => Some("XLM"),
        _ => None,
    }
}

pub fn parse_trades(text: &str, source: &str) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 13, source, line)?;

        let date = parse_datetime(&record[3], "%Y-%m-%d %H:%M:%S%.f", source, line)?;
        let cost = parse_decimal(&record[7], source, line)?;
        let fee = parse_decimal(&record[8], source, line)?;
        let volume = parse_decimal(&record[9], source, line)?;

        // Fees above the advertised schedule suggest a misread column.
        if !cost.is_zero()
            && fee / cost > Decimal::new(5, 3)
            && fee > Decimal::new(1, 5)
        {
            return Err(LedgerError::malformed(
                source,
                line,
                format!("unexpected fee schedule ({} on {})", fee / cost, cost),
            )
            .into());
        }

        let (currency1, currency2) = translate_pair(&record[2]).ok_or_else(|| {
            LedgerError::malformed(
                source,
                line,
                format!("unknown kraken pair '{}'", &record[2]),
            )
        })?;

        let mut amount1 = volume;
        let mut amount2 = cost - fee;
        match &record[4] {
            "sell" => amount1 = -amount1,
            "buy" => amount2 = -amount2,
            other => {
                return Err(LedgerError::malformed(
                    source,
                    line,
                    format!("unexpected kraken trade type '{}'", other),
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

pub fn parse_ledger(text: &str, source: &str, base_currency: &str) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 9, source, line)?;

        let entry_type = &record[3];
        let asset = &record[5];
        if asset == "KFEE"
            || !matches!(entry_type, "deposit" | "withdrawal" | "transfer")
        {
            continue;
        }

        let date = hour_bucket(&parse_datetime(
            &record[2],
            "%Y-%m-%d %H:%M:%S%.f",
            source,
            line,
        )?);
        let currency = translate_asset(asset).ok_or_else(|| {
            LedgerError::malformed(source, line, format!("unknown kraken asset '{}'", asset))
        })?;
        let amount = parse_decimal(&record[6], source, line)?;

        let mut tx = match entry_type {
            "deposit" | "withdrawal" => {
                // The exchange-side leg moves by `amount`; the external
                // account mirrors it.
                let mut tx = Transaction::new(date, currency, -amount, currency, amount);
                tx.account2 = format!("kraken{}", currency);
                tx.flag_as_transfer();
                tx
            }
            // In-kind grants arrive with no base-currency cost.
            _ => Transaction::new(date, base_currency, Decimal::ZERO, currency, amount),
        };
        tx.line = line;
        transactions.push(tx);

        let fee = parse_decimal(&record[7], source, line)?.abs();
        if fee > Decimal::ZERO {
            let mut fee_tx =
                Transaction::new(date, base_currency, Decimal::ZERO, currency, -fee);
            fee_tx.line = line;
            transactions.push(fee_tx);
        }
    }
    Ok(transactions)
}
