//! CurrencyFair exports
//!
//! Two layouts: the transfer statement (deposits in, transfers out,
//! referral credits) and the matched-trade history. Referral credits are
//! valued through the conversion tables since no counter-leg is reported.

use rust_decimal::Decimal;

use super::{csv_records, expect_fields, parse_datetime, parse_decimal};
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::model::Transaction;
use crate::rates::CurrencyConverter;

pub fn parse_transfers(
    text: &str,
    source: &str,
    config: &Config,
    converter: &CurrencyConverter,
) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 9, source, line)?;

        if &record[6] != "confirmed" {
            continue;
        }

        let date = parse_datetime(&record[7], "%d-%b-%Y %H:%M", source, line)?;
        let currency2 = record[5].to_string();
        let amount2 = parse_decimal(&record[4], source, line)?;

        let mut tx = match &record[2] {
            "Deposit In" | "Transfer Out" => {
                let mut tx = Transaction::new(
                    date,
                    currency2.clone(),
                    -amount2,
                    currency2.clone(),
                    amount2,
                );
                tx.account2 = format!("currencyfair{}", currency2);
                tx.flag_as_transfer();
                tx
            }
            "Referral Success" => {
                let amount1 = -converter.convert(
                    &date,
                    &currency2,
                    &config.base_currency,
                    amount2,
                )?;
                Transaction::new(
                    date,
                    config.base_currency.clone(),
                    amount1,
                    currency2,
                    amount2,
                )
            }
            other => {
                return Err(LedgerError::malformed(
                    source,
                    line,
                    format!("unexpected transfer type '{}'", other),
                )
                .into());
            }
        };
        tx.line = line;
        transactions.push(tx);
    }
    Ok(transactions)
}

pub fn parse_trades(text: &str, source: &str) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (line, record) in csv_records(text) {
        let record = record?;
        expect_fields(&record, 7, source, line)?;

        if &record[5] != "matched" {
            continue;
        }

        let date = parse_datetime(&record[1], "%d-%b-%Y %H:%M", source, line)?;
        let (given, currency1) = record[4].split_once(' ').ok_or_else(|| {
            LedgerError::malformed(source, line, format!("bad amount '{}'", &record[4]))
        })?;
        let (received, currency2) = record[6].split_once(' ').ok_or_else(|| {
            LedgerError::malformed(source, line, format!("bad amount '{}'", &record[6]))
        })?;
        let amount1 = -parse_decimal(given, source, line)?;
        let amount2 = parse_decimal(received, source, line)?;

        let mut tx = Transaction::new(date, currency1, amount1, currency2, amount2);
        tx.line = line;
        transactions.push(tx);
    }
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const TRANSFERS_HEADER: &str = r#"Reference,Date,Type,Description,Amount,Currency,Status,"Received Date","Transfer Reference""#;
    const TRADES_HEADER: &str =
        "Reference,Date,Exchange Type,Order Rate,Amount Placed,Status,Amount Purchased";

    fn setup() -> (Config, CurrencyConverter) {
        let config = Config::default();
        let mut converter = CurrencyConverter::new();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("eurgbp.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"EUR, GBP\n2015-03-02-10-00, 0.8\n").unwrap();
        converter.load_pair_file(&path).unwrap();
        (config, converter)
    }

    #[test]
    fn test_parse_deposit_in() {
        let (config, converter) = setup();
        let text = format!(
            "{}\nR1,01-Mar-2015 09:00,Deposit In,desc,\"1,000.00\",EUR,confirmed,02-Mar-2015 10:30,T1\n",
            TRANSFERS_HEADER
        );
        let txs = parse_transfers(&text, "currencyfair.csv", &config, &converter).unwrap();
        assert_eq!(txs.len(), 1);
        assert!(txs[0].is_transfer);
        assert_eq!(txs[0].amount1, dec!(-1000.00));
        assert_eq!(txs[0].account2, "currencyfairEUR");
    }

    #[test]
    fn test_parse_referral_converts_to_base() {
        let (config, converter) = setup();
        let text = format!(
            "{}\nR1,01-Mar-2015 09:00,Referral Success,desc,30.00,EUR,confirmed,02-Mar-2015 10:30,T1\n",
            TRANSFERS_HEADER
        );
        let txs = parse_transfers(&text, "currencyfair.csv", &config, &converter).unwrap();
        assert!(!txs[0].is_transfer);
        assert_eq!(txs[0].currency1, "GBP");
        assert_eq!(txs[0].amount1, dec!(-24.0));
    }

    #[test]
    fn test_unconfirmed_rows_skipped() {
        let (config, converter) = setup();
        let text = format!(
            "{}\nR1,01-Mar-2015 09:00,Deposit In,desc,100,EUR,pending,02-Mar-2015 10:30,T1\n",
            TRANSFERS_HEADER
        );
        let txs = parse_transfers(&text, "currencyfair.csv", &config, &converter).unwrap();
        assert!(txs.is_empty());
    }

    #[test]
    fn test_parse_matched_trade() {
        let text = format!(
            "{}\nR1,02-Mar-2015 10:30,Market,1.3860,\"2,000.00 EUR\",matched,\"1,440.00 GBP\"\n",
            TRADES_HEADER
        );
        let txs = parse_trades(&text, "currencyfair.csv").unwrap();
        assert_eq!(txs[0].currency1, "EUR");
        assert_eq!(txs[0].amount1, dec!(-2000.00));
        assert_eq!(txs[0].currency2, "GBP");
        assert_eq!(txs[0].amount2, dec!(1440.00));
    }
}
