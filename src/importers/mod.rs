// Import module - exchange CSV parsers with header-based format detection

pub mod accounts;
pub mod bitstamp;
pub mod currencyfair;
pub mod kraken;
pub mod poloniex;
pub mod raw;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use tracing::info;

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::model::Transaction;
use crate::rates::CurrencyConverter;

pub use accounts::load_account_openings;

/// Exchanges whose name in a file stem becomes an account prefix for
/// non-base trade legs.
const EXCHANGE_PREFIXES: &[&str] = &[
    "poloniex",
    "kraken",
    "bitstamp",
    "gatecoin",
    "localbitcoins",
    "bitfinex",
    "bittrex",
    "cryptsy",
    "btcsx",
    "currencyfair",
];

/// Source file formats, detected from the exact header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Basic,
    Raw,
    PoloniexTrades,
    PoloniexTransfers,
    KrakenTrades,
    KrakenLedger,
    Bitstamp,
    CurrencyFairTransfers,
    CurrencyFairTrades,
}

pub fn detect_format(first_line: &str) -> Option<FileFormat> {
    match first_line.trim_end() {
        "Date, From-Currency, Amount, To-Currency, Value" => Some(FileFormat::Basic),
        "Date, Base Currency, Value, Trade Currency, Amount, Transfer Info" => {
            Some(FileFormat::Raw)
        }
        "Date,Market,Category,Type,Price,Amount,Total,Fee,Order Number,Base Total Less Fee,Quote Total Less Fee" => {
            Some(FileFormat::PoloniexTrades)
        }
        "Date,Currency,Amount,Address,Status" => Some(FileFormat::PoloniexTransfers),
        r#""txid","ordertxid","pair","time","type","ordertype","price","cost","fee","vol","margin","misc","ledgers""# => {
            Some(FileFormat::KrakenTrades)
        }
        r#""txid","refid","time","type","aclass","asset","amount","fee","balance""# => {
            Some(FileFormat::KrakenLedger)
        }
        "Type,Datetime,Account,Amount,Value,Rate,Fee,Sub Type" => Some(FileFormat::Bitstamp),
        r#"Reference,Date,Type,Description,Amount,Currency,Status,"Received Date","Transfer Reference""# => {
            Some(FileFormat::CurrencyFairTransfers)
        }
        "Reference,Date,Exchange Type,Order Rate,Amount Placed,Status,Amount Purchased" => {
            Some(FileFormat::CurrencyFairTrades)
        }
        _ => None,
    }
}

/// Account prefix derived from the file stem when it names a known
/// exchange.
fn account_prefix(path: &Path) -> String {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .split('.')
        .next()
        .unwrap_or("");
    if EXCHANGE_PREFIXES.contains(&stem) {
        stem.to_string()
    } else {
        String::new()
    }
}

/// Import one ledger file, detecting its format from the header line.
pub fn import_file(
    path: &Path,
    config: &Config,
    converter: &CurrencyConverter,
) -> Result<Vec<Transaction>> {
    let source = path.display().to_string();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {}", source))?;
    let first_line = text.lines().next().unwrap_or("");
    let format = detect_format(first_line).ok_or_else(|| {
        anyhow!(
            "{}: unknown file format with first line '{}'",
            source,
            first_line.trim_end()
        )
    })?;
    info!("Importing {} as {:?}", source, format);

    let mut transactions = match format {
        FileFormat::Basic => raw::parse_basic(&text, &source)?,
        FileFormat::Raw => raw::parse_raw(&text, &source, converter)?,
        FileFormat::PoloniexTrades => poloniex::parse_trades(&text, &source)?,
        FileFormat::PoloniexTransfers => poloniex::parse_transfers(&text, &source, path)?,
        FileFormat::KrakenTrades => kraken::parse_trades(&text, &source)?,
        FileFormat::KrakenLedger => {
            kraken::parse_ledger(&text, &source, &config.base_currency)?
        }
        FileFormat::Bitstamp => bitstamp::parse(&text, &source)?,
        FileFormat::CurrencyFairTransfers => {
            currencyfair::parse_transfers(&text, &source, config, converter)?
        }
        FileFormat::CurrencyFairTrades => currencyfair::parse_trades(&text, &source)?,
    };

    let prefix = account_prefix(path);
    for tx in &mut transactions {
        tx.prefix = prefix.clone();
        tx.source = source.clone();
    }
    // Rows where both native amounts are negligible carry nothing.
    transactions.retain(|tx| !tx.is_empty());
    info!("Parsed {} transactions from {}", transactions.len(), source);
    Ok(transactions)
}

/// Iterate CSV records after the header line, paired with their 1-based
/// line numbers.
pub(crate) fn csv_records(
    text: &str,
) -> impl Iterator<Item = (usize, std::result::Result<StringRecord, csv::Error>)> + '_ {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    reader
        .into_records()
        .enumerate()
        .map(|(i, record)| (i + 2, record))
}

pub(crate) fn expect_fields(
    record: &StringRecord,
    n: usize,
    source: &str,
    line: usize,
) -> Result<()> {
    if record.len() != n {
        return Err(LedgerError::malformed(
            source,
            line,
            format!("expected {} entries, got {}", n, record.len()),
        )
        .into());
    }
    Ok(())
}

pub(crate) fn parse_decimal(text: &str, source: &str, line: usize) -> Result<Decimal> {
    let cleaned = text.trim().replace(',', "");
    match Decimal::from_str(&cleaned) {
        Ok(value) => Ok(value),
        Err(e) => {
            Err(LedgerError::malformed(source, line, format!("bad number '{}': {}", text, e))
                .into())
        }
    }
}

pub(crate) fn parse_datetime(
    text: &str,
    format: &str,
    source: &str,
    line: usize,
) -> Result<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(text.trim(), format) {
        Ok(date) => Ok(date),
        Err(e) => {
            Err(LedgerError::malformed(source, line, format!("invalid date '{}': {}", text, e))
                .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_headers() {
        assert_eq!(
            detect_format("Date, Base Currency, Value, Trade Currency, Amount, Transfer Info"),
            Some(FileFormat::Raw)
        );
        assert_eq!(
            detect_format(r#""txid","refid","time","type","aclass","asset","amount","fee","balance""#),
            Some(FileFormat::KrakenLedger)
        );
        assert_eq!(detect_format("Date,Currency,Amount,Address,Status"), Some(FileFormat::PoloniexTransfers));
        assert_eq!(detect_format("Account,Stuff"), None);
    }

    #[test]
    fn test_account_prefix_from_known_stems() {
        assert_eq!(account_prefix(Path::new("ledgers/kraken.csv")), "kraken");
        assert_eq!(
            account_prefix(Path::new("ledgers/poloniex.trades.csv")),
            "poloniex"
        );
        assert_eq!(account_prefix(Path::new("ledgers/mytrades.csv")), "");
    }
}
