//! Historical currency conversion tables
//!
//! Rate data comes from pair files: the first row names the currency pair
//! (`from, to`), every following row is `date, rate`. Rates are bucketed by
//! the hour; lookups truncate minutes. `combine_pair_files` chains several
//! pair files (A->B, B->C, ...) into one synthetic A->Z table, keeping only
//! the hours present in every link of the chain.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use chrono::{NaiveDateTime, Timelike};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use itertools::Itertools;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::model::{format_ledger_datetime, parse_ledger_datetime};

/// Truncate a datetime to its hour bucket.
pub fn hour_bucket(date: &NaiveDateTime) -> NaiveDateTime {
    date.date()
        .and_hms_opt(date.hour(), 0, 0)
        .unwrap_or(*date)
}

#[derive(Debug, Default)]
pub struct CurrencyConverter {
    tables: HashMap<(String, String), HashMap<NaiveDateTime, Decimal>>,
}

impl CurrencyConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one pair file, returning the pair it covers.
    pub fn load_pair_file(&mut self, path: &Path) -> Result<(String, String)> {
        let source = path.display().to_string();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read conversion file {}", source))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .trim(Trim::All)
            .from_reader(text.as_bytes());
        let mut records = reader.records();

        let header = records
            .next()
            .ok_or_else(|| anyhow!("conversion file {} is empty", source))?
            .with_context(|| format!("failed to read header of {}", source))?;
        if header.len() != 2 {
            return Err(LedgerError::malformed(
                &source,
                1,
                format!("expected 2 entries, got {}", header.len()),
            )
            .into());
        }
        let from = header[0].to_string();
        let to = header[1].to_string();

        let table = self
            .tables
            .entry((from.clone(), to.clone()))
            .or_default();
        let mut count = 0;
        for (i, record) in records.enumerate() {
            let line = i + 2;
            let record = record.with_context(|| format!("failed to read {}:{}", source, line))?;
            if record.len() != 2 {
                return Err(LedgerError::malformed(
                    &source,
                    line,
                    format!("expected 2 entries, got {}", record.len()),
                )
                .into());
            }
            let date = parse_ledger_datetime(&record[0])
                .map_err(|e| LedgerError::malformed(&source, line, e.to_string()))?;
            let rate = Decimal::from_str(record[1].trim())
                .map_err(|e| LedgerError::malformed(&source, line, format!("bad rate: {}", e)))?;
            table.insert(hour_bucket(&date), rate);
            count += 1;
        }
        info!("Loaded {} {}->{} rates from {}", count, from, to, source);
        Ok((from, to))
    }

    pub fn can_convert_on(&self, date: &NaiveDateTime, from: &str, to: &str) -> bool {
        self.tables
            .get(&(from.to_string(), to.to_string()))
            .map(|table| table.contains_key(&hour_bucket(date)))
            .unwrap_or(false)
    }

    /// Convert an amount at the rate recorded for the date's hour bucket.
    pub fn convert(
        &self,
        date: &NaiveDateTime,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<Decimal> {
        let rate = self
            .tables
            .get(&(from.to_string(), to.to_string()))
            .and_then(|table| table.get(&hour_bucket(date)))
            .ok_or_else(|| LedgerError::NoRateAvailable {
                date: *date,
                from: from.to_string(),
                to: to.to_string(),
            })?;
        Ok(amount * rate)
    }

    /// Any rate data at all for converting `from` into `to` on `date`?
    /// Used for priority-leg selection.
    pub fn has_rate_data(&self, date: &NaiveDateTime, from: &str, to: &str) -> bool {
        self.can_convert_on(date, from, to)
    }
}

/// Chain pair files (A->B, B->C, ...) into a single A->Z pair file.
///
/// Each output row multiplies the per-file rates for one hour bucket; hours
/// missing from any link are dropped.
pub fn combine_pair_files(inputs: &[impl AsRef<Path>], output: &Path) -> Result<(String, String)> {
    anyhow::ensure!(!inputs.is_empty(), "need at least one conversion file to combine");

    let mut chain_from: Option<String> = None;
    let mut chain_to: Option<String> = None;
    let mut data: HashMap<NaiveDateTime, (Decimal, usize)> = HashMap::new();

    for input in inputs {
        let mut link = CurrencyConverter::new();
        let (from, to) = link.load_pair_file(input.as_ref())?;
        match chain_to {
            None => chain_from = Some(from.clone()),
            Some(ref previous) if *previous == from => {}
            Some(ref previous) => {
                return Err(anyhow!(
                    "currency mismatch in chain file {}: expected {}, got {}",
                    input.as_ref().display(),
                    previous,
                    from
                ));
            }
        }
        chain_to = Some(to.clone());

        for (date, rate) in &link.tables[&(from, to)] {
            let entry = data.entry(*date).or_insert((Decimal::ONE, 0));
            entry.0 *= *rate;
            entry.1 += 1;
        }
    }

    let from = chain_from.unwrap_or_default();
    let to = chain_to.unwrap_or_default();

    let mut writer = WriterBuilder::new()
        .from_path(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    writer.write_record([from.as_str(), to.as_str()])?;
    let mut written = 0;
    for date in data.keys().sorted() {
        let (rate, count) = data[date];
        if count == inputs.len() {
            writer.write_record([format_ledger_datetime(date), rate.to_string()])?;
            written += 1;
        }
    }
    writer.flush()?;
    info!(
        "Wrote {} combined {}->{} rates to {}",
        written,
        from,
        to,
        output.display()
    );
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_pair_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn date(text: &str) -> NaiveDateTime {
        parse_ledger_datetime(text).unwrap()
    }

    #[test]
    fn test_lookup_truncates_to_hour() {
        let dir = TempDir::new().unwrap();
        let path = write_pair_file(
            &dir,
            "btcgbp.csv",
            "BTC, GBP\n2017-06-01-14-00, 1800\n2017-06-01-15-00, 1820\n",
        );
        let mut converter = CurrencyConverter::new();
        assert_eq!(
            converter.load_pair_file(&path).unwrap(),
            ("BTC".to_string(), "GBP".to_string())
        );

        assert!(converter.can_convert_on(&date("2017-06-01-14-59"), "BTC", "GBP"));
        assert!(!converter.can_convert_on(&date("2017-06-01-16-00"), "BTC", "GBP"));
        assert_eq!(
            converter
                .convert(&date("2017-06-01-14-30"), "BTC", "GBP", dec!(2))
                .unwrap(),
            dec!(3600)
        );
    }

    #[test]
    fn test_missing_rate_is_an_error() {
        let converter = CurrencyConverter::new();
        let err = converter
            .convert(&date("2017-06-01-14-30"), "BTC", "GBP", dec!(1))
            .unwrap_err();
        assert!(err.to_string().contains("no conversion rate"));
    }

    #[test]
    fn test_malformed_rows_carry_line_context() {
        let dir = TempDir::new().unwrap();
        let path = write_pair_file(
            &dir,
            "bad.csv",
            "BTC, GBP\n2017-06-01-14-00, 1800\nnot-a-date, 1\n",
        );
        let mut converter = CurrencyConverter::new();
        let err = converter.load_pair_file(&path).unwrap_err();
        assert!(err.to_string().contains(":3:"));
    }

    #[test]
    fn test_combine_chains_rates_and_drops_partial_hours() {
        let dir = TempDir::new().unwrap();
        let a = write_pair_file(
            &dir,
            "btceur.csv",
            "BTC, EUR\n2017-06-01-14-00, 2000\n2017-06-01-15-00, 2100\n",
        );
        let b = write_pair_file(
            &dir,
            "eurgbp.csv",
            "EUR, GBP\n2017-06-01-14-00, 0.9\n",
        );
        let out = dir.path().join("btcgbp.csv");
        let (from, to) = combine_pair_files(&[a, b], &out).unwrap();
        assert_eq!((from.as_str(), to.as_str()), ("BTC", "GBP"));

        let mut converter = CurrencyConverter::new();
        converter.load_pair_file(&out).unwrap();
        assert_eq!(
            converter
                .convert(&date("2017-06-01-14-00"), "BTC", "GBP", dec!(1))
                .unwrap(),
            dec!(1800.0)
        );
        // 15:00 exists only in the first link.
        assert!(!converter.can_convert_on(&date("2017-06-01-15-00"), "BTC", "GBP"));
    }

    #[test]
    fn test_combine_rejects_broken_chain() {
        let dir = TempDir::new().unwrap();
        let a = write_pair_file(&dir, "a.csv", "BTC, EUR\n2017-06-01-14-00, 2000\n");
        let b = write_pair_file(&dir, "b.csv", "USD, GBP\n2017-06-01-14-00, 0.8\n");
        let out = dir.path().join("out.csv");
        assert!(combine_pair_files(&[a, b], &out).is_err());
    }
}
