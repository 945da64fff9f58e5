//! Pre-ledger account bootstrap file
//!
//! Headerless rows of `account, currency, amount, base-currency, value`
//! describing positions held before the first imported transaction. The
//! stated base currency must match the configured one; anything else means
//! the file belongs to a different run.

use std::fs;
use std::path::Path;

use anyhow::Context;
use csv::{ReaderBuilder, Trim};

use crate::error::{LedgerError, Result};
use crate::model::AccountOpening;

pub fn load_account_openings(path: &Path, base_currency: &str) -> Result<Vec<AccountOpening>> {
    let source = path.display().to_string();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read accounts file {}", source))?;

    let reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut openings = Vec::new();
    for (i, record) in reader.into_records().enumerate() {
        let line = i + 1;
        let record = record.with_context(|| format!("failed to read {}:{}", source, line))?;
        if record.len() != 5 {
            return Err(LedgerError::malformed(
                &source,
                line,
                format!("expected 5 entries, got {}", record.len()),
            )
            .into());
        }
        if &record[3] != base_currency {
            return Err(LedgerError::malformed(
                &source,
                line,
                format!(
                    "invalid base currency '{}' for account (expected {})",
                    &record[3], base_currency
                ),
            )
            .into());
        }
        openings.push(AccountOpening {
            account: record[0].to_string(),
            currency: record[1].to_string(),
            amount: super::parse_decimal(&record[2], &source, line)?,
            value: super::parse_decimal(&record[4], &source, line)?,
        });
    }
    Ok(openings)
}
