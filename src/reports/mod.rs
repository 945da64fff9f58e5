//! Report output
//!
//! Three artifacts after processing: one CSV ledger per account (a row per
//! lot with running balances), the transfer-reconciliation CSV, and the
//! terminal summary table with whole-portfolio totals and the
//! cost-conservation check.

use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDateTime;
use colored::Colorize;
use csv::Writer;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tabled::{settings::Style, Table, Tabled};

use crate::error::Result;
use crate::ledger::Portfolio;
use crate::model::format_ledger_datetime;
use crate::transfers::TransferRegistry;

/// Tolerance for the cost-conservation check, in base-currency units.
static CHECK_TOLERANCE: Lazy<Decimal> = Lazy::new(|| Decimal::new(1, 2));

/// Per-account figures over the reporting window.
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub account: String,
    pub currency: String,
    pub balance: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub proceeds: Decimal,
    pub chargeable: Decimal,
    pub disposals: usize,
    pub initial_cost: Decimal,
    pub warned_unowned: bool,
}

/// Whole-portfolio totals over the reporting window.
#[derive(Debug, Clone, Default)]
pub struct PortfolioTotals {
    pub cost: Decimal,
    pub initial_cost: Decimal,
    pub profit: Decimal,
    pub proceeds: Decimal,
    pub chargeable: Decimal,
    pub disposals: usize,
}

impl PortfolioTotals {
    /// Total cost at the range end should match the range start: every
    /// trade posts offsetting values across accounts. A sanity invariant,
    /// not a correctness guarantee.
    pub fn consistency_error(&self) -> Decimal {
        (self.cost - self.initial_cost).abs()
    }

    pub fn consistent(&self) -> bool {
        self.consistency_error() < *CHECK_TOLERANCE
    }
}

/// Summarize every account over `[start, end]`.
pub fn summarize(
    portfolio: &Portfolio,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> (Vec<AccountSummary>, PortfolioTotals) {
    let mut summaries = Vec::new();
    let mut totals = PortfolioTotals::default();

    for ledger in portfolio.accounts() {
        let (proceeds, disposals) = ledger.proceeds_between(start, end);
        let summary = AccountSummary {
            account: ledger.name().to_string(),
            currency: ledger.currency().to_string(),
            balance: ledger.balance_at(end),
            cost: ledger.cost_at(end),
            profit: ledger.profit_between(start, end),
            proceeds,
            chargeable: ledger.chargeable_between(start, end),
            disposals,
            initial_cost: ledger.cost_at(start),
            warned_unowned: ledger.warned_unowned(),
        };

        totals.cost += summary.cost;
        totals.initial_cost += summary.initial_cost;
        totals.profit += summary.profit;
        totals.proceeds += summary.proceeds;
        totals.chargeable += summary.chargeable;
        totals.disposals += summary.disposals;
        summaries.push(summary);
    }
    (summaries, totals)
}

/// Write one CSV ledger per account into `dir`.
pub fn write_account_ledgers(portfolio: &Portfolio, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let base = portfolio.base_currency();
    for ledger in portfolio.accounts() {
        let filename = format!("{}.csv", ledger.name().replace(['/', '\\'], "_"));
        let path = dir.join(filename);
        let mut writer = Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        writer.write_record([
            "Date",
            "Id",
            "Account",
            "Base",
            "Value",
            "Currency",
            "Amount",
            "Chargeable",
            "Profit",
            "Base Balance",
            "Currency Balance",
        ])?;
        for row in ledger.rows() {
            writer.write_record([
                format_ledger_datetime(&row.date),
                row.id.clone(),
                ledger.name().to_string(),
                base.to_string(),
                row.value.to_string(),
                ledger.currency().to_string(),
                row.quantity.to_string(),
                row.chargeable.to_string(),
                row.profit.to_string(),
                row.running_cost.to_string(),
                row.running_balance.to_string(),
            ])?;
        }
        writer.flush()?;
    }
    Ok(())
}

/// Write the transfer-reconciliation report: every registered transfer
/// with its fingerprint, source file, and matched/unmatched status.
pub fn write_transfer_report(registry: &TransferRegistry, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join("transfers.csv");
    let mut writer = Writer::from_path(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    writer.write_record(["Id", "Date", "Source", "Fingerprint", "Status", "Matched With"])?;
    for registration in registry.registrations() {
        let (status, partner) = match &registration.matched_with {
            Some(partner) => ("matched", partner.clone()),
            None => ("unmatched", String::new()),
        };
        writer.write_record([
            registration.id.clone(),
            format_ledger_datetime(&registration.date),
            registration.source.clone(),
            registration.fingerprint.clone(),
            status.to_string(),
            partner,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Profit")]
    profit: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Chargeable")]
    chargeable: String,
}

/// Render the terminal summary: per-account table, portfolio totals, and
/// the conservation check.
pub fn render_summary(
    summaries: &[AccountSummary],
    totals: &PortfolioTotals,
    base_currency: &str,
) -> String {
    let rows: Vec<SummaryRow> = summaries
        .iter()
        .map(|summary| SummaryRow {
            account: if summary.warned_unowned {
                format!("{} {}", summary.account, "!".yellow())
            } else {
                summary.account.clone()
            },
            balance: summary.balance.normalize().to_string(),
            cost: format!("{:.2}", summary.cost),
            profit: format!("{:.2}", summary.profit),
            proceeds: format!("{:.2}", summary.proceeds),
            chargeable: format!("{:.2}", summary.chargeable),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();

    let check = if totals.consistent() {
        "OK".green().bold().to_string()
    } else {
        "FAILED".red().bold().to_string()
    };

    format!(
        "{table}\n\nFinal:\n  Cost = {:.2} {base}\n  Profit = {:.2} {base}\n  Proceeds = {:.2} {base}\n  Chargeable = {:.2} {base}\n  Number of disposals = {}\n\nCheck:\n  {:.6} ({check})\n",
        totals.cost,
        totals.profit,
        totals.proceeds,
        totals.chargeable,
        totals.disposals,
        totals.consistency_error(),
        base = base_currency,
    )
}
