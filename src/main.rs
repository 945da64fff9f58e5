use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;

use capgains::cli::{Cli, Commands};
use capgains::config::Config;
use capgains::importers;
use capgains::ledger::Portfolio;
use capgains::model::parse_ledger_datetime;
use capgains::rates::{self, CurrencyConverter};
use capgains::reports;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Calculate {
            input,
            conversions,
            accounts,
            base,
            start,
            end,
            output,
            config,
        } => handle_calculate(
            input,
            conversions,
            accounts,
            base,
            &start,
            &end,
            output,
            config,
        ),

        Commands::CombineRates { files, output } => {
            let (from, to) = rates::combine_pair_files(&files, &output)?;
            println!(
                "{} Combined {} files into a {} -> {} table: {}",
                "✓".green().bold(),
                files.len(),
                from,
                to,
                output.display()
            );
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_calculate(
    input: Vec<PathBuf>,
    conversions: Vec<PathBuf>,
    accounts: Option<PathBuf>,
    base: Option<String>,
    start: &str,
    end: &str,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path.as_deref())?;
    if let Some(base) = base {
        config.base_currency = base;
    }
    let start = parse_ledger_datetime(start)?;
    let end = parse_ledger_datetime(end)?;

    let mut converter = CurrencyConverter::new();
    for file in &conversions {
        converter.load_pair_file(file)?;
    }

    let mut portfolio = Portfolio::new(&config, &converter);

    if let Some(accounts_path) = accounts {
        let openings =
            importers::load_account_openings(&accounts_path, &config.base_currency)?;
        info!(
            "Bootstrapping {} account openings from {}",
            openings.len(),
            accounts_path.display()
        );
        for opening in &openings {
            portfolio.open_account(opening, start)?;
        }
    }

    let mut posted = 0;
    for file in &input {
        let transactions = importers::import_file(file, &config, &converter)?;
        for tx in &transactions {
            if tx.date > end {
                continue;
            }
            portfolio.post(tx)?;
            posted += 1;
        }
    }
    info!("Posted {} transactions", posted);

    portfolio.process_all()?;

    reports::write_account_ledgers(&portfolio, &output)?;
    reports::write_transfer_report(portfolio.transfers(), &output)?;

    let (summaries, totals) = reports::summarize(&portfolio, start, end);
    println!(
        "{}",
        reports::render_summary(&summaries, &totals, &config.base_currency)
    );
    println!(
        "{} Per-account ledgers and transfer report written to {}",
        "✓".green().bold(),
        output.display()
    );
    Ok(())
}
