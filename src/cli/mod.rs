use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "capgains")]
#[command(
    version,
    about = "Capital gains calculator with Section 104 pooling and bed-and-breakfast matching"
)]
#[command(
    long_about = "Read exchange CSV exports and raw ledger files, reconcile transfers reported \
by both sides, and compute realized gains per account under Section 104 aggregation, the \
30-day bed-and-breakfast rule, and disregard of accounts in debt."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Calculate realized gains from ledger files
    Calculate {
        /// Ledger CSV files to read (exchange exports or raw format)
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Currency conversion table files
        #[arg(short, long, num_args = 0..)]
        conversions: Vec<PathBuf>,

        /// Pre-ledger account states file
        #[arg(short, long)]
        accounts: Option<PathBuf>,

        /// Base currency for reporting (overrides the config file)
        #[arg(short, long)]
        base: Option<String>,

        /// Start of the reporting range (YYYY-MM-DD-HH-MM)
        #[arg(short, long, default_value = "1000-01-01-00-00")]
        start: String,

        /// End of the reporting range (YYYY-MM-DD-HH-MM); later rows are
        /// ignored
        #[arg(short, long, default_value = "2099-12-31-23-59")]
        end: String,

        /// Output directory for per-account ledgers and reports
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Optional TOML configuration file (priorities, policies)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Chain conversion tables (A->B, B->C, ...) into a single A->Z table
    CombineRates {
        /// Pair files in chain order
        #[arg(short, long, required = true, num_args = 2..)]
        files: Vec<PathBuf>,

        /// Output pair file
        #[arg(short, long, default_value = "combined.csv")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_args_parse() {
        let cli = Cli::try_parse_from([
            "capgains",
            "calculate",
            "-i",
            "ledgers/kraken.csv",
            "ledgers/raw.csv",
            "-c",
            "conversions/btcgbp.csv",
            "-b",
            "GBP",
            "-s",
            "2017-04-06-00-00",
        ])
        .unwrap();
        match cli.command {
            Commands::Calculate {
                input,
                conversions,
                base,
                start,
                end,
                ..
            } => {
                assert_eq!(input.len(), 2);
                assert_eq!(conversions.len(), 1);
                assert_eq!(base.as_deref(), Some("GBP"));
                assert_eq!(start, "2017-04-06-00-00");
                assert_eq!(end, "2099-12-31-23-59");
            }
            _ => panic!("expected calculate"),
        }
    }

    #[test]
    fn test_combine_requires_two_files() {
        let result = Cli::try_parse_from(["capgains", "combine-rates", "-f", "one.csv"]);
        assert!(result.is_err());
    }
}
