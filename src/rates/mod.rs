// Rates module - historical conversion tables and trade valuation

pub mod converter;
pub mod valuation;

pub use converter::{combine_pair_files, CurrencyConverter};
pub use valuation::value_trade;
