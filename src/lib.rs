//! Capgains - realized capital gains calculator
//!
//! This library reads chronological trade, transfer, and deposit records,
//! reconciles transfers reported independently by two source files, and
//! computes realized gains per currency account under Section 104
//! aggregation, the 30-day bed-and-breakfast rule, and disregard of
//! accounts in debt.

pub mod cli;
pub mod config;
pub mod error;
pub mod importers;
pub mod ledger;
pub mod model;
pub mod rates;
pub mod reports;
pub mod transfers;
