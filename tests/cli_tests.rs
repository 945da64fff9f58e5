//! CLI smoke tests
//!
//! Drive the compiled binary over real files and check the reports land on
//! disk with a sane summary.

use std::fs;
use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_calculate_writes_reports_and_summary() {
    let dir = TempDir::new().unwrap();
    let rates = write_file(
        &dir,
        "btcgbp.csv",
        "BTC, GBP\n2017-05-01-10-00, 1000\n2017-06-15-10-00, 1500\n",
    );
    let ledger = write_file(
        &dir,
        "mytrades.csv",
        "Date, Base Currency, Value, Trade Currency, Amount, Transfer Info\n\
         2017-05-01-10-00, GBP, -1000, BTC, 1,\n\
         2017-06-15-10-00, GBP, 1500, BTC, -1,\n",
    );
    let out = dir.path().join("output");

    Command::cargo_bin("capgains")
        .unwrap()
        .arg("calculate")
        .arg("-i")
        .arg(&ledger)
        .arg("-c")
        .arg(&rates)
        .arg("-o")
        .arg(&out)
        .arg("-b")
        .arg("GBP")
        .assert()
        .success()
        .stdout(predicate::str::contains("Final:"))
        .stdout(predicate::str::contains("Number of disposals = 1"))
        .stdout(predicate::str::contains("OK"));

    assert!(out.join("GBP.csv").exists());
    assert!(out.join("BTC.csv").exists());
    assert!(out.join("transfers.csv").exists());
}

#[test]
fn test_combine_rates_subcommand() {
    let dir = TempDir::new().unwrap();
    let a = write_file(&dir, "btceur.csv", "BTC, EUR\n2017-05-01-10-00, 2000\n");
    let b = write_file(&dir, "eurgbp.csv", "EUR, GBP\n2017-05-01-10-00, 0.9\n");
    let out = dir.path().join("btcgbp.csv");

    Command::cargo_bin("capgains")
        .unwrap()
        .arg("combine-rates")
        .arg("-f")
        .arg(&a)
        .arg(&b)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("BTC -> GBP"));

    let combined = fs::read_to_string(&out).unwrap();
    assert!(combined.contains("1800"));
}

#[test]
fn test_unknown_format_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let bogus = write_file(&dir, "bogus.csv", "What,Even,Is,This\n1,2,3,4\n");

    Command::cargo_bin("capgains")
        .unwrap()
        .arg("calculate")
        .arg("-i")
        .arg(&bogus)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown file format"));
}
