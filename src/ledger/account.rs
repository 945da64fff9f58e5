//! Per-account ledger: bed-and-breakfast matching and Section 104 pooling
//!
//! An account ledger owns every tax lot posted to one account (one
//! currency). Lots are staged by exact date-time key until `process()`
//! runs the matching algorithm once over the whole history; afterwards the
//! ledger is read-only and serves time-windowed queries.
//!
//! The matching contract: disposals are queued as they occur; a later
//! acquisition consumes queued disposals newest-first (LIFO) while the
//! disposal is no older than the 30-day window; whatever never matches is
//! absorbed into the aggregated pool. Gains always land on the disposal
//! lot.

use std::collections::{BTreeMap, VecDeque};

use anyhow::ensure;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::warn;

use super::{TaxLot, DEBT_TOLERANCE, MATCH_WINDOW_DAYS, QUANTITY_EPSILON};
use crate::error::Result;

/// One output row per processed lot, with running balances.
#[derive(Debug, Clone)]
pub struct LotRow {
    pub date: NaiveDateTime,
    pub id: String,
    pub value: Decimal,
    pub quantity: Decimal,
    pub chargeable: Decimal,
    pub profit: Decimal,
    pub running_cost: Decimal,
    pub running_balance: Decimal,
}

#[derive(Debug)]
pub struct AccountLedger {
    name: String,
    currency: String,
    is_base: bool,
    debit_pool_chargeable: bool,
    /// Lots staged by exact date-time key, waiting for `process()`.
    staged: BTreeMap<NaiveDateTime, Vec<TaxLot>>,
    /// All lots in process order (chronological, disposals first within a
    /// date key).
    lots: Vec<TaxLot>,
    /// Indices into `lots` awaiting 30-day matching, FIFO by insertion.
    queue: VecDeque<usize>,
    pool_quantity: Decimal,
    pool_cost: Decimal,
    profit: Decimal,
    chargeable_gain: Decimal,
    warned_unowned: bool,
    processed: bool,
    earliest: Option<NaiveDateTime>,
    latest: Option<NaiveDateTime>,
    rows: Vec<LotRow>,
}

impl AccountLedger {
    pub fn new(
        name: impl Into<String>,
        currency: impl Into<String>,
        is_base: bool,
        debit_pool_chargeable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
            is_base,
            debit_pool_chargeable,
            staged: BTreeMap::new(),
            lots: Vec::new(),
            queue: VecDeque::new(),
            pool_quantity: Decimal::ZERO,
            pool_cost: Decimal::ZERO,
            profit: Decimal::ZERO,
            chargeable_gain: Decimal::ZERO,
            warned_unowned: false,
            processed: false,
            earliest: None,
            latest: None,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Stage a lot for processing. Only valid before `process()`.
    pub fn add_lot(&mut self, lot: TaxLot) -> Result<()> {
        ensure!(
            !self.processed,
            "account '{}' already processed, cannot add lots",
            self.name
        );
        self.staged.entry(lot.date).or_default().push(lot);
        Ok(())
    }

    /// Run the matching/pooling algorithm over the staged history.
    ///
    /// Called exactly once, after all lots are posted; afterwards the
    /// ledger is read-only.
    pub fn process(&mut self) -> Result<()> {
        ensure!(
            !self.processed,
            "account '{}' already processed",
            self.name
        );
        self.processed = true;

        self.earliest = self.staged.keys().next().cloned();
        self.latest = self.staged.keys().next_back().cloned();

        let staged = std::mem::take(&mut self.staged);
        for (date, lots) in staged {
            self.expire_window(&date)?;

            // Same-day rule: disposals are queued before any acquisition
            // dated the same instant gets to match, preserving relative
            // order within each group.
            let (disposals, acquisitions): (Vec<TaxLot>, Vec<TaxLot>) =
                lots.into_iter().partition(|lot| lot.is_disposal());

            for lot in disposals {
                self.lots.push(lot);
                self.queue.push_back(self.lots.len() - 1);
            }
            for lot in acquisitions {
                self.lots.push(lot);
                self.match_acquisition(self.lots.len() - 1)?;
            }
        }

        // Whatever the window never matched goes to the pool, oldest first.
        while let Some(idx) = self.queue.pop_front() {
            self.absorb_into_pool(idx)?;
        }

        let mut running_cost = Decimal::ZERO;
        let mut running_balance = Decimal::ZERO;
        for lot in &self.lots {
            self.profit += lot.realized_profit();
            self.chargeable_gain += lot.realized_chargeable_gain();
            running_cost += lot.value;
            running_balance += lot.quantity;
            self.rows.push(LotRow {
                date: lot.date,
                id: lot.id.clone(),
                value: lot.value,
                quantity: lot.quantity,
                chargeable: lot.realized_chargeable_gain(),
                profit: lot.realized_profit(),
                running_cost,
                running_balance,
            });
        }
        Ok(())
    }

    /// Absorb queued disposals older than the matching window into the pool.
    fn expire_window(&mut self, date: &NaiveDateTime) -> Result<()> {
        loop {
            let expired = match self.queue.front() {
                Some(&head) => {
                    (date.date() - self.lots[head].date.date()).num_days() > MATCH_WINDOW_DAYS
                }
                None => break,
            };
            if !expired {
                break;
            }
            if let Some(idx) = self.queue.pop_front() {
                self.absorb_into_pool(idx)?;
            }
        }
        Ok(())
    }

    /// Match an acquisition backward against queued disposals, newest
    /// first. The acquisition's remainder is pooled once no disposal is
    /// left to match.
    fn match_acquisition(&mut self, acq: usize) -> Result<()> {
        loop {
            let tail = match self.queue.back() {
                Some(&tail) => tail,
                None => return self.absorb_into_pool(acq),
            };
            let satisfies_tail = self.lots[tail].outstanding_quantity()
                + self.lots[acq].outstanding_quantity()
                >= Decimal::ZERO;
            if satisfies_tail {
                // Fully consume the most recently queued disposal.
                self.queue.pop_back();
                let (quantity, value) = self.lots[tail].drain();
                let delta = self.lots[acq].partially_consume(quantity)?;
                let profit = delta - value;
                let chargeable = profit * self.lots[tail].chargeable_weight();
                self.lots[tail].record_gain(profit, chargeable);
            } else {
                // Drain what is left of the acquisition into the newest
                // disposal; the disposal stays queued with its remainder.
                let (quantity, value) = self.lots[acq].drain();
                let delta = self.lots[tail].partially_consume(quantity)?;
                let profit = delta - value;
                let chargeable = profit * self.lots[tail].chargeable_weight();
                self.lots[tail].record_gain(profit, chargeable);
                return Ok(());
            }
        }
    }

    /// Section 104 absorption of a lot's drained remainder.
    ///
    /// Three mutually exclusive cases: a disposal from an account in
    /// credit (chargeable, only the in-credit portion counts), an
    /// acquisition paying down a debt account (profit without chargeable
    /// status unless configured otherwise), or plain cost aggregation.
    fn absorb_into_pool(&mut self, idx: usize) -> Result<()> {
        let (quantity, value) = self.lots[idx].drain();

        let mut profit = Decimal::ZERO;
        let mut chargeable = Decimal::ZERO;

        if quantity < Decimal::ZERO && self.pool_quantity > Decimal::ZERO {
            let covered = self.pool_quantity.min(-quantity);
            let basis = covered * self.pool_rate();
            let gain = (value * covered / quantity) - basis;
            profit = gain;
            chargeable = gain;
            self.pool_cost =
                self.pool_cost * (self.pool_quantity + quantity) / self.pool_quantity;
        } else if quantity > Decimal::ZERO && self.pool_quantity < Decimal::ZERO {
            let covered = (-self.pool_quantity).min(quantity);
            let basis = covered * self.pool_rate();
            let paydown = (value * covered / quantity) - basis;
            profit = paydown;
            chargeable = if self.debit_pool_chargeable {
                paydown
            } else {
                paydown * self.lots[idx].chargeable_weight()
            };
            self.pool_cost =
                self.pool_cost * (self.pool_quantity + quantity) / self.pool_quantity;
        } else {
            self.pool_cost += value;
        }

        self.lots[idx].record_gain(profit, chargeable);
        self.pool_quantity += quantity;

        if self.pool_quantity < -*DEBT_TOLERANCE
            && !self.warned_unowned
            && !self.is_base
            && quantity.abs() > *DEBT_TOLERANCE
        {
            self.warned_unowned = true;
            warn!(
                "disposal of unowned assets in '{}' account: pool balance = {}, disposal = {}, date = {}",
                self.name,
                self.pool_quantity,
                quantity,
                self.lots[idx].date
            );
        }
        Ok(())
    }

    /// Aggregated acquisition rate of the pool; zero for an empty pool and
    /// never negative.
    pub fn pool_rate(&self) -> Decimal {
        if self.pool_quantity.is_zero() {
            Decimal::ZERO
        } else {
            (self.pool_cost / self.pool_quantity).max(Decimal::ZERO)
        }
    }

    pub fn pool_quantity(&self) -> Decimal {
        self.pool_quantity
    }

    pub fn pool_cost(&self) -> Decimal {
        self.pool_cost
    }

    pub fn profit(&self) -> Decimal {
        self.profit
    }

    pub fn chargeable_gain(&self) -> Decimal {
        self.chargeable_gain
    }

    pub fn warned_unowned(&self) -> bool {
        self.warned_unowned
    }

    pub fn earliest_date(&self) -> Option<NaiveDateTime> {
        self.earliest
    }

    pub fn latest_date(&self) -> Option<NaiveDateTime> {
        self.latest
    }

    /// Per-lot output rows in process order. Empty before `process()`.
    pub fn rows(&self) -> &[LotRow] {
        &self.rows
    }

    fn total_between<F>(&self, start: NaiveDateTime, end: NaiveDateTime, field: F) -> Decimal
    where
        F: Fn(&TaxLot) -> Decimal,
    {
        let mut total = Decimal::ZERO;
        for lot in &self.lots {
            if lot.date < start {
                continue;
            }
            if lot.date > end {
                break;
            }
            total += field(lot);
        }
        total
    }

    pub fn profit_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Decimal {
        self.total_between(start, end, |lot| lot.realized_profit())
    }

    pub fn chargeable_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Decimal {
        self.total_between(start, end, |lot| lot.realized_chargeable_gain())
    }

    pub fn balance_at(&self, end: NaiveDateTime) -> Decimal {
        match self.earliest {
            Some(earliest) => self.total_between(earliest, end, |lot| lot.quantity),
            None => Decimal::ZERO,
        }
    }

    pub fn cost_at(&self, end: NaiveDateTime) -> Decimal {
        match self.earliest {
            Some(earliest) => self.total_between(earliest, end, |lot| lot.value),
            None => Decimal::ZERO,
        }
    }

    /// Disposal proceeds and count over the window; a lot counts as a
    /// disposal when it carries non-negligible chargeable gain.
    pub fn proceeds_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> (Decimal, usize) {
        let mut proceeds = Decimal::ZERO;
        let mut count = 0;
        for lot in &self.lots {
            if lot.date < start {
                continue;
            }
            if lot.date > end {
                break;
            }
            if lot.realized_chargeable_gain().abs() > *QUANTITY_EPSILON {
                proceeds += -lot.value;
                count += 1;
            }
        }
        (proceeds, count)
    }
}
