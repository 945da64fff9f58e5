//! Tax lots
//!
//! A lot is one transaction leg posted to one currency's ledger: a signed
//! quantity in the native currency and a signed base-currency value fixed
//! at creation. Matching and pooling drain the outstanding remainder toward
//! zero; realized gains accumulate on the lot that was disposed.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::QUANTITY_EPSILON;
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone)]
pub struct TaxLot {
    /// Transaction id, shared by both legs of the originating transaction.
    pub id: String,
    pub date: NaiveDateTime,
    /// Signed native quantity; negative is a disposal.
    pub quantity: Decimal,
    /// Signed base-currency value, sign matched to `quantity` at creation.
    pub value: Decimal,
    /// Historical base-per-unit rate, fixed at creation and used for all
    /// later partial consumption.
    rate: Decimal,
    outstanding_quantity: Decimal,
    outstanding_value: Decimal,
    /// 1 for lots that originated as disposals, else 0; deposits never
    /// generate chargeable gain directly.
    chargeable_weight: Decimal,
    realized_profit: Decimal,
    realized_chargeable_gain: Decimal,
}

impl TaxLot {
    pub fn new(id: String, date: NaiveDateTime, quantity: Decimal, value: Decimal) -> Self {
        // Force the value's sign to match the quantity's.
        let value = if quantity.is_sign_negative() && !quantity.is_zero() {
            -value.abs()
        } else {
            value.abs()
        };
        let rate = if quantity.abs() < *QUANTITY_EPSILON {
            Decimal::ZERO
        } else {
            value / quantity
        };
        let chargeable_weight = if quantity < Decimal::ZERO {
            Decimal::ONE
        } else {
            Decimal::ZERO
        };
        Self {
            id,
            date,
            quantity,
            value,
            rate,
            outstanding_quantity: quantity,
            outstanding_value: value,
            chargeable_weight,
            realized_profit: Decimal::ZERO,
            realized_chargeable_gain: Decimal::ZERO,
        }
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn outstanding_quantity(&self) -> Decimal {
        self.outstanding_quantity
    }

    pub fn outstanding_value(&self) -> Decimal {
        self.outstanding_value
    }

    pub fn chargeable_weight(&self) -> Decimal {
        self.chargeable_weight
    }

    pub fn realized_profit(&self) -> Decimal {
        self.realized_profit
    }

    pub fn realized_chargeable_gain(&self) -> Decimal {
        self.realized_chargeable_gain
    }

    pub fn is_disposal(&self) -> bool {
        self.quantity < Decimal::ZERO
    }

    /// Consume `quantity` units of the outstanding remainder.
    ///
    /// `quantity` must oppose the remainder's sign and must not exceed it in
    /// magnitude; either violation is a matching-algorithm bug. Returns the
    /// value delta `quantity * rate` after applying it to the outstanding
    /// value. Negligible quantities are a no-op.
    pub fn partially_consume(&mut self, quantity: Decimal) -> Result<Decimal> {
        if quantity.abs() < *QUANTITY_EPSILON {
            return Ok(Decimal::ZERO);
        }
        if self.outstanding_quantity * quantity > Decimal::ZERO
            || quantity.abs() > self.outstanding_quantity.abs()
        {
            return Err(LedgerError::InvalidAdjustment {
                outstanding: self.outstanding_quantity,
                adjustment: quantity,
            }
            .into());
        }
        self.outstanding_quantity += quantity;
        let delta = quantity * self.rate;
        self.outstanding_value += delta;
        Ok(delta)
    }

    /// Take the whole outstanding remainder, leaving the lot fully used.
    pub fn drain(&mut self) -> (Decimal, Decimal) {
        let quantity = self.outstanding_quantity;
        let value = self.outstanding_value;
        self.outstanding_quantity = Decimal::ZERO;
        self.outstanding_value = Decimal::ZERO;
        (quantity, value)
    }

    /// Accumulate realized profit and chargeable gain.
    pub fn record_gain(&mut self, profit: Decimal, chargeable: Decimal) {
        self.realized_profit += profit;
        self.realized_chargeable_gain += chargeable;
    }
}
