//! Pricing configuration and billing computation

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::client::BalancePool;

/// Decimal places money keeps in storage
pub const MONEY_SCALE: u32 = 6;

/// Largest magnitude (exclusive) a DECIMAL(24,6) column holds
const MONEY_LIMIT: i64 = 1_000_000_000_000_000_000;

/// Round to storage precision, halves away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

fn fits_storage(value: Decimal) -> bool {
    value.abs() < Decimal::from(MONEY_LIMIT)
}

/// How a service log is billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingMode {
    Individual,
    Package,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Individual => "Individual",
            BillingMode::Package => "Package",
        }
    }

    /// The balance pool this mode draws from
    pub fn pool(&self) -> BalancePool {
        match self {
            BillingMode::Individual => BalancePool::Individual,
            BillingMode::Package => BalancePool::Package,
        }
    }
}

impl fmt::Display for BillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Individual" => Ok(BillingMode::Individual),
            "Package" => Ok(BillingMode::Package),
            other => Err(format!("billing mode must be Individual or Package, got '{}'", other)),
        }
    }
}

/// Singleton pricing record (id = 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub price_per_individual_hour: Decimal,
    pub price_per_package_hour: Decimal,
    pub commission_percent: Decimal,
}

impl Pricing {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.price_per_individual_hour < Decimal::ZERO {
            return Err("individual hour price cannot be negative");
        }
        if self.price_per_package_hour < Decimal::ZERO {
            return Err("package hour price cannot be negative");
        }
        if self.commission_percent < Decimal::ZERO {
            return Err("commission percent cannot be negative");
        }
        let values = [
            self.price_per_individual_hour,
            self.price_per_package_hour,
            self.commission_percent,
        ];
        if !values.into_iter().all(fits_storage) {
            return Err("pricing values must be below 10^18");
        }
        Ok(())
    }
}

/// Read-only pricing values in effect for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingSnapshot {
    pub pricing: Pricing,
    pub loaded_at: DateTime<Utc>,
}

impl PricingSnapshot {
    pub fn new(pricing: Pricing) -> Self {
        Self {
            pricing,
            loaded_at: Utc::now(),
        }
    }

    pub fn base_price(&self, mode: BillingMode) -> Decimal {
        match mode {
            BillingMode::Individual => self.pricing.price_per_individual_hour,
            BillingMode::Package => self.pricing.price_per_package_hour,
        }
    }

    /// Surcharge added to one hour of the given mode, `None` on overflow
    pub fn surcharge(&self, mode: BillingMode) -> Option<Decimal> {
        self.base_price(mode)
            .checked_mul(self.pricing.commission_percent)?
            .checked_div(Decimal::ONE_HUNDRED)
    }

    /// `hours * (price + price * commission / 100)` rounded once with
    /// `round_money`, so the charged and debited amounts are the same value
    ///
    /// `None` when the result overflows or does not fit storage.
    pub fn amount_for(&self, mode: BillingMode, hours: u32) -> Option<Decimal> {
        let per_hour = self.base_price(mode).checked_add(self.surcharge(mode)?)?;
        Decimal::from(hours)
            .checked_mul(per_hour)
            .map(round_money)
            .filter(|amount| fits_storage(*amount))
    }
}
