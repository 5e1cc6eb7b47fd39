//! Client domain model and its prepaid balances

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two independent prepaid pools a client draws down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalancePool {
    Individual,
    Package,
}

impl BalancePool {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalancePool::Individual => "individual",
            BalancePool::Package => "package",
        }
    }
}

impl fmt::Display for BalancePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BalancePool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "individual" => Ok(BalancePool::Individual),
            "package" => Ok(BalancePool::Package),
            other => Err(format!("unknown balance pool '{}'", other)),
        }
    }
}

/// Materialized balances of a client
///
/// Hours and money may go negative: over-consumption is allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub package_hours: i64,
    pub package_money: Decimal,
    pub individual_hours: i64,
    pub individual_money: Decimal,
}

impl Balances {
    pub fn hours(&self, pool: BalancePool) -> i64 {
        match pool {
            BalancePool::Individual => self.individual_hours,
            BalancePool::Package => self.package_hours,
        }
    }

    pub fn money(&self, pool: BalancePool) -> Decimal {
        match pool {
            BalancePool::Individual => self.individual_money,
            BalancePool::Package => self.package_money,
        }
    }

    /// Apply a signed delta to one pool
    pub fn apply(&mut self, pool: BalancePool, hours_delta: i64, money_delta: Decimal) {
        match pool {
            BalancePool::Individual => {
                self.individual_hours += hours_delta;
                self.individual_money += money_delta;
            }
            BalancePool::Package => {
                self.package_hours += hours_delta;
                self.package_money += money_delta;
            }
        }
    }
}

/// A customer company with prepaid support hours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub company_name: String,
    pub tax_id: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub balances: Balances,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Create a new client with zero balances
    pub fn new(company_name: impl Into<String>, tax_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_name: company_name.into(),
            tax_id: tax_id.into(),
            contact_name: None,
            contact_email: None,
            balances: Balances::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize tax ids so lookups are case and whitespace insensitive
    pub fn normalize_tax_id(tax_id: &str) -> String {
        tax_id
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_uppercase()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.company_name.trim().is_empty() {
            return Err("company name cannot be empty");
        }
        if self.tax_id.trim().is_empty() {
            return Err("tax id cannot be empty");
        }
        Ok(())
    }
}
