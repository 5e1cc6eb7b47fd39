//! Ledger service - client balances and their hash-chained history

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::ledger::verify_chain;
use crate::domain::result::{Error, Result};
use crate::domain::{BalancePool, Balances, ChainVerification, Client, LedgerDraft, LedgerEntry};
use crate::ports::Repository;

use super::boundary::AtBoundary;
use super::logging::{LogEvent, LoggingService};

/// Outcome of a payment credit
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub entry: LedgerEntry,
    pub balances: Balances,
}

pub struct LedgerService {
    repository: Arc<dyn Repository>,
    logger: Arc<LoggingService>,
}

impl LedgerService {
    pub fn new(repository: Arc<dyn Repository>, logger: Arc<LoggingService>) -> Self {
        Self { repository, logger }
    }

    /// Credit hours and/or money to one pool of a client
    pub fn record_payment(
        &self,
        client_id: Uuid,
        pool: BalancePool,
        hours: u32,
        money: Decimal,
    ) -> Result<PaymentReceipt> {
        if money < Decimal::ZERO {
            return Err(Error::invalid("payment amount cannot be negative"));
        }
        if hours == 0 && money.is_zero() {
            return Err(Error::invalid("payment must credit hours or money"));
        }
        self.require_client(client_id)?;

        let draft = LedgerDraft::credit(client_id, pool, hours, money);
        let (entry, balances) = self
            .repository
            .append_ledger_entry(&draft)
            .at_boundary(&self.logger, "payment_failed")?;

        self.logger
            .record(LogEvent::new("payment_recorded").with_entity("ledger_entry", entry.id));
        Ok(PaymentReceipt { entry, balances })
    }

    pub fn balance(&self, client_id: Uuid) -> Result<Balances> {
        Ok(self.require_client(client_id)?.balances)
    }

    /// Ledger history in sequence order
    pub fn entries(&self, client_id: Uuid) -> Result<Vec<LedgerEntry>> {
        self.require_client(client_id)?;
        self.repository
            .get_ledger_entries(client_id)
            .at_boundary(&self.logger, "ledger_read_failed")
    }

    /// Recompute the chain and compare its sums with the projection
    pub fn verify(&self, client_id: Uuid) -> Result<ChainVerification> {
        let client = self.require_client(client_id)?;
        let entries = self
            .repository
            .get_ledger_entries(client_id)
            .at_boundary(&self.logger, "ledger_read_failed")?;
        Ok(verify_chain(client_id, &entries, &client.balances))
    }

    /// Verify every client's chain
    pub fn verify_all(&self) -> Result<Vec<ChainVerification>> {
        let clients = self
            .repository
            .get_clients()
            .at_boundary(&self.logger, "ledger_read_failed")?;
        clients
            .iter()
            .map(|client| {
                let entries = self
                    .repository
                    .get_ledger_entries(client.id)
                    .at_boundary(&self.logger, "ledger_read_failed")?;
                Ok(verify_chain(client.id, &entries, &client.balances))
            })
            .collect()
    }

    fn require_client(&self, client_id: Uuid) -> Result<Client> {
        self.repository
            .get_client(client_id)
            .at_boundary(&self.logger, "ledger_read_failed")?
            .ok_or_else(|| Error::not_found(format!("client {}", client_id)))
    }
}
