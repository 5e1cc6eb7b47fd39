//! Service log engine - validates, prices and records technician visits

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::signature::check_signature_image;
use crate::domain::{AssetRef, BillingMode, LedgerDraft, NewServiceLog, ServiceLog, Signature};
use crate::ports::Repository;

use super::boundary::AtBoundary;
use super::logging::{LogEvent, LoggingService};
use super::pricing::ConfigurationProvider;

pub struct ServiceLogService {
    repository: Arc<dyn Repository>,
    pricing: Arc<ConfigurationProvider>,
    logger: Arc<LoggingService>,
}

impl ServiceLogService {
    pub fn new(
        repository: Arc<dyn Repository>,
        pricing: Arc<ConfigurationProvider>,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self {
            repository,
            pricing,
            logger,
        }
    }

    /// Record a visit and debit the client's balance for it
    ///
    /// Every check runs before anything is written. The technician
    /// signature, the ledger debit and the log itself are stored in one
    /// transaction.
    pub fn create(&self, input: NewServiceLog) -> Result<ServiceLog> {
        self.create_checked(input)
            .at_boundary(&self.logger, "service_log_create_failed")
    }

    fn create_checked(&self, input: NewServiceLog) -> Result<ServiceLog> {
        let signature_payload = match input.technician_signature.as_deref() {
            Some(payload) if input.has_technician_signature() => payload,
            _ => return Err(Error::unauthorized("technician signature is mandatory")),
        };
        let asset = AssetRef::from_ids(input.equipment_id, input.system_id).map_err(Error::invalid)?;

        let client = self
            .repository
            .get_client(input.client_id)?
            .ok_or_else(|| Error::not_found(format!("client {}", input.client_id)))?;
        if self.repository.get_active_survey()?.is_none() {
            return Err(Error::not_found("no active survey"));
        }
        let technician = self
            .repository
            .get_user(input.technician_id)?
            .ok_or_else(|| Error::not_found(format!("technician {}", input.technician_id)))?;

        let image = check_signature_image(signature_payload).map_err(|rejection| {
            Error::invalid(format!("technician signature: {}", rejection.message()))
        })?;

        let stored_asset = self
            .repository
            .get_asset(asset.kind(), asset.id())?
            .ok_or_else(|| Error::not_found(format!("{} {}", asset.kind(), asset.id())))?;
        if !stored_asset.active {
            return Err(Error::unauthorized("referenced asset is inactive"));
        }

        let billing_mode: BillingMode = input.billing_mode.parse().map_err(Error::invalid)?;
        input.check_schedule().map_err(Error::invalid)?;

        let snapshot = self.pricing.snapshot()?;
        let amount = snapshot
            .amount_for(billing_mode, input.hours)
            .ok_or_else(|| Error::invalid("amount out of range"))?;

        let signature = Signature::in_person(image);
        let log = ServiceLog {
            id: Uuid::new_v4(),
            ticket_number: input.ticket_number.trim().to_string(),
            client_id: client.id,
            technician_id: technician.id,
            scheduled_arrival: input.scheduled_arrival,
            scheduled_departure: input.scheduled_departure,
            actual_arrival: input.actual_arrival,
            actual_departure: input.actual_departure,
            billing_mode,
            hours: input.hours,
            amount,
            description: input.description,
            asset,
            technician_signature_id: signature.id,
            client_signature_id: None,
            grade: None,
            created_at: Utc::now(),
        };
        let debit = LedgerDraft::debit(client.id, billing_mode.pool(), input.hours, amount, log.id);

        self.repository
            .create_service_log(&log, &signature, &debit)?;

        self.logger.record(
            LogEvent::new("service_log_created").with_entity("service_log", log.id),
        );
        Ok(log)
    }

    pub fn get(&self, id: Uuid) -> Result<ServiceLog> {
        self.repository
            .get_service_log(id)
            .at_boundary(&self.logger, "service_log_read_failed")?
            .ok_or_else(|| Error::not_found(format!("service log {}", id)))
    }

    /// Logs, newest first, optionally for one client
    pub fn list(&self, client_id: Option<Uuid>) -> Result<Vec<ServiceLog>> {
        self.repository
            .get_service_logs(client_id)
            .at_boundary(&self.logger, "service_log_read_failed")
    }

    /// Remove a log; only admins may do this and the debit stays in the ledger
    pub fn delete(&self, id: Uuid, actor_id: Uuid) -> Result<()> {
        self.delete_checked(id, actor_id)
            .at_boundary(&self.logger, "service_log_delete_failed")
    }

    fn delete_checked(&self, id: Uuid, actor_id: Uuid) -> Result<()> {
        let is_admin = self
            .repository
            .get_user(actor_id)?
            .map_or(false, |actor| actor.active && actor.is_admin());
        if !is_admin {
            return Err(Error::unauthorized("only administrators can delete service logs"));
        }
        if !self.repository.delete_service_log(id)? {
            return Err(Error::not_found(format!("service log {}", id)));
        }

        self.logger.record(
            LogEvent::new("service_log_deleted")
                .with_entity("service_log", id)
                .with_command(format!("actor {}", actor_id)),
        );
        Ok(())
    }
}
