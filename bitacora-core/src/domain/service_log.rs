//! Service log (bitácora) domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::AssetRef;
use super::pricing::BillingMode;

/// Raw request to record a service visit
///
/// Kept loose on purpose (string billing mode, two optional asset ids,
/// optional signature) so validation failures map to precise error kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewServiceLog {
    pub ticket_number: String,
    pub client_id: Uuid,
    pub technician_id: Uuid,
    pub scheduled_arrival: DateTime<Utc>,
    pub scheduled_departure: DateTime<Utc>,
    #[serde(default)]
    pub actual_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_departure: Option<DateTime<Utc>>,
    pub billing_mode: String,
    pub hours: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub equipment_id: Option<Uuid>,
    #[serde(default)]
    pub system_id: Option<Uuid>,
    /// Base64 PNG drawn by the technician on site
    #[serde(default)]
    pub technician_signature: Option<String>,
}

impl NewServiceLog {
    pub fn has_technician_signature(&self) -> bool {
        self.technician_signature
            .as_deref()
            .map_or(false, |s| !s.trim().is_empty())
    }

    /// Ticket and timestamp sanity checks
    pub fn check_schedule(&self) -> Result<(), &'static str> {
        if self.ticket_number.trim().is_empty() {
            return Err("ticket number cannot be empty");
        }
        if self.scheduled_departure < self.scheduled_arrival {
            return Err("scheduled departure is before scheduled arrival");
        }
        if let (Some(arrival), Some(departure)) = (self.actual_arrival, self.actual_departure) {
            if departure < arrival {
                return Err("actual departure is before actual arrival");
            }
        }
        Ok(())
    }
}

/// A recorded technician visit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLog {
    pub id: Uuid,
    pub ticket_number: String,
    pub client_id: Uuid,
    pub technician_id: Uuid,
    pub scheduled_arrival: DateTime<Utc>,
    pub scheduled_departure: DateTime<Utc>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub billing_mode: BillingMode,
    pub hours: u32,
    /// Amount debited at creation, never re-priced
    pub amount: Decimal,
    pub description: String,
    pub asset: AssetRef,
    pub technician_signature_id: Uuid,
    pub client_signature_id: Option<Uuid>,
    /// Satisfaction grade 0-10, set at most once
    pub grade: Option<u8>,
    pub created_at: DateTime<Utc>,
}

impl ServiceLog {
    pub fn is_signed_by_client(&self) -> bool {
        self.client_signature_id.is_some()
    }

    pub fn is_graded(&self) -> bool {
        self.grade.is_some()
    }
}
