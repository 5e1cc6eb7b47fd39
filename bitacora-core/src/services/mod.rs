//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod boundary;
mod directory;
mod doctor;
mod ledger;
pub mod logging;
pub mod migration;
mod pricing;
mod service_log;
mod signature;
mod status;
mod survey;

#[cfg(test)]
pub(crate) mod test_support;

pub use directory::{opening_in, DirectoryService, NewClient};
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use ledger::{LedgerService, PaymentReceipt};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use pricing::ConfigurationProvider;
pub use service_log::ServiceLogService;
pub use signature::{RemoteLink, SignatureService, TokenValidation};
pub use status::{ClientSummary, StatusService, StatusSummary};
pub use survey::SurveyService;
