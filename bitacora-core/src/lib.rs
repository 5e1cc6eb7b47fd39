//! Bitacora Core - service-log accounting and signature lifecycle
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Client, ServiceLog, Signature, ledger, etc.)
//! - **ports**: Trait definitions for external dependencies (Repository)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use adapters::duckdb::DuckDbRepository;
use config::Config;
use domain::SignatureLinks;
use ports::Repository;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorKind, OperationResult};
pub use domain::{
    Answers, BalancePool, Balances, BillingMode, Client, GradeResult, LedgerEntry, NewServiceLog,
    Pricing, PricingSnapshot, Role, ServiceLog, Signature,
};

/// Name of the main database file inside the data directory
pub const DB_FILENAME: &str = "bitacora.duckdb";

/// Main context for Bitacora operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and all services.
pub struct BitacoraContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub logger: Arc<LoggingService>,
    pub pricing: Arc<ConfigurationProvider>,
    pub directory_service: DirectoryService,
    pub ledger_service: LedgerService,
    pub service_log_service: ServiceLogService,
    pub signature_service: SignatureService,
    pub survey_service: SurveyService,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
}

impl BitacoraContext {
    /// Open (or create) the databases in `data_dir` and wire the services
    pub fn new(data_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;

        let logger = Arc::new(LoggingService::new(
            data_dir,
            entry_point,
            env!("CARGO_PKG_VERSION"),
        )?);

        let links = SignatureLinks::new(&config.base_url).map_err(|e| anyhow!(e))?;
        let repo: Arc<dyn Repository> = repository.clone();

        let pricing = Arc::new(ConfigurationProvider::new(
            Arc::clone(&repo),
            Arc::clone(&logger),
            config.pricing_cache_ttl(),
        ));
        let directory_service = DirectoryService::new(Arc::clone(&repo), Arc::clone(&logger));
        let ledger_service = LedgerService::new(Arc::clone(&repo), Arc::clone(&logger));
        let service_log_service =
            ServiceLogService::new(Arc::clone(&repo), Arc::clone(&pricing), Arc::clone(&logger));
        let signature_service = SignatureService::new(
            Arc::clone(&repo),
            links,
            config.link_validity(),
            Arc::clone(&logger),
        );
        let survey_service = SurveyService::new(Arc::clone(&repo), Arc::clone(&logger));
        let status_service = StatusService::new(Arc::clone(&repo), Arc::clone(&pricing));
        let doctor_service = DoctorService::new(Arc::clone(&repo), config.link_validity());

        Ok(Self {
            config,
            repository,
            logger,
            pricing,
            directory_service,
            ledger_service,
            service_log_service,
            signature_service,
            survey_service,
            status_service,
            doctor_service,
        })
    }
}
