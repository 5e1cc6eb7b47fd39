//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod asset;
mod client;
pub mod ledger;
mod pricing;
pub mod result;
mod service_log;
pub mod signature;
pub mod survey;
mod user;

pub use asset::{Asset, AssetKind, AssetRef};
pub use client::{BalancePool, Balances, Client};
pub use ledger::{ChainVerification, EntrySource, LedgerDraft, LedgerEntry};
pub use pricing::{BillingMode, Pricing, PricingSnapshot};
pub use service_log::{NewServiceLog, ServiceLog};
pub use signature::{Signature, SignatureLinks};
pub use survey::{ActiveSurvey, Answers, GradeResult, Question, Survey};
pub use user::{Role, User};
