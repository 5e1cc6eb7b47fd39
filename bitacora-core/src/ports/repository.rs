//! Repository port - storage abstraction

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{
    ActiveSurvey, Answers, Asset, AssetKind, Balances, Client, LedgerDraft, LedgerEntry, Pricing,
    Question, ServiceLog, Signature, Survey, User,
};

/// Storage abstraction used by every service
///
/// Methods that change more than one row are atomic: implementations must
/// apply all of their writes or none.
pub trait Repository: Send + Sync {
    // === Clients ===

    /// Insert a client and one opening ledger entry per non-zero pool
    fn insert_client(&self, client: &Client, opening: &[LedgerDraft]) -> Result<()>;

    fn get_client(&self, id: Uuid) -> Result<Option<Client>>;

    fn get_client_by_tax_id(&self, tax_id: &str) -> Result<Option<Client>>;

    fn get_clients(&self) -> Result<Vec<Client>>;

    // === Ledger ===

    /// Append an entry to the client's chain and update the projection
    fn append_ledger_entry(&self, draft: &LedgerDraft) -> Result<(LedgerEntry, Balances)>;

    /// Entries of a client in sequence order
    fn get_ledger_entries(&self, client_id: Uuid) -> Result<Vec<LedgerEntry>>;

    // === Configuration ===

    /// The singleton pricing record (id = 1)
    fn get_pricing(&self) -> Result<Option<Pricing>>;

    fn save_pricing(&self, pricing: &Pricing) -> Result<()>;

    // === Users ===

    fn insert_user(&self, user: &User) -> Result<()>;

    fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    fn count_users(&self) -> Result<i64>;

    // === Assets ===

    fn insert_asset(&self, asset: &Asset) -> Result<()>;

    fn get_asset(&self, kind: AssetKind, id: Uuid) -> Result<Option<Asset>>;

    fn set_asset_active(&self, kind: AssetKind, id: Uuid, active: bool) -> Result<bool>;

    // === Surveys ===

    fn insert_survey(&self, survey: &Survey) -> Result<()>;

    fn get_survey(&self, id: Uuid) -> Result<Option<Survey>>;

    fn insert_question(&self, question: &Question) -> Result<()>;

    /// Most recently created active survey with its active questions
    fn get_active_survey(&self) -> Result<Option<ActiveSurvey>>;

    // === Service logs ===

    /// Insert technician signature, debit entry and log in one transaction
    fn create_service_log(
        &self,
        log: &ServiceLog,
        technician_signature: &Signature,
        debit: &LedgerDraft,
    ) -> Result<LedgerEntry>;

    fn get_service_log(&self, id: Uuid) -> Result<Option<ServiceLog>>;

    fn get_service_logs(&self, client_id: Option<Uuid>) -> Result<Vec<ServiceLog>>;

    /// Remove the log row; returns false if it did not exist
    fn delete_service_log(&self, id: Uuid) -> Result<bool>;

    /// Set grade and store answers; returns false if a grade was already set
    fn record_grade(&self, log_id: Uuid, grade: u8, answers: &Answers) -> Result<bool>;

    // === Signatures ===

    fn insert_signature(&self, signature: &Signature) -> Result<()>;

    fn get_signature(&self, id: Uuid) -> Result<Option<Signature>>;

    /// Unused signature addressed by `token`
    fn get_draft_by_token(&self, token: &str) -> Result<Option<Signature>>;

    /// Burn `old_id` (only if still unused) and insert `replacement`.
    /// Returns false without writing if `old_id` was already used.
    fn regenerate_signature(&self, old_id: Uuid, replacement: &Signature) -> Result<bool>;

    /// Attach the image, mark used and link the owning log's client signature.
    /// Returns false without writing if the signature was already used.
    fn complete_signature(&self, id: Uuid, image: &str, completed_at: DateTime<Utc>) -> Result<bool>;

    /// Unused signatures, optionally only those created before `cutoff`
    fn count_drafts(&self, created_before: Option<DateTime<Utc>>) -> Result<i64>;
}
