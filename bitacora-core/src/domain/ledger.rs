//! Balance ledger entries
//!
//! Every change to a client's balances is an append-only, hash-chained entry.
//! The balances stored on the client row are a projection of these entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::client::{BalancePool, Balances};
use super::pricing::round_money;

/// Hash the first entry of every client chains from
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Where a ledger entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Opening,
    Payment,
    ServiceLog,
}

impl EntrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrySource::Opening => "opening",
            EntrySource::Payment => "payment",
            EntrySource::ServiceLog => "service_log",
        }
    }
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntrySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opening" => Ok(EntrySource::Opening),
            "payment" => Ok(EntrySource::Payment),
            "service_log" => Ok(EntrySource::ServiceLog),
            other => Err(format!("unknown ledger source '{}'", other)),
        }
    }
}

/// A ledger entry before it has been placed in a client's chain
#[derive(Debug, Clone)]
pub struct LedgerDraft {
    pub client_id: Uuid,
    pub pool: BalancePool,
    pub hours_delta: i64,
    pub money_delta: Decimal,
    pub source: EntrySource,
    pub reference_id: Option<Uuid>,
}

impl LedgerDraft {
    /// Debit produced by a service log
    pub fn debit(client_id: Uuid, pool: BalancePool, hours: u32, amount: Decimal, log_id: Uuid) -> Self {
        Self {
            client_id,
            pool,
            hours_delta: -(hours as i64),
            money_delta: -amount,
            source: EntrySource::ServiceLog,
            reference_id: Some(log_id),
        }
    }

    /// Credit produced by a recorded payment
    pub fn credit(client_id: Uuid, pool: BalancePool, hours: u32, money: Decimal) -> Self {
        Self {
            client_id,
            pool,
            hours_delta: hours as i64,
            money_delta: money,
            source: EntrySource::Payment,
            reference_id: None,
        }
    }

    /// Opening balance of a freshly created client
    pub fn opening(client_id: Uuid, pool: BalancePool, hours: i64, money: Decimal) -> Self {
        Self {
            client_id,
            pool,
            hours_delta: hours,
            money_delta: money,
            source: EntrySource::Opening,
            reference_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hours_delta == 0 && self.money_delta.is_zero()
    }

    /// Place the draft after `prev` (None for the first entry of a client)
    pub fn seal(self, prev: Option<(i64, &str)>, created_at: DateTime<Utc>) -> LedgerEntry {
        let (seq, prev_hash) = match prev {
            Some((last_seq, last_hash)) => (last_seq + 1, last_hash.to_string()),
            None => (1, GENESIS_HASH.to_string()),
        };
        let mut entry = LedgerEntry {
            id: Uuid::new_v4(),
            client_id: self.client_id,
            seq,
            pool: self.pool,
            hours_delta: self.hours_delta,
            money_delta: round_money(self.money_delta),
            source: self.source,
            reference_id: self.reference_id,
            created_at,
            prev_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash();
        entry
    }
}

/// A sealed, immutable ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub client_id: Uuid,
    /// Position in the client's chain, starting at 1
    pub seq: i64,
    pub pool: BalancePool,
    pub hours_delta: i64,
    pub money_delta: Decimal,
    pub source: EntrySource,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

impl LedgerEntry {
    /// Timestamp format used both for storage and hashing
    pub fn format_time(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// SHA-256 over the canonical fields and the previous hash
    pub fn compute_hash(&self) -> String {
        let canonical = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.client_id,
            self.seq,
            self.pool,
            self.hours_delta,
            self.money_delta.normalize(),
            self.source,
            self.reference_id.map(|id| id.to_string()).unwrap_or_default(),
            Self::format_time(&self.created_at),
            self.prev_hash,
        );
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Outcome of walking a client's chain
#[derive(Debug, Clone, Serialize)]
pub struct ChainVerification {
    pub client_id: Uuid,
    pub entries: usize,
    /// Sequence numbers whose hash or back-link does not match
    pub broken_links: Vec<i64>,
    /// Balances obtained by summing every entry
    pub ledger_balances: Balances,
    pub projection_matches: bool,
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        self.broken_links.is_empty() && self.projection_matches
    }
}

/// Walk entries in sequence order, recomputing hashes and summing deltas
pub fn verify_chain(client_id: Uuid, entries: &[LedgerEntry], projection: &Balances) -> ChainVerification {
    let mut broken_links = Vec::new();
    let mut totals = Balances::default();
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut expected_seq = 1;

    for entry in entries {
        if entry.seq != expected_seq
            || entry.prev_hash != expected_prev
            || entry.hash != entry.compute_hash()
        {
            broken_links.push(entry.seq);
        }
        totals.apply(entry.pool, entry.hours_delta, entry.money_delta);
        expected_prev = entry.hash.clone();
        expected_seq = entry.seq + 1;
    }

    ChainVerification {
        client_id,
        entries: entries.len(),
        broken_links,
        ledger_balances: totals,
        projection_matches: totals == *projection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(client_id: Uuid) -> Vec<LedgerEntry> {
        let now = Utc::now();
        let first = LedgerDraft::opening(client_id, BalancePool::Individual, 10, Decimal::new(1000, 0))
            .seal(None, now);
        let second = LedgerDraft::debit(
            client_id,
            BalancePool::Individual,
            2,
            Decimal::new(230, 0),
            Uuid::new_v4(),
        )
        .seal(Some((first.seq, &first.hash)), now);
        vec![first, second]
    }

    #[test]
    fn test_seal_links_entries() {
        let client_id = Uuid::new_v4();
        let entries = chain(client_id);

        assert_eq!(entries[0].seq, 1);
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].seq, 2);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(entries[1].hash.len(), 64);
    }

    #[test]
    fn test_verify_chain_sums_deltas() {
        let client_id = Uuid::new_v4();
        let entries = chain(client_id);
        let projection = Balances {
            individual_hours: 8,
            individual_money: Decimal::new(770, 0),
            ..Balances::default()
        };

        let result = verify_chain(client_id, &entries, &projection);
        assert!(result.is_valid());
        assert_eq!(result.entries, 2);
    }

    #[test]
    fn test_verify_chain_detects_tampering() {
        let client_id = Uuid::new_v4();
        let mut entries = chain(client_id);
        entries[1].money_delta = Decimal::new(-1, 0);

        let result = verify_chain(client_id, &entries, &Balances::default());
        assert_eq!(result.broken_links, vec![2]);
        assert!(!result.projection_matches);
    }

    #[test]
    fn test_hash_ignores_decimal_scale() {
        let client_id = Uuid::new_v4();
        let mut entry = LedgerDraft::credit(client_id, BalancePool::Package, 5, Decimal::new(500, 0))
            .seal(None, Utc::now());
        let original = entry.hash.clone();

        // Same value read back from a DECIMAL(24,6) column
        entry.money_delta = "500.000000".parse().unwrap();
        assert_eq!(entry.compute_hash(), original);
    }
}
