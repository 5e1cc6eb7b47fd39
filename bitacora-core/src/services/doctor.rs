//! Doctor service - database health checks

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;

use crate::domain::ledger::verify_chain;
use crate::domain::result::Result;
use crate::ports::Repository;

/// Doctor service for health checks
pub struct DoctorService {
    repository: Arc<dyn Repository>,
    link_validity: Duration,
}

impl DoctorService {
    pub fn new(repository: Arc<dyn Repository>, link_validity: Duration) -> Self {
        Self {
            repository,
            link_validity,
        }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = HashMap::new();
        let clients = self.repository.get_clients()?;
        let logs = self.repository.get_service_logs(None)?;

        // Ledger chains and projections
        let mut broken_chains = Vec::new();
        let mut drifted = Vec::new();
        for client in &clients {
            let entries = self.repository.get_ledger_entries(client.id)?;
            let verification = verify_chain(client.id, &entries, &client.balances);
            if !verification.broken_links.is_empty() {
                broken_chains.push(json!({
                    "client_id": client.id,
                    "broken_seq": verification.broken_links,
                }));
            }
            if !verification.projection_matches {
                drifted.push(json!({
                    "client_id": client.id,
                    "projection": client.balances,
                    "ledger": verification.ledger_balances,
                }));
            }
        }
        checks.insert(
            "ledger_chain".to_string(),
            CheckResult::from_findings(
                broken_chains,
                "error",
                format!("All {} client ledger(s) verify", clients.len()),
                |n| format!("{} client ledger(s) have broken hash links", n),
            ),
        );
        checks.insert(
            "balance_projection".to_string(),
            CheckResult::from_findings(
                drifted,
                "error",
                "Client balances match their ledgers".to_string(),
                |n| format!("{} client(s) have balances that differ from the ledger", n),
            ),
        );

        // Service logs pointing at missing clients
        let client_ids: HashSet<_> = clients.iter().map(|c| c.id).collect();
        let orphans: Vec<serde_json::Value> = logs
            .iter()
            .filter(|log| !client_ids.contains(&log.client_id))
            .map(|log| json!({"service_log_id": log.id, "client_id": log.client_id}))
            .collect();
        checks.insert(
            "orphaned_service_logs".to_string(),
            CheckResult::from_findings(
                orphans,
                "error",
                "No orphaned service logs found".to_string(),
                |n| format!("{} service log(s) reference missing clients", n),
            ),
        );

        // Drafts nobody opened within the validity window
        let stale = self
            .repository
            .count_drafts(Some(Utc::now() - self.link_validity))?;
        checks.insert(
            "stale_signature_links".to_string(),
            CheckResult {
                status: if stale == 0 { "pass" } else { "warning" }.to_string(),
                message: if stale == 0 {
                    "No expired signature links pending".to_string()
                } else {
                    format!("{} signature link(s) expired without being opened", stale)
                },
                details: None,
            },
        );

        // Informational only
        let unsigned = logs.iter().filter(|log| !log.is_signed_by_client()).count();
        checks.insert(
            "unsigned_service_logs".to_string(),
            CheckResult {
                status: "pass".to_string(),
                message: format!(
                    "{} of {} service log(s) await a client signature",
                    unsigned,
                    logs.len()
                ),
                details: None,
            },
        );

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: HashMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn from_findings(
        findings: Vec<serde_json::Value>,
        failing_status: &str,
        pass_message: String,
        fail_message: impl Fn(usize) -> String,
    ) -> Self {
        if findings.is_empty() {
            return Self {
                status: "pass".to_string(),
                message: pass_message,
                details: None,
            };
        }
        Self {
            status: failing_status.to_string(),
            message: fail_message(findings.len()),
            details: Some(findings),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
