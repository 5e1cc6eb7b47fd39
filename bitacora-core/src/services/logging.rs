//! Event log - what happened, to which entity, from where
//!
//! Events go to logs.duckdb, next to the main database, so the log can be
//! cleared or lost without touching business data. Only event names,
//! entity kinds and ids are stored; client data (names, amounts, signature
//! images, tokens) never reaches the log.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::{Connection, ToSql};
use serde::{Deserialize, Serialize};

use crate::log_migrations::LOG_MIGRATIONS;

use super::migration::MigrationService;

const LOG_FILENAME: &str = "logs.duckdb";

/// Disambiguates ids minted within one millisecond
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp in the high bits, a wrapping counter in the low 16
fn next_id(timestamp_ms: i64) -> u64 {
    let low = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((timestamp_ms.max(0) as u64) << 16) | low
}

/// Which surface produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    /// Embedded in another process (HTTP front end, tests)
    Service,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Service => "service",
        }
    }
}

/// Builder for one event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }

    /// The entity the event is about (`service_log`, `signature`, ...)
    pub fn with_entity(mut self, entity: impl Into<String>, id: impl ToString) -> Self {
        self.entity = Some(entity.into());
        self.entity_id = Some(id.to_string());
        self
    }

    /// CLI command line that triggered the event
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Underlying cause, e.g. the storage error behind an `Internal`
    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A stored event, stamped with origin and time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    /// Unix milliseconds
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub command: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEntry {
    const COLUMNS: &'static str = "id, timestamp, entry_point, app_version, platform, \
        event, entity, entity_id, command, error_message, error_details";

    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            entry_point: row.get(2)?,
            app_version: row.get(3)?,
            platform: row.get(4)?,
            event: row.get(5)?,
            entity: row.get(6)?,
            entity_id: row.get(7)?,
            command: row.get(8)?,
            error_message: row.get(9)?,
            error_details: row.get(10)?,
        })
    }
}

/// Writer and reader for logs.duckdb
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
}

impl LoggingService {
    /// Open (or create) logs.duckdb in `data_dir` and bring its schema up to date
    pub fn new(
        data_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        let db_path = data_dir.join(LOG_FILENAME);
        let conn = Connection::open(&db_path)?;
        MigrationService::with_migrations(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Log connection poisoned: {}", e))
    }

    /// Store an event
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let timestamp = Utc::now().timestamp_millis();
        self.lock()?.execute(
            &format!(
                "INSERT INTO sys_logs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                LogEntry::COLUMNS
            ),
            duckdb::params![
                next_id(timestamp),
                timestamp,
                self.entry_point.as_str(),
                &self.app_version,
                std::env::consts::OS,
                &event.event,
                &event.entity,
                &event.entity_id,
                &event.command,
                &event.error_message,
                &event.error_details,
            ],
        )?;
        Ok(())
    }

    /// Store an event; a failed write is reported on stderr and swallowed
    ///
    /// Business operations log through this so a broken log database never
    /// fails the operation being logged.
    pub fn record(&self, event: LogEvent) {
        if let Err(e) = self.log(event) {
            eprintln!("[bitacora] Failed to write log event: {:#}", e);
        }
    }

    /// Newest entries first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.select("TRUE", &[], limit)
    }

    /// Newest entries that carry an error message
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.select("error_message IS NOT NULL", &[], limit)
    }

    /// Newest entries about one entity id
    pub fn get_for_entity(&self, entity_id: &str, limit: usize) -> Result<Vec<LogEntry>> {
        self.select("entity_id = ?", &[&entity_id], limit)
    }

    fn select(&self, filter: &str, args: &[&dyn ToSql], limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_logs WHERE {} ORDER BY timestamp DESC, id DESC LIMIT {}",
            LogEntry::COLUMNS,
            filter,
            limit
        ))?;
        let entries = stmt
            .query_map(args, LogEntry::from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Entry counts per event name, most frequent first
    pub fn event_counts(&self) -> Result<Vec<(String, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT event, COUNT(*) AS n FROM sys_logs GROUP BY event ORDER BY n DESC, event",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(counts)
    }

    /// Remove entries older than `timestamp_ms` (unix ms); returns how many
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let deleted = self
            .lock()?
            .execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(entry_point: EntryPoint) -> (TempDir, LoggingService) {
        let dir = TempDir::new().unwrap();
        let service = LoggingService::new(dir.path(), entry_point, "0.3.1").unwrap();
        (dir, service)
    }

    #[test]
    fn test_entries_are_stamped() {
        let (_dir, service) = open(EntryPoint::Cli);
        assert!(service.db_path().ends_with("logs.duckdb"));

        service.log(LogEvent::new("payment_recorded")).unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "payment_recorded");
        assert_eq!(entries[0].entry_point, "cli");
        assert_eq!(entries[0].app_version, "0.3.1");
        assert_eq!(entries[0].platform, std::env::consts::OS);
    }

    #[test]
    fn test_entity_lookup() {
        let (_dir, service) = open(EntryPoint::Service);

        service.record(
            LogEvent::new("signature_regenerated")
                .with_entity("signature", "abc")
                .with_command("signature validate"),
        );
        service.record(LogEvent::new("signature_finalized").with_entity("signature", "xyz"));

        let entries = service.get_for_entity("abc", 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entity.as_deref(), Some("signature"));
        assert_eq!(entries[0].command.as_deref(), Some("signature validate"));
        assert_eq!(entries[0].entry_point, "service");
    }

    #[test]
    fn test_errors_only() {
        let (_dir, service) = open(EntryPoint::Cli);

        service.record(LogEvent::new("survey_graded"));
        service.record(
            LogEvent::new("service_log_create_failed")
                .with_error("unexpected storage failure")
                .with_error_details("disk full"),
        );

        let errors = service.get_errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event, "service_log_create_failed");
        assert_eq!(errors[0].error_details.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_recent_respects_limit_and_order() {
        let (_dir, service) = open(EntryPoint::Cli);
        for i in 0..5 {
            service.record(LogEvent::new(format!("event_{}", i)));
        }

        let entries = service.get_recent(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, "event_4");
        assert!(entries[0].id > entries[1].id);
    }

    #[test]
    fn test_counts_and_delete() {
        let (_dir, service) = open(EntryPoint::Cli);

        service.record(LogEvent::new("payment_recorded"));
        service.record(LogEvent::new("payment_recorded"));
        service.record(LogEvent::new("survey_graded"));

        assert_eq!(service.count().unwrap(), 3);
        let counts = service.event_counts().unwrap();
        assert_eq!(counts[0], ("payment_recorded".to_string(), 2));

        assert_eq!(service.delete_before(0).unwrap(), 0);
        let future = Utc::now().timestamp_millis() + 1000;
        assert_eq!(service.delete_before(future).unwrap(), 3);
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = TempDir::new().unwrap();
        LoggingService::new(dir.path(), EntryPoint::Cli, "1")
            .unwrap()
            .record(LogEvent::new("client_created"));

        let reopened = LoggingService::new(dir.path(), EntryPoint::Cli, "1").unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
