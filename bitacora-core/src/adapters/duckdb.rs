//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Params, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    ActiveSurvey, Answers, Asset, AssetKind, AssetRef, BalancePool, Balances, BillingMode, Client,
    LedgerDraft, LedgerEntry, Pricing, Question, Role, ServiceLog, Signature, Survey, User,
};
use crate::ports::Repository;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Check if an error message comes from a UNIQUE or PRIMARY KEY violation
fn is_unique_violation(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("duplicate key")
        || lower.contains("unique constraint")
        || lower.contains("primary key")
}

const CLIENT_COLUMNS: &str = "client_id, company_name, tax_id, contact_name, contact_email,
    package_hours, package_money::VARCHAR, individual_hours, individual_money::VARCHAR,
    created_at, updated_at";

const LEDGER_COLUMNS: &str = "entry_id, client_id, seq, pool, hours_delta, money_delta::VARCHAR,
    source, reference_id, created_at, prev_hash, hash";

const SIGNATURE_COLUMNS: &str =
    "signature_id, token, image, used, url, service_log_id, created_at, completed_at";

const SERVICE_LOG_COLUMNS: &str = "service_log_id, ticket_number, client_id, technician_id,
    scheduled_arrival, scheduled_departure, actual_arrival, actual_departure, billing_mode,
    hours, amount::VARCHAR, description, equipment_id, system_id, technician_signature_id,
    client_signature_id, grade, created_at";

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when a second process (e.g. a CLI invocation during a
    /// long-running command) opens the same file.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        // Exponential backoff: 50ms, 100ms, 200ms, 400ms
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[bitacora] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    // Non-retryable error or max retries reached
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// In-memory database, mostly for tests
    pub fn in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off: nothing here needs an extension
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run database migrations using the MigrationService
    ///
    /// Returns the migration result showing what was applied.
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        let migration_service = MigrationService::new(&conn);
        migration_service
            .run_pending()
            .map_err(|e| Error::database(format!("Migration failed: {:#}", e)))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Names of applied migrations
    pub fn applied_migrations(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        MigrationService::new(&conn)
            .get_applied()
            .map_err(|e| Error::database(e.to_string()))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

// === Row helpers ===

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::database(format!("Invalid id '{}': {}", value, e)))
}

fn parse_opt_uuid(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::database(format!("Invalid timestamp '{}': {}", value, e)))
}

fn parse_opt_time(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .map(|d| d.normalize())
        .map_err(|e| Error::database(format!("Invalid decimal '{}': {}", value, e)))
}

fn parse_enum<T: FromStr>(value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| Error::database(format!("Invalid value '{}': {}", value, e)))
}

fn fmt_time(at: &DateTime<Utc>) -> String {
    LedgerEntry::format_time(at)
}

fn fmt_opt_time(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(fmt_time)
}

fn money_columns(pool: BalancePool) -> (&'static str, &'static str) {
    match pool {
        BalancePool::Individual => ("individual_hours", "individual_money"),
        BalancePool::Package => ("package_hours", "package_money"),
    }
}

/// First row of a query, mapped with `f`
fn query_opt<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    f: impl FnOnce(&Row<'_>) -> Result<T>,
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(f(row)?)),
        None => Ok(None),
    }
}

/// Every row of a query, mapped with `f`
fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    f: impl Fn(&Row<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(f(row)?);
    }
    Ok(result)
}

fn row_to_client(row: &Row<'_>) -> Result<Client> {
    // 0: client_id, 1: company_name, 2: tax_id, 3: contact_name, 4: contact_email,
    // 5: package_hours, 6: package_money, 7: individual_hours, 8: individual_money,
    // 9: created_at, 10: updated_at
    Ok(Client {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        company_name: row.get(1)?,
        tax_id: row.get(2)?,
        contact_name: row.get(3)?,
        contact_email: row.get(4)?,
        balances: Balances {
            package_hours: row.get(5)?,
            package_money: parse_decimal(&row.get::<_, String>(6)?)?,
            individual_hours: row.get(7)?,
            individual_money: parse_decimal(&row.get::<_, String>(8)?)?,
        },
        created_at: parse_time(&row.get::<_, String>(9)?)?,
        updated_at: parse_time(&row.get::<_, String>(10)?)?,
    })
}

fn row_to_ledger_entry(row: &Row<'_>) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        client_id: parse_uuid(&row.get::<_, String>(1)?)?,
        seq: row.get(2)?,
        pool: parse_enum(&row.get::<_, String>(3)?)?,
        hours_delta: row.get(4)?,
        money_delta: parse_decimal(&row.get::<_, String>(5)?)?,
        source: parse_enum(&row.get::<_, String>(6)?)?,
        reference_id: parse_opt_uuid(row.get(7)?)?,
        created_at: parse_time(&row.get::<_, String>(8)?)?,
        prev_hash: row.get(9)?,
        hash: row.get(10)?,
    })
}

fn row_to_signature(row: &Row<'_>) -> Result<Signature> {
    Ok(Signature {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        token: row.get(1)?,
        image: row.get(2)?,
        used: row.get(3)?,
        url: row.get(4)?,
        service_log_id: parse_opt_uuid(row.get(5)?)?,
        created_at: parse_time(&row.get::<_, String>(6)?)?,
        completed_at: parse_opt_time(row.get(7)?)?,
    })
}

fn row_to_service_log(row: &Row<'_>) -> Result<ServiceLog> {
    // 0: service_log_id, 1: ticket_number, 2: client_id, 3: technician_id,
    // 4: scheduled_arrival, 5: scheduled_departure, 6: actual_arrival, 7: actual_departure,
    // 8: billing_mode, 9: hours, 10: amount, 11: description, 12: equipment_id,
    // 13: system_id, 14: technician_signature_id, 15: client_signature_id, 16: grade,
    // 17: created_at
    let asset = AssetRef::from_ids(parse_opt_uuid(row.get(12)?)?, parse_opt_uuid(row.get(13)?)?)
        .map_err(Error::database)?;
    let hours: i64 = row.get(9)?;
    let grade: Option<i32> = row.get(16)?;

    Ok(ServiceLog {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        ticket_number: row.get(1)?,
        client_id: parse_uuid(&row.get::<_, String>(2)?)?,
        technician_id: parse_uuid(&row.get::<_, String>(3)?)?,
        scheduled_arrival: parse_time(&row.get::<_, String>(4)?)?,
        scheduled_departure: parse_time(&row.get::<_, String>(5)?)?,
        actual_arrival: parse_opt_time(row.get(6)?)?,
        actual_departure: parse_opt_time(row.get(7)?)?,
        billing_mode: parse_enum::<BillingMode>(&row.get::<_, String>(8)?)?,
        hours: u32::try_from(hours)
            .map_err(|_| Error::database(format!("Invalid hours {}", hours)))?,
        amount: parse_decimal(&row.get::<_, String>(10)?)?,
        description: row.get(11)?,
        asset,
        technician_signature_id: parse_uuid(&row.get::<_, String>(14)?)?,
        client_signature_id: parse_opt_uuid(row.get(15)?)?,
        grade: grade
            .map(|g| u8::try_from(g).map_err(|_| Error::database(format!("Invalid grade {}", g))))
            .transpose()?,
        created_at: parse_time(&row.get::<_, String>(17)?)?,
    })
}

fn row_to_survey(row: &Row<'_>) -> Result<Survey> {
    Ok(Survey {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        title: row.get(1)?,
        active: row.get(2)?,
        created_at: parse_time(&row.get::<_, String>(3)?)?,
    })
}

fn row_to_asset(row: &Row<'_>) -> Result<Asset> {
    let kind = match row.get::<_, String>(1)?.as_str() {
        "equipment" => AssetKind::Equipment,
        "system" => AssetKind::System,
        other => return Err(Error::database(format!("Invalid asset kind '{}'", other))),
    };
    Ok(Asset {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        kind,
        name: row.get(2)?,
        client_id: parse_opt_uuid(row.get(3)?)?,
        active: row.get(4)?,
    })
}

// === Writes shared by the transactional operations ===

fn read_balances(conn: &Connection, client_id: Uuid) -> Result<Option<Balances>> {
    query_opt(
        conn,
        "SELECT package_hours, package_money::VARCHAR, individual_hours, individual_money::VARCHAR
         FROM sys_clients WHERE client_id = ?",
        [client_id.to_string()],
        |row| {
            Ok(Balances {
                package_hours: row.get(0)?,
                package_money: parse_decimal(&row.get::<_, String>(1)?)?,
                individual_hours: row.get(2)?,
                individual_money: parse_decimal(&row.get::<_, String>(3)?)?,
            })
        },
    )
}

fn last_link(conn: &Connection, client_id: Uuid) -> Result<Option<(i64, String)>> {
    query_opt(
        conn,
        "SELECT seq, hash FROM sys_ledger_entries WHERE client_id = ? ORDER BY seq DESC LIMIT 1",
        [client_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

fn insert_ledger_row(conn: &Connection, entry: &LedgerEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO sys_ledger_entries (entry_id, client_id, seq, pool, hours_delta, money_delta,
                                         source, reference_id, created_at, prev_hash, hash)
         VALUES (?, ?, ?, ?, ?, CAST(? AS DECIMAL(24,6)), ?, ?, ?, ?, ?)",
        params![
            entry.id.to_string(),
            entry.client_id.to_string(),
            entry.seq,
            entry.pool.as_str(),
            entry.hours_delta,
            entry.money_delta.to_string(),
            entry.source.as_str(),
            entry.reference_id.map(|id| id.to_string()),
            fmt_time(&entry.created_at),
            &entry.prev_hash,
            &entry.hash,
        ],
    )?;
    Ok(())
}

/// Chain a draft onto the client's ledger and move the projection by the
/// same deltas. Must run inside a transaction.
fn append_entry(conn: &Connection, draft: &LedgerDraft) -> Result<LedgerEntry> {
    let last = last_link(conn, draft.client_id)?;
    let entry = draft
        .clone()
        .seal(last.as_ref().map(|(seq, hash)| (*seq, hash.as_str())), Utc::now());
    insert_ledger_row(conn, &entry)?;

    let (hours_col, money_col) = money_columns(entry.pool);
    let updated = conn.execute(
        &format!(
            "UPDATE sys_clients
             SET {hours} = {hours} + ?, {money} = {money} + CAST(? AS DECIMAL(24,6)), updated_at = ?
             WHERE client_id = ?",
            hours = hours_col,
            money = money_col
        ),
        params![
            entry.hours_delta,
            entry.money_delta.to_string(),
            fmt_time(&entry.created_at),
            entry.client_id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(Error::not_found(format!("client {}", entry.client_id)));
    }
    Ok(entry)
}

fn insert_signature_row(conn: &Connection, signature: &Signature) -> Result<()> {
    conn.execute(
        "INSERT INTO sys_signatures (signature_id, token, image, used, url, service_log_id,
                                     created_at, completed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            signature.id.to_string(),
            &signature.token,
            &signature.image,
            signature.used,
            &signature.url,
            signature.service_log_id.map(|id| id.to_string()),
            fmt_time(&signature.created_at),
            fmt_opt_time(&signature.completed_at),
        ],
    )?;
    Ok(())
}

fn insert_service_log_row(conn: &Connection, log: &ServiceLog) -> Result<()> {
    conn.execute(
        "INSERT INTO sys_service_logs (service_log_id, ticket_number, client_id, technician_id,
                                       scheduled_arrival, scheduled_departure, actual_arrival,
                                       actual_departure, billing_mode, hours, amount, description,
                                       equipment_id, system_id, technician_signature_id,
                                       client_signature_id, grade, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS DECIMAL(24,6)), ?, ?, ?, ?, ?, ?, ?)",
        params![
            log.id.to_string(),
            &log.ticket_number,
            log.client_id.to_string(),
            log.technician_id.to_string(),
            fmt_time(&log.scheduled_arrival),
            fmt_time(&log.scheduled_departure),
            fmt_opt_time(&log.actual_arrival),
            fmt_opt_time(&log.actual_departure),
            log.billing_mode.as_str(),
            log.hours as i64,
            log.amount.to_string(),
            &log.description,
            log.asset.equipment_id().map(|id| id.to_string()),
            log.asset.system_id().map(|id| id.to_string()),
            log.technician_signature_id.to_string(),
            log.client_signature_id.map(|id| id.to_string()),
            log.grade.map(|g| g as i32),
            fmt_time(&log.created_at),
        ],
    )?;
    Ok(())
}

impl Repository for DuckDbRepository {
    // === Clients ===

    fn insert_client(&self, client: &Client, opening: &[LedgerDraft]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // Projection starts at the sum of the opening entries
        let mut balances = Balances::default();
        let mut prev: Option<(i64, String)> = None;
        let created_at = Utc::now();
        for draft in opening.iter().filter(|d| !d.is_empty()) {
            let entry = draft
                .clone()
                .seal(prev.as_ref().map(|(seq, hash)| (*seq, hash.as_str())), created_at);
            insert_ledger_row(&tx, &entry)?;
            balances.apply(entry.pool, entry.hours_delta, entry.money_delta);
            prev = Some((entry.seq, entry.hash));
        }

        let inserted = tx.execute(
            "INSERT INTO sys_clients (client_id, company_name, tax_id, contact_name, contact_email,
                                      package_hours, package_money, individual_hours, individual_money,
                                      created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, CAST(? AS DECIMAL(24,6)), ?, CAST(? AS DECIMAL(24,6)), ?, ?)",
            params![
                client.id.to_string(),
                &client.company_name,
                &client.tax_id,
                &client.contact_name,
                &client.contact_email,
                balances.package_hours,
                balances.package_money.to_string(),
                balances.individual_hours,
                balances.individual_money.to_string(),
                fmt_time(&client.created_at),
                fmt_time(&client.updated_at),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e.to_string()) => {
                return Err(Error::conflict(format!(
                    "a client with tax id {} already exists",
                    client.tax_id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(())
    }

    fn get_client(&self, id: Uuid) -> Result<Option<Client>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            &format!("SELECT {} FROM sys_clients WHERE client_id = ?", CLIENT_COLUMNS),
            [id.to_string()],
            row_to_client,
        )
    }

    fn get_client_by_tax_id(&self, tax_id: &str) -> Result<Option<Client>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            &format!("SELECT {} FROM sys_clients WHERE tax_id = ?", CLIENT_COLUMNS),
            [tax_id],
            row_to_client,
        )
    }

    fn get_clients(&self) -> Result<Vec<Client>> {
        let conn = self.conn()?;
        query_all(
            &conn,
            &format!("SELECT {} FROM sys_clients ORDER BY company_name", CLIENT_COLUMNS),
            [],
            row_to_client,
        )
    }

    // === Ledger ===

    fn append_ledger_entry(&self, draft: &LedgerDraft) -> Result<(LedgerEntry, Balances)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let entry = append_entry(&tx, draft)?;
        let balances = read_balances(&tx, draft.client_id)?
            .ok_or_else(|| Error::not_found(format!("client {}", draft.client_id)))?;
        tx.commit()?;
        Ok((entry, balances))
    }

    fn get_ledger_entries(&self, client_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        query_all(
            &conn,
            &format!(
                "SELECT {} FROM sys_ledger_entries WHERE client_id = ? ORDER BY seq",
                LEDGER_COLUMNS
            ),
            [client_id.to_string()],
            row_to_ledger_entry,
        )
    }

    // === Configuration ===

    fn get_pricing(&self) -> Result<Option<Pricing>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            "SELECT price_per_individual_hour::VARCHAR, price_per_package_hour::VARCHAR,
                    commission_percent::VARCHAR
             FROM sys_configuration WHERE config_id = 1",
            [],
            |row| {
                Ok(Pricing {
                    price_per_individual_hour: parse_decimal(&row.get::<_, String>(0)?)?,
                    price_per_package_hour: parse_decimal(&row.get::<_, String>(1)?)?,
                    commission_percent: parse_decimal(&row.get::<_, String>(2)?)?,
                })
            },
        )
    }

    fn save_pricing(&self, pricing: &Pricing) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_configuration (config_id, price_per_individual_hour,
                                            price_per_package_hour, commission_percent, updated_at)
             VALUES (1, CAST(? AS DECIMAL(24,6)), CAST(? AS DECIMAL(24,6)), CAST(? AS DECIMAL(24,6)), ?)
             ON CONFLICT (config_id) DO UPDATE SET
                price_per_individual_hour = EXCLUDED.price_per_individual_hour,
                price_per_package_hour = EXCLUDED.price_per_package_hour,
                commission_percent = EXCLUDED.commission_percent,
                updated_at = EXCLUDED.updated_at",
            params![
                pricing.price_per_individual_hour.to_string(),
                pricing.price_per_package_hour.to_string(),
                pricing.commission_percent.to_string(),
                fmt_time(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    // === Users ===

    fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_users (user_id, name, email, role, active) VALUES (?, ?, ?, ?, ?)",
            params![
                user.id.to_string(),
                &user.name,
                &user.email,
                user.role.as_str(),
                user.active,
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            "SELECT user_id, name, email, role, active FROM sys_users WHERE user_id = ?",
            [id.to_string()],
            |row| {
                Ok(User {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: parse_enum::<Role>(&row.get::<_, String>(3)?)?,
                    active: row.get(4)?,
                })
            },
        )
    }

    fn count_users(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM sys_users", [], |row| row.get(0))?)
    }

    // === Assets ===

    fn insert_asset(&self, asset: &Asset) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_assets (asset_id, kind, name, client_id, active) VALUES (?, ?, ?, ?, ?)",
            params![
                asset.id.to_string(),
                asset.kind.as_str(),
                &asset.name,
                asset.client_id.map(|id| id.to_string()),
                asset.active,
            ],
        )?;
        Ok(())
    }

    fn get_asset(&self, kind: AssetKind, id: Uuid) -> Result<Option<Asset>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            "SELECT asset_id, kind, name, client_id, active FROM sys_assets
             WHERE asset_id = ? AND kind = ?",
            params![id.to_string(), kind.as_str()],
            row_to_asset,
        )
    }

    fn set_asset_active(&self, kind: AssetKind, id: Uuid, active: bool) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sys_assets SET active = ? WHERE asset_id = ? AND kind = ?",
            params![active, id.to_string(), kind.as_str()],
        )?;
        Ok(updated > 0)
    }

    // === Surveys ===

    fn insert_survey(&self, survey: &Survey) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_surveys (survey_id, title, active, created_at) VALUES (?, ?, ?, ?)",
            params![
                survey.id.to_string(),
                &survey.title,
                survey.active,
                fmt_time(&survey.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_survey(&self, id: Uuid) -> Result<Option<Survey>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            "SELECT survey_id, title, active, created_at FROM sys_surveys WHERE survey_id = ?",
            [id.to_string()],
            row_to_survey,
        )
    }

    fn insert_question(&self, question: &Question) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_questions (question_id, survey_id, text, position, active)
             VALUES (?, ?, ?, ?, ?)",
            params![
                question.id.to_string(),
                question.survey_id.to_string(),
                &question.text,
                question.position,
                question.active,
            ],
        )?;
        Ok(())
    }

    fn get_active_survey(&self) -> Result<Option<ActiveSurvey>> {
        let conn = self.conn()?;
        let survey = query_opt(
            &conn,
            "SELECT survey_id, title, active, created_at FROM sys_surveys
             WHERE active ORDER BY created_at DESC LIMIT 1",
            [],
            row_to_survey,
        )?;
        let Some(survey) = survey else {
            return Ok(None);
        };

        let questions = query_all(
            &conn,
            "SELECT question_id, survey_id, text, position, active FROM sys_questions
             WHERE survey_id = ? AND active ORDER BY position, question_id",
            [survey.id.to_string()],
            |row| {
                Ok(Question {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    survey_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    text: row.get(2)?,
                    position: row.get(3)?,
                    active: row.get(4)?,
                })
            },
        )?;

        Ok(Some(ActiveSurvey { survey, questions }))
    }

    // === Service logs ===

    fn create_service_log(
        &self,
        log: &ServiceLog,
        technician_signature: &Signature,
        debit: &LedgerDraft,
    ) -> Result<LedgerEntry> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        insert_signature_row(&tx, technician_signature)?;
        let entry = append_entry(&tx, debit)?;
        // Dropping `tx` on any error below rolls back the debit as well
        if let Err(e) = insert_service_log_row(&tx, log) {
            return Err(match e {
                Error::Database(msg) if is_unique_violation(&msg) => Error::conflict(format!(
                    "ticket number '{}' is already recorded",
                    log.ticket_number
                )),
                other => other,
            });
        }

        tx.commit()?;
        Ok(entry)
    }

    fn get_service_log(&self, id: Uuid) -> Result<Option<ServiceLog>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            &format!(
                "SELECT {} FROM sys_service_logs WHERE service_log_id = ?",
                SERVICE_LOG_COLUMNS
            ),
            [id.to_string()],
            row_to_service_log,
        )
    }

    fn get_service_logs(&self, client_id: Option<Uuid>) -> Result<Vec<ServiceLog>> {
        let conn = self.conn()?;
        match client_id {
            Some(client_id) => query_all(
                &conn,
                &format!(
                    "SELECT {} FROM sys_service_logs WHERE client_id = ? ORDER BY created_at DESC",
                    SERVICE_LOG_COLUMNS
                ),
                [client_id.to_string()],
                row_to_service_log,
            ),
            None => query_all(
                &conn,
                &format!(
                    "SELECT {} FROM sys_service_logs ORDER BY created_at DESC",
                    SERVICE_LOG_COLUMNS
                ),
                [],
                row_to_service_log,
            ),
        }
    }

    fn delete_service_log(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM sys_survey_answers WHERE service_log_id = ?",
            [id.to_string()],
        )?;
        let deleted = tx.execute(
            "DELETE FROM sys_service_logs WHERE service_log_id = ?",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn record_grade(&self, log_id: Uuid, grade: u8, answers: &Answers) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE sys_service_logs SET grade = ? WHERE service_log_id = ? AND grade IS NULL",
            params![grade as i32, log_id.to_string()],
        )?;
        if updated == 0 {
            return Ok(false);
        }

        for (question_id, answer) in answers {
            tx.execute(
                "INSERT INTO sys_survey_answers (service_log_id, question_id, answer)
                 VALUES (?, ?, ?)",
                params![log_id.to_string(), question_id.to_string(), *answer as i32],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    // === Signatures ===

    fn insert_signature(&self, signature: &Signature) -> Result<()> {
        let conn = self.conn()?;
        insert_signature_row(&conn, signature)
    }

    fn get_signature(&self, id: Uuid) -> Result<Option<Signature>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            &format!(
                "SELECT {} FROM sys_signatures WHERE signature_id = ?",
                SIGNATURE_COLUMNS
            ),
            [id.to_string()],
            row_to_signature,
        )
    }

    fn get_draft_by_token(&self, token: &str) -> Result<Option<Signature>> {
        let conn = self.conn()?;
        query_opt(
            &conn,
            &format!(
                "SELECT {} FROM sys_signatures WHERE token = ? AND NOT used",
                SIGNATURE_COLUMNS
            ),
            [token],
            row_to_signature,
        )
    }

    fn regenerate_signature(&self, old_id: Uuid, replacement: &Signature) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // Only the caller that flips `used` gets to insert a replacement
        let burned = tx.execute(
            "UPDATE sys_signatures SET used = TRUE WHERE signature_id = ? AND NOT used",
            [old_id.to_string()],
        )?;
        if burned == 0 {
            return Ok(false);
        }
        insert_signature_row(&tx, replacement)?;

        tx.commit()?;
        Ok(true)
    }

    fn complete_signature(&self, id: Uuid, image: &str, completed_at: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let owner: Option<Option<String>> = query_opt(
            &tx,
            "SELECT service_log_id FROM sys_signatures WHERE signature_id = ?",
            [id.to_string()],
            |row| Ok(row.get(0)?),
        )?;
        let Some(owner) = owner else {
            return Ok(false);
        };

        let completed = tx.execute(
            "UPDATE sys_signatures SET image = ?, used = TRUE, completed_at = ?
             WHERE signature_id = ? AND NOT used AND image IS NULL",
            params![image, fmt_time(&completed_at), id.to_string()],
        )?;
        if completed == 0 {
            return Ok(false);
        }

        if let Some(log_id) = owner {
            tx.execute(
                "UPDATE sys_service_logs SET client_signature_id = ? WHERE service_log_id = ?",
                params![id.to_string(), log_id],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    fn count_drafts(&self, created_before: Option<DateTime<Utc>>) -> Result<i64> {
        let conn = self.conn()?;
        let count = match created_before {
            Some(cutoff) => conn.query_row(
                "SELECT COUNT(*) FROM sys_signatures WHERE NOT used AND created_at < ?",
                [fmt_time(&cutoff)],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM sys_signatures WHERE NOT used",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }
}
