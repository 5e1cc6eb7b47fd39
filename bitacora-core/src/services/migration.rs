//! Migration service - manages database schema migrations
//!
//! Migrations are SQL files embedded at compile time. Each migration is
//! tracked in the sys_migrations table so it runs exactly once. The same
//! runner serves bitacora.duckdb and logs.duckdb with their own sets.

use std::collections::HashSet;

use anyhow::{Context, Result};
use duckdb::Connection;

use crate::migrations::{Migration, BOOTSTRAP, MIGRATIONS};

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Service for managing database migrations
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [Migration],
}

impl<'a> MigrationService<'a> {
    /// Runner for the main database schema
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_migrations(conn, MIGRATIONS)
    }

    pub fn with_migrations(conn: &'a Connection, migrations: &'static [Migration]) -> Self {
        Self { conn, migrations }
    }

    /// Run all pending migrations
    ///
    /// 1. Bootstraps sys_migrations if it does not exist
    /// 2. Applies every unrecorded migration in order
    /// 3. Records each one as it succeeds
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let mut newly_applied = Vec::new();

        if !self.migrations_table_exists()? {
            if let Some((name, sql)) = self.migrations.iter().find(|(n, _)| *n == BOOTSTRAP) {
                self.apply(name, sql)?;
                newly_applied.push(name.to_string());
            }
        }

        let applied: HashSet<String> = self.get_applied()?.into_iter().collect();
        let already_applied = applied.len() - newly_applied.len();

        for (name, sql) in self.migrations.iter() {
            if !applied.contains(*name) {
                self.apply(name, sql)?;
                newly_applied.push(name.to_string());
            }
        }

        Ok(MigrationResult {
            applied: newly_applied,
            already_applied,
        })
    }

    fn apply(&self, name: &str, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .with_context(|| format!("Migration {} failed", name))?;
        self.conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [name],
        )?;
        Ok(())
    }

    fn migrations_table_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Names of already applied migrations
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Names of migrations not yet applied
    pub fn get_pending(&self) -> Result<Vec<String>> {
        let applied: HashSet<String> = if self.migrations_table_exists()? {
            self.get_applied()?.into_iter().collect()
        } else {
            HashSet::new()
        };
        Ok(self
            .migrations
            .iter()
            .filter(|(name, _)| !applied.contains(*name))
            .map(|(name, _)| name.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_migrations::LOG_MIGRATIONS;

    #[test]
    fn test_migrations_run_once() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn);

        let result = service.run_pending().unwrap();
        assert_eq!(result.applied.len(), MIGRATIONS.len());
        assert_eq!(result.already_applied, 0);

        let again = service.run_pending().unwrap();
        assert!(again.applied.is_empty());
        assert_eq!(again.already_applied, MIGRATIONS.len());
        assert!(service.get_pending().unwrap().is_empty());
    }

    #[test]
    fn test_pending_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn);
        assert_eq!(service.get_pending().unwrap().len(), MIGRATIONS.len());
    }

    #[test]
    fn test_log_set_is_tracked_separately() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::with_migrations(&conn, LOG_MIGRATIONS);

        let result = service.run_pending().unwrap();
        assert_eq!(result.applied.len(), LOG_MIGRATIONS.len());
        // Main schema is still entirely pending on this connection
        let main = MigrationService::new(&conn).get_pending().unwrap();
        assert!(!main.contains(&BOOTSTRAP.to_string()));
        assert_eq!(main.len(), MIGRATIONS.len() - 1);
    }

    #[test]
    fn test_schema_seeds_pricing_row() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationService::new(&conn).run_pending().unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM sys_configuration WHERE config_id = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }
}
