//! Embedded SQL migrations for bitacora.duckdb
//!
//! Applied in list order by `MigrationService`. The bootstrap file creates
//! `sys_migrations` and is shared with the log database.

/// `(file name, SQL)`; the name is what `sys_migrations` records
pub type Migration = (&'static str, &'static str);

/// Creates the tracking table; always first in every set
pub const BOOTSTRAP: &str = "000_migrations.sql";

pub const MIGRATIONS: &[Migration] = &[
    (BOOTSTRAP, include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
