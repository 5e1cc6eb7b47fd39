//! Embedded SQL migrations for logs.duckdb

use crate::migrations::{Migration, BOOTSTRAP};

pub const LOG_MIGRATIONS: &[Migration] = &[
    (BOOTSTRAP, include_str!("../migrations/000_migrations.sql")),
    ("001_event_log.sql", include_str!("001_event_log.sql")),
];
