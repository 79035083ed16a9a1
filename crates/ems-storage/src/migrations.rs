//! Database migration management.
//!
//! Migrations are embedded in the binary at compile time so deployments
//! stay single-binary; applied versions are tracked in `_sqlx_migrations`.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::Result;

/// Embedded migrations in chronological order: (version, description, sql).
///
/// To add a migration, create the SQL file under `migrations/` and append
/// an entry here.
const EMBEDDED_MIGRATIONS: &[(i64, &str, &str)] = &[(
    20250801000001,
    "initial_schema",
    include_str!("../migrations/20250801000001_initial_schema.sql"),
)];

fn build_migrations() -> Vec<Migration> {
    EMBEDDED_MIGRATIONS
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]), // empty checksum for embedded migrations
            no_tx: false,
        })
        .collect()
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running database migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ..Migrator::DEFAULT
    };

    migrator.run(pool).await?;

    info!("Database migrations complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        let migrations = build_migrations();
        assert!(!migrations.is_empty());
        for pair in migrations.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn test_initial_schema_creates_all_tables() {
        let (_, _, sql) = EMBEDDED_MIGRATIONS[0];
        for table in [
            "employees",
            "departments",
            "user_role_maps",
            "licenses",
            "hardware",
            "software",
            "tickets",
            "integrations",
            "attendance_logs",
        ] {
            assert!(sql.contains(table), "missing table {table}");
        }
    }
}
