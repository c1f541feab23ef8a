//! # Database Migrations
//!
//! Embedded SQL migrations for FuelRecon.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Startup ──► _sqlx_migrations present? ──► compare embedded vs applied  │
//! │                                                  │                      │
//! │        001_initial_schema.sql ✓ applied          │                      │
//! │        002_...             ⬜ pending ◄───────────┘                      │
//! │                                                                         │
//! │  Pending files run in filename order, one transaction each.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! New schema changes go in a new `NNN_description.sql` file under
//! `migrations/sqlite/`; applied files are never edited.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations. Safe to call repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!(
        total = MIGRATOR.migrations.len(),
        "All migrations applied successfully"
    );
    Ok(())
}

/// Returns `(embedded, applied)` migration counts for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
