//! Schema migrations
//!
//! Migrations live in `src/database/migrations` and are embedded at compile
//! time, so the server binary can bring a fresh database up to date without
//! any external tooling.

use sqlx::PgPool;

use crate::DatabaseError;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply every pending migration.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    tracing::info!(
        available = MIGRATOR.iter().count(),
        "Running database migrations"
    );

    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    tracing::info!("Database migrations completed");
    Ok(())
}
