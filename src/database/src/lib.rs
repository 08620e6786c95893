//! Tenant persistence layer for CommitCast
//!
//! This crate owns everything the broadcaster persists in multi-tenant mode:
//! tenants, their one-to-one settings rows, webhook-token generation and
//! password hashing. Consumers depend on the [`TenantStore`] capability and
//! receive either the PostgreSQL implementation or the in-memory one.

pub mod credentials;
pub mod migrations;
pub mod models;
pub mod repositories;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;

pub use credentials::{generate_webhook_token, hash_password};
pub use migrations::run_migrations;
pub use models::{
    NewTenant, SettingsUpdate, Tenant, TenantSettings, DEFAULT_AI_MODEL, DEFAULT_MAX_COMMITS,
    DEFAULT_POST_LANGUAGE,
};
pub use repositories::{InMemoryTenantStore, PgTenantStore, TenantStore};

/// PostgreSQL connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/commitcast".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            max_lifetime_seconds: 1800,
        }
    }
}

/// Open a PostgreSQL pool and verify it answers a trivial query.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, DatabaseError> {
    tracing::info!(
        max_connections = config.max_connections,
        "Initializing PostgreSQL connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    let row = sqlx::query("SELECT 1").fetch_one(&pool).await?;
    let value: i32 = row.try_get(0)?;
    if value != 1 {
        return Err(DatabaseError::Connection(
            "PostgreSQL connection test failed".to_string(),
        ));
    }

    Ok(pool)
}

/// Errors raised by the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Password hashing error: {0}")]
    Hashing(String),
}
