//! Tenant repositories
//!
//! [`TenantStore`] is the capability the broadcaster depends on. Two
//! implementations ship with the crate:
//! - [`PgTenantStore`] for production, backed by PostgreSQL
//! - [`InMemoryTenantStore`] for tests and local experiments

pub mod memory;
pub mod postgresql;

use async_trait::async_trait;
use uuid::Uuid;

pub use memory::InMemoryTenantStore;
pub use postgresql::PgTenantStore;

use crate::models::{NewTenant, SettingsUpdate, Tenant, TenantSettings};
use crate::DatabaseError;

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Look up the tenant owning a webhook token.
    async fn find_by_webhook_token(&self, token: &str) -> Result<Option<Tenant>, DatabaseError>;

    /// Load the settings row of a tenant.
    async fn find_settings(&self, tenant_id: Uuid)
        -> Result<Option<TenantSettings>, DatabaseError>;

    /// Persist a new tenant together with its default settings.
    ///
    /// Fails with [`DatabaseError::Conflict`] when the email is taken.
    async fn create_tenant(
        &self,
        new_tenant: NewTenant,
    ) -> Result<(Tenant, TenantSettings), DatabaseError>;

    /// Apply a partial settings update and return the stored result.
    async fn update_settings(
        &self,
        tenant_id: Uuid,
        update: &SettingsUpdate,
    ) -> Result<TenantSettings, DatabaseError>;
}
