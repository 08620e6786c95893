//! In-memory tenant repository

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::TenantStore;
use crate::models::{NewTenant, SettingsUpdate, Tenant, TenantSettings};
use crate::DatabaseError;

#[derive(Default)]
struct MemoryState {
    tenants: HashMap<Uuid, Tenant>,
    settings: HashMap<Uuid, TenantSettings>,
}

/// Process-local [`TenantStore`]; nothing survives a restart.
#[derive(Default)]
pub struct InMemoryTenantStore {
    state: RwLock<MemoryState>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tenant directly, optionally without a settings row.
    pub fn insert(&self, tenant: Tenant, settings: Option<TenantSettings>) {
        let mut state = self.state.write();
        if let Some(settings) = settings {
            state.settings.insert(tenant.id, settings);
        }
        state.tenants.insert(tenant.id, tenant);
    }

    pub fn tenant_count(&self) -> usize {
        self.state.read().tenants.len()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find_by_webhook_token(&self, token: &str) -> Result<Option<Tenant>, DatabaseError> {
        let state = self.state.read();
        Ok(state
            .tenants
            .values()
            .find(|t| t.webhook_token == token)
            .cloned())
    }

    async fn find_settings(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantSettings>, DatabaseError> {
        Ok(self.state.read().settings.get(&tenant_id).cloned())
    }

    async fn create_tenant(
        &self,
        new_tenant: NewTenant,
    ) -> Result<(Tenant, TenantSettings), DatabaseError> {
        let mut state = self.state.write();

        if state.tenants.values().any(|t| t.email == new_tenant.email) {
            return Err(DatabaseError::Conflict(
                "a tenant with this email already exists".to_string(),
            ));
        }
        if state
            .tenants
            .values()
            .any(|t| t.webhook_token == new_tenant.webhook_token)
        {
            return Err(DatabaseError::Conflict("webhook token collision".to_string()));
        }

        let now = Utc::now();
        let tenant = new_tenant.into_tenant(now);
        let settings = TenantSettings::defaults_for(tenant.id, now);

        state.tenants.insert(tenant.id, tenant.clone());
        state.settings.insert(tenant.id, settings.clone());

        Ok((tenant, settings))
    }

    async fn update_settings(
        &self,
        tenant_id: Uuid,
        update: &SettingsUpdate,
    ) -> Result<TenantSettings, DatabaseError> {
        let mut state = self.state.write();
        let settings = state
            .settings
            .get_mut(&tenant_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("settings for tenant {}", tenant_id)))?;

        settings.apply(update, Utc::now());
        Ok(settings.clone())
    }
}
