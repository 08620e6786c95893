//! Tenant administration used by the `tenant` CLI commands

use commitcast_database::{NewTenant, SettingsUpdate, Tenant, TenantSettings, TenantStore};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{BroadcastError, BroadcastResult};
use crate::tenant::webhook_url;

/// What an operator sees about a tenant; never includes credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantOverview {
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub webhook_url: String,
    pub is_active: bool,
    pub missing_credentials: Vec<&'static str>,
    pub post_language: String,
    pub max_commits: i32,
}

impl fmt::Display for TenantOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tenant:      {} <{}>", self.name, self.email)?;
        writeln!(f, "Tenant id:   {}", self.tenant_id)?;
        writeln!(f, "Webhook URL: {}", self.webhook_url)?;
        writeln!(f, "Language:    {}", self.post_language)?;
        writeln!(f, "Max commits: {}", self.max_commits)?;
        if self.is_active {
            write!(f, "Status:      active")
        } else {
            write!(
                f,
                "Status:      inactive (missing: {})",
                self.missing_credentials.join(", ")
            )
        }
    }
}

pub struct TenantAdmin {
    store: Arc<dyn TenantStore>,
    public_base_url: String,
}

impl TenantAdmin {
    pub fn new(store: Arc<dyn TenantStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into(),
        }
    }

    /// Register a tenant with empty, inactive settings.
    pub async fn create(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> BroadcastResult<TenantOverview> {
        let new_tenant = NewTenant::register(email, name, password)?;
        let (tenant, settings) = self.store.create_tenant(new_tenant).await?;
        info!(tenant_id = %tenant.id, "Tenant registered");
        Ok(self.overview(&tenant, &settings))
    }

    /// Apply a partial settings update to the tenant owning `token`.
    pub async fn configure(
        &self,
        token: &str,
        update: &SettingsUpdate,
    ) -> BroadcastResult<TenantOverview> {
        let tenant = self.tenant_by_token(token).await?;
        let settings = self.store.update_settings(tenant.id, update).await?;
        info!(
            tenant_id = %tenant.id,
            is_active = settings.is_active,
            "Tenant settings updated"
        );
        Ok(self.overview(&tenant, &settings))
    }

    pub async fn show(&self, token: &str) -> BroadcastResult<TenantOverview> {
        let tenant = self.tenant_by_token(token).await?;
        let settings = self
            .store
            .find_settings(tenant.id)
            .await?
            .ok_or_else(|| BroadcastError::not_found("Tenant settings"))?;
        Ok(self.overview(&tenant, &settings))
    }

    async fn tenant_by_token(&self, token: &str) -> BroadcastResult<Tenant> {
        self.store
            .find_by_webhook_token(token)
            .await?
            .ok_or_else(|| BroadcastError::not_found("Tenant"))
    }

    fn overview(&self, tenant: &Tenant, settings: &TenantSettings) -> TenantOverview {
        let missing_credentials = [
            ("telegram_bot_token", settings.telegram_bot_token.is_empty()),
            ("telegram_channel_id", settings.telegram_channel_id.is_empty()),
            ("ai_api_key", settings.ai_api_key.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect();

        TenantOverview {
            tenant_id: tenant.id,
            email: tenant.email.clone(),
            name: tenant.name.clone(),
            webhook_url: webhook_url(&self.public_base_url, &tenant.webhook_token),
            is_active: settings.is_active,
            missing_credentials,
            post_language: settings.post_language.clone(),
            max_commits: settings.max_commits,
        }
    }
}
