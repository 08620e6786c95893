//! Webhook-token to tenant resolution for multi-tenant mode

use commitcast_database::{DatabaseError, Tenant, TenantSettings, TenantStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::BroadcastError;

/// A tenant whose deliveries may be broadcast
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub tenant: Tenant,
    pub settings: TenantSettings,
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no tenant owns this webhook token")]
    NotFound,

    #[error("tenant {tenant_id} has no settings")]
    SettingsMissing { tenant_id: Uuid },

    #[error("tenant {tenant_id} is not active")]
    Inactive { tenant_id: Uuid },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<ResolutionError> for BroadcastError {
    fn from(error: ResolutionError) -> Self {
        match error {
            ResolutionError::NotFound | ResolutionError::SettingsMissing { .. } => {
                BroadcastError::not_found("Tenant")
            }
            ResolutionError::Inactive { .. } => BroadcastError::forbidden(
                "tenant is not active; configure Telegram and AI credentials first",
            ),
            ResolutionError::Store(source) => BroadcastError::Database { source },
        }
    }
}

#[derive(Clone)]
pub struct TenantResolver {
    store: Arc<dyn TenantStore>,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    pub async fn resolve_by_token(&self, token: &str) -> Result<ResolvedTenant, ResolutionError> {
        let token_prefix = token_prefix(token);

        let tenant = self
            .store
            .find_by_webhook_token(token)
            .await?
            .ok_or_else(|| {
                debug!(token_prefix = %token_prefix, "Unknown webhook token");
                ResolutionError::NotFound
            })?;

        let settings = match self.store.find_settings(tenant.id).await? {
            Some(settings) => settings,
            None => {
                error!(
                    tenant_id = %tenant.id,
                    token_prefix = %token_prefix,
                    "Invariant violation: tenant exists without settings"
                );
                return Err(ResolutionError::SettingsMissing {
                    tenant_id: tenant.id,
                });
            }
        };

        if !settings.is_active {
            debug!(tenant_id = %tenant.id, "Tenant is inactive");
            return Err(ResolutionError::Inactive {
                tenant_id: tenant.id,
            });
        }

        Ok(ResolvedTenant { tenant, settings })
    }
}

/// First characters of a token, safe to put in logs.
pub fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if token.chars().count() > 8 {
        format!("{}…", prefix)
    } else {
        prefix
    }
}

/// Public webhook URL for a tenant token.
pub fn webhook_url(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/webhook/github/{}",
        public_base_url.trim_end_matches('/'),
        token
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use commitcast_database::{InMemoryTenantStore, NewTenant, SettingsUpdate};
    use tracing_test::traced_test;

    async fn store_with_tenant(active: bool) -> (Arc<InMemoryTenantStore>, Tenant) {
        let store = Arc::new(InMemoryTenantStore::new());
        let new_tenant = NewTenant::register("ops@acme.dev", "Acme", "secret-pass").unwrap();
        let (tenant, _) = store.create_tenant(new_tenant).await.unwrap();
        if active {
            store
                .update_settings(
                    tenant.id,
                    &SettingsUpdate {
                        telegram_bot_token: Some("123:abc".to_string()),
                        telegram_channel_id: Some("@releases".to_string()),
                        ai_api_key: Some("sk-test".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        (store, tenant)
    }

    #[tokio::test]
    async fn test_resolves_active_tenant() {
        let (store, tenant) = store_with_tenant(true).await;
        let resolver = TenantResolver::new(store);

        let resolved = resolver
            .resolve_by_token(&tenant.webhook_token)
            .await
            .unwrap();
        assert_eq!(resolved.tenant.id, tenant.id);
        assert!(resolved.settings.is_active);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (store, _) = store_with_tenant(true).await;
        let resolver = TenantResolver::new(store);

        let result = resolver.resolve_by_token("deadbeef").await;
        assert!(matches!(result, Err(ResolutionError::NotFound)));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_inactive_tenant() {
        let (store, tenant) = store_with_tenant(false).await;
        let resolver = TenantResolver::new(store);

        let result = resolver.resolve_by_token(&tenant.webhook_token).await;
        assert!(matches!(result, Err(ResolutionError::Inactive { .. })));
        assert!(logs_contain("Tenant is inactive"));
        assert!(!logs_contain("Invariant violation"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_settings_missing() {
        let store = Arc::new(InMemoryTenantStore::new());
        let tenant = NewTenant::register("ops@acme.dev", "Acme", "secret-pass")
            .unwrap()
            .into_tenant(Utc::now());
        let token = tenant.webhook_token.clone();
        store.insert(tenant, None);

        let resolver = TenantResolver::new(store);
        let result = resolver.resolve_by_token(&token).await;
        assert!(matches!(
            result,
            Err(ResolutionError::SettingsMissing { .. })
        ));
        assert!(logs_contain(
            "Invariant violation: tenant exists without settings"
        ));
        assert!(logs_contain("ERROR"));
        assert!(!logs_contain(&token));
    }

    #[test]
    fn test_error_mapping() {
        use axum::http::StatusCode;

        let not_found: BroadcastError = ResolutionError::NotFound.into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let missing: BroadcastError = ResolutionError::SettingsMissing {
            tenant_id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let inactive: BroadcastError = ResolutionError::Inactive {
            tenant_id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(inactive.status_code(), StatusCode::FORBIDDEN);

        let store: BroadcastError =
            ResolutionError::Store(DatabaseError::Connection("refused".to_string())).into();
        assert_eq!(store.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_token_helpers() {
        assert_eq!(token_prefix("0123456789abcdef"), "01234567…");
        assert_eq!(token_prefix("abc"), "abc");
        assert_eq!(
            webhook_url("https://cast.example.com/", "abc123"),
            "https://cast.example.com/webhook/github/abc123"
        );
    }
}
