//! PostgreSQL tenant repository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::TenantStore;
use crate::models::{NewTenant, SettingsUpdate, Tenant, TenantSettings};
use crate::DatabaseError;

const TENANT_COLUMNS: &str =
    "id, email, name, password_hash, webhook_token, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "tenant_id, telegram_bot_token, telegram_channel_id, ai_api_key, \
     ai_model, github_secret, post_language, max_commits, custom_prompt, is_active, \
     created_at, updated_at";

const EMAIL_UNIQUE: &str = "tenants_email_key";
const WEBHOOK_TOKEN_UNIQUE: &str = "tenants_webhook_token_key";

#[derive(Clone)]
pub struct PgTenantStore {
    pool: Arc<PgPool>,
}

impl PgTenantStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn find_by_webhook_token(&self, token: &str) -> Result<Option<Tenant>, DatabaseError> {
        let query = format!("SELECT {} FROM tenants WHERE webhook_token = $1", TENANT_COLUMNS);
        let tenant = sqlx::query_as::<_, Tenant>(&query)
            .bind(token)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(tenant)
    }

    async fn find_settings(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantSettings>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM tenant_settings WHERE tenant_id = $1",
            SETTINGS_COLUMNS
        );
        let settings = sqlx::query_as::<_, TenantSettings>(&query)
            .bind(tenant_id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(settings)
    }

    async fn create_tenant(
        &self,
        new_tenant: NewTenant,
    ) -> Result<(Tenant, TenantSettings), DatabaseError> {
        let now = Utc::now();
        let tenant = new_tenant.into_tenant(now);
        let defaults = TenantSettings::defaults_for(tenant.id, now);

        let mut tx = self.pool.begin().await?;

        let insert_tenant = format!(
            r#"
            INSERT INTO tenants (id, email, name, password_hash, webhook_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            TENANT_COLUMNS
        );
        let tenant = sqlx::query_as::<_, Tenant>(&insert_tenant)
            .bind(tenant.id)
            .bind(&tenant.email)
            .bind(&tenant.name)
            .bind(&tenant.password_hash)
            .bind(&tenant.webhook_token)
            .bind(tenant.created_at)
            .bind(tenant.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(tenant_conflict)?;

        let insert_settings = format!(
            r#"
            INSERT INTO tenant_settings (tenant_id, ai_model, post_language, max_commits, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            SETTINGS_COLUMNS
        );
        let settings = sqlx::query_as::<_, TenantSettings>(&insert_settings)
            .bind(defaults.tenant_id)
            .bind(&defaults.ai_model)
            .bind(&defaults.post_language)
            .bind(defaults.max_commits)
            .bind(defaults.created_at)
            .bind(defaults.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant.id, "Tenant created");
        Ok((tenant, settings))
    }

    async fn update_settings(
        &self,
        tenant_id: Uuid,
        update: &SettingsUpdate,
    ) -> Result<TenantSettings, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT {} FROM tenant_settings WHERE tenant_id = $1 FOR UPDATE",
            SETTINGS_COLUMNS
        );
        let mut settings = sqlx::query_as::<_, TenantSettings>(&select)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("settings for tenant {}", tenant_id)))?;

        settings.apply(update, Utc::now());

        let statement = format!(
            r#"
            UPDATE tenant_settings SET
                telegram_bot_token = $2,
                telegram_channel_id = $3,
                ai_api_key = $4,
                ai_model = $5,
                github_secret = $6,
                post_language = $7,
                max_commits = $8,
                custom_prompt = $9,
                is_active = $10,
                updated_at = $11
            WHERE tenant_id = $1
            RETURNING {}
            "#,
            SETTINGS_COLUMNS
        );
        let stored = sqlx::query_as::<_, TenantSettings>(&statement)
            .bind(tenant_id)
            .bind(&settings.telegram_bot_token)
            .bind(&settings.telegram_channel_id)
            .bind(&settings.ai_api_key)
            .bind(&settings.ai_model)
            .bind(&settings.github_secret)
            .bind(&settings.post_language)
            .bind(settings.max_commits)
            .bind(&settings.custom_prompt)
            .bind(settings.is_active)
            .bind(settings.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            is_active = stored.is_active,
            "Tenant settings updated"
        );
        Ok(stored)
    }
}

fn tenant_conflict(error: sqlx::Error) -> DatabaseError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DatabaseError::Conflict(conflict_message(db.constraint()))
        }
        _ => DatabaseError::Postgres(error),
    }
}

/// Names the column behind a unique violation on `tenants`.
fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some(EMAIL_UNIQUE) => "a tenant with this email already exists".to_string(),
        Some(WEBHOOK_TOKEN_UNIQUE) => {
            "generated webhook token is already in use; retry tenant creation".to_string()
        }
        Some(other) => format!("tenant violates unique constraint {}", other),
        None => "tenant already exists".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PostgresConfig;

    #[test]
    fn test_conflict_message_names_the_colliding_column() {
        assert_eq!(
            conflict_message(Some("tenants_email_key")),
            "a tenant with this email already exists"
        );
        assert!(conflict_message(Some("tenants_webhook_token_key")).contains("webhook token"));
        assert!(!conflict_message(Some("tenants_webhook_token_key")).contains("email"));
        assert!(conflict_message(Some("tenants_pkey")).contains("tenants_pkey"));
        assert_eq!(conflict_message(None), "tenant already exists");
    }

    async fn test_store() -> Option<PgTenantStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let config = PostgresConfig {
            url,
            max_connections: 2,
            ..Default::default()
        };
        let pool = crate::connect(&config).await.ok()?;
        crate::run_migrations(&pool).await.ok()?;
        Some(PgTenantStore::new(Arc::new(pool)))
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL pointing at a disposable PostgreSQL database"]
    async fn test_create_find_and_update() {
        let Some(store) = test_store().await else {
            return;
        };

        let email = format!("{}@example.test", Uuid::new_v4());
        let new_tenant = NewTenant::register(&email, "Acme", "secret-pass").unwrap();
        let (tenant, settings) = store.create_tenant(new_tenant).await.unwrap();
        assert!(!settings.is_active);

        let found = store
            .find_by_webhook_token(&tenant.webhook_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, tenant.id);

        let updated = store
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
        assert!(updated.is_active);

        let duplicate = NewTenant::register(&email, "Other", "secret-pass").unwrap();
        match store.create_tenant(duplicate).await {
            Err(DatabaseError::Conflict(message)) => assert!(message.contains("email")),
            other => panic!("expected email conflict, got {:?}", other.map(|(t, _)| t.id)),
        }
    }
}
