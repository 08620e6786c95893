//! Tenant and tenant-settings records
//!
//! A tenant owns exactly one settings row. The settings row is created with
//! defaults when the tenant registers and is only ever changed through
//! [`TenantSettings::apply`], which keeps `is_active` in sync with the
//! credentials present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::credentials::{generate_webhook_token, hash_password};
use crate::DatabaseError;

pub const DEFAULT_AI_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";
pub const DEFAULT_POST_LANGUAGE: &str = "ru";
pub const DEFAULT_MAX_COMMITS: i32 = 5;

const MIN_PASSWORD_LENGTH: usize = 6;

/// A registered customer of the hosted broadcaster
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub webhook_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("webhook_token", &redact(&self.webhook_token))
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Per-tenant delivery configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantSettings {
    pub tenant_id: Uuid,
    pub telegram_bot_token: String,
    pub telegram_channel_id: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub github_secret: String,
    pub post_language: String,
    pub max_commits: i32,
    pub custom_prompt: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantSettings {
    /// Settings row created alongside a new tenant
    pub fn defaults_for(tenant_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            telegram_bot_token: String::new(),
            telegram_channel_id: String::new(),
            ai_api_key: String::new(),
            ai_model: DEFAULT_AI_MODEL.to_string(),
            github_secret: String::new(),
            post_language: DEFAULT_POST_LANGUAGE.to_string(),
            max_commits: DEFAULT_MAX_COMMITS,
            custom_prompt: None,
            is_active: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the bot token, channel id and AI key are all present
    pub fn has_required_credentials(&self) -> bool {
        !self.telegram_bot_token.is_empty()
            && !self.telegram_channel_id.is_empty()
            && !self.ai_api_key.is_empty()
    }

    /// Merge a partial update and recompute activation.
    ///
    /// Absent fields, empty strings and non-positive `max_commits` leave the
    /// stored value untouched.
    pub fn apply(&mut self, update: &SettingsUpdate, now: DateTime<Utc>) {
        overwrite(&mut self.telegram_bot_token, &update.telegram_bot_token);
        overwrite(&mut self.telegram_channel_id, &update.telegram_channel_id);
        overwrite(&mut self.ai_api_key, &update.ai_api_key);
        overwrite(&mut self.ai_model, &update.ai_model);
        overwrite(&mut self.github_secret, &update.github_secret);
        overwrite(&mut self.post_language, &update.post_language);

        if let Some(prompt) = update.custom_prompt.as_deref().filter(|p| !p.is_empty()) {
            self.custom_prompt = Some(prompt.to_string());
        }
        if let Some(max_commits) = update.max_commits.filter(|n| *n > 0) {
            self.max_commits = max_commits;
        }

        self.is_active = self.has_required_credentials();
        self.updated_at = now;
    }
}

impl fmt::Debug for TenantSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantSettings")
            .field("tenant_id", &self.tenant_id)
            .field("telegram_bot_token", &redact(&self.telegram_bot_token))
            .field("telegram_channel_id", &self.telegram_channel_id)
            .field("ai_api_key", &redact(&self.ai_api_key))
            .field("ai_model", &self.ai_model)
            .field("github_secret", &redact(&self.github_secret))
            .field("post_language", &self.post_language)
            .field("max_commits", &self.max_commits)
            .field("custom_prompt", &self.custom_prompt)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Partial settings update submitted by a tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub telegram_bot_token: Option<String>,
    pub telegram_channel_id: Option<String>,
    pub ai_api_key: Option<String>,
    pub ai_model: Option<String>,
    pub github_secret: Option<String>,
    pub post_language: Option<String>,
    pub max_commits: Option<i32>,
    pub custom_prompt: Option<String>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self == &SettingsUpdate::default()
    }
}

/// Validated registration request, password already hashed
#[derive(Clone)]
pub struct NewTenant {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub webhook_token: String,
}

impl NewTenant {
    /// Validate registration input, hash the password and mint a webhook token.
    pub fn register(email: &str, name: &str, password: &str) -> Result<Self, DatabaseError> {
        let email = email.trim();
        let name = name.trim();

        if email.is_empty() || !email.contains('@') {
            return Err(DatabaseError::Validation(format!(
                "invalid email address: {:?}",
                email
            )));
        }
        if name.is_empty() {
            return Err(DatabaseError::Validation("name must not be empty".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(DatabaseError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        Ok(Self {
            email: email.to_lowercase(),
            name: name.to_string(),
            password_hash: hash_password(password)?,
            webhook_token: generate_webhook_token(),
        })
    }

    /// Materialize the tenant record with a fresh id.
    pub fn into_tenant(self, now: DateTime<Utc>) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            webhook_token: self.webhook_token,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Debug for NewTenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewTenant")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn overwrite(field: &mut String, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
        *field = value.to_string();
    }
}

/// Show only a short prefix of a secret.
fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let prefix: String = secret.chars().take(6).collect();
    format!("{}…", prefix)
}
