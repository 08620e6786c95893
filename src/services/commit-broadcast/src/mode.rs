//! Delivery modes
//!
//! A [`DeliveryMode`] answers one question for the webhook router: which
//! secret verifies this delivery and which credentials publish it. The mode is
//! chosen once at startup from `mode` in the configuration.

use async_trait::async_trait;
use commitcast_database::TenantSettings;
use std::fmt;
use uuid::Uuid;

use crate::config::{DeploymentMode, SingleTenantConfig};
use crate::error::{BroadcastError, BroadcastResult};
use crate::tenant::{ResolvedTenant, TenantResolver};

/// Credentials and preferences one broadcast job needs
#[derive(Clone, PartialEq, Eq)]
pub struct PublishProfile {
    pub telegram_bot_token: String,
    pub telegram_channel_id: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub post_language: String,
    pub max_commits: i32,
    pub custom_prompt: Option<String>,
}

impl From<&TenantSettings> for PublishProfile {
    fn from(settings: &TenantSettings) -> Self {
        Self {
            telegram_bot_token: settings.telegram_bot_token.clone(),
            telegram_channel_id: settings.telegram_channel_id.clone(),
            ai_api_key: settings.ai_api_key.clone(),
            ai_model: settings.ai_model.clone(),
            post_language: settings.post_language.clone(),
            max_commits: settings.max_commits,
            custom_prompt: settings.custom_prompt.clone(),
        }
    }
}

impl From<&SingleTenantConfig> for PublishProfile {
    fn from(config: &SingleTenantConfig) -> Self {
        Self {
            telegram_bot_token: config.telegram_bot_token.clone(),
            telegram_channel_id: config.telegram_channel_id.clone(),
            ai_api_key: config.ai_api_key.clone(),
            ai_model: config.ai_model.clone(),
            post_language: config.post_language.clone(),
            max_commits: config.max_commits,
            custom_prompt: config.custom_prompt.clone(),
        }
    }
}

impl fmt::Debug for PublishProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishProfile")
            .field("telegram_channel_id", &self.telegram_channel_id)
            .field("ai_model", &self.ai_model)
            .field("post_language", &self.post_language)
            .field("max_commits", &self.max_commits)
            .field("custom_prompt", &self.custom_prompt.is_some())
            .finish_non_exhaustive()
    }
}

/// Where a delivery goes once it is verified
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    pub tenant_id: Option<Uuid>,
    pub webhook_secret: String,
    pub profile: PublishProfile,
}

#[async_trait]
pub trait DeliveryMode: Send + Sync {
    fn kind(&self) -> DeploymentMode;

    /// Resolve the target for a delivery; `token` is the URL path token.
    async fn resolve(&self, token: Option<&str>) -> BroadcastResult<DeliveryTarget>;
}

/// Process-wide credentials for every delivery
pub struct SingleTenantMode {
    target: DeliveryTarget,
}

impl SingleTenantMode {
    pub fn new(config: &SingleTenantConfig) -> Self {
        Self {
            target: DeliveryTarget {
                tenant_id: None,
                webhook_secret: config.github_webhook_secret.clone(),
                profile: PublishProfile::from(config),
            },
        }
    }
}

#[async_trait]
impl DeliveryMode for SingleTenantMode {
    fn kind(&self) -> DeploymentMode {
        DeploymentMode::Single
    }

    async fn resolve(&self, _token: Option<&str>) -> BroadcastResult<DeliveryTarget> {
        Ok(self.target.clone())
    }
}

/// Per-tenant credentials looked up by webhook token
pub struct MultiTenantMode {
    resolver: TenantResolver,
}

impl MultiTenantMode {
    pub fn new(resolver: TenantResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl DeliveryMode for MultiTenantMode {
    fn kind(&self) -> DeploymentMode {
        DeploymentMode::Multi
    }

    async fn resolve(&self, token: Option<&str>) -> BroadcastResult<DeliveryTarget> {
        let token = token.ok_or_else(|| BroadcastError::not_found("Tenant"))?;
        let ResolvedTenant { tenant, settings } = self.resolver.resolve_by_token(token).await?;

        Ok(DeliveryTarget {
            tenant_id: Some(tenant.id),
            webhook_secret: settings.github_secret.clone(),
            profile: PublishProfile::from(&settings),
        })
    }
}
