//! Configuration for the CommitCast broadcast service
//!
//! Values are layered, lowest priority first:
//! 1. built-in defaults
//! 2. legacy deployment variables (`TELEGRAM_BOT_TOKEN`, `PORT`, `DATABASE_URL`, ...)
//! 3. an optional file named by `COMMITCAST_CONFIG_FILE`
//! 4. `COMMITCAST_<SECTION>__<KEY>` environment variables
//!
//! Leaving `single_tenant.github_webhook_secret` empty disables signature
//! checks for the single-tenant endpoint. Anyone who can reach the endpoint
//! can then trigger posts, so only do this behind a trusted proxy.

use commitcast_database::{PostgresConfig, DEFAULT_AI_MODEL, DEFAULT_MAX_COMMITS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

const ENV_PREFIX: &str = "COMMITCAST";
const CONFIG_FILE_VAR: &str = "COMMITCAST_CONFIG_FILE";

pub const DEFAULT_AI_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Prompt used when a tenant has no custom prompt of its own
pub const DEFAULT_PROMPT: &str = "You are a developer sharing your progress with followers on Telegram. \
Write in a lively, energetic way with a bit of humor.

Commits:
{summary}

Project: {repository}

Write a short post of 2-4 sentences:
- No formal greetings
- Get straight to the point: what changed and why it matters
- A light joke is welcome
- A few emoji are fine, do not overdo it
- No hashtags
- Write it in the language with code \"{language}\"";

/// Main configuration structure for the broadcast service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    pub server: ServerConfig,
    /// Which route family and credential source to use
    pub mode: DeploymentMode,
    /// Process-wide credentials, used in single-tenant mode only
    pub single_tenant: SingleTenantConfig,
    pub ai: AiConfig,
    pub telegram: TelegramConfig,
    /// Tenant database, used in multi-tenant mode only
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Single,
    #[serde(alias = "saas")]
    Multi,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Single => "single",
            DeploymentMode::Multi => "multi",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 8080)
    pub port: u16,
    /// Timeout for outbound HTTP requests in seconds (default: 30)
    pub request_timeout: u64,
    /// Maximum webhook body size in bytes (default: 5MB)
    pub max_body_size: usize,
    /// Externally reachable base URL, used to build tenant webhook URLs
    pub public_base_url: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SingleTenantConfig {
    pub github_webhook_secret: String,
    pub telegram_bot_token: String,
    pub telegram_channel_id: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub post_language: String,
    pub max_commits: i32,
    pub custom_prompt: Option<String>,
}

impl fmt::Debug for SingleTenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleTenantConfig")
            .field("github_webhook_secret", &is_set(&self.github_webhook_secret))
            .field("telegram_bot_token", &is_set(&self.telegram_bot_token))
            .field("telegram_channel_id", &self.telegram_channel_id)
            .field("ai_api_key", &is_set(&self.ai_api_key))
            .field("ai_model", &self.ai_model)
            .field("post_language", &self.post_language)
            .field("max_commits", &self.max_commits)
            .field("custom_prompt", &self.custom_prompt)
            .finish()
    }
}

/// Chat-completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// OpenAI-compatible chat completion endpoint
    pub api_url: String,
    /// Model used when a profile does not name one
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Sent as `HTTP-Referer` when set
    pub referer: Option<String>,
    /// Sent as `X-Title` when set
    pub title: Option<String>,
    /// Template for tenants without a custom prompt
    pub default_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL (default: https://api.telegram.org)
    pub api_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn to_postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            acquire_timeout_seconds: self.connection_timeout,
            ..PostgresConfig::default()
        }
    }
}

/// Background dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of worker tasks (default: 4)
    pub workers: usize,
    /// Jobs buffered before new deliveries are dropped (default: 256)
    pub queue_capacity: usize,
    /// Deadline for each outbound step in seconds (default: 30)
    pub step_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty, compact)
    pub log_format: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            mode: DeploymentMode::Single,
            single_tenant: SingleTenantConfig::default(),
            ai: AiConfig::default(),
            telegram: TelegramConfig::default(),
            database: DatabaseConfig::default(),
            dispatch: DispatchConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: 30,
            max_body_size: 5 * 1024 * 1024,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for SingleTenantConfig {
    fn default() -> Self {
        Self {
            github_webhook_secret: String::new(),
            telegram_bot_token: String::new(),
            telegram_channel_id: String::new(),
            ai_api_key: String::new(),
            ai_model: DEFAULT_AI_MODEL.to_string(),
            post_language: "ru".to_string(),
            max_commits: DEFAULT_MAX_COMMITS,
            custom_prompt: None,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_AI_API_URL.to_string(),
            default_model: DEFAULT_AI_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
            referer: None,
            title: Some("CommitCast".to_string()),
            default_prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_TELEGRAM_API_BASE.to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            connection_timeout: 10,
            run_migrations: true,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            step_timeout_seconds: 30,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl BroadcastConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load configuration from an explicit set of environment variables
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, config::ConfigError> {
        let mut cfg = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.request_timeout", 30)?
            .set_default("server.max_body_size", 5 * 1024 * 1024)?
            .set_default("server.public_base_url", "http://localhost:8080")?
            .set_default("mode", "single")?
            .set_default("single_tenant.github_webhook_secret", "")?
            .set_default("single_tenant.telegram_bot_token", "")?
            .set_default("single_tenant.telegram_channel_id", "")?
            .set_default("single_tenant.ai_api_key", "")?
            .set_default("single_tenant.ai_model", DEFAULT_AI_MODEL)?
            .set_default("single_tenant.post_language", "ru")?
            .set_default("single_tenant.max_commits", DEFAULT_MAX_COMMITS)?
            .set_default("ai.api_url", DEFAULT_AI_API_URL)?
            .set_default("ai.default_model", DEFAULT_AI_MODEL)?
            .set_default("ai.temperature", 0.7)?
            .set_default("ai.max_tokens", 500)?
            .set_default("ai.title", "CommitCast")?
            .set_default("ai.default_prompt", DEFAULT_PROMPT)?
            .set_default("telegram.api_base_url", DEFAULT_TELEGRAM_API_BASE)?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.connection_timeout", 10)?
            .set_default("database.run_migrations", true)?
            .set_default("dispatch.workers", 4)?
            .set_default("dispatch.queue_capacity", 256)?
            .set_default("dispatch.step_timeout_seconds", 30)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.log_format", "json")?;

        // Variables from the pre-layered deployment
        let legacy = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();
        let ai_key = legacy("AI_API_KEY").or_else(|| legacy("GROQ_API_KEY"));
        for (key, value) in [
            ("single_tenant.telegram_bot_token", legacy("TELEGRAM_BOT_TOKEN")),
            ("single_tenant.telegram_channel_id", legacy("TELEGRAM_CHANNEL_ID")),
            ("single_tenant.ai_api_key", ai_key),
            ("single_tenant.github_webhook_secret", legacy("GITHUB_WEBHOOK_SECRET")),
            ("server.port", legacy("PORT")),
            ("server.public_base_url", legacy("BASE_URL")),
            ("database.url", legacy("DATABASE_URL")),
        ] {
            if let Some(value) = value {
                cfg = cfg.set_default(key, value)?;
            }
        }

        if let Some(config_path) = vars.get(CONFIG_FILE_VAR) {
            cfg = cfg.add_source(config::File::with_name(config_path).required(false));
        }

        let environment: config::Map<String, String> = vars
            .iter()
            .filter(|(k, _)| k.as_str() != CONFIG_FILE_VAR)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        cfg = cfg.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(Some(environment)),
        );

        cfg.build()?.try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        match self.mode {
            DeploymentMode::Single => {
                let single = &self.single_tenant;
                if single.telegram_bot_token.is_empty() {
                    return Err("Telegram bot token is required in single-tenant mode".to_string());
                }
                if single.telegram_channel_id.is_empty() {
                    return Err("Telegram channel id is required in single-tenant mode".to_string());
                }
                if single.ai_api_key.is_empty() {
                    return Err("AI API key is required in single-tenant mode".to_string());
                }
            }
            DeploymentMode::Multi => {
                if self.database.url.is_empty() {
                    return Err("Database URL is required in multi-tenant mode".to_string());
                }
                Url::parse(&self.database.url)
                    .map_err(|e| format!("Invalid database URL: {}", e))?;
            }
        }

        Url::parse(&self.ai.api_url).map_err(|e| format!("Invalid AI API URL: {}", e))?;
        Url::parse(&self.telegram.api_base_url)
            .map_err(|e| format!("Invalid Telegram API base URL: {}", e))?;
        Url::parse(&self.server.public_base_url)
            .map_err(|e| format!("Invalid public base URL: {}", e))?;

        if self.dispatch.workers == 0 {
            return Err("Dispatch needs at least one worker".to_string());
        }
        if self.dispatch.queue_capacity == 0 {
            return Err("Dispatch queue capacity must be at least 1".to_string());
        }
        if self.dispatch.step_timeout_seconds == 0 {
            return Err("Dispatch step timeout must be at least 1 second".to_string());
        }

        Ok(())
    }
}

fn is_set(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
