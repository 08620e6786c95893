//! Binary entry point for the CommitCast broadcast service
//!
//! `serve` (the default) runs the webhook server. The `tenant` and `migrate`
//! commands administer the multi-tenant database.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use commit_broadcast_service::{
    config::ObservabilityConfig, service::connect_database, BroadcastConfig, BroadcastService,
    DeploymentMode, TenantAdmin, SERVICE_NAME, VERSION,
};
use commitcast_database::{PgTenantStore, SettingsUpdate};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "commit-broadcast-server", version, about = "GitHub pushes to Telegram posts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the webhook server
    Serve,
    /// Manage tenants (multi-tenant database)
    #[command(subcommand)]
    Tenant(TenantCommand),
    /// Apply pending database migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum TenantCommand {
    /// Register a tenant and print its webhook URL
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "COMMITCAST_TENANT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Update a tenant's credentials and preferences
    Configure {
        #[arg(long)]
        token: String,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Show a tenant's webhook URL and activation state
    Show {
        #[arg(long)]
        token: String,
    },
}

/// Omitted or empty flags leave the stored value unchanged
#[derive(Debug, Args)]
struct SettingsArgs {
    #[arg(long)]
    telegram_bot_token: Option<String>,
    #[arg(long)]
    telegram_channel_id: Option<String>,
    #[arg(long)]
    ai_api_key: Option<String>,
    #[arg(long)]
    ai_model: Option<String>,
    #[arg(long)]
    github_secret: Option<String>,
    #[arg(long)]
    post_language: Option<String>,
    #[arg(long)]
    max_commits: Option<i32>,
    #[arg(long)]
    custom_prompt: Option<String>,
}

impl From<SettingsArgs> for SettingsUpdate {
    fn from(args: SettingsArgs) -> Self {
        SettingsUpdate {
            telegram_bot_token: args.telegram_bot_token,
            telegram_channel_id: args.telegram_channel_id,
            ai_api_key: args.ai_api_key,
            ai_model: args.ai_model,
            github_secret: args.github_secret,
            post_language: args.post_language,
            max_commits: args.max_commits,
            custom_prompt: args.custom_prompt,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let config = BroadcastConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config.observability)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Tenant(command) => run_tenant_command(config, command).await,
        Command::Migrate => {
            let mut database = config.database;
            database.run_migrations = true;
            require_database_url(&database.url)?;
            connect_database(&database).await?;
            Ok(())
        }
    }
}

async fn serve(config: BroadcastConfig) -> anyhow::Result<()> {
    info!("Starting {} v{}", SERVICE_NAME, VERSION);
    log_mode(&config);

    let service = BroadcastService::new(config)
        .await
        .context("Failed to initialize service")?;
    service.start().await?;

    info!("{} shutdown complete", SERVICE_NAME);
    Ok(())
}

async fn run_tenant_command(config: BroadcastConfig, command: TenantCommand) -> anyhow::Result<()> {
    require_database_url(&config.database.url)?;
    let pool = connect_database(&config.database).await?;
    let admin = TenantAdmin::new(
        Arc::new(PgTenantStore::new(Arc::new(pool))),
        config.server.public_base_url,
    );

    let overview = match command {
        TenantCommand::Create {
            email,
            name,
            password,
        } => admin.create(&email, &name, &password).await?,
        TenantCommand::Configure { token, settings } => {
            let update = SettingsUpdate::from(settings);
            if update.is_empty() {
                bail!("Nothing to update; pass at least one setting flag");
            }
            admin.configure(&token, &update).await?
        }
        TenantCommand::Show { token } => admin.show(&token).await?,
    };

    println!("{}", overview);
    Ok(())
}

fn require_database_url(url: &str) -> anyhow::Result<()> {
    if url.is_empty() {
        bail!("DATABASE_URL (or COMMITCAST_DATABASE__URL) must be set");
    }
    Ok(())
}

fn log_mode(config: &BroadcastConfig) {
    match config.mode {
        DeploymentMode::Single => {
            info!(
                channel = %config.single_tenant.telegram_channel_id,
                "Single-tenant mode: POST /webhook/github"
            );
            if config.single_tenant.github_webhook_secret.is_empty() {
                warn!("Webhook signature verification: ⚠️  disabled (no secret configured)");
            }
        }
        DeploymentMode::Multi => {
            info!(
                public_base_url = %config.server.public_base_url,
                "Multi-tenant mode: POST /webhook/github/{{token}}"
            );
            if !config.database.run_migrations {
                info!("Startup migrations: ✗ Disabled");
            }
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(observability: &ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&observability.log_level))
        .or_else(|_| EnvFilter::try_new("info"))?;

    match observability.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
        "pretty" | "text" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_file(true)
                        .with_line_number(true)
                        .with_target(false),
                )
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init()?;
        }
    }

    Ok(())
}
