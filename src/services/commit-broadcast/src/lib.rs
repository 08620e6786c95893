//! # CommitCast broadcast service
//!
//! Receives GitHub `push` webhooks, asks an OpenAI-compatible chat model to
//! write a short post about the commits, and publishes that post to a
//! Telegram channel.
//!
//! ## Deployment modes
//!
//! - **single**: one set of credentials from the process configuration,
//!   served at `POST /webhook/github`
//! - **multi**: tenants stored in PostgreSQL, each addressed by an opaque
//!   token at `POST /webhook/github/{token}`
//!
//! GitHub is acknowledged as soon as a delivery is verified and queued;
//! post generation and publishing run on background workers (see
//! [`dispatch`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use commit_broadcast_service::{BroadcastConfig, BroadcastService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BroadcastConfig::from_env()?;
//!     let service = BroadcastService::new(config).await?;
//!     service.start().await?;
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod mode;
pub mod models;
pub mod publishing;
pub mod service;
pub mod tenant;
pub mod webhook;

pub use admin::{TenantAdmin, TenantOverview};
pub use config::{BroadcastConfig, DeploymentMode};
pub use dispatch::{BroadcastJob, DispatchHandle, DispatchSnapshot, Dispatcher};
pub use error::{BroadcastError, BroadcastResult};
pub use handlers::{create_routes, AppState};
pub use mode::{DeliveryMode, DeliveryTarget, MultiTenantMode, PublishProfile, SingleTenantMode};
pub use models::{PushEvent, WebhookAck};
pub use publishing::{ChannelPublisher, PostGenerator};
pub use service::{build_router, BroadcastService};
pub use tenant::{ResolutionError, TenantResolver};
pub use webhook::WebhookRouter;

/// Version information for the broadcast service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SERVICE_NAME: &str = "CommitCast";
