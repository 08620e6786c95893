//! Service orchestration: wiring, HTTP middleware, startup and graceful shutdown

use axum::{serve, Router};
use commitcast_database::{connect, run_migrations, PgTenantStore};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{BroadcastConfig, DatabaseConfig, DeploymentMode};
use crate::dispatch::Dispatcher;
use crate::error::{BroadcastError, BroadcastResult};
use crate::handlers::{create_routes, AppState};
use crate::mode::{DeliveryMode, MultiTenantMode, SingleTenantMode};
use crate::publishing::{
    ChannelPublisher, ChatCompletionGenerator, PostGenerator, TelegramPublisher,
};
use crate::tenant::TenantResolver;
use crate::webhook::WebhookRouter;
use crate::{SERVICE_NAME, VERSION};

/// The running broadcast service
pub struct BroadcastService {
    config: BroadcastConfig,
    app_state: Arc<AppState>,
    dispatcher: Dispatcher,
    addr: SocketAddr,
}

#[derive(Clone, Default)]
struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = format!("req-{}", Uuid::new_v4());
        axum::http::HeaderValue::from_str(&id)
            .ok()
            .map(RequestId::new)
    }
}

impl BroadcastService {
    /// Validate the configuration and wire every component.
    ///
    /// In multi-tenant mode this connects to PostgreSQL (and migrates when
    /// `database.run_migrations` is set); single-tenant mode never touches a
    /// database.
    pub async fn new(config: BroadcastConfig) -> BroadcastResult<Self> {
        info!(mode = %config.mode, "Initializing {}", SERVICE_NAME);

        config.validate().map_err(BroadcastError::configuration)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.request_timeout))
            .user_agent(format!("{}/{}", SERVICE_NAME, VERSION))
            .build()
            .map_err(|e| BroadcastError::internal(format!("Failed to create HTTP client: {}", e)))?;

        let generator: Arc<dyn PostGenerator> = Arc::new(ChatCompletionGenerator::new(
            http_client.clone(),
            config.ai.clone(),
        ));
        let publisher: Arc<dyn ChannelPublisher> =
            Arc::new(TelegramPublisher::new(http_client, &config.telegram));

        let mode = Self::delivery_mode(&config).await?;
        let dispatcher = Dispatcher::start(&config.dispatch, generator, publisher);
        let webhooks = WebhookRouter::new(mode, dispatcher.handle());
        let app_state = Arc::new(AppState::new(webhooks, config.server.max_body_size));

        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| BroadcastError::configuration(format!("Invalid server address: {}", e)))?;

        Ok(Self {
            config,
            app_state,
            dispatcher,
            addr,
        })
    }

    async fn delivery_mode(config: &BroadcastConfig) -> BroadcastResult<Arc<dyn DeliveryMode>> {
        match config.mode {
            DeploymentMode::Single => {
                if config.single_tenant.github_webhook_secret.is_empty() {
                    warn!("GITHUB_WEBHOOK_SECRET is not set; webhook signatures will not be checked");
                }
                Ok(Arc::new(SingleTenantMode::new(&config.single_tenant)))
            }
            DeploymentMode::Multi => {
                let pool = connect_database(&config.database).await?;
                let store = Arc::new(PgTenantStore::new(Arc::new(pool)));
                Ok(Arc::new(MultiTenantMode::new(TenantResolver::new(store))))
            }
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Routes plus middleware, as served by [`BroadcastService::start`]
    pub fn router(&self) -> Router {
        build_router(self.app_state.clone())
    }

    /// Serve until SIGINT/SIGTERM, then drain queued broadcasts.
    pub async fn start(self) -> BroadcastResult<()> {
        info!(
            mode = %self.config.mode,
            workers = self.config.dispatch.workers,
            "Starting {} on {}",
            SERVICE_NAME,
            self.addr
        );

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| BroadcastError::internal(format!("Failed to bind to address: {}", e)))?;

        let served = serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await;

        let snapshot = self.dispatcher.shutdown().await;
        info!(
            published = snapshot.published,
            failed = snapshot.failed,
            rejected = snapshot.rejected,
            "{} stopped",
            SERVICE_NAME
        );

        served.map_err(|e| {
            error!("Server error: {}", e);
            BroadcastError::internal(format!("Server error: {}", e))
        })
    }
}

/// Attach request ids and HTTP tracing to the mode's routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(RequestIdGenerator))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id());

    create_routes(state).layer(middleware)
}

/// Open the tenant database, applying migrations when configured to.
pub async fn connect_database(database: &DatabaseConfig) -> BroadcastResult<PgPool> {
    let pool = connect(&database.to_postgres_config()).await?;
    info!("Database connection pool initialized");

    if database.run_migrations {
        run_migrations(&pool).await?;
        info!("Database migrations applied");
    }
    Ok(pool)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
