pub mod config;
pub mod route_builder;

use crate::{
    auth::jwt::{JwtService, JwtServiceImpl},
    billing::BillingService,
    config::Config,
    database::{DatabaseManager, DatabaseManagerImpl},
    error::AppError,
    health::HealthService,
    history::HistoryService,
    metrics,
    provider::{CompletionProvider, OpenRouterProvider},
    relay::{RelayService, RelayServiceImpl},
    routes::{
        create_ask_routes, create_billing_routes, create_billing_webhook_routes,
        create_health_routes, create_history_routes, create_profile_routes,
    },
    server::route_builder::{protected, request_response_logger},
    shutdown::ShutdownCoordinator,
    usage::UsageLedger,
    utils::request_id_middleware,
};
use axum::{Router, extract::DefaultBodyLimit, middleware};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Questions carry page context, which stays well below this
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub jwt_service: Arc<dyn JwtService>,
    pub relay: Arc<dyn RelayService>,
    pub ledger: UsageLedger,
    pub history: HistoryService,
    pub billing: BillingService,
    pub health_service: Arc<HealthService>,
    pub database: Arc<dyn DatabaseManager>,
    pub shutdown_coordinator: Arc<ShutdownCoordinator>,
}

impl Server {
    /// Build a server talking to OpenRouter
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let provider = OpenRouterProvider::new(config.provider.clone())?;
        let provider_health = provider.health_checker();

        let server = Self::new_with_provider(config, Arc::new(provider)).await?;
        server.health_service.register(provider_health).await;
        Ok(server)
    }

    /// Build a server around any completion provider
    pub async fn new_with_provider(
        config: Config,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, AppError> {
        if config.metrics.enabled {
            metrics::init_metrics(config.metrics.port).map_err(|e| {
                error!(port = config.metrics.port, error = %e, "Failed to start metrics server");
                AppError::Internal(format!("Failed to start metrics server: {}", e))
            })?;
        }

        let jwt_impl = JwtServiceImpl::new(&config.jwt)?;
        let jwt_health = jwt_impl.health_checker();
        let jwt_service: Arc<dyn JwtService> = Arc::new(jwt_impl);

        let database_impl = Arc::new(DatabaseManagerImpl::new_from_config(&config.database).await?);
        let database: Arc<dyn DatabaseManager> = database_impl.clone();

        let ledger = UsageLedger::new(database.clone(), config.usage.clone());
        let relay: Arc<dyn RelayService> = Arc::new(RelayServiceImpl::new(
            provider,
            ledger.clone(),
            database.clone(),
            config.provider.clone(),
        ));
        let history = HistoryService::new(database.clone());
        let billing = BillingService::new(config.billing.clone(), database.clone())?;

        let health_service = Arc::new(HealthService::new());
        health_service.register(database_impl).await;
        health_service.register(jwt_health).await;

        Ok(Self {
            config: Arc::new(config),
            jwt_service,
            relay,
            ledger,
            history,
            billing,
            health_service,
            database,
            shutdown_coordinator: Arc::new(ShutdownCoordinator::new()),
        })
    }

    pub async fn run(&self) -> Result<(), AppError> {
        if self.config.database.migration_on_startup {
            self.database.migrate().await?;
        }

        let app = self.create_app();

        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid listen address: {}", e)))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to address: {}", e)))?;

        info!("Server listening on http://{}", addr);

        let coordinator = self.shutdown_coordinator.clone();
        tokio::spawn(async move {
            coordinator.wait_for_shutdown_signal().await;
        });

        let coordinator = self.shutdown_coordinator.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                coordinator.wait().await;
                info!("Graceful shutdown initiated");
            })
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

        if let Err(e) = self.database.connection().clone().close().await {
            error!("Failed to close database connection: {}", e);
        }
        info!("Server shutdown complete");

        Ok(())
    }

    pub fn create_app(&self) -> Router {
        let api = Router::new()
            .merge(create_ask_routes())
            .merge(create_profile_routes())
            .merge(create_history_routes())
            .merge(create_billing_routes());

        let app = Router::new()
            .merge(protected(api, self))
            .merge(create_billing_webhook_routes())
            .merge(create_health_routes())
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .with_state(self.clone());

        self.add_conditional_middleware(app)
            .layer(middleware::from_fn(request_id_middleware))
    }

    fn add_conditional_middleware(&self, mut app: Router) -> Router {
        if self.config.metrics.enabled {
            app = app.layer(middleware::from_fn(metrics::metrics_middleware));
        }
        if self.config.logging.log_request {
            app = app.layer(middleware::from_fn(request_response_logger));
        }
        app
    }
}
