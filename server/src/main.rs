//! Workspace Reconciler
//!
//! Holds remote development workspaces and answers the reconcile polls of
//! cluster agents with the Kubernetes resources each workspace needs.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod domain;
mod error;
mod infra;
mod service;

pub use config::Config;
pub use error::{Error, Result};

use infra::sqlite::AgentRepository;
use infra::workspace_repository::WorkspaceRepository;
use service::agent::AgentService;
use service::desired_config::{DefaultDevfileCompiler, DesiredConfigGenerator};
use service::feature::{ConfigFeatureGate, FeatureGate};
use service::reconcile::ReconcileService;
use service::workspace::WorkspaceService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub agent_service: Arc<AgentService>,
    pub workspace_service: Arc<WorkspaceService>,
    pub reconcile_service: Arc<ReconcileService>,
    pub feature_gate: Arc<dyn FeatureGate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let http_addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port).parse()?;

    info!("Starting Workspace Reconciler");
    info!("HTTP listening on {}", http_addr);
    if !config.licensed {
        info!("Running unlicensed, agent reconcile requests will be rejected");
    }

    // Initialize infrastructure
    let pool = infra::sqlite::init(&config.database_url).await?;
    let agent_repository = Arc::new(AgentRepository::new(pool.clone()));
    let workspace_repository = Arc::new(WorkspaceRepository::new(pool));

    // Initialize services
    let generator = DesiredConfigGenerator::new(Arc::new(DefaultDevfileCompiler));
    let state = AppState {
        agent_service: Arc::new(AgentService::new(agent_repository.clone())),
        workspace_service: Arc::new(WorkspaceService::new(
            workspace_repository.clone(),
            agent_repository,
        )),
        reconcile_service: Arc::new(ReconcileService::new(workspace_repository, generator)),
        feature_gate: Arc::new(ConfigFeatureGate::new(&config)),
    };

    let app = api::http::create_router(state);

    let result = axum::serve(
        tokio::net::TcpListener::bind(http_addr).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = result {
        error!("HTTP server error: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
