//! IntelliLib API Gateway
//!
//! Binary entry point: configuration, logging, metrics exporter, database,
//! collaborators, then the HTTP server with graceful shutdown.

use intellilib_common::{
    ai::create_ai_service,
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    metrics::{self, LATENCY_BUCKETS, AI_CALL_BUCKETS, METRICS_PREFIX},
    notify::create_notifier,
    services::ServiceDeps,
    storage::create_file_store,
    Repository, VERSION,
};
use intellilib_gateway::{build_router, AppState};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config.observability);
    info!("Starting IntelliLib API Gateway v{}", VERSION);

    // Initialize metrics
    init_metrics(&config.observability)?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        db.migrate().await?;
    }
    let repo = Repository::new(db);

    let deps = ServiceDeps {
        config: config.clone(),
        repo,
        jwt: Arc::new(JwtManager::from_config(&config.auth)),
        ai: create_ai_service(&config.ai_service)?,
        notifier: create_notifier(&config.notifier)?,
        files: create_file_store(&config.storage),
    };

    // Create app state
    let state = AppState::new(deps);

    if let Some(admin) = &config.auth.bootstrap_admin {
        match state.services.accounts.bootstrap_admin(admin).await {
            Ok(Some(account)) => info!(email = %account.email, "Provisioned bootstrap admin"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not provision bootstrap admin"),
        }
    }

    // Build the router
    let app = build_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve Prometheus metrics on their own port
fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_ai_call_duration_seconds", METRICS_PREFIX)),
            AI_CALL_BUCKETS,
        )?
        .install()?;

    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
