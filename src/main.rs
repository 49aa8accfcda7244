//! Reconciliation daemon for the settlement engine.
//!
//! Long-running sidecar: watches the hub for payment requests whose
//! approval stalled between the shard settle and the hub finalize, and
//! self-heals them. The request-facing operations live in the library and
//! are driven by the API layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;

use pix_settlement::audit::AuditTrail;
use pix_settlement::config::Config;
use pix_settlement::db;
use pix_settlement::settlement::{reconciliation_sweeper, RequestStore, SettlementService};
use pix_settlement::shard::ShardRouter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(
        "Connecting to hub store at {}",
        config.hub_database_url_masked()
    );
    let hub_pool = db::create_hub_pool(&config).await?;
    db::run_hub_migrations(&hub_pool).await?;

    let router = ShardRouter::from_config(&config)?;
    let configured: Vec<&str> = router.configured_cities().map(|city| city.as_str()).collect();
    tracing::info!(?configured, "Shard router ready");

    let service = Arc::new(SettlementService::new(
        RequestStore::new(hub_pool.clone()),
        router,
        AuditTrail::new(hub_pool.clone()),
        config.pix.clone(),
    ));

    // Start reconciliation sweeper in background
    let interval = Duration::from_secs(config.reconcile_interval_secs);
    let grace = chrono::Duration::seconds(config.reconcile_grace_secs);
    tokio::spawn(async move {
        reconciliation_sweeper(service, interval, grace).await;
        tracing::error!("Reconciliation sweeper exited unexpectedly");
    });

    shutdown_signal().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
