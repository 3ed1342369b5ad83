use std::net::SocketAddr;
use std::sync::Arc;

use alfalah_gateway::api::alfalah::AlfalahState;
use alfalah_gateway::config::AppConfig;
use alfalah_gateway::ledger::{InMemoryLedger, TransactionLedger};
use alfalah_gateway::logging::init_tracing;
use alfalah_gateway::payments::{AlfalahGateway, PaymentGateway};
use alfalah_gateway::{build_app, cors_layer};
use tokio::signal;
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Bank Alfalah gateway service"
    );
    info!(config = ?config.alfalah, "Bank Alfalah configuration loaded");

    let problems = config.alfalah.misconfigurations();
    if problems.is_empty() {
        info!("Bank Alfalah configuration complete");
    } else {
        for problem in &problems {
            error!(problem = %problem, "CRITICAL: Bank Alfalah misconfiguration");
        }
    }

    let gateway: Arc<dyn PaymentGateway> = Arc::new(AlfalahGateway::new(config.alfalah.clone())?);
    let ledger: Arc<dyn TransactionLedger> =
        Arc::new(InMemoryLedger::new(config.ledger.policy()?));
    info!(
        ttl_secs = config.ledger.ttl_secs,
        max_entries = config.ledger.max_entries,
        "Transaction ledger initialized"
    );

    let state = AlfalahState::new(gateway, ledger, config.alfalah.clone());
    let app = build_app(state).layer(cors_layer(&config.server));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
