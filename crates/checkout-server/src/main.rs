//! Checkout Gateway HTTP Server
//!
//! Axum-based server for buyer checkouts, provider webhooks and seller
//! outbound-event management. The outbound fan-out worker runs in the same
//! process.

mod config;
mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{MemoryAccountDirectory, MemorySaleStore, SaleStore, SeedData};
use checkout_engine::fanout::{EmailSender, LogEmailSender};
use checkout_engine::{FanoutConfig, FanoutWorker, OutboundDeliverer, SmtpConfig, SmtpEmailSender};
use checkout_gateways::{GatewayConfig, HttpGatewayFactory};

use crate::config::ServerConfig;
use crate::state::AppState;

/// Timeout for seller webhook and attribution deliveries
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Account directory
    let directory = match &config.seed_file {
        Some(path) => {
            let seed = SeedData::from_file(path)?;
            tracing::info!(
                path = %path.display(),
                sellers = seed.sellers.len(),
                products = seed.products.len(),
                checkouts = seed.checkouts.len(),
                "✓ Account directory seeded"
            );
            MemoryAccountDirectory::from_seed(seed)
        }
        None => {
            tracing::warn!("⚠ SEED_FILE not set - account directory is empty");
            MemoryAccountDirectory::new()
        }
    };
    let store: Arc<dyn SaleStore> = Arc::new(MemorySaleStore::new());

    // Email
    let (email, smtp_configured): (Arc<dyn EmailSender>, bool) = match SmtpConfig::from_env() {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "✓ SMTP configured");
            (Arc::new(SmtpEmailSender::new(&smtp)?), true)
        }
        None => {
            tracing::warn!("⚠ SMTP not configured - buyer emails are only logged");
            tracing::warn!("  Set SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and SMTP_FROM in .env");
            (Arc::new(LogEmailSender::new()), false)
        }
    };

    // Build application state
    let factory = Arc::new(HttpGatewayFactory::new(GatewayConfig::from_env()));
    let state = AppState::new(
        store.clone(),
        Arc::new(directory),
        factory,
        &config,
        smtp_configured,
    );

    // Outbound fan-out
    let deliverer = Arc::new(OutboundDeliverer::new(email, DELIVERY_TIMEOUT)?);
    let worker = FanoutWorker::new(store, deliverer, FanoutConfig::from_env());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout-server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  GET  /checkout/{{id}}           - Resolve checkout");
    tracing::info!("  POST /checkout/{{id}}/pay       - Start payment");
    tracing::info!("  GET  /sales/{{id}}/status       - Poll sale status");
    tracing::info!("  POST /webhooks/{{provider}}     - Provider notifications");
    tracing::info!("  GET  /sales/{{id}}/events       - Outbound events (seller)");
    tracing::info!("  POST /outbound/{{id}}/retry     - Retry failed event (seller)");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_tx.send(true).ok();
    worker_handle.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
