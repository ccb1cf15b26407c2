use anyhow::Context;
use clap::Parser;
use finna_payment::handlers;
use finna_payment::services::{PaymentProcessorClient, PaymentService, TransactionStore};
use finna_payment::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "payment-api", about = "Online payment service for library fines")]
struct Args {
    /// TOML configuration file; the environment is used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    info!(
        "Starting payment service on port {} with {} handler",
        config.server_port, config.handler
    );

    let transport = Arc::new(PaymentProcessorClient::new(&config).context("building HTTP client")?);
    let store = Arc::new(TransactionStore::new());
    let service = Arc::new(PaymentService::new(config.clone(), store, transport));

    let app = handlers::router(service);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
