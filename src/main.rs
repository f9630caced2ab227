//! Chainhub API server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chainhub::{config::Args, db, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("chainhub={},info", args.log_level).into());
    if args.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Chainhub API");
    info!("======================================");
    info!("Environment: {}", args.app_env);
    info!("Listen: {}", args.listen);
    info!("Database: {}", args.database_path.display());
    info!("Frontend origin: {}", args.frontend_url);
    info!("Request timeout: {} ms", args.request_timeout_ms);
    info!("======================================");

    let store = db::connect(&args.database_path, args.db_connect_attempts).await?;

    if args.run_migrations {
        let report = db::migrate(&store)?;
        info!(
            version = report.version,
            applied = report.applied,
            "Schema is current"
        );
    } else {
        info!("Skipping migrations (RUN_MIGRATIONS=false)");
    }

    let state = Arc::new(AppState::new(args, store)?);
    server::run(state).await?;

    info!("Chainhub stopped");
    Ok(())
}
