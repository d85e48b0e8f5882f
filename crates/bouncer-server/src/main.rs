use std::sync::Arc;

use bouncer_collector::NAME;
use bouncer_server::{
    AppState, Cli, Command, app_router, handlers::health::check_store,
};
use bouncer_store::{PgStore, StatsStore};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("bouncer=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let config = cli.exporter_config()?;
    let store = Arc::new(PgStore::new(&config.database_url)?);

    if let Err(err) = check_store(store.as_ref(), config.store_timeout).await {
        if cli.command() == Command::Health {
            return Err(format!("store health check failed: {err}").into());
        }
        return Err(format!("could not check store: {err}").into());
    }

    if cli.command() == Command::Health {
        info!(console = %store.target(), "store is healthy");
        return Ok(());
    }

    let state = Arc::new(AppState::new(&config, store.clone())?);
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        console = %store.target(),
        "starting {NAME}"
    );
    info!("server listening on {}", config.listen_address);
    info!("metrics available at {}", config.telemetry_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = store.close().await {
        warn!(error = %err, "closing admin console session failed");
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
