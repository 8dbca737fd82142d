use std::net::ToSocketAddrs;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bonkagent::bootstrap;
use bonkagent::cli::{Cli, Command, doctor::run_doctor_command};
use bonkagent::config::Config;
use bonkagent::web::{AppState, start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    bootstrap::load_env(cli.env_file.as_deref());
    init_tracing();

    match cli.command {
        Some(Command::Doctor { strict }) => run_doctor_command(strict).await,
        Some(Command::Serve) | None => serve().await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    let addr = (config.server.host.as_str(), config.server.port)
        .to_socket_addrs()
        .with_context(|| {
            format!(
                "cannot resolve bind address {}:{}",
                config.server.host, config.server.port
            )
        })?
        .next()
        .with_context(|| {
            format!(
                "no usable bind address for {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let state = AppState::new(&config);
    let bound = start_server(addr, Arc::clone(&state)).await?;
    tracing::info!("API server listening on {bound}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    if let Some(tx) = state.shutdown_tx.write().await.take() {
        let _ = tx.send(());
    }

    Ok(())
}
