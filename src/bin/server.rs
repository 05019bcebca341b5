//! Entry point for the FIX 4.2 exchange simulator.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use exchange_core::config::{Args, Config};
use exchange_core::engine::MatchingEngine;
use exchange_core::events::EventBus;
use exchange_core::persistence::InMemoryPersistence;
use exchange_core::session::acceptor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Arc::new(Config::resolve(args)?);

    let persistence = Arc::new(InMemoryPersistence::new());
    let events = EventBus::default();
    let engine = Arc::new(MatchingEngine::new(persistence, events));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    acceptor::run(config, engine, shutdown_rx).await
}
