// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use anyhow::Context;
use busline_node::catalog::FileCatalog;
use busline_node::config::NodeConfig;
use busline_node::notifier::ChangeNotifier;
use busline_node::recovery::open_store;
use busline_node::server::{build_router, AppState};
use busline_node::store::RecordStore;
use busline_node::telemetry::init_telemetry;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry();

    let cfg = NodeConfig::from_env();
    tracing::info!("Initializing busline node with config: {:?}", cfg);

    let store = match &cfg.log_path {
        Some(path) => {
            let (store, _) = open_store(path)
                .with_context(|| format!("failed to recover record log {:?}", path))?;
            store
        }
        None => {
            tracing::warn!("No record log configured; reports will not survive a restart");
            RecordStore::in_memory()
        }
    };

    let catalog = Arc::new(FileCatalog::new(&cfg.routes_path, &cfg.stops_path));
    let state = AppState::new(Arc::new(store), catalog, &cfg);
    let notifier = state.notifier.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    tracing::info!("Listening on {}", cfg.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(notifier))
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal(notifier: ChangeNotifier) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, closing {} streams", notifier.subscriber_count());
    // Open streams would otherwise hold the server up forever.
    notifier.close_all();
}
