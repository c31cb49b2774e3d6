mod app;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod normalize;
mod state;
mod store;

use std::{process::ExitCode, sync::Arc};

use ping_common::{bind_listener, init_tracing, shutdown_signal};

use crate::config::ServiceConfig;
use crate::state::AppState;
use crate::store::PgEventStore;

#[tokio::main]
async fn main() -> ExitCode {
    let _guards = init_tracing("analytics-service");

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // The service does not start serving without a reachable store.
    let store = match PgEventStore::connect(&config.database_url, &config.table).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, operation = "connect", "failed to connect to event store");
            return ExitCode::FAILURE;
        }
    };

    let app = app::build_router(AppState::new(Arc::new(store)));
    let listener = match bind_listener(config.port).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, port = config.port, "bind listener failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(port = config.port, "listening");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
