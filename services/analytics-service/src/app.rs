use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::{capture, find_event, healthz, readyz};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Request lines at info so they survive the default filter.
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/analytics", post(capture))
        .route("/analytics/:id", get(find_event))
        .layer(trace)
        .with_state(state)
}
