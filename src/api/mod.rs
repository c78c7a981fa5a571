pub mod errors;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::Backend;
use crate::config::ConsoleSettings;
use crate::pipeline::phase::DEFAULT_REQUEST;
use crate::stream::FallbackProducer;

/// Shared state of the relay server.
#[derive(Clone)]
pub struct RelayState {
    pub upstream: Arc<dyn Backend>,
    pub fallback: FallbackProducer,
    pub allow_fallback: bool,
    pub default_request: String,
}

impl RelayState {
    pub fn new(upstream: Arc<dyn Backend>, settings: &ConsoleSettings) -> Self {
        Self {
            upstream,
            fallback: FallbackProducer::new(settings.agents.clone(), settings.fallback.clone()),
            allow_fallback: settings.backend.allow_fallback,
            default_request: DEFAULT_REQUEST.to_string(),
        }
    }
}

pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/pipeline", post(routes::pipeline::run_pipeline))
        .route("/api/pipeline/stream", post(routes::pipeline::stream_pipeline))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
