//! HTTP API server with observability for the trade store.
//!
//! Provides REST endpoints for booking, amending, pricing and cancelling
//! swap trades, with structured logging (tracing) and Prometheus metrics.
//! Queries are served from the projection-maintained read model.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use domain::{BroadcastRelay, TradeStore};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{InMemoryCursorStore, ProjectionEngine, TradeBlotterView};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::trades::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/swaps", post(routes::trades::create::<S>))
        .route("/swaps", get(routes::trades::list::<S>))
        .route("/swaps/{id}", get(routes::trades::get::<S>))
        .route("/swaps/{id}", put(routes::trades::update::<S>))
        .route("/swaps/{id}", delete(routes::trades::cancel::<S>))
        .route("/swaps/{id}/price", post(routes::trades::price::<S>))
        .route("/swaps/{id}/events", get(routes::trades::events::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: blotter, projection engine and
/// trade store wired over the given event store.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
) -> (Arc<AppState<S>>, Arc<ProjectionEngine<S>>) {
    let blotter = Arc::new(TradeBlotterView::new());

    let mut engine =
        ProjectionEngine::new(event_store.clone(), Arc::new(InMemoryCursorStore::new()));
    engine.register(blotter.clone());
    let engine = Arc::new(engine);

    let relay = BroadcastRelay::default();
    let trade_store = TradeStore::new(event_store.clone(), blotter, Arc::new(relay.clone()));

    let state = Arc::new(AppState {
        trade_store,
        event_store,
        engine: engine.clone(),
        relay,
    });

    (state, engine)
}
