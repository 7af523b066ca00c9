//! Router assembly for the supergraph HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{delete, get};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Graph management
        .route(
            "/graphs",
            get(handlers::graphs::list_graphs).post(handlers::graphs::import_graph),
        )
        .route("/graphs/{graph_id}", delete(handlers::graphs::delete_graph))
        // Reconstruction
        .route("/graphs/{graph_id}/base", get(handlers::methods::base_method))
        .route("/graphs/{graph_id}/methods", get(handlers::methods::method_index))
        .route(
            "/graphs/{graph_id}/methods/{method_id}",
            get(handlers::methods::method_subgraph),
        )
        .route(
            "/graphs/{graph_id}/statements/{statement_id}/facts",
            get(handlers::methods::dataflow_facts),
        )
        .route("/graphs/{graph_id}/all", get(handlers::methods::all_methods))
        // Search
        .route(
            "/graphs/{graph_id}/search/instructions",
            get(handlers::search::search_instructions),
        )
        .route(
            "/graphs/{graph_id}/search/facts",
            get(handlers::search::search_facts),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
