//! Reconstruction handlers: base method, lazy method bodies, data-flow facts.

use axum::extract::{Path, Query, State};
use axum::Json;

use esg_core::{
    BaseMethodGraph, GraphId, GraphNode, MethodId, MethodIndex, MethodSubgraph, StatementId,
};

use crate::error::ApiError;
use crate::schema::queries::BaseMethodParams;
use crate::state::AppState;

/// Entry subgraph of a method (`main` unless `method_id` is given).
///
/// `GET /graphs/{graph_id}/base?method_id=&all_callees=`
pub async fn base_method(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
    Query(params): Query<BaseMethodParams>,
) -> Result<Json<BaseMethodGraph>, ApiError> {
    let service = state.service.lock().await;
    let base = service.base_method(&GraphId(graph_id), params.method(), params.all_callees)?;
    Ok(Json(base))
}

/// Method id -> name for every method of the graph.
///
/// `GET /graphs/{graph_id}/methods`
pub async fn method_index(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
) -> Result<Json<MethodIndex>, ApiError> {
    let service = state.service.lock().await;
    Ok(Json(service.method_index(&GraphId(graph_id))?))
}

/// Body of one method for a lazy expand.
///
/// `GET /graphs/{graph_id}/methods/{method_id}`
pub async fn method_subgraph(
    State(state): State<AppState>,
    Path((graph_id, method_id)): Path<(String, i64)>,
) -> Result<Json<MethodSubgraph>, ApiError> {
    let service = state.service.lock().await;
    let body = service.method_subgraph(&GraphId(graph_id), MethodId(method_id))?;
    Ok(Json(body))
}

/// Data-flow fact nodes of one statement.
///
/// `GET /graphs/{graph_id}/statements/{statement_id}/facts`
pub async fn dataflow_facts(
    State(state): State<AppState>,
    Path((graph_id, statement_id)): Path<(String, i64)>,
) -> Result<Json<Vec<GraphNode>>, ApiError> {
    let service = state.service.lock().await;
    let facts = service.dataflow_facts(&GraphId(graph_id), StatementId(statement_id))?;
    Ok(Json(facts))
}

/// Every method body of the graph at once.
///
/// `GET /graphs/{graph_id}/all`
pub async fn all_methods(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
) -> Result<Json<MethodSubgraph>, ApiError> {
    let service = state.service.lock().await;
    Ok(Json(service.all_methods(&GraphId(graph_id))?))
}
