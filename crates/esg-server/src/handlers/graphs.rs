//! Graph management handlers (import, list, delete).

use axum::extract::{Path, State};
use axum::Json;

use esg_core::{GraphId, GraphSummary};
use esg_storage::AnalysisBundle;

use crate::error::ApiError;
use crate::schema::graphs::{DeleteGraphResponse, ImportGraphResponse};
use crate::state::AppState;

/// Lists all stored graphs.
///
/// `GET /graphs`
pub async fn list_graphs(
    State(state): State<AppState>,
) -> Result<Json<Vec<GraphSummary>>, ApiError> {
    let service = state.service.lock().await;
    Ok(Json(service.list_graphs()?))
}

/// Imports an analysis bundle as a new graph.
///
/// `POST /graphs`
pub async fn import_graph(
    State(state): State<AppState>,
    Json(bundle): Json<AnalysisBundle>,
) -> Result<Json<ImportGraphResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let summary = service.import_bundle(&bundle)?;
    Ok(Json(ImportGraphResponse {
        id: summary.id,
        name: summary.name,
        method_count: summary.method_count,
    }))
}

/// Deletes a graph and all of its records.
///
/// `DELETE /graphs/{graph_id}`
pub async fn delete_graph(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
) -> Result<Json<DeleteGraphResponse>, ApiError> {
    let id = GraphId(graph_id);
    let mut service = state.service.lock().await;
    service.delete_graph(&id)?;
    Ok(Json(DeleteGraphResponse { success: true, id }))
}
