//! Search handlers over the full stored graph.

use axum::extract::{Path, Query, State};
use axum::Json;

use esg_core::{GraphId, MethodIndex};

use crate::error::ApiError;
use crate::schema::queries::SearchParams;
use crate::service::SearchTarget;
use crate::state::AppState;

/// Methods with a statement containing `q`.
///
/// `GET /graphs/{graph_id}/search/instructions?q=`
pub async fn search_instructions(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<MethodIndex>, ApiError> {
    let service = state.service.lock().await;
    let hits = service.search(&GraphId(graph_id), SearchTarget::Instructions, &params.q)?;
    Ok(Json(hits))
}

/// Methods with a data-flow fact containing `q`.
///
/// `GET /graphs/{graph_id}/search/facts?q=`
pub async fn search_facts(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<MethodIndex>, ApiError> {
    let service = state.service.lock().await;
    let hits = service.search(&GraphId(graph_id), SearchTarget::DataflowFacts, &params.q)?;
    Ok(Json(hits))
}
