//! Graph management request/response types.

use esg_core::GraphId;
use serde::Serialize;

/// Response from importing an analysis bundle.
#[derive(Debug, Clone, Serialize)]
pub struct ImportGraphResponse {
    /// The newly allocated graph identifier.
    pub id: GraphId,
    pub name: String,
    pub method_count: usize,
}

/// Response from deleting a graph.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteGraphResponse {
    pub success: bool,
    pub id: GraphId,
}
