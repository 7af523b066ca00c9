//! Query-string parameters for the read endpoints.

use esg_core::MethodId;
use serde::Deserialize;

/// `GET /graphs/{graph_id}/base` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseMethodParams {
    /// Method to show; the `main` method when absent.
    pub method_id: Option<i64>,
    /// Mark callee placeholders as expanded.
    #[serde(default)]
    pub all_callees: bool,
}

impl BaseMethodParams {
    pub fn method(&self) -> Option<MethodId> {
        self.method_id.map(MethodId)
    }
}

/// `GET /graphs/{graph_id}/search/*` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}
