//! SupergraphService: the single coordinator between HTTP handlers and the
//! record store.
//!
//! Handlers are thin wrappers that delegate to these methods. Reconstruction
//! itself lives in [`esg_storage::reconstruct`]; the service adds input
//! validation, timing, and error conversion.

use std::time::Instant;

use esg_core::{
    BaseMethodGraph, GraphId, GraphNode, GraphSummary, MethodId, MethodIndex, MethodSubgraph,
    StatementId,
};
use esg_storage::{reconstruct, AnalysisBundle, RecordStore, SqliteStore};

use crate::error::ApiError;

/// Which record content a search runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    Instructions,
    DataflowFacts,
}

/// Serves reconstruction, search, and ingestion over one SQLite store.
pub struct SupergraphService {
    store: SqliteStore,
}

impl SupergraphService {
    /// Opens (and migrates) the database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self, ApiError> {
        let store = SqliteStore::new(db_path)
            .map_err(|e| ApiError::InternalError(format!("failed to open store: {}", e)))?;
        Ok(SupergraphService { store })
    }

    /// Creates a service backed by a fresh temp-file database (for testing).
    pub fn in_memory() -> Result<Self, ApiError> {
        let tmp_path = std::env::temp_dir()
            .join(format!("esg_test_{}.db", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();
        Self::new(&tmp_path)
    }

    // -------------------------------------------------------------------
    // Graph management
    // -------------------------------------------------------------------

    pub fn import_bundle(&mut self, bundle: &AnalysisBundle) -> Result<GraphSummary, ApiError> {
        if bundle.name.trim().is_empty() {
            return Err(ApiError::BadRequest("graph name must not be empty".into()));
        }
        let id = self.store.insert_bundle(bundle)?;
        tracing::info!(
            graph = %id,
            methods = bundle.methods.len(),
            statements = bundle.statements.len(),
            facts = bundle.facts.len(),
            "imported analysis bundle"
        );
        Ok(GraphSummary {
            id,
            name: bundle.name.clone(),
            method_count: bundle.methods.len(),
        })
    }

    pub fn list_graphs(&self) -> Result<Vec<GraphSummary>, ApiError> {
        Ok(self.store.list_graphs()?)
    }

    pub fn delete_graph(&mut self, graph: &GraphId) -> Result<(), ApiError> {
        self.store.delete_graph(graph)?;
        tracing::info!(graph = %graph, "deleted graph");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Reconstruction
    // -------------------------------------------------------------------

    pub fn base_method(
        &self,
        graph: &GraphId,
        method: Option<MethodId>,
        include_all_callees: bool,
    ) -> Result<BaseMethodGraph, ApiError> {
        let started = Instant::now();
        let base = reconstruct::base_method(&self.store, graph, method, include_all_callees)?;
        tracing::info!(
            graph = %graph,
            method = %base.method_name,
            nodes = base.nodes.len(),
            edges = base.edges.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "served base method"
        );
        Ok(base)
    }

    pub fn method_subgraph(
        &self,
        graph: &GraphId,
        method: MethodId,
    ) -> Result<MethodSubgraph, ApiError> {
        Ok(reconstruct::fetch_method(&self.store, graph, method)?)
    }

    pub fn dataflow_facts(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<Vec<GraphNode>, ApiError> {
        Ok(reconstruct::dataflow_facts(&self.store, graph, statement)?)
    }

    pub fn all_methods(&self, graph: &GraphId) -> Result<MethodSubgraph, ApiError> {
        let started = Instant::now();
        let all = reconstruct::all_methods(&self.store, graph)?;
        tracing::info!(
            graph = %graph,
            nodes = all.nodes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "served all methods"
        );
        Ok(all)
    }

    pub fn method_index(&self, graph: &GraphId) -> Result<MethodIndex, ApiError> {
        Ok(self.store.method_index(graph)?)
    }

    // -------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------

    /// Methods containing `query` in statement or fact content.
    pub fn search(
        &self,
        graph: &GraphId,
        target: SearchTarget,
        query: &str,
    ) -> Result<MethodIndex, ApiError> {
        if query.is_empty() {
            return Err(ApiError::BadRequest("search query must not be empty".into()));
        }
        let hits = match target {
            SearchTarget::Instructions => self.store.search_statements(graph, query)?,
            SearchTarget::DataflowFacts => self.store.search_facts(graph, query)?,
        };
        tracing::debug!(graph = %graph, ?target, query, methods = hits.len(), "search");
        Ok(hits)
    }
}
