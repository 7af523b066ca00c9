//! The [`RecordStore`] trait defining the storage contract for supergraph
//! records.
//!
//! Two-layer API design:
//! - **Ingestion** (`insert_bundle`, `delete_graph`) writes or removes a whole
//!   graph atomically. Records are never updated in place.
//! - **Read queries** serve reconstruction and search. Batch lookups return
//!   only the records that exist, in request order, so callers can detect
//!   dangling references themselves.
//!
//! All backends (InMemoryStore, SqliteStore) implement this trait, ensuring
//! they are fully swappable without changing reconstruction logic.

use std::collections::HashSet;

use esg_core::{
    DataflowFactRecord, GraphId, GraphRecord, GraphSummary, MethodId, MethodIndex, MethodRecord,
    StatementId, StatementRecord,
};

use crate::error::StorageError;
use crate::ingest::AnalysisBundle;

/// The storage contract for exploded supergraph records.
///
/// The trait is synchronous; the server serializes access behind one async
/// mutex.
pub trait RecordStore {
    // -------------------------------------------------------------------
    // Graph-level operations
    // -------------------------------------------------------------------

    /// Writes every record of `bundle` as a new graph in one transaction.
    ///
    /// Returns the newly allocated [`GraphId`].
    fn insert_bundle(&mut self, bundle: &AnalysisBundle) -> Result<GraphId, StorageError>;

    /// Deletes a graph and all records belonging to it.
    fn delete_graph(&mut self, graph: &GraphId) -> Result<(), StorageError>;

    /// Lists all stored graphs with their method counts.
    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError>;

    /// Retrieves one graph record.
    fn get_graph(&self, graph: &GraphId) -> Result<GraphRecord, StorageError>;

    // -------------------------------------------------------------------
    // Methods
    // -------------------------------------------------------------------

    /// Retrieves a method by ID.
    fn get_method(&self, graph: &GraphId, method: MethodId)
        -> Result<MethodRecord, StorageError>;

    /// Finds a method by name. Returns `Ok(None)` when the graph exists but
    /// holds no such method.
    fn find_method_by_name(
        &self,
        graph: &GraphId,
        name: &str,
    ) -> Result<Option<MethodRecord>, StorageError>;

    /// Returns the existing methods among `ids`, in request order.
    fn find_methods(
        &self,
        graph: &GraphId,
        ids: &[MethodId],
    ) -> Result<Vec<MethodRecord>, StorageError>;

    /// Lists all methods of a graph in graph order.
    fn list_methods(&self, graph: &GraphId) -> Result<Vec<MethodRecord>, StorageError>;

    /// Method id -> name for every method of a graph.
    fn method_index(&self, graph: &GraphId) -> Result<MethodIndex, StorageError>;

    // -------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------

    /// Retrieves a statement by ID.
    fn get_statement(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<StatementRecord, StorageError>;

    /// Returns the existing statements among `ids`, in request order.
    fn find_statements(
        &self,
        graph: &GraphId,
        ids: &[StatementId],
    ) -> Result<Vec<StatementRecord>, StorageError>;

    /// Returns the subset of `ids` that exist in the graph.
    fn existing_statements(
        &self,
        graph: &GraphId,
        ids: &[StatementId],
    ) -> Result<HashSet<StatementId>, StorageError>;

    // -------------------------------------------------------------------
    // Data-flow facts
    // -------------------------------------------------------------------

    /// All facts attached to one statement, ordered by fact id.
    fn facts_for_statement(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<Vec<DataflowFactRecord>, StorageError>;

    // -------------------------------------------------------------------
    // Search over the full persisted corpus
    // -------------------------------------------------------------------

    /// Methods containing a statement whose content contains `needle`.
    fn search_statements(&self, graph: &GraphId, needle: &str)
        -> Result<MethodIndex, StorageError>;

    /// Methods containing a data-flow fact whose content contains `needle`.
    fn search_facts(&self, graph: &GraphId, needle: &str) -> Result<MethodIndex, StorageError>;
}
