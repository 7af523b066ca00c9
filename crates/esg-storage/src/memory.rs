//! In-memory implementation of [`RecordStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and for viewing a
//! bundle without a database. It stores all records in HashMaps with the same
//! semantics as the SQLite backend.

use std::collections::{HashMap, HashSet};

use esg_core::{
    DataflowFactRecord, GraphId, GraphRecord, GraphSummary, MethodId, MethodIndex, MethodRecord,
    StatementId, StatementRecord,
};

use crate::error::StorageError;
use crate::ingest::{new_graph_id, AnalysisBundle};
use crate::traits::RecordStore;

/// Records stored for a single graph.
#[derive(Debug, Clone)]
struct StoredGraph {
    record: GraphRecord,
    methods: HashMap<MethodId, MethodRecord>,
    statements: HashMap<StatementId, StatementRecord>,
    /// Facts grouped by owning statement, each group ordered by fact id.
    facts: HashMap<StatementId, Vec<DataflowFactRecord>>,
}

/// HashMap-backed [`RecordStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    graphs: HashMap<GraphId, StoredGraph>,
    /// Insertion order of graphs, for stable listing.
    order: Vec<GraphId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn graph(&self, id: &GraphId) -> Result<&StoredGraph, StorageError> {
        self.graphs
            .get(id)
            .ok_or_else(|| StorageError::GraphNotFound(id.clone()))
    }

    fn search<'a>(
        stored: &'a StoredGraph,
        hits: impl Iterator<Item = (MethodId, &'a str)>,
        needle: &str,
    ) -> MethodIndex {
        let mut index = MethodIndex::new();
        for (method, content) in hits {
            if !content.contains(needle) {
                continue;
            }
            // Records referencing a missing method are skipped, matching the
            // SQL join.
            if let Some(record) = stored.methods.get(&method) {
                index.insert(method, record.name.clone());
            }
        }
        index
    }
}

impl RecordStore for InMemoryStore {
    fn insert_bundle(&mut self, bundle: &AnalysisBundle) -> Result<GraphId, StorageError> {
        let records = bundle.into_records(new_graph_id())?;
        let id = records.graph.id.clone();

        let mut facts: HashMap<StatementId, Vec<DataflowFactRecord>> = HashMap::new();
        for fact in records.facts {
            facts.entry(fact.statement).or_default().push(fact);
        }
        for group in facts.values_mut() {
            group.sort_by_key(|f| f.id);
        }

        let stored = StoredGraph {
            record: records.graph,
            methods: records.methods.into_iter().map(|m| (m.id, m)).collect(),
            statements: records.statements.into_iter().map(|s| (s.id, s)).collect(),
            facts,
        };
        self.graphs.insert(id.clone(), stored);
        self.order.push(id.clone());
        tracing::debug!(graph = %id, "stored bundle in memory");
        Ok(id)
    }

    fn delete_graph(&mut self, graph: &GraphId) -> Result<(), StorageError> {
        if self.graphs.remove(graph).is_none() {
            return Err(StorageError::GraphNotFound(graph.clone()));
        }
        self.order.retain(|id| id != graph);
        Ok(())
    }

    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError> {
        Ok(self
            .order
            .iter()
            .filter_map(|id| self.graphs.get(id))
            .map(|stored| GraphSummary {
                id: stored.record.id.clone(),
                name: stored.record.name.clone(),
                method_count: stored.record.methods.len(),
            })
            .collect())
    }

    fn get_graph(&self, graph: &GraphId) -> Result<GraphRecord, StorageError> {
        Ok(self.graph(graph)?.record.clone())
    }

    fn get_method(
        &self,
        graph: &GraphId,
        method: MethodId,
    ) -> Result<MethodRecord, StorageError> {
        self.graph(graph)?
            .methods
            .get(&method)
            .cloned()
            .ok_or_else(|| StorageError::method_not_found(graph, method))
    }

    fn find_method_by_name(
        &self,
        graph: &GraphId,
        name: &str,
    ) -> Result<Option<MethodRecord>, StorageError> {
        let stored = self.graph(graph)?;
        Ok(stored
            .record
            .methods
            .iter()
            .filter_map(|id| stored.methods.get(id))
            .find(|m| m.name == name)
            .cloned())
    }

    fn find_methods(
        &self,
        graph: &GraphId,
        ids: &[MethodId],
    ) -> Result<Vec<MethodRecord>, StorageError> {
        let stored = self.graph(graph)?;
        Ok(ids
            .iter()
            .filter_map(|id| stored.methods.get(id))
            .cloned()
            .collect())
    }

    fn list_methods(&self, graph: &GraphId) -> Result<Vec<MethodRecord>, StorageError> {
        let stored = self.graph(graph)?;
        Ok(stored
            .record
            .methods
            .iter()
            .filter_map(|id| stored.methods.get(id))
            .cloned()
            .collect())
    }

    fn method_index(&self, graph: &GraphId) -> Result<MethodIndex, StorageError> {
        Ok(self
            .graph(graph)?
            .methods
            .values()
            .map(|m| (m.id, m.name.clone()))
            .collect())
    }

    fn get_statement(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<StatementRecord, StorageError> {
        self.graph(graph)?
            .statements
            .get(&statement)
            .cloned()
            .ok_or_else(|| StorageError::StatementNotFound {
                graph: graph.clone(),
                statement,
            })
    }

    fn find_statements(
        &self,
        graph: &GraphId,
        ids: &[StatementId],
    ) -> Result<Vec<StatementRecord>, StorageError> {
        let stored = self.graph(graph)?;
        Ok(ids
            .iter()
            .filter_map(|id| stored.statements.get(id))
            .cloned()
            .collect())
    }

    fn existing_statements(
        &self,
        graph: &GraphId,
        ids: &[StatementId],
    ) -> Result<HashSet<StatementId>, StorageError> {
        let stored = self.graph(graph)?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| stored.statements.contains_key(id))
            .collect())
    }

    fn facts_for_statement(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<Vec<DataflowFactRecord>, StorageError> {
        Ok(self
            .graph(graph)?
            .facts
            .get(&statement)
            .cloned()
            .unwrap_or_default())
    }

    fn search_statements(
        &self,
        graph: &GraphId,
        needle: &str,
    ) -> Result<MethodIndex, StorageError> {
        let stored = self.graph(graph)?;
        let hits = stored
            .statements
            .values()
            .map(|s| (s.method, s.content.as_str()));
        Ok(Self::search(stored, hits, needle))
    }

    fn search_facts(&self, graph: &GraphId, needle: &str) -> Result<MethodIndex, StorageError> {
        let stored = self.graph(graph)?;
        let hits = stored
            .facts
            .values()
            .flatten()
            .map(|f| (f.method, f.content.as_str()));
        Ok(Self::search(stored, hits, needle))
    }
}
