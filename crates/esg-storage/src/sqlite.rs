//! SQLite implementation of [`RecordStore`].
//!
//! [`SqliteStore`] persists supergraph records in a SQLite database with WAL
//! mode, one transaction per ingested bundle, and automatic schema
//! migrations. List-valued record fields are stored as JSON TEXT columns via
//! serde_json; a column that fails to decode is reported as data corruption.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use esg_core::{
    DataflowFactRecord, FactId, GraphId, GraphRecord, GraphSummary, MethodId, MethodIndex,
    MethodRecord, StatementId, StatementKind, StatementRecord,
};

use crate::error::StorageError;
use crate::ingest::{new_graph_id, AnalysisBundle};
use crate::traits::RecordStore;

/// SQLite-backed implementation of [`RecordStore`].
pub struct SqliteStore {
    conn: Connection,
}

/// Raw `methods` row before JSON decoding.
struct MethodRow {
    id: i64,
    name: String,
    statements_json: String,
    callsites_json: String,
}

/// Raw `statements` row before JSON decoding.
struct StatementRow {
    id: i64,
    method: i64,
    content: String,
    successors_json: String,
    kind: i64,
    targets_json: String,
}

const METHOD_COLUMNS: &str = "method_id, name, statements_json, callsites_json";
const STATEMENT_COLUMNS: &str =
    "statement_id, method_id, content, successors_json, kind, targets_json";

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Verifies a graph exists, returning an error if not.
    fn assert_graph_exists(&self, graph: &GraphId) -> Result<(), StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM graphs WHERE id = ?1)",
            params![graph.as_str()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::GraphNotFound(graph.clone()));
        }
        Ok(())
    }

    fn decode_json<T: DeserializeOwned>(json: &str, what: &str) -> Result<T, StorageError> {
        serde_json::from_str(json)
            .map_err(|e| StorageError::corruption(format!("malformed {}: {}", what, e)))
    }

    fn read_method_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MethodRow> {
        Ok(MethodRow {
            id: row.get(0)?,
            name: row.get(1)?,
            statements_json: row.get(2)?,
            callsites_json: row.get(3)?,
        })
    }

    fn read_statement_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatementRow> {
        Ok(StatementRow {
            id: row.get(0)?,
            method: row.get(1)?,
            content: row.get(2)?,
            successors_json: row.get(3)?,
            kind: row.get(4)?,
            targets_json: row.get(5)?,
        })
    }

    fn decode_method(graph: &GraphId, row: MethodRow) -> Result<MethodRecord, StorageError> {
        let context = format!("statement list of method {}", row.id);
        let statements = Self::decode_json(&row.statements_json, &context)?;
        let context = format!("callsite list of method {}", row.id);
        let callsites = Self::decode_json(&row.callsites_json, &context)?;
        Ok(MethodRecord {
            id: MethodId(row.id),
            name: row.name,
            statements,
            callsites,
            graph: graph.clone(),
        })
    }

    fn decode_statement(
        graph: &GraphId,
        row: StatementRow,
    ) -> Result<StatementRecord, StorageError> {
        let context = format!("successors of statement {}", row.id);
        let successors = Self::decode_json(&row.successors_json, &context)?;
        let context = format!("call targets of statement {}", row.id);
        let target_methods = Self::decode_json(&row.targets_json, &context)?;
        Ok(StatementRecord {
            id: StatementId(row.id),
            method: MethodId(row.method),
            content: row.content,
            successors,
            kind: StatementKind::from_code(row.kind),
            target_methods,
            graph: graph.clone(),
        })
    }

    fn search_table(
        &self,
        graph: &GraphId,
        needle: &str,
        table: &str,
    ) -> Result<MethodIndex, StorageError> {
        self.assert_graph_exists(graph)?;
        let sql = format!(
            "SELECT DISTINCT t.method_id, m.name FROM {table} t \
             JOIN methods m ON m.graph_id = t.graph_id AND m.method_id = t.method_id \
             WHERE t.graph_id = ?1 AND instr(t.content, ?2) > 0"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![graph.as_str(), needle], |row| {
            Ok((MethodId(row.get(0)?), row.get::<_, String>(1)?))
        })?;
        let mut index = MethodIndex::new();
        for row in rows {
            let (id, name) = row?;
            index.insert(id, name);
        }
        Ok(index)
    }
}

impl RecordStore for SqliteStore {
    fn insert_bundle(&mut self, bundle: &AnalysisBundle) -> Result<GraphId, StorageError> {
        let records = bundle.into_records(new_graph_id())?;
        let graph_id = records.graph.id.clone();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO graphs (id, name) VALUES (?1, ?2)",
            params![graph_id.as_str(), records.graph.name],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO methods (graph_id, method_id, name, position, statements_json, callsites_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (position, method) in records.methods.iter().enumerate() {
                stmt.execute(params![
                    graph_id.as_str(),
                    method.id.0,
                    method.name,
                    position as i64,
                    serde_json::to_string(&method.statements)?,
                    serde_json::to_string(&method.callsites)?,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO statements (graph_id, statement_id, method_id, content, successors_json, kind, targets_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for statement in &records.statements {
                stmt.execute(params![
                    graph_id.as_str(),
                    statement.id.0,
                    statement.method.0,
                    statement.content,
                    serde_json::to_string(&statement.successors)?,
                    statement.kind.code(),
                    serde_json::to_string(&statement.target_methods)?,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO dataflow_facts (graph_id, fact_id, statement_id, method_id, content) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for fact in &records.facts {
                stmt.execute(params![
                    graph_id.as_str(),
                    fact.id.0,
                    fact.statement.0,
                    fact.method.0,
                    fact.content,
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!(
            graph = %graph_id,
            methods = records.methods.len(),
            statements = records.statements.len(),
            facts = records.facts.len(),
            "ingested analysis bundle"
        );
        Ok(graph_id)
    }

    fn delete_graph(&mut self, graph: &GraphId) -> Result<(), StorageError> {
        self.assert_graph_exists(graph)?;
        self.conn
            .execute("DELETE FROM graphs WHERE id = ?1", params![graph.as_str()])?;
        Ok(())
    }

    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.name, (SELECT COUNT(*) FROM methods m WHERE m.graph_id = g.id) \
             FROM graphs g ORDER BY g.created_at, g.rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(GraphSummary {
                id: GraphId(row.get(0)?),
                name: row.get(1)?,
                method_count: row.get::<_, i64>(2)? as usize,
            })
        })?;
        let mut graphs = Vec::new();
        for row in rows {
            graphs.push(row?);
        }
        Ok(graphs)
    }

    fn get_graph(&self, graph: &GraphId) -> Result<GraphRecord, StorageError> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM graphs WHERE id = ?1",
                params![graph.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let name = name.ok_or_else(|| StorageError::GraphNotFound(graph.clone()))?;

        let mut stmt = self
            .conn
            .prepare("SELECT method_id FROM methods WHERE graph_id = ?1 ORDER BY position")?;
        let rows = stmt.query_map(params![graph.as_str()], |row| Ok(MethodId(row.get(0)?)))?;
        let mut methods = Vec::new();
        for row in rows {
            methods.push(row?);
        }

        Ok(GraphRecord {
            id: graph.clone(),
            name,
            methods,
        })
    }

    fn get_method(
        &self,
        graph: &GraphId,
        method: MethodId,
    ) -> Result<MethodRecord, StorageError> {
        self.assert_graph_exists(graph)?;
        let sql = format!(
            "SELECT {METHOD_COLUMNS} FROM methods WHERE graph_id = ?1 AND method_id = ?2"
        );
        let row = self
            .conn
            .query_row(&sql, params![graph.as_str(), method.0], Self::read_method_row)
            .optional()?
            .ok_or_else(|| StorageError::method_not_found(graph, method))?;
        Self::decode_method(graph, row)
    }

    fn find_method_by_name(
        &self,
        graph: &GraphId,
        name: &str,
    ) -> Result<Option<MethodRecord>, StorageError> {
        self.assert_graph_exists(graph)?;
        let sql = format!(
            "SELECT {METHOD_COLUMNS} FROM methods WHERE graph_id = ?1 AND name = ?2 ORDER BY position LIMIT 1"
        );
        let row = self
            .conn
            .query_row(&sql, params![graph.as_str(), name], Self::read_method_row)
            .optional()?;
        row.map(|row| Self::decode_method(graph, row)).transpose()
    }

    fn find_methods(
        &self,
        graph: &GraphId,
        ids: &[MethodId],
    ) -> Result<Vec<MethodRecord>, StorageError> {
        self.assert_graph_exists(graph)?;
        let sql = format!(
            "SELECT {METHOD_COLUMNS} FROM methods WHERE graph_id = ?1 AND method_id = ?2"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut methods = Vec::with_capacity(ids.len());
        for id in ids {
            let row = stmt
                .query_row(params![graph.as_str(), id.0], Self::read_method_row)
                .optional()?;
            if let Some(row) = row {
                methods.push(Self::decode_method(graph, row)?);
            }
        }
        Ok(methods)
    }

    fn list_methods(&self, graph: &GraphId) -> Result<Vec<MethodRecord>, StorageError> {
        self.assert_graph_exists(graph)?;
        let sql =
            format!("SELECT {METHOD_COLUMNS} FROM methods WHERE graph_id = ?1 ORDER BY position");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![graph.as_str()], Self::read_method_row)?;
        let mut methods = Vec::new();
        for row in rows {
            methods.push(Self::decode_method(graph, row?)?);
        }
        Ok(methods)
    }

    fn method_index(&self, graph: &GraphId) -> Result<MethodIndex, StorageError> {
        self.assert_graph_exists(graph)?;
        let mut stmt = self
            .conn
            .prepare("SELECT method_id, name FROM methods WHERE graph_id = ?1")?;
        let rows = stmt.query_map(params![graph.as_str()], |row| {
            Ok((MethodId(row.get(0)?), row.get::<_, String>(1)?))
        })?;
        let mut index = MethodIndex::new();
        for row in rows {
            let (id, name) = row?;
            index.insert(id, name);
        }
        Ok(index)
    }

    fn get_statement(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<StatementRecord, StorageError> {
        self.assert_graph_exists(graph)?;
        let sql = format!(
            "SELECT {STATEMENT_COLUMNS} FROM statements WHERE graph_id = ?1 AND statement_id = ?2"
        );
        let row = self
            .conn
            .query_row(&sql, params![graph.as_str(), statement.0], Self::read_statement_row)
            .optional()?
            .ok_or_else(|| StorageError::StatementNotFound {
                graph: graph.clone(),
                statement,
            })?;
        Self::decode_statement(graph, row)
    }

    fn find_statements(
        &self,
        graph: &GraphId,
        ids: &[StatementId],
    ) -> Result<Vec<StatementRecord>, StorageError> {
        self.assert_graph_exists(graph)?;
        let sql = format!(
            "SELECT {STATEMENT_COLUMNS} FROM statements WHERE graph_id = ?1 AND statement_id = ?2"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut statements = Vec::with_capacity(ids.len());
        for id in ids {
            let row = stmt
                .query_row(params![graph.as_str(), id.0], Self::read_statement_row)
                .optional()?;
            if let Some(row) = row {
                statements.push(Self::decode_statement(graph, row)?);
            }
        }
        Ok(statements)
    }

    fn existing_statements(
        &self,
        graph: &GraphId,
        ids: &[StatementId],
    ) -> Result<HashSet<StatementId>, StorageError> {
        self.assert_graph_exists(graph)?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM statements WHERE graph_id = ?1 AND statement_id = ?2)",
        )?;
        let mut found = HashSet::new();
        for id in ids {
            let exists: bool = stmt.query_row(params![graph.as_str(), id.0], |row| row.get(0))?;
            if exists {
                found.insert(*id);
            }
        }
        Ok(found)
    }

    fn facts_for_statement(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<Vec<DataflowFactRecord>, StorageError> {
        self.assert_graph_exists(graph)?;
        let mut stmt = self.conn.prepare(
            "SELECT fact_id, statement_id, method_id, content FROM dataflow_facts \
             WHERE graph_id = ?1 AND statement_id = ?2 ORDER BY fact_id",
        )?;
        let rows = stmt.query_map(params![graph.as_str(), statement.0], |row| {
            Ok(DataflowFactRecord {
                id: FactId(row.get(0)?),
                statement: StatementId(row.get(1)?),
                method: MethodId(row.get(2)?),
                content: row.get(3)?,
            })
        })?;
        let mut facts = Vec::new();
        for row in rows {
            facts.push(row?);
        }
        Ok(facts)
    }

    fn search_statements(
        &self,
        graph: &GraphId,
        needle: &str,
    ) -> Result<MethodIndex, StorageError> {
        self.search_table(graph, needle, "statements")
    }

    fn search_facts(&self, graph: &GraphId, needle: &str) -> Result<MethodIndex, StorageError> {
        self.search_table(graph, needle, "dataflow_facts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::sample_bundle;

    fn seeded() -> (SqliteStore, GraphId) {
        let mut store = SqliteStore::in_memory().unwrap();
        let graph = store.insert_bundle(&sample_bundle()).unwrap();
        (store, graph)
    }

    #[test]
    fn insert_and_list_graphs() {
        let (store, graph) = seeded();
        let graphs = store.list_graphs().unwrap();
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].id, graph);
        assert_eq!(graphs[0].name, "sample");
        assert_eq!(graphs[0].method_count, 4);
    }

    #[test]
    fn get_graph_preserves_method_order() {
        let (store, graph) = seeded();
        let record = store.get_graph(&graph).unwrap();
        assert_eq!(
            record.methods,
            vec![MethodId(1), MethodId(2), MethodId(3), MethodId(4)]
        );
    }

    #[test]
    fn missing_graph_is_not_found() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.get_graph(&GraphId("nope".into())).unwrap_err();
        assert!(matches!(err, StorageError::GraphNotFound(_)));
        let err = store.search_statements(&GraphId("nope".into()), "x").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn method_lookup_by_id_and_name() {
        let (store, graph) = seeded();
        let main = store.find_method_by_name(&graph, "main").unwrap().unwrap();
        assert_eq!(main.id, MethodId(1));
        assert_eq!(main.callsites, vec![StatementId(11)]);
        assert!(store.find_method_by_name(&graph, "nope").unwrap().is_none());

        let foo = store.get_method(&graph, MethodId(2)).unwrap();
        assert_eq!(foo.name, "foo");
        let err = store.get_method(&graph, MethodId(99)).unwrap_err();
        assert!(matches!(err, StorageError::MethodNotFound { .. }));
    }

    #[test]
    fn batch_lookups_skip_missing_ids() {
        let (store, graph) = seeded();
        let stmts = store
            .find_statements(&graph, &[StatementId(12), StatementId(999), StatementId(10)])
            .unwrap();
        let ids: Vec<_> = stmts.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![StatementId(12), StatementId(10)]);

        let existing = store
            .existing_statements(&graph, &[StatementId(20), StatementId(999)])
            .unwrap();
        assert!(existing.contains(&StatementId(20)));
        assert!(!existing.contains(&StatementId(999)));
    }

    #[test]
    fn statement_round_trips_kind_and_targets() {
        let (store, graph) = seeded();
        let call = store.get_statement(&graph, StatementId(11)).unwrap();
        assert!(call.kind.is_call());
        assert_eq!(call.target_methods, vec![MethodId(2), MethodId(3)]);
        assert_eq!(call.successors, vec![StatementId(12), StatementId(20)]);
    }

    #[test]
    fn facts_are_scoped_to_statement() {
        let (store, graph) = seeded();
        let facts = store.facts_for_statement(&graph, StatementId(11)).unwrap();
        let contents: Vec<_> = facts.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(contents, vec!["%x tainted", "zero value"]);
    }

    #[test]
    fn search_returns_containing_methods() {
        let (store, graph) = seeded();
        let hits = store.search_statements(&graph, "ret void").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits.get(&MethodId(2)).map(String::as_str), Some("foo"));
        assert_eq!(hits.get(&MethodId(3)).map(String::as_str), Some("bar"));

        let hits = store.search_facts(&graph, "tainted").unwrap();
        assert_eq!(hits.keys().copied().collect::<Vec<_>>(), vec![MethodId(1), MethodId(2)]);
    }

    #[test]
    fn malformed_json_column_is_corruption() {
        let (store, graph) = seeded();
        store
            .conn
            .execute(
                "UPDATE statements SET successors_json = 'not json' WHERE statement_id = 10",
                [],
            )
            .unwrap();
        let err = store.get_statement(&graph, StatementId(10)).unwrap_err();
        assert!(matches!(err, StorageError::DataCorruption { .. }));
    }

    #[test]
    fn callees_sharing_a_name_are_corruption() {
        let (store, graph) = seeded();
        store
            .conn
            .execute("UPDATE methods SET name = 'foo' WHERE method_id = 3", [])
            .unwrap();
        let err = crate::reconstruct::base_method(&store, &graph, None, false).unwrap_err();
        assert!(
            matches!(err, StorageError::DataCorruption { ref reason } if reason.contains("'foo'"))
        );
    }

    #[test]
    fn delete_graph_cascades() {
        let (mut store, graph) = seeded();
        store.delete_graph(&graph).unwrap();
        assert!(store.list_graphs().unwrap().is_empty());
        let orphans: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM statements", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esg.db");
        let path = path.to_str().unwrap();
        let graph = {
            let mut store = SqliteStore::new(path).unwrap();
            store.insert_bundle(&sample_bundle()).unwrap()
        };
        let store = SqliteStore::new(path).unwrap();
        assert_eq!(store.get_graph(&graph).unwrap().name, "sample");
    }
}
