//! The ingestion document for one analysis run.
//!
//! An [`AnalysisBundle`] is what the analysis step hands over: a graph name
//! plus flat method, statement, and fact lists. Graph ownership is implied by
//! the bundle, so the entries carry no graph id; [`AnalysisBundle::into_records`]
//! stamps the freshly allocated id onto every record.
//!
//! Validation here is limited to what would make the write itself ambiguous
//! (duplicate ids). Dangling cross-references are stored as-is and surface as
//! `DataCorruption` during reconstruction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use esg_core::{
    DataflowFactRecord, GraphId, GraphRecord, MethodId, MethodRecord, StatementId, StatementKind,
    StatementRecord,
};

use crate::error::StorageError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMethod {
    pub id: MethodId,
    pub name: String,
    #[serde(default)]
    pub statements: Vec<StatementId>,
    /// Call sites; derived from call statements when omitted.
    #[serde(default)]
    pub callsites: Option<Vec<StatementId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleStatement {
    pub id: StatementId,
    pub method: MethodId,
    pub content: String,
    #[serde(default)]
    pub successors: Vec<StatementId>,
    /// Numeric kind code as emitted by the analysis tool (`4` = call).
    #[serde(default = "default_kind_code")]
    pub kind: i64,
    #[serde(default)]
    pub target_methods: Vec<MethodId>,
}

fn default_kind_code() -> i64 {
    StatementKind::Regular.code()
}

/// One analysis run, ready to be written to a [`crate::RecordStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisBundle {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<BundleMethod>,
    #[serde(default)]
    pub statements: Vec<BundleStatement>,
    #[serde(default)]
    pub facts: Vec<DataflowFactRecord>,
}

/// Records produced from a bundle, all stamped with the same graph id.
#[derive(Debug, Clone)]
pub struct BundleRecords {
    pub graph: GraphRecord,
    pub methods: Vec<MethodRecord>,
    pub statements: Vec<StatementRecord>,
    pub facts: Vec<DataflowFactRecord>,
}

/// Allocates a fresh graph id.
pub fn new_graph_id() -> GraphId {
    GraphId(uuid::Uuid::new_v4().to_string())
}

impl AnalysisBundle {
    pub fn new(name: impl Into<String>) -> Self {
        AnalysisBundle {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Rejects bundles with duplicate method, statement, or fact ids, and
    /// with two methods of the same name (view node ids are name-based).
    pub fn validate(&self) -> Result<(), StorageError> {
        let mut methods = HashSet::new();
        let mut names = HashSet::new();
        for method in &self.methods {
            if !methods.insert(method.id) {
                return Err(StorageError::InvalidBundle {
                    reason: format!("duplicate method id {}", method.id),
                });
            }
            if !names.insert(method.name.as_str()) {
                return Err(StorageError::InvalidBundle {
                    reason: format!("duplicate method name '{}'", method.name),
                });
            }
        }
        let mut statements = HashSet::new();
        for stmt in &self.statements {
            if !statements.insert(stmt.id) {
                return Err(StorageError::InvalidBundle {
                    reason: format!("duplicate statement id {}", stmt.id),
                });
            }
        }
        let mut facts = HashSet::new();
        for fact in &self.facts {
            if !facts.insert(fact.id) {
                return Err(StorageError::InvalidBundle {
                    reason: format!("duplicate fact id {}", fact.id),
                });
            }
        }
        Ok(())
    }

    /// Validates the bundle and converts it into graph-stamped records.
    pub fn into_records(&self, graph: GraphId) -> Result<BundleRecords, StorageError> {
        self.validate()?;

        let call_statements: HashSet<StatementId> = self
            .statements
            .iter()
            .filter(|s| StatementKind::from_code(s.kind).is_call())
            .map(|s| s.id)
            .collect();

        let methods = self
            .methods
            .iter()
            .map(|m| MethodRecord {
                id: m.id,
                name: m.name.clone(),
                statements: m.statements.clone(),
                callsites: m.callsites.clone().unwrap_or_else(|| {
                    m.statements
                        .iter()
                        .copied()
                        .filter(|s| call_statements.contains(s))
                        .collect()
                }),
                graph: graph.clone(),
            })
            .collect();

        let statements = self
            .statements
            .iter()
            .map(|s| StatementRecord {
                id: s.id,
                method: s.method,
                content: s.content.clone(),
                successors: s.successors.clone(),
                kind: StatementKind::from_code(s.kind),
                target_methods: s.target_methods.clone(),
                graph: graph.clone(),
            })
            .collect();

        Ok(BundleRecords {
            graph: GraphRecord {
                id: graph,
                name: self.name.clone(),
                methods: self.methods.iter().map(|m| m.id).collect(),
            },
            methods,
            statements,
            facts: self.facts.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small bundles shared by the storage and reconstruction tests.

    use super::*;

    pub fn method(id: i64, name: &str, statements: &[i64]) -> BundleMethod {
        BundleMethod {
            id: MethodId(id),
            name: name.to_string(),
            statements: statements.iter().map(|s| StatementId(*s)).collect(),
            callsites: None,
        }
    }

    pub fn stmt(id: i64, method: i64, content: &str, succs: &[i64]) -> BundleStatement {
        BundleStatement {
            id: StatementId(id),
            method: MethodId(method),
            content: content.to_string(),
            successors: succs.iter().map(|s| StatementId(*s)).collect(),
            kind: StatementKind::Regular.code(),
            target_methods: vec![],
        }
    }

    pub fn call(id: i64, method: i64, content: &str, succs: &[i64], targets: &[i64]) -> BundleStatement {
        BundleStatement {
            kind: StatementKind::Call.code(),
            target_methods: targets.iter().map(|t| MethodId(*t)).collect(),
            ..stmt(id, method, content, succs)
        }
    }

    pub fn fact(id: i64, statement: i64, method: i64, content: &str) -> DataflowFactRecord {
        DataflowFactRecord {
            id: esg_core::FactId(id),
            statement: StatementId(statement),
            method: MethodId(method),
            content: content.to_string(),
        }
    }

    /// `main` (1) calls `foo` (2) and `bar` (3) from one call site.
    pub fn sample_bundle() -> AnalysisBundle {
        AnalysisBundle {
            name: "sample".into(),
            methods: vec![
                method(1, "main", &[10, 11, 12]),
                method(2, "foo", &[20, 21]),
                method(3, "bar", &[30]),
                method(4, "empty", &[]),
            ],
            statements: vec![
                stmt(10, 1, "%x = alloca i32", &[11]),
                call(11, 1, "call @dispatch(%x)", &[12, 20], &[2, 3]),
                stmt(12, 1, "ret i32 0", &[]),
                stmt(20, 2, "%y = load i32 %x", &[21]),
                stmt(21, 2, "ret void", &[12]),
                stmt(30, 3, "ret void", &[]),
            ],
            facts: vec![
                fact(100, 10, 1, "zero value"),
                fact(101, 11, 1, "%x tainted"),
                fact(102, 11, 1, "zero value"),
                fact(200, 20, 2, "%y tainted"),
            ],
        }
    }
}
