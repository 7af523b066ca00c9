//! Persisted record shapes written by the ingestion step.
//!
//! Records are immutable once stored. They are the flat, relational form of
//! an exploded supergraph; the hierarchical view model in [`crate::node`] is
//! reconstructed from them one method at a time.

use serde::{Deserialize, Serialize};

use crate::id::{FactId, GraphId, MethodId, StatementId};

/// One stored exploded supergraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub id: GraphId,
    pub name: String,
    /// Ordered method ids belonging to this graph.
    pub methods: Vec<MethodId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub id: MethodId,
    pub name: String,
    /// Statements in program order.
    pub statements: Vec<StatementId>,
    /// The subset of `statements` that are call sites.
    pub callsites: Vec<StatementId>,
    pub graph: GraphId,
}

/// Statement kind as emitted by the analysis tool.
///
/// The tool uses numeric codes; only the call/non-call distinction carries
/// meaning for reconstruction, so every code other than `4` is a regular
/// statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatementKind {
    #[default]
    Regular,
    Call,
}

impl StatementKind {
    const CALL_CODE: i64 = 4;
    const REGULAR_CODE: i64 = 1;

    pub fn from_code(code: i64) -> Self {
        if code == Self::CALL_CODE {
            StatementKind::Call
        } else {
            StatementKind::Regular
        }
    }

    pub fn code(self) -> i64 {
        match self {
            StatementKind::Regular => Self::REGULAR_CODE,
            StatementKind::Call => Self::CALL_CODE,
        }
    }

    pub fn is_call(self) -> bool {
        matches!(self, StatementKind::Call)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRecord {
    pub id: StatementId,
    /// Owning method.
    pub method: MethodId,
    /// Textual instruction content.
    pub content: String,
    /// Control-flow successors. May point into other methods.
    #[serde(default)]
    pub successors: Vec<StatementId>,
    #[serde(default)]
    pub kind: StatementKind,
    /// Callee methods, populated only for call statements.
    #[serde(default)]
    pub target_methods: Vec<MethodId>,
    pub graph: GraphId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataflowFactRecord {
    pub id: FactId,
    pub statement: StatementId,
    pub method: MethodId,
    pub content: String,
}
