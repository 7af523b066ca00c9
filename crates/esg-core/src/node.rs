//! View-layer nodes of the materialized supergraph.
//!
//! A [`GraphNode`] is one element of the compound (parent/child) hierarchy the
//! renderer draws:
//!
//! ```text
//! GraphWrapper
//! └── Method
//!     ├── StatementRow
//!     │   ├── Statement
//!     │   └── DataflowCompound
//!     │       └── DataflowFact*
//!     └── Method (callee placeholder)
//! ```
//!
//! Method nodes and data-flow compounds are collapsible and carry a
//! [`Visibility`] state.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{FactId, GraphId, MethodId, NodeId, StatementId};
use crate::record::{DataflowFactRecord, StatementRecord};

/// Tri-state visibility of a collapsible node.
///
/// Legal transitions form the cycle
/// `CollapsedUnfetched -> Expanded -> CollapsedCached -> Expanded -> ...`.
/// Once a node has been fetched it never returns to `CollapsedUnfetched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Children attached and visible.
    Expanded,
    /// Children detached but retained client-side for instant restore.
    CollapsedCached,
    /// Children never requested from the server.
    CollapsedUnfetched,
}

impl Visibility {
    pub fn is_collapsed(self) -> bool {
        !matches!(self, Visibility::Expanded)
    }

    /// Returns whether moving from `self` to `to` is a legal transition.
    pub fn can_transition(self, to: Visibility) -> bool {
        use Visibility::*;
        matches!(
            (self, to),
            (CollapsedUnfetched, Expanded)
                | (Expanded, CollapsedCached)
                | (CollapsedCached, Expanded)
        ) || self == to
    }
}

/// Discriminant of [`NodeKind`] without payload, used for kind filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKindTag {
    GraphWrapper,
    Method,
    StatementRow,
    Statement,
    DataflowCompound,
    DataflowFact,
}

/// Kind-specific payload of a view node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    GraphWrapper,
    Method {
        method_id: MethodId,
        visibility: Visibility,
    },
    StatementRow,
    Statement {
        statement_id: StatementId,
        method_id: MethodId,
        method_name: String,
    },
    DataflowCompound {
        /// Statement whose facts this compound clusters.
        statement_id: StatementId,
        visibility: Visibility,
    },
    DataflowFact {
        fact_id: FactId,
        statement_id: StatementId,
    },
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::GraphWrapper => NodeKindTag::GraphWrapper,
            NodeKind::Method { .. } => NodeKindTag::Method,
            NodeKind::StatementRow => NodeKindTag::StatementRow,
            NodeKind::Statement { .. } => NodeKindTag::Statement,
            NodeKind::DataflowCompound { .. } => NodeKindTag::DataflowCompound,
            NodeKind::DataflowFact { .. } => NodeKindTag::DataflowFact,
        }
    }
}

/// A materialized node of the view graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    /// Compound parent. Parents are always inserted before their children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    /// Display name; the searchable text of statements and facts.
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl GraphNode {
    /// Root compound wrapping everything shown for one graph.
    pub fn wrapper(graph: &GraphId) -> Self {
        GraphNode {
            id: NodeId::graph(graph),
            parent: None,
            name: String::new(),
            kind: NodeKind::GraphWrapper,
        }
    }

    pub fn method(
        method_id: MethodId,
        name: &str,
        parent: Option<NodeId>,
        visibility: Visibility,
    ) -> Self {
        GraphNode {
            id: NodeId::method(name),
            parent,
            name: name.to_string(),
            kind: NodeKind::Method {
                method_id,
                visibility,
            },
        }
    }

    pub fn row(statement: StatementId, method_node: &NodeId) -> Self {
        GraphNode {
            id: NodeId::row(statement),
            parent: Some(method_node.clone()),
            name: String::new(),
            kind: NodeKind::StatementRow,
        }
    }

    pub fn statement(record: &StatementRecord, method_name: &str) -> Self {
        GraphNode {
            id: NodeId::statement(record.id),
            parent: Some(NodeId::row(record.id)),
            name: record.content.clone(),
            kind: NodeKind::Statement {
                statement_id: record.id,
                method_id: record.method,
                method_name: method_name.to_string(),
            },
        }
    }

    /// Unfetched data-flow placeholder hanging off a statement row.
    pub fn flow_compound(statement: StatementId) -> Self {
        GraphNode {
            id: NodeId::flow_facts(statement),
            parent: Some(NodeId::row(statement)),
            name: "Dataflow Facts".to_string(),
            kind: NodeKind::DataflowCompound {
                statement_id: statement,
                visibility: Visibility::CollapsedUnfetched,
            },
        }
    }

    pub fn fact(record: &DataflowFactRecord) -> Self {
        GraphNode {
            id: NodeId::fact(record.id),
            parent: Some(NodeId::flow_facts(record.statement)),
            name: record.content.clone(),
            kind: NodeKind::DataflowFact {
                fact_id: record.id,
                statement_id: record.statement,
            },
        }
    }

    pub fn tag(&self) -> NodeKindTag {
        self.kind.tag()
    }

    /// Visibility of a collapsible node; `None` for every other kind.
    pub fn visibility(&self) -> Option<Visibility> {
        match &self.kind {
            NodeKind::Method { visibility, .. }
            | NodeKind::DataflowCompound { visibility, .. } => Some(*visibility),
            _ => None,
        }
    }

    pub fn is_collapsible(&self) -> bool {
        self.visibility().is_some()
    }

    /// Moves a collapsible node to `to`, rejecting illegal transitions.
    pub fn set_visibility(&mut self, to: Visibility) -> Result<(), CoreError> {
        let id = self.id.clone();
        match &mut self.kind {
            NodeKind::Method { visibility, .. }
            | NodeKind::DataflowCompound { visibility, .. } => {
                if !visibility.can_transition(to) {
                    return Err(CoreError::InvalidTransition {
                        node: id,
                        from: *visibility,
                        to,
                    });
                }
                *visibility = to;
                Ok(())
            }
            _ => Err(CoreError::NotCollapsible { node: id }),
        }
    }

    /// Rolls a failed first fetch back to `CollapsedUnfetched`.
    ///
    /// Only valid while the node has never been expanded, which is the
    /// case for every node still waiting on its first fetch.
    pub fn reset_unfetched(&mut self) {
        match &mut self.kind {
            NodeKind::Method { visibility, .. }
            | NodeKind::DataflowCompound { visibility, .. } => {
                *visibility = Visibility::CollapsedUnfetched;
            }
            _ => {}
        }
    }
}
