//! Control-flow edges of the view graph.
//!
//! Edges only ever connect statement nodes. Compound membership is expressed
//! through [`crate::node::GraphNode::parent`], never through edges.

use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, NodeId, StatementId};

/// A control-flow successor relation between two statements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl GraphEdge {
    pub fn control(source: StatementId, target: StatementId) -> Self {
        GraphEdge {
            id: EdgeId::control(source, target),
            source: NodeId::statement(source),
            target: NodeId::statement(target),
        }
    }

    /// Returns `true` if either endpoint is `node`.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}
