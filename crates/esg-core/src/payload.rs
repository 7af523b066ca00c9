//! Response payload shapes shared by the server and the client loader.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::edge::GraphEdge;
use crate::id::{GraphId, MethodId};
use crate::node::GraphNode;

/// Method id to method name, as returned by search and method listing.
pub type MethodIndex = BTreeMap<MethodId, String>;

/// The entry subgraph for one method, including its wrapper and method node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseMethodGraph {
    /// Nodes in parent-before-child order.
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub method_name: String,
}

/// The body of a method, parented under an already materialized method node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodSubgraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl MethodSubgraph {
    pub fn extend(&mut self, other: MethodSubgraph) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }
}

/// Listing entry for one stored graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub id: GraphId,
    pub name: String,
    pub method_count: usize,
}
