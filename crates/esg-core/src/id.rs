//! Stable ID newtypes for supergraph records and view elements.
//!
//! Record identifiers (`GraphId`, `MethodId`, `StatementId`, `FactId`) mirror
//! the keys written by the ingestion step. View identifiers (`NodeId`,
//! `EdgeId`) are the string ids of materialized graph elements and are
//! derived deterministically from record ids so that the server and the
//! client agree on them without coordination.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one stored exploded supergraph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub String);

/// Method identity within the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub i64);

/// Statement identity. Unique across the whole supergraph, not only within
/// its owning method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementId(pub i64);

/// Data-flow fact identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactId(pub i64);

/// Id of a materialized view node. Unique within one client-side graph store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Id of a materialized control-flow edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl GraphId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        NodeId(raw.into())
    }

    /// The wrapper compound for a whole graph uses the graph id verbatim.
    pub fn graph(graph: &GraphId) -> Self {
        NodeId(graph.0.clone())
    }

    /// Method nodes are keyed by method name.
    pub fn method(name: &str) -> Self {
        NodeId(name.to_string())
    }

    pub fn statement(id: StatementId) -> Self {
        NodeId(id.0.to_string())
    }

    /// Row compound grouping a statement with its data-flow cluster.
    pub fn row(id: StatementId) -> Self {
        NodeId(format!("{}row", id.0))
    }

    /// Data-flow compound attached to a statement.
    pub fn flow_facts(id: StatementId) -> Self {
        NodeId(format!("{}_flowFacts", id.0))
    }

    pub fn fact(id: FactId) -> Self {
        NodeId(format!("fact-{}", id.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EdgeId {
    /// Control-flow edge between two statements.
    pub fn control(source: StatementId, target: StatementId) -> Self {
        EdgeId(format!("{}_{}", source.0, target.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(raw: &str) -> Self {
        NodeId(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn derived_node_ids() {
        let stmt = StatementId(17);
        assert_eq!(NodeId::statement(stmt).as_str(), "17");
        assert_eq!(NodeId::row(stmt).as_str(), "17row");
        assert_eq!(NodeId::flow_facts(stmt).as_str(), "17_flowFacts");
        assert_eq!(NodeId::fact(FactId(3)).as_str(), "fact-3");
        assert_eq!(NodeId::method("main").as_str(), "main");
    }

    #[test]
    fn control_edge_id() {
        assert_eq!(EdgeId::control(StatementId(1), StatementId(2)).as_str(), "1_2");
    }

    #[test]
    fn statement_and_wrapper_ids_do_not_collide() {
        let graph = GraphId("3f2a-graph".into());
        assert_ne!(NodeId::graph(&graph), NodeId::statement(StatementId(3)));
    }

    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&MethodId(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&NodeId::from("x")).unwrap(), "\"x\"");
    }

    #[test]
    fn method_id_works_as_json_map_key() {
        let mut map = BTreeMap::new();
        map.insert(MethodId(4), "foo".to_string());
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"4":"foo"}"#);
        let back: BTreeMap<MethodId, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
