//! Fixtures shared by the client tests: a small hand-built supergraph in the
//! exact shape the server emits, and a scripted [`LazyLoader`].
//!
//! `main` (1) holds statements 10, 11, 12 and calls `foo` (2) and `bar` (3)
//! from statement 11. `foo` holds 20, 21; `bar` holds 30.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use esg_core::{
    BaseMethodGraph, DataflowFactRecord, FactId, GraphEdge, GraphId, GraphNode, GraphSummary,
    MethodId, MethodIndex, MethodSubgraph, NodeId, StatementId, StatementKind, StatementRecord,
    Visibility,
};

use crate::error::ClientError;
use crate::loader::LazyLoader;
use crate::search::SearchTrack;

pub const GRAPH: &str = "g1";

struct Method {
    id: i64,
    name: &'static str,
    statements: &'static [(i64, &'static str, &'static [i64])],
    callees: &'static [i64],
}

const METHODS: &[Method] = &[
    Method {
        id: 1,
        name: "main",
        statements: &[
            (10, "%x = alloca i32", &[11]),
            (11, "call @dispatch(%x)", &[12, 20]),
            (12, "ret i32 0", &[]),
        ],
        callees: &[2, 3],
    },
    Method {
        id: 2,
        name: "foo",
        statements: &[(20, "%y = load i32 %x", &[21]), (21, "ret void", &[12])],
        callees: &[],
    },
    Method {
        id: 3,
        name: "bar",
        statements: &[(30, "ret void", &[])],
        callees: &[],
    },
];

const FACTS: &[(i64, i64, i64, &str)] = &[
    (100, 10, 1, "zero value"),
    (101, 11, 1, "%x tainted"),
    (102, 11, 1, "zero value"),
    (200, 20, 2, "%y tainted"),
];

pub fn graph_id() -> GraphId {
    GraphId(GRAPH.into())
}

fn lookup(name: &str) -> &'static Method {
    METHODS
        .iter()
        .find(|m| m.name == name)
        .unwrap_or_else(|| panic!("no fixture method {}", name))
}

fn lookup_id(id: MethodId) -> Option<&'static Method> {
    METHODS.iter().find(|m| m.id == id.0)
}

fn body(method: &Method, callee_visibility: Visibility) -> MethodSubgraph {
    let method_node = NodeId::method(method.name);
    let mut out = MethodSubgraph::default();
    for (id, content, succs) in method.statements {
        let record = StatementRecord {
            id: StatementId(*id),
            method: MethodId(method.id),
            content: content.to_string(),
            successors: succs.iter().map(|s| StatementId(*s)).collect(),
            kind: StatementKind::Regular,
            target_methods: vec![],
            graph: graph_id(),
        };
        out.nodes.push(GraphNode::row(record.id, &method_node));
        out.nodes.push(GraphNode::statement(&record, method.name));
        out.nodes.push(GraphNode::flow_compound(record.id));
        for succ in succs.iter() {
            out.edges.push(GraphEdge::control(record.id, StatementId(*succ)));
        }
    }
    for callee in method.callees {
        if let Some(target) = lookup_id(MethodId(*callee)) {
            out.nodes.push(GraphNode::method(
                MethodId(target.id),
                target.name,
                Some(method_node.clone()),
                callee_visibility,
            ));
        }
    }
    out
}

/// The entry subgraph for `main`.
pub fn base_graph() -> BaseMethodGraph {
    base_graph_for("main")
}

pub fn base_graph_for(name: &str) -> BaseMethodGraph {
    let method = lookup(name);
    let wrapper = GraphNode::wrapper(&graph_id());
    let method_node = GraphNode::method(
        MethodId(method.id),
        method.name,
        Some(wrapper.id.clone()),
        Visibility::Expanded,
    );
    let sub = body(method, Visibility::CollapsedUnfetched);
    let mut nodes = vec![wrapper, method_node];
    nodes.extend(sub.nodes);
    BaseMethodGraph {
        nodes,
        edges: sub.edges,
        method_name: method.name.to_string(),
    }
}

/// The lazily fetched body of one method.
pub fn method_body(name: &str) -> MethodSubgraph {
    body(lookup(name), Visibility::CollapsedUnfetched)
}

/// Fact nodes of one statement.
pub fn facts_for(statement: i64) -> Vec<GraphNode> {
    FACTS
        .iter()
        .filter(|(_, s, _, _)| *s == statement)
        .map(|(id, s, m, content)| {
            GraphNode::fact(&DataflowFactRecord {
                id: FactId(*id),
                statement: StatementId(*s),
                method: MethodId(*m),
                content: content.to_string(),
            })
        })
        .collect()
}

/// Every method body at once, each method node emitted once.
pub fn all_methods() -> MethodSubgraph {
    let wrapper = GraphNode::wrapper(&graph_id());
    let mut emitted: HashSet<NodeId> = HashSet::new();
    let mut out = MethodSubgraph {
        nodes: vec![wrapper.clone()],
        edges: vec![],
    };
    for method in METHODS {
        let node = GraphNode::method(
            MethodId(method.id),
            method.name,
            Some(wrapper.id.clone()),
            Visibility::Expanded,
        );
        if emitted.insert(node.id.clone()) {
            out.nodes.push(node);
        }
        let sub = body(method, Visibility::Expanded);
        for node in sub.nodes {
            if node.tag() == esg_core::NodeKindTag::Method && !emitted.insert(node.id.clone()) {
                continue;
            }
            out.nodes.push(node);
        }
        out.edges.extend(sub.edges);
    }
    out
}

fn index_where(pred: impl Fn(&Method) -> bool) -> MethodIndex {
    METHODS
        .iter()
        .filter(|m| pred(m))
        .map(|m| (MethodId(m.id), m.name.to_string()))
        .collect()
}

/// In-process loader serving the fixtures above.
///
/// Every request is logged under a key such as `method:2` or `facts:11`;
/// keys registered with [`ScriptedLoader::fail_on`] answer with
/// `UpstreamUnavailable`.
#[derive(Default)]
pub struct ScriptedLoader {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, key: &str) {
        self.failures.lock().unwrap().insert(key.to_string());
    }

    pub fn recover(&self, key: &str) {
        self.failures.lock().unwrap().remove(key);
    }

    /// Number of requests whose key starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.starts_with(prefix))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, key: String) -> Result<(), ClientError> {
        let failing = self.failures.lock().unwrap().contains(&key);
        self.calls.lock().unwrap().push(key.clone());
        if failing {
            Err(ClientError::UpstreamUnavailable(format!("scripted failure for {}", key)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LazyLoader for ScriptedLoader {
    async fn list_graphs(&self) -> Result<Vec<GraphSummary>, ClientError> {
        self.record("graphs".into())?;
        Ok(vec![GraphSummary {
            id: graph_id(),
            name: "sample".into(),
            method_count: METHODS.len(),
        }])
    }

    async fn fetch_base_method(
        &self,
        _graph: &GraphId,
        method: Option<MethodId>,
        _include_all_callees: bool,
    ) -> Result<BaseMethodGraph, ClientError> {
        let key = match method {
            Some(id) => format!("base:{}", id),
            None => "base:main".to_string(),
        };
        self.record(key)?;
        match method {
            None => Ok(base_graph()),
            Some(id) => lookup_id(id)
                .map(|m| base_graph_for(m.name))
                .ok_or_else(|| ClientError::NotFound(format!("method {}", id))),
        }
    }

    async fn fetch_method(
        &self,
        _graph: &GraphId,
        method: MethodId,
    ) -> Result<MethodSubgraph, ClientError> {
        self.record(format!("method:{}", method))?;
        lookup_id(method)
            .map(|m| body(m, Visibility::CollapsedUnfetched))
            .ok_or_else(|| ClientError::NotFound(format!("method {}", method)))
    }

    async fn fetch_dataflow_facts(
        &self,
        _graph: &GraphId,
        statement: StatementId,
    ) -> Result<Vec<GraphNode>, ClientError> {
        self.record(format!("facts:{}", statement))?;
        Ok(facts_for(statement.0))
    }

    async fn search(
        &self,
        _graph: &GraphId,
        track: SearchTrack,
        query: &str,
    ) -> Result<MethodIndex, ClientError> {
        self.record(format!("search:{}:{}", track.as_str(), query))?;
        Ok(match track {
            SearchTrack::Instruction => index_where(|m| {
                m.statements
                    .iter()
                    .any(|(_, content, _)| content.contains(query))
            }),
            SearchTrack::DataflowFact => index_where(|m| {
                FACTS
                    .iter()
                    .any(|(_, _, owner, content)| *owner == m.id && content.contains(query))
            }),
        })
    }

    async fn method_index(&self, _graph: &GraphId) -> Result<MethodIndex, ClientError> {
        self.record("methods".into())?;
        Ok(index_where(|_| true))
    }

    async fn fetch_all_methods(&self, _graph: &GraphId) -> Result<MethodSubgraph, ClientError> {
        self.record("all".into())?;
        Ok(all_methods())
    }
}
