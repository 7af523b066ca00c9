//! Reconstruction of the hierarchical view graph from flat records.
//!
//! Only one method is materialized per call. Everything the method refers to
//! but does not own (callee methods, data-flow facts) is emitted as a
//! collapsed placeholder that the client fetches on demand.
//!
//! All functions build their output in local buffers and return it only once
//! every referenced record has been resolved, so a failure never yields a
//! partial graph.

use std::collections::{HashMap, HashSet};

use esg_core::{
    BaseMethodGraph, GraphEdge, GraphId, GraphNode, MethodId, MethodRecord, MethodSubgraph, NodeId,
    NodeKindTag, StatementId, StatementRecord, Visibility,
};

use crate::error::StorageError;
use crate::traits::RecordStore;

/// Name of the method shown when no method is requested explicitly.
pub const ENTRY_METHOD: &str = "main";

/// Builds the entry subgraph for `method` (or the `main` method when `None`):
/// the graph wrapper, the method node, and the method body.
pub fn base_method<S: RecordStore + ?Sized>(
    store: &S,
    graph: &GraphId,
    method: Option<MethodId>,
    include_all_callees: bool,
) -> Result<BaseMethodGraph, StorageError> {
    let graph_record = store.get_graph(graph)?;
    let method = match method {
        Some(id) => store.get_method(graph, id)?,
        None => store
            .find_method_by_name(graph, ENTRY_METHOD)?
            .ok_or_else(|| StorageError::MethodNotFound {
                graph: graph.clone(),
                method: ENTRY_METHOD.to_string(),
            })?,
    };

    let body = method_body(store, graph, &method, include_all_callees)?;

    let wrapper = GraphNode::wrapper(&graph_record.id);
    let method_node = GraphNode::method(
        method.id,
        &method.name,
        Some(wrapper.id.clone()),
        Visibility::Expanded,
    );

    let mut nodes = Vec::with_capacity(body.nodes.len() + 2);
    nodes.push(wrapper);
    nodes.push(method_node);
    nodes.extend(body.nodes);

    tracing::debug!(
        graph = %graph,
        method = %method.name,
        nodes = nodes.len(),
        edges = body.edges.len(),
        "reconstructed base method"
    );

    Ok(BaseMethodGraph {
        nodes,
        edges: body.edges,
        method_name: method.name,
    })
}

/// Builds the body of one method, parented under its method node.
///
/// The method node itself is not part of the output: the caller already has
/// it (as the base method or as a callee placeholder).
pub fn method_body<S: RecordStore + ?Sized>(
    store: &S,
    graph: &GraphId,
    method: &MethodRecord,
    include_all_callees: bool,
) -> Result<MethodSubgraph, StorageError> {
    let method_node = NodeId::method(&method.name);
    let statements = load_statements(store, graph, method)?;
    check_successors(store, graph, &statements)?;

    let mut nodes = Vec::with_capacity(statements.len() * 3);
    let mut edges = Vec::new();

    for statement in &statements {
        nodes.push(GraphNode::row(statement.id, &method_node));
        nodes.push(GraphNode::statement(statement, &method.name));
        nodes.push(GraphNode::flow_compound(statement.id));
        for succ in &statement.successors {
            edges.push(GraphEdge::control(statement.id, *succ));
        }
    }

    let callee_visibility = if include_all_callees {
        Visibility::Expanded
    } else {
        Visibility::CollapsedUnfetched
    };
    // Method node ids are derived from names, so two methods sharing a name
    // would collapse into one node.
    let mut seen: HashMap<NodeId, MethodId> = HashMap::new();
    seen.insert(method_node.clone(), method.id);
    for callee in resolve_callees(store, graph, method, &statements)? {
        let node = GraphNode::method(
            callee.id,
            &callee.name,
            Some(method_node.clone()),
            callee_visibility,
        );
        // One placeholder per distinct callee; a recursive call does not
        // nest the method inside itself.
        match seen.get(&node.id) {
            Some(owner) if *owner == callee.id => {}
            Some(owner) => {
                return Err(StorageError::corruption(format!(
                    "methods {} and {} share the name '{}'",
                    owner, callee.id, callee.name
                )));
            }
            None => {
                seen.insert(node.id.clone(), callee.id);
                nodes.push(node);
            }
        }
    }

    Ok(MethodSubgraph { nodes, edges })
}

/// Looks up `method` by id and builds its body as a lazily fetched subgraph.
pub fn fetch_method<S: RecordStore + ?Sized>(
    store: &S,
    graph: &GraphId,
    method: MethodId,
) -> Result<MethodSubgraph, StorageError> {
    let record = store.get_method(graph, method)?;
    method_body(store, graph, &record, false)
}

/// The data-flow fact nodes attached to one statement.
pub fn dataflow_facts<S: RecordStore + ?Sized>(
    store: &S,
    graph: &GraphId,
    statement: StatementId,
) -> Result<Vec<GraphNode>, StorageError> {
    // Resolves the statement first so an unknown id is NotFound rather than
    // an empty fact list.
    store.get_statement(graph, statement)?;
    let facts = store.facts_for_statement(graph, statement)?;
    Ok(facts.iter().map(GraphNode::fact).collect())
}

/// Every method body of the graph at once ("show all methods").
///
/// Each method node is emitted exactly once: under its first caller when it
/// appears as a callee before its own turn, otherwise directly under the
/// graph wrapper. Method nodes always precede their bodies.
pub fn all_methods<S: RecordStore + ?Sized>(
    store: &S,
    graph: &GraphId,
) -> Result<MethodSubgraph, StorageError> {
    let graph_record = store.get_graph(graph)?;
    let wrapper = GraphNode::wrapper(&graph_record.id);
    let mut emitted: HashSet<NodeId> = HashSet::new();
    let mut out = MethodSubgraph {
        nodes: vec![wrapper.clone()],
        edges: Vec::new(),
    };

    for method in store.list_methods(graph)? {
        let node = GraphNode::method(
            method.id,
            &method.name,
            Some(wrapper.id.clone()),
            Visibility::Expanded,
        );
        if emitted.insert(node.id.clone()) {
            out.nodes.push(node);
        }
        let body = method_body(store, graph, &method, true)?;
        for node in body.nodes {
            if node.tag() == NodeKindTag::Method && !emitted.insert(node.id.clone()) {
                continue;
            }
            out.nodes.push(node);
        }
        out.edges.extend(body.edges);
    }

    tracing::debug!(
        graph = %graph,
        nodes = out.nodes.len(),
        edges = out.edges.len(),
        "reconstructed all methods"
    );
    Ok(out)
}

/// Loads the statements of `method` in method order, verifying that every
/// listed id exists and belongs to the method.
fn load_statements<S: RecordStore + ?Sized>(
    store: &S,
    graph: &GraphId,
    method: &MethodRecord,
) -> Result<Vec<StatementRecord>, StorageError> {
    if let Some(dup) = first_duplicate(&method.statements) {
        return Err(StorageError::corruption(format!(
            "method '{}' lists statement {} more than once",
            method.name, dup
        )));
    }
    if let Some(dup) = first_duplicate(&method.callsites) {
        return Err(StorageError::corruption(format!(
            "method '{}' lists call site {} more than once",
            method.name, dup
        )));
    }
    let found = store.find_statements(graph, &method.statements)?;
    if found.len() != method.statements.len() {
        let present: HashSet<StatementId> = found.iter().map(|s| s.id).collect();
        let missing = method
            .statements
            .iter()
            .find(|id| !present.contains(id))
            .map(|id| id.to_string())
            .unwrap_or_else(|| "duplicate entry".to_string());
        return Err(StorageError::corruption(format!(
            "method '{}' lists statement {} which does not exist",
            method.name, missing
        )));
    }
    if let Some(stray) = found.iter().find(|s| s.method != method.id) {
        return Err(StorageError::corruption(format!(
            "statement {} is listed by method '{}' but owned by method {}",
            stray.id, method.name, stray.method
        )));
    }
    Ok(found)
}

fn first_duplicate(ids: &[StatementId]) -> Option<StatementId> {
    let mut seen = HashSet::new();
    ids.iter().copied().find(|id| !seen.insert(*id))
}

/// Successors may live in other methods; they only have to exist somewhere
/// in the graph.
fn check_successors<S: RecordStore + ?Sized>(
    store: &S,
    graph: &GraphId,
    statements: &[StatementRecord],
) -> Result<(), StorageError> {
    let local: HashSet<StatementId> = statements.iter().map(|s| s.id).collect();
    let mut external: Vec<StatementId> = statements
        .iter()
        .flat_map(|s| s.successors.iter().copied())
        .filter(|succ| !local.contains(succ))
        .collect();
    if external.is_empty() {
        return Ok(());
    }
    external.sort();
    external.dedup();

    let existing = store.existing_statements(graph, &external)?;
    for statement in statements {
        for succ in &statement.successors {
            if !local.contains(succ) && !existing.contains(succ) {
                return Err(StorageError::corruption(format!(
                    "statement {} has dangling successor {}",
                    statement.id, succ
                )));
            }
        }
    }
    Ok(())
}

/// Resolves the callee methods of every call site, in call-site order.
fn resolve_callees<S: RecordStore + ?Sized>(
    store: &S,
    graph: &GraphId,
    method: &MethodRecord,
    statements: &[StatementRecord],
) -> Result<Vec<MethodRecord>, StorageError> {
    let by_id: HashMap<StatementId, &StatementRecord> =
        statements.iter().map(|s| (s.id, s)).collect();

    let mut callees = Vec::new();
    for callsite in &method.callsites {
        let statement = by_id.get(callsite).ok_or_else(|| {
            StorageError::corruption(format!(
                "method '{}' lists call site {} outside its statements",
                method.name, callsite
            ))
        })?;
        let targets = store.find_methods(graph, &statement.target_methods)?;
        if targets.len() != statement.target_methods.len() {
            let present: HashSet<MethodId> = targets.iter().map(|m| m.id).collect();
            let missing = statement
                .target_methods
                .iter()
                .find(|id| !present.contains(id))
                .map(|id| id.to_string())
                .unwrap_or_else(|| "duplicate entry".to_string());
            return Err(StorageError::corruption(format!(
                "call site {} targets method {} which does not exist",
                statement.id, missing
            )));
        }
        callees.extend(targets);
    }
    Ok(callees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use crate::ingest::AnalysisBundle;
    use crate::memory::InMemoryStore;
    use esg_core::NodeKind;

    fn seeded(bundle: AnalysisBundle) -> (InMemoryStore, GraphId) {
        let mut store = InMemoryStore::new();
        let graph = store.insert_bundle(&bundle).unwrap();
        (store, graph)
    }

    /// Every parent appears earlier in `nodes` than its children.
    fn assert_parent_before_child(nodes: &[GraphNode], preexisting: &[&str]) {
        let mut seen: HashSet<&str> = preexisting.iter().copied().collect();
        for node in nodes {
            if let Some(parent) = &node.parent {
                assert!(
                    seen.contains(parent.as_str()),
                    "node {} emitted before its parent {}",
                    node.id,
                    parent
                );
            }
            seen.insert(node.id.as_str());
        }
    }

    #[test]
    fn base_method_defaults_to_main() {
        let (store, graph) = seeded(sample_bundle());
        let base = base_method(&store, &graph, None, false).unwrap();
        assert_eq!(base.method_name, "main");
        assert_eq!(base.nodes[0].tag(), NodeKindTag::GraphWrapper);
        assert_eq!(base.nodes[0].id.as_str(), graph.as_str());
        assert_eq!(base.nodes[1].id.as_str(), "main");
        assert_eq!(base.nodes[1].visibility(), Some(Visibility::Expanded));
        assert_parent_before_child(&base.nodes, &[]);
    }

    #[test]
    fn statements_get_row_statement_and_compound() {
        let (store, graph) = seeded(sample_bundle());
        let base = base_method(&store, &graph, None, false).unwrap();
        let count = |tag| base.nodes.iter().filter(|n| n.tag() == tag).count();
        assert_eq!(count(NodeKindTag::StatementRow), 3);
        assert_eq!(count(NodeKindTag::Statement), 3);
        assert_eq!(count(NodeKindTag::DataflowCompound), 3);
        assert_eq!(count(NodeKindTag::DataflowFact), 0);

        let compound = base
            .nodes
            .iter()
            .find(|n| n.id.as_str() == "11_flowFacts")
            .unwrap();
        assert_eq!(compound.parent.as_ref().unwrap().as_str(), "11row");
        assert_eq!(
            compound.kind,
            NodeKind::DataflowCompound {
                statement_id: StatementId(11),
                visibility: Visibility::CollapsedUnfetched,
            }
        );
    }

    #[test]
    fn method_without_statements_yields_two_nodes() {
        let (store, graph) = seeded(sample_bundle());
        let base = base_method(&store, &graph, Some(MethodId(4)), false).unwrap();
        assert_eq!(base.nodes.len(), 2);
        assert!(base.edges.is_empty());
        assert_eq!(base.method_name, "empty");
    }

    #[test]
    fn callsite_with_two_targets_yields_two_placeholders() {
        let (store, graph) = seeded(sample_bundle());
        let base = base_method(&store, &graph, None, false).unwrap();
        let callees: Vec<_> = base
            .nodes
            .iter()
            .filter(|n| n.tag() == NodeKindTag::Method && n.id.as_str() != "main")
            .collect();
        assert_eq!(callees.len(), 2);
        for callee in callees {
            assert_eq!(callee.parent.as_ref().unwrap().as_str(), "main");
            assert_eq!(callee.visibility(), Some(Visibility::CollapsedUnfetched));
        }
    }

    #[test]
    fn include_all_callees_marks_placeholders_expanded_without_bodies() {
        let (store, graph) = seeded(sample_bundle());
        let base = base_method(&store, &graph, None, true).unwrap();
        let foo = base.nodes.iter().find(|n| n.id.as_str() == "foo").unwrap();
        assert_eq!(foo.visibility(), Some(Visibility::Expanded));
        // foo's statements still need their own fetch.
        assert!(!base.nodes.iter().any(|n| n.id.as_str() == "20"));
    }

    #[test]
    fn cross_method_successors_are_kept_as_edges() {
        let (store, graph) = seeded(sample_bundle());
        let base = base_method(&store, &graph, None, false).unwrap();
        let ids: Vec<_> = base.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["10_11", "11_12", "11_20"]);
    }

    #[test]
    fn lazy_method_fetch_is_parented_under_method_node() {
        let (store, graph) = seeded(sample_bundle());
        let body = fetch_method(&store, &graph, MethodId(2)).unwrap();
        assert_eq!(body.nodes.len(), 6);
        assert_parent_before_child(&body.nodes, &["foo"]);
        assert_eq!(body.edges.len(), 2);
    }

    #[test]
    fn recursive_call_does_not_nest_method_in_itself() {
        let bundle = AnalysisBundle {
            name: "rec".into(),
            methods: vec![method(1, "main", &[1])],
            statements: vec![call(1, 1, "call @main()", &[], &[1])],
            facts: vec![],
        };
        let (store, graph) = seeded(bundle);
        let base = base_method(&store, &graph, None, false).unwrap();
        let mains = base.nodes.iter().filter(|n| n.id.as_str() == "main").count();
        assert_eq!(mains, 1);
    }

    #[test]
    fn missing_graph_or_method_is_not_found() {
        let (store, graph) = seeded(sample_bundle());
        let err = base_method(&store, &GraphId("nope".into()), None, false).unwrap_err();
        assert!(err.is_not_found());
        let err = base_method(&store, &graph, Some(MethodId(77)), false).unwrap_err();
        assert!(err.is_not_found());

        let (store, graph) = seeded(AnalysisBundle {
            name: "no-main".into(),
            methods: vec![method(1, "start", &[])],
            ..Default::default()
        });
        let err = base_method(&store, &graph, None, false).unwrap_err();
        assert!(matches!(err, StorageError::MethodNotFound { .. }));
    }

    #[test]
    fn dangling_successor_is_corruption() {
        let mut bundle = sample_bundle();
        bundle.statements[0].successors.push(StatementId(999));
        let (store, graph) = seeded(bundle);
        let err = base_method(&store, &graph, None, false).unwrap_err();
        assert!(matches!(err, StorageError::DataCorruption { .. }));
    }

    #[test]
    fn dangling_call_target_is_corruption() {
        let mut bundle = sample_bundle();
        bundle.statements[1].target_methods.push(MethodId(55));
        let (store, graph) = seeded(bundle);
        let err = base_method(&store, &graph, None, false).unwrap_err();
        assert!(matches!(err, StorageError::DataCorruption { .. }));
    }

    #[test]
    fn missing_listed_statement_is_corruption() {
        let mut bundle = sample_bundle();
        bundle.methods[0].statements.push(StatementId(404));
        let (store, graph) = seeded(bundle);
        let err = base_method(&store, &graph, None, false).unwrap_err();
        assert!(matches!(err, StorageError::DataCorruption { .. }));
    }

    #[test]
    fn statement_listed_twice_is_corruption() {
        let mut bundle = sample_bundle();
        bundle.methods[0].statements.push(StatementId(10));
        let (store, graph) = seeded(bundle);
        let err = base_method(&store, &graph, None, false).unwrap_err();
        assert!(matches!(err, StorageError::DataCorruption { ref reason } if reason.contains("10")));
    }

    #[test]
    fn call_site_listed_twice_is_corruption() {
        let mut bundle = sample_bundle();
        bundle.methods[0].callsites = Some(vec![StatementId(11), StatementId(11)]);
        let (store, graph) = seeded(bundle);
        let err = base_method(&store, &graph, None, false).unwrap_err();
        assert!(matches!(err, StorageError::DataCorruption { .. }));
    }

    #[test]
    fn dataflow_facts_for_statement() {
        let (store, graph) = seeded(sample_bundle());
        let facts = dataflow_facts(&store, &graph, StatementId(11)).unwrap();
        assert_eq!(facts.len(), 2);
        assert!(facts
            .iter()
            .all(|f| f.parent.as_ref().unwrap().as_str() == "11_flowFacts"));
        assert!(dataflow_facts(&store, &graph, StatementId(12))
            .unwrap()
            .is_empty());
        let err = dataflow_facts(&store, &graph, StatementId(999)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn all_methods_emits_each_method_once_in_parent_order() {
        let (store, graph) = seeded(sample_bundle());
        let all = all_methods(&store, &graph).unwrap();
        assert_parent_before_child(&all.nodes, &[]);
        for name in ["main", "foo", "bar", "empty"] {
            let count = all.nodes.iter().filter(|n| n.id.as_str() == name).count();
            assert_eq!(count, 1, "method {} emitted {} times", name, count);
        }
        let foo = all.nodes.iter().find(|n| n.id.as_str() == "foo").unwrap();
        assert_eq!(foo.parent.as_ref().unwrap().as_str(), "main");
        let statements = all
            .nodes
            .iter()
            .filter(|n| n.tag() == NodeKindTag::Statement)
            .count();
        assert_eq!(statements, 6);
    }
}
