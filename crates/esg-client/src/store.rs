//! Client-side graph store: the materialized nodes and edges the renderer
//! draws, plus the cache of subtrees detached by collapsing.
//!
//! Invariants:
//! - a node is only inserted once its parent is present;
//! - an attached edge always has both endpoints present. Edges arriving ahead
//!   of an endpoint are parked and promoted once the endpoint shows up;
//! - a detached subtree is removed from the attached maps entirely, so
//!   "is present" is the visibility test.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use esg_core::{EdgeId, GraphEdge, GraphNode, NodeId, NodeKindTag, Visibility};

use crate::error::ClientError;

/// Search highlight state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    None,
    Match,
}

/// What the renderer should draw a node as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStyle {
    Default,
    Match,
    /// A collapsed method node.
    Collapsed,
}

/// Nodes and edges removed by one collapse, kept for instant restore.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetachedSubtree {
    /// In original insertion order, so parents precede children.
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: IndexMap<NodeId, GraphNode>,
    edges: IndexMap<EdgeId, GraphEdge>,
    /// Edges waiting for an endpoint.
    parked: IndexMap<EdgeId, GraphEdge>,
    children: HashMap<NodeId, Vec<NodeId>>,
    detached: HashMap<NodeId, DetachedSubtree>,
    highlighted: HashMap<NodeId, NodeKindTag>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every node, edge, cached subtree and highlight.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edges.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn parked_edge_count(&self) -> usize {
        self.parked.len()
    }

    /// Attached nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    pub fn nodes_of(&self, tag: NodeKindTag) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(move |n| n.tag() == tag)
    }

    /// Direct children of an attached node.
    pub fn children(&self, id: &NodeId) -> &[NodeId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn visibility(&self, id: &NodeId) -> Option<Visibility> {
        self.nodes.get(id).and_then(GraphNode::visibility)
    }

    /// Whether `id` is the root of a cached, detached subtree.
    pub fn has_cached_subtree(&self, id: &NodeId) -> bool {
        self.detached.contains_key(id)
    }

    // -------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------

    pub fn set_visibility(&mut self, id: &NodeId, to: Visibility) -> Result<(), ClientError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ClientError::unknown_node(id))?;
        node.set_visibility(to)?;
        Ok(())
    }

    /// Merges a batch of nodes and edges.
    ///
    /// Every node's parent must already be attached or appear earlier in the
    /// batch; otherwise nothing is inserted. Nodes whose id is already
    /// attached are left untouched. Returns the ids of newly inserted nodes.
    pub fn merge(
        &mut self,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> Result<Vec<NodeId>, ClientError> {
        let mut known: HashSet<&NodeId> = HashSet::new();
        for node in &nodes {
            if let Some(parent) = &node.parent {
                if !self.nodes.contains_key(parent) && !known.contains(parent) {
                    return Err(ClientError::DataCorruption(format!(
                        "node '{}' arrived before its parent '{}'",
                        node.id, parent
                    )));
                }
            }
            known.insert(&node.id);
        }

        let mut added = Vec::new();
        for node in nodes {
            if self.nodes.contains_key(&node.id) {
                continue;
            }
            added.push(node.id.clone());
            self.insert_node(node);
        }
        for edge in edges {
            self.add_edge(edge);
        }
        self.promote_parked();
        Ok(added)
    }

    /// Adds an edge, parking it when an endpoint is absent. Returns whether
    /// the edge is attached.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        if self.edges.contains_key(&edge.id) {
            return true;
        }
        if self.nodes.contains_key(&edge.source) && self.nodes.contains_key(&edge.target) {
            self.parked.shift_remove(&edge.id);
            self.edges.insert(edge.id.clone(), edge);
            true
        } else {
            self.parked.insert(edge.id.clone(), edge);
            false
        }
    }

    /// All descendants of `id` in insertion order, excluding `id` itself.
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut set = HashSet::new();
        let mut queue: VecDeque<&NodeId> = self.children(id).iter().collect();
        while let Some(next) = queue.pop_front() {
            if set.insert(next.clone()) {
                queue.extend(self.children(next).iter());
            }
        }
        self.nodes
            .keys()
            .filter(|k| set.contains(*k))
            .cloned()
            .collect()
    }

    /// Removes the descendants of `id` and every edge touching them, and
    /// caches them under `id`. Returns the number of detached nodes.
    pub fn detach(&mut self, id: &NodeId) -> Result<usize, ClientError> {
        if !self.nodes.contains_key(id) {
            return Err(ClientError::unknown_node(id));
        }
        let doomed: HashSet<NodeId> = self.descendants(id).into_iter().collect();

        let mut subtree = DetachedSubtree::default();
        self.nodes.retain(|key, node| {
            if doomed.contains(key) {
                subtree.nodes.push(node.clone());
                false
            } else {
                true
            }
        });
        self.edges.retain(|_, edge| {
            if doomed.contains(&edge.source) || doomed.contains(&edge.target) {
                subtree.edges.push(edge.clone());
                false
            } else {
                true
            }
        });
        for node in &doomed {
            self.children.remove(node);
            self.highlighted.remove(node);
        }
        self.children.remove(id);

        let count = subtree.nodes.len();
        self.detached.insert(id.clone(), subtree);
        Ok(count)
    }

    /// Restores the subtree cached under `id`. Returns the restored node ids.
    pub fn reattach(&mut self, id: &NodeId) -> Result<Vec<NodeId>, ClientError> {
        if !self.nodes.contains_key(id) {
            return Err(ClientError::unknown_node(id));
        }
        let subtree = self.detached.remove(id).ok_or_else(|| {
            ClientError::NotFound(format!("no cached subtree for node '{}'", id))
        })?;
        self.merge(subtree.nodes, subtree.edges)
    }

    fn insert_node(&mut self, node: GraphNode) {
        if let Some(parent) = &node.parent {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    fn promote_parked(&mut self) {
        let ready: Vec<EdgeId> = self
            .parked
            .values()
            .filter(|e| self.nodes.contains_key(&e.source) && self.nodes.contains_key(&e.target))
            .map(|e| e.id.clone())
            .collect();
        for id in ready {
            if let Some(edge) = self.parked.shift_remove(&id) {
                self.edges.insert(id, edge);
            }
        }
    }

    // -------------------------------------------------------------------
    // Styling
    // -------------------------------------------------------------------

    /// Marks an attached node as a search match.
    pub fn highlight(&mut self, id: &NodeId) -> bool {
        match self.nodes.get(id) {
            Some(node) => {
                self.highlighted.insert(id.clone(), node.tag());
                true
            }
            None => false,
        }
    }

    pub fn highlight_of(&self, id: &NodeId) -> Highlight {
        if self.highlighted.contains_key(id) {
            Highlight::Match
        } else {
            Highlight::None
        }
    }

    /// Restores default styling for every node of one kind.
    pub fn clear_highlights(&mut self, tag: NodeKindTag) {
        self.highlighted.retain(|_, t| *t != tag);
    }

    pub fn clear_all_highlights(&mut self) {
        self.highlighted.clear();
    }

    pub fn style(&self, id: &NodeId) -> Option<NodeStyle> {
        let node = self.nodes.get(id)?;
        if node.tag() == NodeKindTag::Method
            && node.visibility().is_some_and(Visibility::is_collapsed)
        {
            return Some(NodeStyle::Collapsed);
        }
        Some(match self.highlight_of(id) {
            Highlight::Match => NodeStyle::Match,
            Highlight::None => NodeStyle::Default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::collections::BTreeSet;

    fn loaded() -> GraphStore {
        let base = base_graph();
        let mut store = GraphStore::new();
        store.merge(base.nodes, base.edges).unwrap();
        store
    }

    fn snapshot(store: &GraphStore) -> (BTreeSet<String>, BTreeSet<String>) {
        (
            store.nodes().map(|n| n.id.to_string()).collect(),
            store.edges().map(|e| e.id.to_string()).collect(),
        )
    }

    #[test]
    fn edges_to_absent_statements_are_parked() {
        let store = loaded();
        assert!(store.contains_edge(&EdgeId("10_11".into())));
        assert!(!store.contains_edge(&EdgeId("11_20".into())));
        assert_eq!(store.parked_edge_count(), 1);
    }

    #[test]
    fn parked_edge_is_promoted_when_endpoint_arrives() {
        let mut store = loaded();
        let body = method_body("foo");
        store.merge(body.nodes, body.edges).unwrap();
        assert!(store.contains_edge(&EdgeId("11_20".into())));
        assert!(store.contains_edge(&EdgeId("21_12".into())));
        assert_eq!(store.parked_edge_count(), 0);
    }

    #[test]
    fn orphan_batch_is_rejected_without_mutation() {
        let mut store = GraphStore::new();
        let body = method_body("foo");
        let err = store.merge(body.nodes, body.edges).unwrap_err();
        assert!(matches!(err, ClientError::DataCorruption(_)));
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.parked_edge_count(), 0);
    }

    #[test]
    fn duplicate_nodes_are_not_reinserted() {
        let mut store = loaded();
        let before = store.node_count();
        let base = base_graph();
        let added = store.merge(base.nodes, base.edges).unwrap();
        assert!(added.is_empty());
        assert_eq!(store.node_count(), before);
    }

    #[test]
    fn detach_then_reattach_restores_identical_sets() {
        let mut store = loaded();
        let body = method_body("foo");
        store.merge(body.nodes, body.edges).unwrap();
        let before = snapshot(&store);

        let foo = NodeId::from("foo");
        assert_eq!(store.detach(&foo).unwrap(), 6);
        assert!(!store.contains_node(&NodeId::from("20")));
        assert!(!store.contains_edge(&EdgeId("11_20".into())));
        assert!(store.has_cached_subtree(&foo));

        store.reattach(&foo).unwrap();
        assert_eq!(snapshot(&store), before);
        assert!(!store.has_cached_subtree(&foo));
    }

    #[test]
    fn detach_removes_whole_subtree_including_compounds() {
        let mut store = loaded();
        store.merge(facts_for(11), vec![]).unwrap();
        let main = NodeId::from("main");
        store.detach(&main).unwrap();
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 0);
        assert!(store.children(&main).is_empty());
    }

    #[test]
    fn nested_caches_survive_parent_collapse() {
        let mut store = loaded();
        store.merge(facts_for(11), vec![]).unwrap();
        let compound = NodeId::from("11_flowFacts");
        store.detach(&compound).unwrap();
        let main = NodeId::from("main");
        store.detach(&main).unwrap();
        store.reattach(&main).unwrap();
        assert!(store.contains_node(&compound));
        assert!(!store.contains_node(&NodeId::from("fact-101")));
        store.reattach(&compound).unwrap();
        assert!(store.contains_node(&NodeId::from("fact-101")));
    }

    #[test]
    fn highlights_are_cleared_per_kind() {
        let mut store = loaded();
        store.merge(facts_for(11), vec![]).unwrap();
        let stmt = NodeId::from("10");
        let fact = NodeId::from("fact-101");
        assert!(store.highlight(&stmt));
        assert!(store.highlight(&fact));
        store.clear_highlights(NodeKindTag::Statement);
        assert_eq!(store.highlight_of(&stmt), Highlight::None);
        assert_eq!(store.highlight_of(&fact), Highlight::Match);
        assert_eq!(store.style(&fact), Some(NodeStyle::Match));
    }

    #[test]
    fn collapsed_methods_render_collapsed() {
        let store = loaded();
        assert_eq!(store.style(&NodeId::from("foo")), Some(NodeStyle::Collapsed));
        assert_eq!(store.style(&NodeId::from("main")), Some(NodeStyle::Default));
        assert_eq!(store.style(&NodeId::from("nope")), None);
    }
}
