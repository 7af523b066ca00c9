//! The viewer: a single-owner reducer over the graph store.
//!
//! Every mutation (initial load, collapse, expand, search, navigation) goes
//! through [`Viewer`], which owns the [`GraphStore`] and the [`SearchIndex`]
//! and never talks to the renderer directly. Instead it queues
//! [`ViewEvent`]s that the front end drains after each action.
//!
//! Expanding an unfetched node is split into a synchronous
//! [`Viewer::begin_expand`], the network fetch, and a synchronous
//! [`Viewer::complete_expand`]. Each outstanding fetch holds a ticket with a
//! generation number; collapsing the node, navigating, or resetting the view
//! invalidates the ticket and the late response is dropped.

use std::collections::HashMap;
use std::time::Instant;

use futures::future::join_all;

use esg_core::{
    BaseMethodGraph, GraphEdge, GraphId, GraphNode, MethodId, MethodIndex, MethodSubgraph, NodeId,
    NodeKind, NodeKindTag, StatementId, Visibility,
};

use crate::error::ClientError;
use crate::loader::LazyLoader;
use crate::search::{SearchIndex, SearchTrack};
use crate::store::GraphStore;

/// Notification shown when navigation finds no attached match.
pub const NO_VISIBLE_MATCH: &str = "No search result visible";

/// Instructions for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// Run one layout pass over the current store.
    Relayout,
    /// Center the viewport on a node.
    Focus(NodeId),
    /// Show a message to the user.
    Notify(String),
    /// The displayed base method changed.
    MethodChanged(String),
}

/// What a fetch ticket asks the loader for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequest {
    Method(MethodId),
    DataflowFacts(StatementId),
}

/// An outstanding fetch for one collapsed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandTicket {
    pub node: NodeId,
    pub generation: u64,
    pub request: FetchRequest,
}

/// First half of an expand.
#[derive(Debug)]
pub enum ExpandStep {
    /// Finished without a fetch.
    Done(ExpandOutcome),
    /// The caller must fetch and hand the result to
    /// [`Viewer::complete_expand`].
    Fetch(ExpandTicket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandOutcome {
    AlreadyExpanded,
    /// A cached subtree was restored without a fetch.
    Reattached { nodes: usize },
    /// Content was fetched and merged.
    Fetched { added: Vec<NodeId>, edges: usize },
    /// A fetch for this node is already outstanding; nothing was requested.
    Suppressed,
    /// The response arrived after its ticket was invalidated and was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollapseOutcome {
    /// The subtree was detached and cached.
    Collapsed { nodes: usize },
    /// The node was still waiting on its first fetch; the fetch was abandoned.
    Cancelled,
}

/// Result of a global visibility toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub expanded: usize,
    pub collapsed: usize,
    pub failed: usize,
}

/// Result of a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSummary {
    /// Matches among the loaded nodes.
    pub local_matches: usize,
    /// Methods containing a match anywhere in the stored graph.
    pub methods: MethodIndex,
}

pub struct Viewer<L: LazyLoader> {
    loader: L,
    graph: GraphId,
    store: GraphStore,
    search: SearchIndex,
    /// Node id -> generation of its outstanding fetch.
    in_flight: HashMap<NodeId, u64>,
    next_generation: u64,
    /// Entry subgraph captured at load time.
    entry: BaseMethodGraph,
    displayed_method: String,
    show_all_methods: bool,
    show_all_facts: bool,
    layout_passes: u64,
    events: Vec<ViewEvent>,
}

impl<L: LazyLoader> Viewer<L> {
    /// Loads the entry method of `graph` (`main` unless `method` is given).
    pub async fn open(
        loader: L,
        graph: GraphId,
        method: Option<MethodId>,
    ) -> Result<Self, ClientError> {
        let started = Instant::now();
        let entry = loader.fetch_base_method(&graph, method, false).await?;
        tracing::info!(
            graph = %graph,
            method = %entry.method_name,
            nodes = entry.nodes.len(),
            edges = entry.edges.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded entry method"
        );

        let mut viewer = Viewer {
            loader,
            graph,
            store: GraphStore::new(),
            search: SearchIndex::new(),
            in_flight: HashMap::new(),
            next_generation: 0,
            displayed_method: String::new(),
            entry: BaseMethodGraph::default(),
            show_all_methods: false,
            show_all_facts: false,
            layout_passes: 0,
            events: Vec::new(),
        };
        viewer.replace_with(entry.clone())?;
        viewer.entry = entry;
        viewer.relayout();
        Ok(viewer)
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn search_index(&self) -> &SearchIndex {
        &self.search
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn graph(&self) -> &GraphId {
        &self.graph
    }

    /// Name of the base method currently shown.
    pub fn displayed_method(&self) -> &str {
        &self.displayed_method
    }

    pub fn showing_all_methods(&self) -> bool {
        self.show_all_methods
    }

    pub fn showing_all_facts(&self) -> bool {
        self.show_all_facts
    }

    /// Whether a fetch for `node` is outstanding.
    pub fn is_fetching(&self, node: &NodeId) -> bool {
        self.in_flight.contains_key(node)
    }

    pub fn layout_passes(&self) -> u64 {
        self.layout_passes
    }

    pub fn events(&self) -> &[ViewEvent] {
        &self.events
    }

    /// Takes every queued event.
    pub fn drain_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }

    /// Method id -> name for the method picker.
    pub async fn method_index(&self) -> Result<MethodIndex, ClientError> {
        self.loader.method_index(&self.graph).await
    }

    // -------------------------------------------------------------------
    // Collapse / expand
    // -------------------------------------------------------------------

    /// Collapses an expanded node, caching its subtree.
    ///
    /// Collapsing a node whose first fetch is still outstanding abandons the
    /// fetch instead. Collapsing a method turns the show-all-methods toggle
    /// off, and collapsing a data-flow compound turns the facts toggle off.
    pub fn collapse(&mut self, node: &NodeId) -> Result<CollapseOutcome, ClientError> {
        let outcome = self.collapse_node(node)?;
        match self.store.node(node).map(GraphNode::tag) {
            Some(NodeKindTag::Method) => self.show_all_methods = false,
            Some(NodeKindTag::DataflowCompound) => self.show_all_facts = false,
            _ => {}
        }
        if let CollapseOutcome::Collapsed { .. } = outcome {
            self.relayout();
        }
        Ok(outcome)
    }

    fn collapse_node(&mut self, node: &NodeId) -> Result<CollapseOutcome, ClientError> {
        let visibility = self.collapsible_visibility(node)?;
        match visibility {
            Visibility::Expanded => {
                let nodes = self.store.detach(node)?;
                self.store.set_visibility(node, Visibility::CollapsedCached)?;
                tracing::debug!(node = %node, nodes, "collapsed");
                Ok(CollapseOutcome::Collapsed { nodes })
            }
            Visibility::CollapsedUnfetched if self.in_flight.contains_key(node) => {
                self.in_flight.remove(node);
                tracing::debug!(node = %node, "collapsed while fetching; response will be dropped");
                Ok(CollapseOutcome::Cancelled)
            }
            from => Err(ClientError::InvalidTransition {
                node: node.clone(),
                from,
            }),
        }
    }

    /// First half of an expand: handles the synchronous cases and issues a
    /// ticket when content must be fetched.
    pub fn begin_expand(&mut self, node: &NodeId) -> Result<ExpandStep, ClientError> {
        match self.collapsible_visibility(node)? {
            Visibility::Expanded => Ok(ExpandStep::Done(ExpandOutcome::AlreadyExpanded)),
            Visibility::CollapsedCached => {
                let restored = self.store.reattach(node)?;
                self.store.set_visibility(node, Visibility::Expanded)?;
                self.search.register(&mut self.store, &restored);
                tracing::debug!(node = %node, nodes = restored.len(), "reattached cached subtree");
                Ok(ExpandStep::Done(ExpandOutcome::Reattached {
                    nodes: restored.len(),
                }))
            }
            Visibility::CollapsedUnfetched => {
                if self.in_flight.contains_key(node) {
                    tracing::debug!(node = %node, "duplicate expand suppressed");
                    return Ok(ExpandStep::Done(ExpandOutcome::Suppressed));
                }
                let request = self.fetch_request(node)?;
                self.next_generation += 1;
                let generation = self.next_generation;
                self.in_flight.insert(node.clone(), generation);
                tracing::debug!(graph = %self.graph, node = %node, generation, "fetch requested");
                Ok(ExpandStep::Fetch(ExpandTicket {
                    node: node.clone(),
                    generation,
                    request,
                }))
            }
        }
    }

    /// Runs the fetch a ticket asks for.
    pub async fn fetch(&self, ticket: &ExpandTicket) -> Result<MethodSubgraph, ClientError> {
        fetch_ticket(&self.loader, &self.graph, ticket).await
    }

    /// Second half of an expand: merges a fetch result for `ticket`.
    ///
    /// The node stays `CollapsedUnfetched` until the merge succeeds, so a
    /// failed fetch needs no rollback. A response for an invalidated ticket
    /// is dropped.
    pub fn complete_expand(
        &mut self,
        ticket: ExpandTicket,
        result: Result<MethodSubgraph, ClientError>,
    ) -> Result<ExpandOutcome, ClientError> {
        let outcome = self.finish_expand(ticket, result)?;
        if matches!(outcome, ExpandOutcome::Fetched { .. }) {
            self.relayout();
        }
        Ok(outcome)
    }

    fn finish_expand(
        &mut self,
        ticket: ExpandTicket,
        result: Result<MethodSubgraph, ClientError>,
    ) -> Result<ExpandOutcome, ClientError> {
        if self.in_flight.get(&ticket.node) != Some(&ticket.generation) {
            tracing::warn!(
                node = %ticket.node,
                generation = ticket.generation,
                "dropping stale fetch response"
            );
            return Ok(ExpandOutcome::Stale);
        }
        self.in_flight.remove(&ticket.node);
        if !self.store.contains_node(&ticket.node) {
            tracing::warn!(
                node = %ticket.node,
                generation = ticket.generation,
                "dropping fetch response for a detached node"
            );
            return Ok(ExpandOutcome::Stale);
        }

        let subgraph = match result {
            Ok(subgraph) => subgraph,
            Err(err) => {
                tracing::warn!(node = %ticket.node, error = %err, "fetch failed");
                return Err(err);
            }
        };
        let edges = subgraph.edges.len();
        let added = match self.store.merge(subgraph.nodes, subgraph.edges) {
            Ok(added) => added,
            Err(err) => {
                tracing::warn!(node = %ticket.node, error = %err, "rejected fetched subgraph");
                return Err(err);
            }
        };
        self.store.set_visibility(&ticket.node, Visibility::Expanded)?;
        self.search.register(&mut self.store, &added);
        tracing::info!(
            node = %ticket.node,
            nodes = added.len(),
            edges,
            "merged fetched subgraph"
        );
        Ok(ExpandOutcome::Fetched { added, edges })
    }

    /// Expands one node, fetching its content if needed.
    ///
    /// With the data-flow toggle on, the compounds of a freshly fetched
    /// method body are expanded too.
    pub async fn expand(&mut self, node: &NodeId) -> Result<ExpandOutcome, ClientError> {
        let ticket = match self.begin_expand(node)? {
            ExpandStep::Done(outcome) => {
                if let ExpandOutcome::Reattached { .. } = outcome {
                    self.relayout();
                }
                return Ok(outcome);
            }
            ExpandStep::Fetch(ticket) => ticket,
        };

        let started = Instant::now();
        let result = self.fetch(&ticket).await;
        let outcome = self.finish_expand(ticket, result)?;

        if let ExpandOutcome::Fetched { added, .. } = &outcome {
            tracing::info!(
                node = %node,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "expanded"
            );
            if self.show_all_facts {
                let compounds = self.collapsed_among(added, NodeKindTag::DataflowCompound);
                self.expand_batch(compounds).await;
            }
            self.relayout();
        }
        Ok(outcome)
    }

    /// Turns a global toggle on or off for every node of `kind`.
    ///
    /// On: expands every collapsed node of the kind, with all fetches running
    /// concurrently. Off: collapses every expanded node of the kind (except
    /// the top-level method under the graph wrapper) and resets styling.
    /// Either way exactly one relayout is queued.
    pub async fn set_all_visibility(
        &mut self,
        on: bool,
        kind: NodeKindTag,
    ) -> Result<BatchReport, ClientError> {
        let report = if on {
            let targets: Vec<NodeId> = self
                .store
                .nodes_of(kind)
                .filter(|n| n.visibility().is_some_and(Visibility::is_collapsed))
                .map(|n| n.id.clone())
                .collect();
            self.expand_batch(targets).await
        } else {
            let report = self.collapse_all(kind);
            self.store.clear_all_highlights();
            self.search.restyle(&mut self.store);
            report
        };
        if kind == NodeKindTag::DataflowCompound {
            self.show_all_facts = on;
        }
        self.relayout();
        Ok(report)
    }

    /// Expands `targets` with concurrent fetches. While the facts toggle is
    /// on, data-flow compounds of fetched bodies are expanded in a follow-up
    /// round.
    async fn expand_batch(&mut self, targets: Vec<NodeId>) -> BatchReport {
        let mut report = BatchReport::default();
        let mut pending = targets;
        while !pending.is_empty() {
            let added = self.expand_round(&pending, &mut report).await;
            pending = if self.show_all_facts {
                self.collapsed_among(&added, NodeKindTag::DataflowCompound)
            } else {
                Vec::new()
            };
        }
        report
    }

    /// One round of [`Self::expand_batch`]; returns every node added.
    async fn expand_round(
        &mut self,
        targets: &[NodeId],
        report: &mut BatchReport,
    ) -> Vec<NodeId> {
        let mut tickets = Vec::new();
        for node in targets {
            match self.begin_expand(node) {
                Ok(ExpandStep::Fetch(ticket)) => tickets.push(ticket),
                Ok(ExpandStep::Done(ExpandOutcome::Reattached { .. })) => report.expanded += 1,
                Ok(ExpandStep::Done(_)) => {}
                Err(err) => {
                    tracing::warn!(node = %node, error = %err, "skipping node in batch expand");
                    report.failed += 1;
                }
            }
        }

        let started = Instant::now();
        let results = join_all(
            tickets
                .iter()
                .map(|ticket| fetch_ticket(&self.loader, &self.graph, ticket)),
        )
        .await;

        let mut added = Vec::new();
        let mut last_error = None;
        let mut round_failed = 0;
        for (ticket, result) in tickets.into_iter().zip(results) {
            match self.finish_expand(ticket, result) {
                Ok(ExpandOutcome::Fetched { added: nodes, .. }) => {
                    report.expanded += 1;
                    added.extend(nodes);
                }
                Ok(_) => {}
                Err(err) => {
                    report.failed += 1;
                    round_failed += 1;
                    last_error = Some(err);
                }
            }
        }
        tracing::info!(
            expanded = report.expanded,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch expand round finished"
        );
        if let Some(err) = last_error {
            self.notify(format!("{} node(s) failed to load: {}", round_failed, err));
        }
        added
    }

    fn collapse_all(&mut self, kind: NodeKindTag) -> BatchReport {
        let wrapper = NodeId::graph(&self.graph);
        let targets: Vec<NodeId> = self
            .store
            .nodes_of(kind)
            .filter(|n| n.visibility() == Some(Visibility::Expanded))
            .filter(|n| n.parent.as_ref() != Some(&wrapper))
            .map(|n| n.id.clone())
            .collect();

        let mut report = BatchReport::default();
        // Parents precede children, so a child already detached with its
        // parent is skipped and keeps its own state inside the cache.
        for node in targets {
            if !self.store.contains_node(&node) {
                continue;
            }
            match self.collapse_node(&node) {
                Ok(_) => report.collapsed += 1,
                Err(err) => {
                    tracing::warn!(node = %node, error = %err, "skipping node in batch collapse");
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn collapsible_visibility(&self, node: &NodeId) -> Result<Visibility, ClientError> {
        let n = self
            .store
            .node(node)
            .ok_or_else(|| ClientError::unknown_node(node))?;
        n.visibility()
            .ok_or_else(|| ClientError::NotCollapsible(node.clone()))
    }

    fn fetch_request(&self, node: &NodeId) -> Result<FetchRequest, ClientError> {
        match self.store.node(node).map(|n| &n.kind) {
            Some(NodeKind::Method { method_id, .. }) => Ok(FetchRequest::Method(*method_id)),
            Some(NodeKind::DataflowCompound { statement_id, .. }) => {
                Ok(FetchRequest::DataflowFacts(*statement_id))
            }
            Some(_) => Err(ClientError::NotCollapsible(node.clone())),
            None => Err(ClientError::unknown_node(node)),
        }
    }

    fn collapsed_among(&self, ids: &[NodeId], kind: NodeKindTag) -> Vec<NodeId> {
        ids.iter()
            .filter(|id| {
                self.store.node(id).is_some_and(|n| {
                    n.tag() == kind && n.visibility().is_some_and(Visibility::is_collapsed)
                })
            })
            .cloned()
            .collect()
    }

    // -------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------

    /// Searches `track` locally and on the server.
    ///
    /// An empty query clears the track without asking the server.
    pub async fn search(
        &mut self,
        track: SearchTrack,
        query: &str,
    ) -> Result<SearchSummary, ClientError> {
        if query.is_empty() {
            self.search.reset(track, &mut self.store);
            self.notify("Empty search query".to_string());
            return Ok(SearchSummary::default());
        }

        let local = self.search.begin(track, query, &mut self.store);
        tracing::debug!(track = %track, query, local = local.len(), "local search");
        if local.is_empty() {
            self.notify(format!("No loaded {} match '{}'", track, query));
        }

        let methods = match self.loader.search(&self.graph, track, query).await {
            Ok(methods) => methods,
            Err(err) => {
                tracing::warn!(track = %track, query, error = %err, "server search failed");
                self.notify(format!("Search failed: {}", err));
                MethodIndex::new()
            }
        };
        Ok(SearchSummary {
            local_matches: local.len(),
            methods,
        })
    }

    /// Focuses the next visible match of `track`.
    pub fn focus_next(&mut self, track: SearchTrack) -> Option<NodeId> {
        let found = self.search.next(track, &self.store);
        self.focus(found)
    }

    /// Focuses the previous visible match of `track`.
    pub fn focus_previous(&mut self, track: SearchTrack) -> Option<NodeId> {
        let found = self.search.previous(track, &self.store);
        self.focus(found)
    }

    fn focus(&mut self, found: Option<NodeId>) -> Option<NodeId> {
        match &found {
            Some(node) => self.events.push(ViewEvent::Focus(node.clone())),
            None => self.notify(NO_VISIBLE_MATCH.to_string()),
        }
        found
    }

    pub fn reset_search(&mut self, track: SearchTrack) {
        self.search.reset(track, &mut self.store);
    }

    // -------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------

    /// Replaces the view with the base subgraph of another method.
    pub async fn open_method(&mut self, method: MethodId) -> Result<(), ClientError> {
        let base = self
            .loader
            .fetch_base_method(&self.graph, Some(method), false)
            .await?;
        self.show_all_methods = false;
        self.replace_with(base)?;
        self.expand_facts_if_shown().await;
        self.relayout();
        Ok(())
    }

    /// Restores the entry method captured at load time.
    pub async fn back_to_root(&mut self) -> Result<(), ClientError> {
        self.show_all_methods = false;
        self.replace_with(self.entry.clone())?;
        self.expand_facts_if_shown().await;
        self.relayout();
        Ok(())
    }

    /// Shows every method body at once, or returns to the entry method.
    ///
    /// Turning it on switches the data-flow toggle off.
    pub async fn show_all_methods(&mut self, on: bool) -> Result<(), ClientError> {
        if !on {
            return self.back_to_root().await;
        }
        let started = Instant::now();
        let all = self.loader.fetch_all_methods(&self.graph).await?;
        tracing::info!(
            nodes = all.nodes.len(),
            edges = all.edges.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded all methods"
        );
        self.show_all_facts = false;
        self.show_all_methods = true;
        self.replace_store(all.nodes, all.edges)?;
        self.relayout();
        Ok(())
    }

    /// Shows or hides every data-flow fact of the loaded methods.
    pub async fn show_all_facts(&mut self, on: bool) -> Result<BatchReport, ClientError> {
        self.set_all_visibility(on, NodeKindTag::DataflowCompound)
            .await
    }

    async fn expand_facts_if_shown(&mut self) {
        if self.show_all_facts {
            let compounds: Vec<NodeId> = self
                .store
                .nodes_of(NodeKindTag::DataflowCompound)
                .map(|n| n.id.clone())
                .collect();
            self.expand_batch(compounds).await;
        }
    }

    fn replace_with(&mut self, base: BaseMethodGraph) -> Result<(), ClientError> {
        self.replace_store(base.nodes, base.edges)?;
        self.displayed_method = base.method_name.clone();
        self.events.push(ViewEvent::MethodChanged(base.method_name));
        Ok(())
    }

    /// Swaps the whole store for new content. Outstanding fetches become
    /// stale and active searches are re-run over the new nodes.
    fn replace_store(
        &mut self,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> Result<(), ClientError> {
        let mut fresh = GraphStore::new();
        fresh.merge(nodes, edges)?;
        self.store = fresh;
        self.in_flight.clear();
        self.search.rescan(&mut self.store);
        Ok(())
    }

    fn notify(&mut self, message: String) {
        tracing::info!(message = %message, "notify");
        self.events.push(ViewEvent::Notify(message));
    }

    fn relayout(&mut self) {
        self.layout_passes += 1;
        tracing::debug!(pass = self.layout_passes, nodes = self.store.node_count(), "layout requested");
        self.events.push(ViewEvent::Relayout);
    }
}

async fn fetch_ticket<L: LazyLoader + ?Sized>(
    loader: &L,
    graph: &GraphId,
    ticket: &ExpandTicket,
) -> Result<MethodSubgraph, ClientError> {
    tracing::debug!(graph = %graph, node = %ticket.node, "fetch started");
    match ticket.request {
        FetchRequest::Method(method) => loader.fetch_method(graph, method).await,
        FetchRequest::DataflowFacts(statement) => loader
            .fetch_dataflow_facts(graph, statement)
            .await
            .map(|nodes| MethodSubgraph {
                nodes,
                edges: Vec::new(),
            }),
    }
}
