//! Two-track search over the currently loaded nodes.
//!
//! Each track (instruction text, data-flow fact text) owns its query, its
//! match set, and a [`RingNavigator`] over the matches. Tracks never touch
//! each other's nodes or styling.

use std::collections::HashSet;
use std::fmt;

use esg_core::{GraphNode, NodeId, NodeKindTag};

use crate::ring::RingNavigator;
use crate::store::GraphStore;

/// Which node kind a search runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchTrack {
    /// Statement (instruction) text.
    Instruction,
    /// Data-flow fact text.
    DataflowFact,
}

impl SearchTrack {
    pub const ALL: [SearchTrack; 2] = [SearchTrack::Instruction, SearchTrack::DataflowFact];

    /// Node kind whose display name the track matches against.
    pub fn node_kind(self) -> NodeKindTag {
        match self {
            SearchTrack::Instruction => NodeKindTag::Statement,
            SearchTrack::DataflowFact => NodeKindTag::DataflowFact,
        }
    }

    /// Path segment of the server-side search endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchTrack::Instruction => "instructions",
            SearchTrack::DataflowFact => "facts",
        }
    }
}

impl fmt::Display for SearchTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct TrackState {
    query: Option<String>,
    matches: HashSet<NodeId>,
    ring: RingNavigator,
}

impl TrackState {
    fn clear(&mut self) {
        self.query = None;
        self.matches.clear();
        self.ring.clear();
    }
}

#[derive(Debug, Default)]
pub struct SearchIndex {
    instruction: TrackState,
    dataflow: TrackState,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, track: SearchTrack) -> &TrackState {
        match track {
            SearchTrack::Instruction => &self.instruction,
            SearchTrack::DataflowFact => &self.dataflow,
        }
    }

    fn track_mut(&mut self, track: SearchTrack) -> &mut TrackState {
        match track {
            SearchTrack::Instruction => &mut self.instruction,
            SearchTrack::DataflowFact => &mut self.dataflow,
        }
    }

    /// The active query of a track, if any.
    pub fn query(&self, track: SearchTrack) -> Option<&str> {
        self.track(track).query.as_deref()
    }

    pub fn matches(&self, track: SearchTrack) -> &HashSet<NodeId> {
        &self.track(track).matches
    }

    pub fn ring(&self, track: SearchTrack) -> &RingNavigator {
        &self.track(track).ring
    }

    /// Starts a new search on `track`: discards the previous one, then scans
    /// every attached node of the track's kind. Returns the local matches in
    /// the order encountered.
    pub fn begin(&mut self, track: SearchTrack, query: &str, store: &mut GraphStore) -> Vec<NodeId> {
        self.reset(track, store);
        self.track_mut(track).query = Some(query.to_string());
        let candidates: Vec<NodeId> = store.nodes_of(track.node_kind()).map(|n| n.id.clone()).collect();
        self.register_track(track, store, &candidates)
    }

    /// Offers freshly attached nodes to every track with an active query.
    /// Returns the number of new matches.
    pub fn register(&mut self, store: &mut GraphStore, nodes: &[NodeId]) -> usize {
        SearchTrack::ALL
            .iter()
            .map(|track| self.register_track(*track, store, nodes).len())
            .sum()
    }

    fn register_track(
        &mut self,
        track: SearchTrack,
        store: &mut GraphStore,
        nodes: &[NodeId],
    ) -> Vec<NodeId> {
        let state = self.track_mut(track);
        let Some(query) = state.query.as_deref() else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for id in nodes {
            let matched = store
                .node(id)
                .is_some_and(|node| is_match(node, track, query));
            if !matched {
                continue;
            }
            // A node is in the ring at most once; reattached matches only
            // need their highlight back.
            if state.matches.insert(id.clone()) {
                state.ring.insert(id.clone());
                found.push(id.clone());
            }
            store.highlight(id);
        }
        found
    }

    /// Re-applies highlights for every attached match of every track.
    pub fn restyle(&self, store: &mut GraphStore) {
        for track in SearchTrack::ALL {
            for id in self.track(track).ring.entries() {
                store.highlight(id);
            }
        }
    }

    /// Rebuilds every active track against the current store contents,
    /// keeping the queries. Used after the store is replaced wholesale.
    pub fn rescan(&mut self, store: &mut GraphStore) {
        for track in SearchTrack::ALL {
            if let Some(query) = self.query(track).map(str::to_string) {
                self.begin(track, &query, store);
            }
        }
    }

    /// Clears one track and restores default styling for its node kind.
    pub fn reset(&mut self, track: SearchTrack, store: &mut GraphStore) {
        store.clear_highlights(track.node_kind());
        self.track_mut(track).clear();
    }

    /// Next visible match of `track`; `None` when no match is attached.
    pub fn next(&mut self, track: SearchTrack, store: &GraphStore) -> Option<NodeId> {
        self.track_mut(track)
            .ring
            .next_visible(|id| store.contains_node(id))
    }

    pub fn previous(&mut self, track: SearchTrack, store: &GraphStore) -> Option<NodeId> {
        self.track_mut(track)
            .ring
            .previous_visible(|id| store.contains_node(id))
    }
}

fn is_match(node: &GraphNode, track: SearchTrack, query: &str) -> bool {
    node.tag() == track.node_kind() && node.name.contains(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Highlight;
    use crate::testing::*;

    fn loaded() -> GraphStore {
        let base = base_graph();
        let mut store = GraphStore::new();
        store.merge(base.nodes, base.edges).unwrap();
        store.merge(facts_for(10), vec![]).unwrap();
        store.merge(facts_for(11), vec![]).unwrap();
        store
    }

    #[test]
    fn local_scan_matches_only_the_track_kind() {
        let mut store = loaded();
        let mut index = SearchIndex::new();
        let found = index.begin(SearchTrack::Instruction, "%x", &mut store);
        assert_eq!(
            found.iter().map(NodeId::as_str).collect::<Vec<_>>(),
            vec!["10", "11"]
        );
        // fact-101 mentions %x too, but lives on the other track.
        assert_eq!(store.highlight_of(&NodeId::from("fact-101")), Highlight::None);
    }

    #[test]
    fn new_search_discards_previous_ring() {
        let mut store = loaded();
        let mut index = SearchIndex::new();
        index.begin(SearchTrack::Instruction, "%x", &mut store);
        index.begin(SearchTrack::Instruction, "ret", &mut store);
        assert_eq!(index.ring(SearchTrack::Instruction).len(), 1);
        assert_eq!(store.highlight_of(&NodeId::from("10")), Highlight::None);
        assert_eq!(store.highlight_of(&NodeId::from("12")), Highlight::Match);
    }

    #[test]
    fn reset_leaves_other_track_alone() {
        let mut store = loaded();
        let mut index = SearchIndex::new();
        index.begin(SearchTrack::Instruction, "%x", &mut store);
        index.begin(SearchTrack::DataflowFact, "zero", &mut store);
        index.reset(SearchTrack::Instruction, &mut store);

        assert!(index.query(SearchTrack::Instruction).is_none());
        assert!(index.ring(SearchTrack::Instruction).is_empty());
        assert_eq!(index.ring(SearchTrack::DataflowFact).len(), 2);
        assert_eq!(store.highlight_of(&NodeId::from("fact-100")), Highlight::Match);
        assert_eq!(store.highlight_of(&NodeId::from("11")), Highlight::None);
    }

    #[test]
    fn registration_deduplicates() {
        let mut store = loaded();
        let mut index = SearchIndex::new();
        index.begin(SearchTrack::Instruction, "%x", &mut store);
        let again = index.register(&mut store, &[NodeId::from("10"), NodeId::from("11")]);
        assert_eq!(again, 0);
        assert_eq!(index.ring(SearchTrack::Instruction).len(), 2);
    }

    #[test]
    fn navigation_skips_detached_matches() {
        let mut store = loaded();
        let mut index = SearchIndex::new();
        index.begin(SearchTrack::DataflowFact, "zero", &mut store);
        store.detach(&NodeId::from("10_flowFacts")).unwrap();

        let track = SearchTrack::DataflowFact;
        assert_eq!(index.next(track, &store).unwrap().as_str(), "fact-102");
        assert_eq!(index.next(track, &store).unwrap().as_str(), "fact-102");
        // Still part of the ring, just not reachable.
        assert!(index.ring(track).contains(&NodeId::from("fact-100")));

        store.detach(&NodeId::from("11_flowFacts")).unwrap();
        assert!(index.next(track, &store).is_none());
    }

    #[test]
    fn no_active_query_registers_nothing() {
        let mut store = loaded();
        let mut index = SearchIndex::new();
        assert_eq!(index.register(&mut store, &[NodeId::from("10")]), 0);
    }
}
