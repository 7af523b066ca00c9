//! Cyclic traversal over search matches.
//!
//! The ring is an index-based buffer: entries live in a `Vec` and the cursor
//! is an index into it, so stepping in either direction is O(1) and there are
//! no back/forward references to keep alive.

use std::collections::HashSet;

use esg_core::NodeId;

/// Wrap-around cursor over an ordered set of matched nodes.
///
/// The cursor starts before the first entry: the first `next()` yields the
/// head, the first `previous()` yields the tail.
#[derive(Debug, Clone, Default)]
pub struct RingNavigator {
    entries: Vec<NodeId>,
    members: HashSet<NodeId>,
    cursor: Option<usize>,
}

impl RingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `node` unless it is already part of the ring.
    pub fn insert(&mut self, node: NodeId) -> bool {
        if !self.members.insert(node.clone()) {
            return false;
        }
        self.entries.push(node);
        true
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.members.contains(node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.members.clear();
        self.cursor = None;
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[NodeId] {
        &self.entries
    }

    /// The entry under the cursor, if the ring has been stepped.
    pub fn current(&self) -> Option<&NodeId> {
        self.cursor.and_then(|i| self.entries.get(i))
    }

    pub fn next(&mut self) -> Option<&NodeId> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }
        let i = match self.cursor {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        self.cursor = Some(i);
        self.entries.get(i)
    }

    pub fn previous(&mut self) -> Option<&NodeId> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }
        let i = match self.cursor {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.cursor = Some(i);
        self.entries.get(i)
    }

    /// Steps forward to the next entry accepted by `is_visible`.
    ///
    /// Gives up after one full revolution and returns `None`, leaving the
    /// cursor where it was.
    pub fn next_visible(&mut self, is_visible: impl Fn(&NodeId) -> bool) -> Option<NodeId> {
        self.step_visible(is_visible, true)
    }

    /// Steps backward to the previous entry accepted by `is_visible`.
    pub fn previous_visible(&mut self, is_visible: impl Fn(&NodeId) -> bool) -> Option<NodeId> {
        self.step_visible(is_visible, false)
    }

    fn step_visible(
        &mut self,
        is_visible: impl Fn(&NodeId) -> bool,
        forward: bool,
    ) -> Option<NodeId> {
        let start = self.cursor;
        for _ in 0..self.entries.len() {
            let candidate = if forward { self.next() } else { self.previous() };
            match candidate {
                Some(node) if is_visible(node) => return Some(node.clone()),
                Some(_) => {}
                None => break,
            }
        }
        self.cursor = start;
        None
    }
}
