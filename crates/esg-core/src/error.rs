//! Core error types for esg-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! view-model invariants enforced in this crate.

use crate::id::NodeId;
use crate::node::Visibility;
use thiserror::Error;

/// Core errors produced by the esg-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A visibility change outside the legal state cycle.
    #[error("invalid visibility transition for node '{node}': {from:?} -> {to:?}")]
    InvalidTransition {
        node: NodeId,
        from: Visibility,
        to: Visibility,
    },

    /// Visibility was requested on a node kind that cannot collapse.
    #[error("node '{node}' is not collapsible")]
    NotCollapsible { node: NodeId },
}
