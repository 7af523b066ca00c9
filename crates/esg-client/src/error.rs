//! Client-side error types.
//!
//! A redundant expand trigger is not an error; it is reported as
//! [`crate::viewer::ExpandOutcome::Suppressed`].

use esg_core::{CoreError, NodeId, Visibility};
use thiserror::Error;

/// Errors surfaced by the loader and the viewer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The referenced graph, method, statement, or node does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport failure or an unexpected server response.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The server reported inconsistent stored records, or a payload broke
    /// the parent-before-child contract.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A collapse or expand was requested from a state that does not allow it.
    #[error("invalid transition for node '{node}' from {from:?}")]
    InvalidTransition { node: NodeId, from: Visibility },

    /// The node kind has no visibility state.
    #[error("node '{0}' is not collapsible")]
    NotCollapsible(NodeId),
}

impl ClientError {
    pub fn unknown_node(node: &NodeId) -> Self {
        ClientError::NotFound(format!("node '{}'", node))
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { node, from, .. } => {
                ClientError::InvalidTransition { node, from }
            }
            CoreError::NotCollapsible { node } => ClientError::NotCollapsible(node),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::UpstreamUnavailable(err.to_string())
    }
}
