//! Client engine for browsing an exploded supergraph.
//!
//! Holds the materialized part of the graph and drives it lazily: collapsed
//! method and data-flow nodes are fetched on first expand, cached on
//! collapse, and restored from the cache afterwards. Search runs locally over
//! the loaded nodes and remotely over the whole stored graph.
//!
//! # Modules
//!
//! - [`store`]: GraphStore, the attached nodes/edges plus detached subtrees
//! - [`ring`]: RingNavigator, wrap-around stepping over search matches
//! - [`search`]: SearchIndex with one track per searchable node kind
//! - [`loader`]: LazyLoader trait and the reqwest-backed HttpLoader
//! - [`viewer`]: Viewer, the reducer that owns all of the above
//! - [`config`]: ClientConfig
//! - [`error`]: ClientError

pub mod config;
pub mod error;
pub mod loader;
pub mod ring;
pub mod search;
pub mod store;
pub mod viewer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use error::ClientError;
pub use loader::{HttpLoader, LazyLoader};
pub use ring::RingNavigator;
pub use search::{SearchIndex, SearchTrack};
pub use store::{GraphStore, Highlight, NodeStyle};
pub use viewer::{
    BatchReport, CollapseOutcome, ExpandOutcome, ExpandStep, ExpandTicket, SearchSummary,
    ViewEvent, Viewer,
};
