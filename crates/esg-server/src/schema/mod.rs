//! Request and response types for the HTTP API.
//!
//! Reconstruction payloads (`BaseMethodGraph`, `MethodSubgraph`, fact nodes,
//! method indexes) are served as the `esg-core` types directly; this module
//! only holds the shapes specific to the HTTP surface.

pub mod graphs;
pub mod queries;
