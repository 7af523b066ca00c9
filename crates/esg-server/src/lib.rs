//! HTTP/JSON API serving exploded supergraphs one method at a time.
//!
//! Wraps the record store and reconstruction from `esg-storage` behind an
//! axum router. Each endpoint returns one materialized slice of the graph
//! (a base method, a method body, a statement's facts) or a search result.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod service;
pub mod state;
