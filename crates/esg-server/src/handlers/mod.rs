//! HTTP handler functions, grouped by resource.
//!
//! Handlers extract path/query/body parameters, lock the shared service, and
//! delegate. No reconstruction logic lives here.

pub mod graphs;
pub mod methods;
pub mod search;
