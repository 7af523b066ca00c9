//! Shared data model for the exploded supergraph viewer.
//!
//! Holds the persisted record shapes produced by the analysis ingestion step,
//! the typed identifiers that tie them together, and the view-layer node and
//! edge types that the server emits and the client engine mutates.

pub mod edge;
pub mod error;
pub mod id;
pub mod node;
pub mod payload;
pub mod record;

// Re-export commonly used types
pub use edge::GraphEdge;
pub use error::CoreError;
pub use id::{EdgeId, FactId, GraphId, MethodId, NodeId, StatementId};
pub use node::{GraphNode, NodeKind, NodeKindTag, Visibility};
pub use payload::{BaseMethodGraph, GraphSummary, MethodIndex, MethodSubgraph};
pub use record::{DataflowFactRecord, GraphRecord, MethodRecord, StatementKind, StatementRecord};
