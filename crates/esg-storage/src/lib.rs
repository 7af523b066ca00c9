//! Record storage and graph reconstruction for exploded supergraphs.
//!
//! Provides the [`RecordStore`] trait defining the read contract over the
//! flat Method/Statement/DataflowFact records, the [`SqliteStore`] and
//! [`InMemoryStore`] backends, and the [`reconstruct`] module that turns
//! those records into the hierarchical node/edge payload for one method.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: RecordStore trait definition
//! - [`ingest`]: AnalysisBundle, the document written by the ingestion step
//! - [`reconstruct`]: record -> view-graph reconstruction
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL schema migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod ingest;
pub mod memory;
pub mod reconstruct;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use ingest::AnalysisBundle;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::RecordStore;
