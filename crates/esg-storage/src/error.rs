//! Storage error types for esg-storage.
//!
//! [`StorageError`] covers missing records (graph, method, statement),
//! corrupted stored data, backend failures, and rejected ingestion bundles.

use esg_core::{GraphId, MethodId, StatementId};
use thiserror::Error;

/// Errors produced by storage and reconstruction operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization failed while writing records.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A graph with the given ID was not found.
    #[error("graph not found: {0}")]
    GraphNotFound(GraphId),

    /// A method was not found in the given graph.
    #[error("method not found: graph={graph}, method={method}")]
    MethodNotFound { graph: GraphId, method: String },

    /// A statement was not found in the given graph.
    #[error("statement not found: graph={graph}, statement={statement}")]
    StatementNotFound {
        graph: GraphId,
        statement: StatementId,
    },

    /// A stored record is malformed or references a record that does not
    /// exist.
    #[error("data corruption: {reason}")]
    DataCorruption { reason: String },

    /// An ingestion bundle was rejected before anything was written.
    #[error("invalid bundle: {reason}")]
    InvalidBundle { reason: String },
}

impl StorageError {
    pub fn method_not_found(graph: &GraphId, method: MethodId) -> Self {
        StorageError::MethodNotFound {
            graph: graph.clone(),
            method: method.to_string(),
        }
    }

    pub fn corruption(reason: impl Into<String>) -> Self {
        StorageError::DataCorruption {
            reason: reason.into(),
        }
    }

    /// Returns `true` for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::GraphNotFound(_)
                | StorageError::MethodNotFound { .. }
                | StorageError::StatementNotFound { .. }
        )
    }
}
