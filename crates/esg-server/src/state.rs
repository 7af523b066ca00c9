//! Application state with a shared `SupergraphService`.
//!
//! Uses `tokio::sync::Mutex` so handlers await the lock without blocking the
//! runtime. `rusqlite::Connection` is `!Sync`, which rules out an `RwLock`.

use std::sync::Arc;

use crate::error::ApiError;
use crate::service::SupergraphService;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<tokio::sync::Mutex<SupergraphService>>,
}

impl AppState {
    /// Creates an `AppState` backed by the SQLite database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self, ApiError> {
        Ok(Self::from_service(SupergraphService::new(db_path)?))
    }

    /// Creates an `AppState` over a throwaway database (for testing).
    pub fn in_memory() -> Result<Self, ApiError> {
        Ok(Self::from_service(SupergraphService::in_memory()?))
    }

    fn from_service(service: SupergraphService) -> Self {
        AppState {
            service: Arc::new(tokio::sync::Mutex::new(service)),
        }
    }
}
