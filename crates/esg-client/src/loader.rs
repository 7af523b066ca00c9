//! Fetching of lazily loaded subgraphs.
//!
//! [`LazyLoader`] is the seam between the viewer and the server. Loaders only
//! return data; merging it into the [`crate::store::GraphStore`] is the
//! viewer's job. Nothing here retries.

use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use esg_core::{
    BaseMethodGraph, GraphId, GraphNode, GraphSummary, MethodId, MethodIndex, MethodSubgraph,
    StatementId,
};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::search::SearchTrack;

/// Source of graph content for the viewer.
#[async_trait]
pub trait LazyLoader: Send + Sync {
    async fn list_graphs(&self) -> Result<Vec<GraphSummary>, ClientError>;

    /// Entry subgraph for `method`, or for `main` when `None`.
    async fn fetch_base_method(
        &self,
        graph: &GraphId,
        method: Option<MethodId>,
        include_all_callees: bool,
    ) -> Result<BaseMethodGraph, ClientError>;

    /// Body of one method, to be parented under its method node.
    async fn fetch_method(
        &self,
        graph: &GraphId,
        method: MethodId,
    ) -> Result<MethodSubgraph, ClientError>;

    /// Fact nodes of one statement, to be parented under its data-flow
    /// compound.
    async fn fetch_dataflow_facts(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<Vec<GraphNode>, ClientError>;

    /// Server-side search over the full persisted corpus.
    async fn search(
        &self,
        graph: &GraphId,
        track: SearchTrack,
        query: &str,
    ) -> Result<MethodIndex, ClientError>;

    async fn method_index(&self, graph: &GraphId) -> Result<MethodIndex, ClientError>;

    /// Every method body of the graph at once.
    async fn fetch_all_methods(&self, graph: &GraphId) -> Result<MethodSubgraph, ClientError>;
}

/// Error envelope written by the server.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// [`LazyLoader`] speaking to the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpLoader {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(HttpLoader { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = self.config.endpoint(path);
        let started = Instant::now();
        tracing::debug!(url = %url, "fetch started");

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = classify_failure(status, &body);
            tracing::warn!(url = %url, status = status.as_u16(), error = %err, "fetch failed");
            return Err(err);
        }

        let parsed = serde_json::from_str(&body).map_err(|err| {
            ClientError::UpstreamUnavailable(format!("malformed response from {}: {}", url, err))
        })?;
        tracing::debug!(
            url = %url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch completed"
        );
        Ok(parsed)
    }
}

/// Maps a non-success response onto the client taxonomy.
fn classify_failure(status: reqwest::StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error)
        .unwrap_or_else(|_| ErrorBody {
            code: String::new(),
            message: format!("server responded {}", status),
        });
    match (status.as_u16(), message.code.as_str()) {
        (404, _) | (_, "NOT_FOUND") => ClientError::NotFound(message.message),
        (422, _) | (_, "DATA_CORRUPTION") => ClientError::DataCorruption(message.message),
        _ => ClientError::UpstreamUnavailable(message.message),
    }
}

#[async_trait]
impl LazyLoader for HttpLoader {
    async fn list_graphs(&self) -> Result<Vec<GraphSummary>, ClientError> {
        self.get("/graphs", &[]).await
    }

    async fn fetch_base_method(
        &self,
        graph: &GraphId,
        method: Option<MethodId>,
        include_all_callees: bool,
    ) -> Result<BaseMethodGraph, ClientError> {
        let mut query = vec![("all_callees", include_all_callees.to_string())];
        if let Some(method) = method {
            query.push(("method_id", method.to_string()));
        }
        self.get(&format!("/graphs/{}/base", graph), &query).await
    }

    async fn fetch_method(
        &self,
        graph: &GraphId,
        method: MethodId,
    ) -> Result<MethodSubgraph, ClientError> {
        self.get(&format!("/graphs/{}/methods/{}", graph, method), &[])
            .await
    }

    async fn fetch_dataflow_facts(
        &self,
        graph: &GraphId,
        statement: StatementId,
    ) -> Result<Vec<GraphNode>, ClientError> {
        self.get(&format!("/graphs/{}/statements/{}/facts", graph, statement), &[])
            .await
    }

    async fn search(
        &self,
        graph: &GraphId,
        track: SearchTrack,
        query: &str,
    ) -> Result<MethodIndex, ClientError> {
        self.get(
            &format!("/graphs/{}/search/{}", graph, track.as_str()),
            &[("q", query.to_string())],
        )
        .await
    }

    async fn method_index(&self, graph: &GraphId) -> Result<MethodIndex, ClientError> {
        self.get(&format!("/graphs/{}/methods", graph), &[]).await
    }

    async fn fetch_all_methods(&self, graph: &GraphId) -> Result<MethodSubgraph, ClientError> {
        self.get(&format!("/graphs/{}/all", graph), &[]).await
    }
}
