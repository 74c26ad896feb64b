//! HTTP client for the persistence server.
//!
//! ```text
//! POST <server>/api/janus/<nb>                    PostBody
//! GET  <server>/api/janus/<nb>?q=config           path, start, end
//! GET  <server>/api/janus/<nb>?q=versions         version_ids (JSON array string)
//! GET  <server>/api/janus/<nb>?q=cell_history     cell_id, path, start, end
//! GET  <server>/api/janus/<nb>?q=comment
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use janus_core::JanusBackend;
use janus_types::{
    CellContent, CellHistoryResponse, CellId, Comment, CommentsResponse, ConfigsResponse, PathHash,
    PostBody, PostResponse, Version, VersionId, VersionsResponse,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// [`JanusBackend`] over the server's REST routes.
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn get<T: DeserializeOwned>(
        &self,
        notebook_path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.config.endpoint(notebook_path);
        tracing::debug!(url = %url, q = ?query.first(), "GET");
        let response = self.client.get(&url).query(query).send().await?;
        decode(response).await
    }

    pub async fn post_body(&self, notebook_path: &str, body: &PostBody) -> Result<PostResponse> {
        let url = self.config.endpoint(notebook_path);
        tracing::debug!(url = %url, kind = ?body.kind, name = ?body.name, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn window(path: &PathHash, start: u64, end: u64) -> [(&'static str, String); 3] {
    [
        ("path", path.to_string()),
        ("start", start.to_string()),
        ("end", end.to_string()),
    ]
}

#[async_trait]
impl JanusBackend for HttpBackend {
    async fn post(&self, notebook_path: &str, body: &PostBody) -> janus_core::Result<PostResponse> {
        Ok(self.post_body(notebook_path, body).await?)
    }

    async fn configs(
        &self,
        notebook_path: &str,
        path: &PathHash,
        start: u64,
        end: u64,
    ) -> janus_core::Result<Vec<Value>> {
        let mut query = vec![("q", "config".to_string())];
        query.extend(window(path, start, end));
        let resp: ConfigsResponse = self.get(notebook_path, &query).await?;
        Ok(resp.nb_configs)
    }

    async fn versions(
        &self,
        notebook_path: &str,
        ids: &[VersionId],
    ) -> janus_core::Result<BTreeMap<VersionId, CellContent>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let encoded = serde_json::to_string(ids)?;
        let query = [("q", "versions".to_string()), ("version_ids", encoded)];
        let resp: VersionsResponse = self.get(notebook_path, &query).await?;
        Ok(resp.cells)
    }

    async fn cell_history(
        &self,
        notebook_path: &str,
        cell_id: &CellId,
        path: &PathHash,
        start: u64,
        end: u64,
    ) -> janus_core::Result<Vec<Version>> {
        let mut query = vec![
            ("q", "cell_history".to_string()),
            ("cell_id", cell_id.to_string()),
        ];
        query.extend(window(path, start, end));
        let resp: CellHistoryResponse = self.get(notebook_path, &query).await?;
        Ok(resp.versions)
    }

    async fn comments(&self, notebook_path: &str) -> janus_core::Result<Vec<Comment>> {
        let query = [("q", "comment".to_string())];
        let resp: CommentsResponse = self.get(notebook_path, &query).await?;
        Ok(resp.comments)
    }
}

// ============================================================================
// Tests
// ============================================================================
