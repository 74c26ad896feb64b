//! The persistence collaborator.
//!
//! [`JanusBackend`] is the seam between the synchronous core and whatever
//! stores action logs, configurations and version blobs. Implementations
//! live in `janus-client` (HTTP and in-memory).
//!
//! History queries span every path the notebook has had. The loaders below
//! issue one request per [`PathEntry`] concurrently and merge only after all
//! of them resolve, so a render never sees a partial timeline.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;

use janus_types::{
    CellContent, CellId, Comment, NotebookConfiguration, PathEntry, PathHash, PostBody,
    PostResponse, Version, VersionId,
};

use crate::error::Result;

/// Storage and retrieval of Janus history.
#[async_trait]
pub trait JanusBackend: Send + Sync {
    /// Record an action, log event or comment.
    async fn post(&self, notebook_path: &str, body: &PostBody) -> Result<PostResponse>;

    /// Raw configuration rows for one path between `start` and `end` (millis).
    async fn configs(
        &self,
        notebook_path: &str,
        path: &PathHash,
        start: u64,
        end: u64,
    ) -> Result<Vec<Value>>;

    /// Content of the requested versions. Unknown ids are absent.
    async fn versions(
        &self,
        notebook_path: &str,
        ids: &[VersionId],
    ) -> Result<BTreeMap<VersionId, CellContent>>;

    /// Every recorded version of one cell under one path.
    async fn cell_history(
        &self,
        notebook_path: &str,
        cell_id: &CellId,
        path: &PathHash,
        start: u64,
        end: u64,
    ) -> Result<Vec<Version>>;

    async fn comments(&self, notebook_path: &str) -> Result<Vec<Comment>>;
}

/// Fetch and merge the configuration timeline across all historical paths.
///
/// Rows are concatenated in `filepaths` order and then ordered by timestamp.
/// A failed page or a malformed row is skipped with a warning.
pub async fn load_timeline(
    backend: &dyn JanusBackend,
    notebook_path: &str,
    filepaths: &[PathEntry],
) -> Vec<NotebookConfiguration> {
    let pages = join_all(filepaths.iter().map(|entry| {
        backend.configs(notebook_path, &entry.hash, entry.first_seen, entry.last_seen)
    }))
    .await;

    let mut merged = Vec::new();
    for (entry, page) in filepaths.iter().zip(pages) {
        let rows = match page {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(path = %entry.hash, error = %e, "configuration page unavailable");
                continue;
            }
        };
        for row in &rows {
            match NotebookConfiguration::from_row(row) {
                Ok(config) => merged.push(config),
                Err(e) => tracing::warn!(path = %entry.hash, error = %e, "skipping malformed configuration"),
            }
        }
    }
    merged.sort_by_key(|c| c.timestamp);
    tracing::debug!(paths = filepaths.len(), revisions = merged.len(), "timeline loaded");
    merged
}

/// Fetch one cell's history across all historical paths.
///
/// Results are unioned, deduplicated by version id and ordered by timestamp.
pub async fn load_cell_history(
    backend: &dyn JanusBackend,
    notebook_path: &str,
    cell_id: &CellId,
    filepaths: &[PathEntry],
) -> Vec<Version> {
    let pages = join_all(filepaths.iter().map(|entry| {
        backend.cell_history(
            notebook_path,
            cell_id,
            &entry.hash,
            entry.first_seen,
            entry.last_seen,
        )
    }))
    .await;

    let mut merged: Vec<Version> = Vec::new();
    for (entry, page) in filepaths.iter().zip(pages) {
        match page {
            Ok(versions) => {
                for v in versions {
                    if v.version_id.is_draft()
                        || !merged.iter().any(|m| m.version_id == v.version_id)
                    {
                        merged.push(v);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(cell = %cell_id, path = %entry.hash, error = %e, "cell history unavailable")
            }
        }
    }
    merged.sort_by_key(|v| v.timestamp);
    merged
}

// ============================================================================
// Tests
// ============================================================================
