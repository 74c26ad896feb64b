//! Background reporter for session posts.
//!
//! Editing never waits on the network. The session queues [`PostBody`]s in
//! its outbox, the host hands them to a [`ReporterHandle`], and a tokio task
//! delivers them one at a time in order. Failures are logged and counted,
//! never retried.
//!
//! ```text
//!   ReporterHandle (Clone)       mpsc        Reporter (tokio task)
//!   ┌────────────────────┐  ───────────▶  ┌─────────────────────────┐
//!   │ .post(body)        │                │ Arc<dyn JanusBackend>   │
//!   │ .retarget(path)    │  ◀───────────  │ ordered delivery        │
//!   │ .flush()           │    oneshot     │ collects PostResponses  │
//!   └────────────────────┘                └─────────────────────────┘
//! ```
//!
//! [`ReporterHandle::flush`] returns the responses collected since the last
//! flush so path hashes can be fed back with
//! [`NotebookSession::on_post_response`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use janus_core::{JanusBackend, NotebookSession};
use janus_types::{PathHash, PostBody, PostResponse};

use crate::constants::ACTION_EXPIRY_MS;
use crate::error::{ClientError, Result};

// ============================================================================
// Commands (internal)
// ============================================================================

enum ReportCommand {
    Post {
        body: PostBody,
    },
    Retarget {
        notebook_path: String,
    },
    Flush {
        reply: oneshot::Sender<FlushReport>,
    },
}

/// What the reporter delivered since the previous flush.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlushReport {
    pub posted: usize,
    pub failed: usize,
    /// `(post time, response)` for each successful post, in delivery order.
    pub responses: Vec<(u64, PostResponse)>,
}

impl FlushReport {
    /// Distinct path hashes reported, in first-seen order.
    pub fn paths(&self) -> Vec<&PathHash> {
        let mut paths: Vec<&PathHash> = Vec::new();
        for hash in self.responses.iter().filter_map(|(_, r)| r.hashed_nb_path.as_ref()) {
            if !paths.contains(&hash) {
                paths.push(hash);
            }
        }
        paths
    }
}

// ============================================================================
// ReporterHandle
// ============================================================================

/// Cloneable handle to a running reporter.
#[derive(Clone)]
pub struct ReporterHandle {
    tx: mpsc::UnboundedSender<ReportCommand>,
}

impl ReporterHandle {
    /// Queue one post. Returns immediately.
    pub fn post(&self, body: PostBody) -> Result<()> {
        self.tx
            .send(ReportCommand::Post { body })
            .map_err(|_| ClientError::Shutdown)
    }

    pub fn post_all(&self, bodies: impl IntoIterator<Item = PostBody>) -> Result<usize> {
        let mut queued = 0;
        for body in bodies {
            self.post(body)?;
            queued += 1;
        }
        Ok(queued)
    }

    /// Posts queued after this go to `notebook_path`.
    pub fn retarget(&self, notebook_path: impl Into<String>) -> Result<()> {
        self.tx
            .send(ReportCommand::Retarget {
                notebook_path: notebook_path.into(),
            })
            .map_err(|_| ClientError::Shutdown)
    }

    /// Wait for every post queued so far and take the report.
    pub async fn flush(&self) -> Result<FlushReport> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ReportCommand::Flush { reply })
            .map_err(|_| ClientError::Shutdown)?;
        rx.await.map_err(|_| ClientError::Shutdown)
    }
}

// ============================================================================
// Reporter (task side)
// ============================================================================

struct Reporter {
    backend: Arc<dyn JanusBackend>,
    notebook_path: String,
    report: FlushReport,
}

impl Reporter {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ReportCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle_command(cmd).await;
        }
        tracing::debug!(path = %self.notebook_path, "reporter shutting down: channel closed");
    }

    async fn handle_command(&mut self, cmd: ReportCommand) {
        match cmd {
            ReportCommand::Post { body } => {
                match self.backend.post(&self.notebook_path, &body).await {
                    Ok(response) => {
                        self.report.posted += 1;
                        self.report.responses.push((body.time, response));
                    }
                    Err(e) => {
                        self.report.failed += 1;
                        tracing::warn!(
                            path = %self.notebook_path,
                            kind = ?body.kind,
                            name = ?body.name,
                            error = %e,
                            "report failed"
                        );
                    }
                }
            }
            ReportCommand::Retarget { notebook_path } => {
                tracing::debug!(from = %self.notebook_path, to = %notebook_path, "reporter retargeted");
                self.notebook_path = notebook_path;
            }
            ReportCommand::Flush { reply } => {
                let _ = reply.send(std::mem::take(&mut self.report));
            }
        }
    }
}

/// Spawn a reporter on the current tokio runtime.
pub fn spawn_reporter(
    backend: Arc<dyn JanusBackend>,
    notebook_path: impl Into<String>,
) -> ReporterHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = Reporter {
        backend,
        notebook_path: notebook_path.into(),
        report: FlushReport::default(),
    };
    tokio::spawn(reporter.run(rx));
    ReporterHandle { tx }
}

/// Deliver the session's outbox and feed path hashes back into it.
///
/// Stale deferred actions are expired first. Returns the flush report.
pub async fn sync_session(
    session: &mut NotebookSession,
    reporter: &ReporterHandle,
    now: u64,
) -> Result<FlushReport> {
    let expired = session.expire_actions(now, ACTION_EXPIRY_MS);
    if expired > 0 {
        tracing::debug!(expired, "dropped stale deferred actions");
    }
    reporter.post_all(session.drain_outbox())?;
    let report = reporter.flush().await?;
    for (time, response) in &report.responses {
        session.on_post_response(response.clone(), *time);
    }
    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use janus_types::{CellContent, CellId, Comment, Version, VersionId};
    use parking_lot::Mutex;
    use serde_json::Value;

    /// Records post order; fails posts named "boom".
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl JanusBackend for Recorder {
        async fn post(&self, notebook_path: &str, body: &PostBody) -> janus_core::Result<PostResponse> {
            let name = body.name.clone().unwrap_or_default();
            if name == "boom" {
                return Err(janus_core::JanusError::Backend("refused".into()));
            }
            self.seen.lock().push((notebook_path.to_string(), name));
            Ok(PostResponse {
                hashed_nb_path: Some(PathHash::from(notebook_path)),
            })
        }

        async fn configs(&self, _: &str, _: &PathHash, _: u64, _: u64) -> janus_core::Result<Vec<Value>> {
            Ok(vec![])
        }

        async fn versions(
            &self,
            _: &str,
            _: &[VersionId],
        ) -> janus_core::Result<BTreeMap<VersionId, CellContent>> {
            Ok(BTreeMap::new())
        }

        async fn cell_history(
            &self,
            _: &str,
            _: &CellId,
            _: &PathHash,
            _: u64,
            _: u64,
        ) -> janus_core::Result<Vec<Version>> {
            Ok(vec![])
        }

        async fn comments(&self, _: &str) -> janus_core::Result<Vec<Comment>> {
            Ok(vec![])
        }
    }

    fn log(time: u64, name: &str) -> PostBody {
        PostBody::log(time, name, None, vec![])
    }

    #[tokio::test]
    async fn test_posts_delivered_in_order() {
        let backend = Arc::new(Recorder::default());
        let handle = spawn_reporter(backend.clone(), "a.ipynb");
        handle.post_all([log(1, "one"), log(2, "two"), log(3, "three")]).unwrap();

        let report = handle.flush().await.unwrap();
        assert_eq!(report.posted, 3);
        let names: Vec<String> = backend.seen.lock().iter().map(|(_, n)| n.clone()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
        assert_eq!(report.responses[1].0, 2);
    }

    #[tokio::test]
    async fn test_failures_counted_not_fatal() {
        let backend = Arc::new(Recorder::default());
        let handle = spawn_reporter(backend, "a.ipynb");
        handle.post_all([log(1, "boom"), log(2, "fine")]).unwrap();

        let report = handle.flush().await.unwrap();
        assert_eq!((report.posted, report.failed), (1, 1));

        // Flushing again starts a fresh report.
        assert_eq!(handle.flush().await.unwrap(), FlushReport::default());
    }

    #[tokio::test]
    async fn test_retarget_changes_path() {
        let backend = Arc::new(Recorder::default());
        let handle = spawn_reporter(backend.clone(), "old.ipynb");
        handle.post(log(1, "before")).unwrap();
        handle.retarget("new.ipynb").unwrap();
        handle.post(log(2, "after")).unwrap();

        let report = handle.flush().await.unwrap();
        let paths: Vec<&str> = report.paths().iter().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["old.ipynb", "new.ipynb"]);
    }
}
