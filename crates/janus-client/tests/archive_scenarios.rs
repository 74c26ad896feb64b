//! End-to-end scenarios: a live session reporting into a [`MemoryArchive`]
//! through the background reporter, then reading its own history back.
//!
//! # Tiers
//!
//! - **Recording**: outbox → reporter → archive diffing → path entries.
//! - **History**: timeline across paths, revision rendering, cell history.
//! - **Degraded**: a failing backend never blocks the session.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use janus_client::{MemoryArchive, path_hash, spawn_reporter, sync_session};
use janus_core::{
    ActionPlan, Cell, JanusBackend, JanusError, Notebook, NotebookSession, ScrollTarget, Selection,
};
use janus_types::{
    CellContent, CellId, Comment, HideState, Output, PathHash, PostBody, PostResponse, Version,
    VersionId,
};

const PATH: &str = "work/analysis.ipynb";

fn id(s: &str) -> CellId {
    CellId::from(s)
}

fn open_session() -> NotebookSession {
    let notebook = Notebook::new(PATH).with_cells(vec![
        Cell::code("x = 1").with_id("a"),
        Cell::code("y = 2").with_id("b"),
    ]);
    NotebookSession::open(notebook, 10)
}

/// Run an immediate tracked action so the archive gets a snapshot.
fn save(session: &mut NotebookSession, now: u64) {
    match session.begin_action("save-notebook", now) {
        ActionPlan::Immediate(pending) => session.finish_action(pending),
        other => panic!("save-notebook should be immediate, got {other:?}"),
    }
}

/// Edit and run `cell` the way the host does: action dispatch, execution,
/// completion.
fn run(session: &mut NotebookSession, cell: &str, source: &str, stdout: &str, now: u64) {
    session.on_select(Selection::single(id(cell)), now);
    session
        .on_edit(&id(cell), janus_core::Surface::Primary, source)
        .unwrap();
    let ActionPlan::AwaitExecution { token: action } = session.begin_action("run-cell", now) else {
        panic!("run-cell on a code cell should wait for execution");
    };
    let exec = session.before_execute(&id(cell)).unwrap();
    session.after_execute(exec, vec![Output::stdout(stdout)], Some(1), now);
    session.action_executed(action);
}

/// Three revisions under one path:
///
/// ```text
/// t=10 opened   [a1, b1]  n n
/// t=20 hide b   [a1, b1]  n c
/// t=30 run a    [a2, b1]  n c
/// ```
async fn record_three_revisions(
    session: &mut NotebookSession,
    archive: &Arc<MemoryArchive>,
) -> janus_client::ReporterHandle {
    let reporter = spawn_reporter(archive.clone(), PATH);
    sync_session(session, &reporter, 10).await.unwrap();

    session.on_select(Selection::single(id("b")), 20);
    session.toggle_cell(20).unwrap();
    save(session, 20);
    sync_session(session, &reporter, 20).await.unwrap();

    run(session, "a", "x = 10", "10\n", 30);
    sync_session(session, &reporter, 30).await.unwrap();
    reporter
}

// ============================================================================
// Recording
// ============================================================================

#[tokio::test]
async fn test_open_event_records_first_configuration_and_path() {
    let archive = Arc::new(MemoryArchive::new());
    let mut session = open_session();
    let reporter = spawn_reporter(archive.clone(), PATH);

    let report = sync_session(&mut session, &reporter, 10).await.unwrap();
    assert_eq!(report.posted, 1);
    assert_eq!(archive.actions()[0].name, "notebook-opened");
    assert_eq!(archive.configurations().len(), 1);

    let paths = &session.notebook().meta.filepaths;
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].hash, path_hash(PATH));
    assert_eq!((paths[0].first_seen, paths[0].last_seen), (10, 10));
}

#[tokio::test]
async fn test_visibility_and_execution_produce_revisions() {
    let archive = Arc::new(MemoryArchive::new());
    let mut session = open_session();
    record_three_revisions(&mut session, &archive).await;

    let configs = archive.configurations();
    assert_eq!(configs.len(), 3);
    assert_eq!(configs[1].hide_states, vec![HideState::None, HideState::Cell]);
    assert_eq!(configs[0].version_order, configs[1].version_order);
    assert_ne!(configs[1].version_order[0], configs[2].version_order[0]);
    assert_eq!(configs[1].version_order[1], configs[2].version_order[1]);
    // a1, b1, a2
    assert_eq!(archive.version_count(), 3);

    let names: Vec<String> = archive.actions().iter().map(|a| a.name.clone()).collect();
    assert_eq!(names, vec!["notebook-opened", "hide-cells", "save-notebook", "run-cell"]);

    let entry = &session.notebook().meta.filepaths[0];
    assert_eq!(entry.last_seen, 30);
}

#[tokio::test]
async fn test_recording_disabled_posts_nothing_new() {
    let archive = Arc::new(MemoryArchive::new());
    let mut session = open_session();
    let reporter = spawn_reporter(archive.clone(), PATH);
    sync_session(&mut session, &reporter, 10).await.unwrap();

    assert!(!session.toggle_history_recording());
    session.on_select(Selection::single(id("a")), 11);
    session.toggle_cell(11).unwrap();
    assert!(matches!(session.begin_action("save-notebook", 12), ActionPlan::Untracked));

    let report = sync_session(&mut session, &reporter, 12).await.unwrap();
    assert_eq!(report.posted, 0);
    assert_eq!(archive.actions().len(), 1);
}

#[tokio::test]
async fn test_comments_round_trip() {
    let archive = Arc::new(MemoryArchive::new());
    let reporter = spawn_reporter(archive.clone(), PATH);
    reporter.post(PostBody::comment(5, "clean up before sharing")).unwrap();
    reporter.flush().await.unwrap();

    let comments = archive.comments(PATH).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "clean up before sharing");
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_history_renders_each_revision() {
    let archive = Arc::new(MemoryArchive::new());
    let mut session = open_session();
    record_three_revisions(&mut session, &archive).await;

    let history = session.load_history(&*archive).await;
    assert_eq!(history.revision_count(), 3);
    assert_eq!(history.caption(2), "3 of 3");

    let latest = history.go_to(2, &*archive, PATH).await.unwrap().unwrap();
    assert_eq!(latest.views.len(), 2);
    assert!(latest.views[0].changed);
    assert!(!latest.views[1].changed);
    assert_eq!(latest.views[0].content.source, "x = 10");
    assert_eq!(latest.views[1].hide, HideState::Cell);
    assert_eq!(latest.groups.len(), 1);
    assert_eq!(latest.scroll, ScrollTarget::Cell(0));

    let hidden = history.go_to(1, &*archive, PATH).await.unwrap().unwrap();
    assert_eq!(hidden.views[0].content.source, "x = 1");
    assert!(hidden.views.iter().all(|v| !v.changed));
    assert_eq!(hidden.scroll, ScrollTarget::Preserve);
    assert_eq!(history.pool_len(), 2);
}

#[tokio::test]
async fn test_viewer_blocks_edits_until_closed() {
    let archive = Arc::new(MemoryArchive::new());
    let mut session = open_session();
    record_three_revisions(&mut session, &archive).await;

    session.load_history(&*archive).await;
    assert!(matches!(session.toggle_cell(40), Err(JanusError::HistoryReadOnly)));
    session.close_history();
    assert!(session.toggle_cell(40).is_ok());
}

#[tokio::test]
async fn test_rename_unions_paths() {
    let archive = Arc::new(MemoryArchive::new());
    let mut session = open_session();
    let reporter = record_three_revisions(&mut session, &archive).await;

    const RENAMED: &str = "work/final.ipynb";
    session.rename(RENAMED);
    reporter.retarget(RENAMED).unwrap();
    save(&mut session, 40);
    sync_session(&mut session, &reporter, 40).await.unwrap();

    let paths = &session.notebook().meta.filepaths;
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].hash, path_hash(PATH));
    assert_eq!(paths[1].hash, path_hash(RENAMED));
    assert_eq!((paths[1].first_seen, paths[1].last_seen), (40, 40));

    session.load_cell_history(&id("a"), &*archive).await.unwrap();
    let ledger = &session.notebook().cell(&id("a")).unwrap().ledger;
    let sources: Vec<&str> = ledger
        .versions()
        .iter()
        .map(|v| v.content.source.as_str())
        .collect();
    assert_eq!(sources, vec!["x = 1", "x = 10"]);
    assert_eq!(ledger.current_index(), 1);

    let history = session.load_history(&*archive).await;
    assert_eq!(history.revision_count(), 4);
    let stamps: Vec<u64> = (0..4)
        .filter_map(|r| history.configuration(r).map(|c| c.timestamp))
        .collect();
    assert_eq!(stamps, vec![10, 20, 30, 40]);
}

// ============================================================================
// Degraded
// ============================================================================

/// Refuses every request.
struct Offline;

#[async_trait]
impl JanusBackend for Offline {
    async fn post(&self, _: &str, _: &PostBody) -> janus_core::Result<PostResponse> {
        Err(JanusError::Backend("connection refused".into()))
    }

    async fn configs(&self, _: &str, _: &PathHash, _: u64, _: u64) -> janus_core::Result<Vec<Value>> {
        Err(JanusError::Backend("connection refused".into()))
    }

    async fn versions(
        &self,
        _: &str,
        _: &[VersionId],
    ) -> janus_core::Result<BTreeMap<VersionId, CellContent>> {
        Err(JanusError::Backend("connection refused".into()))
    }

    async fn cell_history(
        &self,
        _: &str,
        _: &CellId,
        _: &PathHash,
        _: u64,
        _: u64,
    ) -> janus_core::Result<Vec<Version>> {
        Err(JanusError::Backend("connection refused".into()))
    }

    async fn comments(&self, _: &str) -> janus_core::Result<Vec<Comment>> {
        Err(JanusError::Backend("connection refused".into()))
    }
}

#[tokio::test]
async fn test_offline_backend_never_blocks_editing() {
    let mut session = open_session();
    let reporter = spawn_reporter(Arc::new(Offline), PATH);

    run(&mut session, "a", "x = 3", "3\n", 20);
    let report = sync_session(&mut session, &reporter, 20).await.unwrap();
    assert_eq!((report.posted, report.failed), (0, 2));
    assert!(session.notebook().meta.filepaths.is_empty());

    // Versions are still kept locally.
    assert_eq!(session.notebook().cell(&id("a")).unwrap().ledger.len(), 1);

    let history = session.load_history(&Offline).await;
    assert!(history.is_empty());
}
