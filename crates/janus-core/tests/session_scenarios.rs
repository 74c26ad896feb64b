//! End-to-end scenarios driving a `NotebookSession` the way a host would.
//!
//! # Tiers
//!
//! - **Tier 0:** Visibility properties over every toggle sequence
//! - **Tier 1:** Version ledger through execution hooks
//! - **Tier 2:** History reconstruction and path registry against a fake backend

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use janus_core::{
    ActionPlan, Cell, JanusBackend, JanusError, Notebook, NotebookSession, Result, ScrollTarget,
    Selection, Surface, Toggle,
};
use janus_types::{
    CellContent, CellId, Comment, Output, PathHash, PostBody, PostResponse, Version, VersionId,
};

// ============================================================================
// Shared test setup
// ============================================================================

fn sample() -> Notebook {
    Notebook::new("analysis.ipynb").with_cells(vec![
        Cell::code("import numpy as np").with_id("imports"),
        Cell::code("x = np.arange(3)\nx")
            .with_id("compute")
            .with_outputs(vec![Output::text_result("array([0, 1, 2])", Some(1))]),
        Cell::markdown("# Notes").with_id("notes"),
        Cell::code("print(x)")
            .with_id("show")
            .with_outputs(vec![Output::stdout("[0 1 2]\n")]),
    ])
}

fn select(session: &mut NotebookSession, ids: &[&str]) {
    let ids: Vec<CellId> = ids.iter().map(|i| CellId::from(*i)).collect();
    session.on_select(
        Selection {
            primary: ids.first().cloned(),
            ids,
        },
        0,
    );
}

fn execute(session: &mut NotebookSession, id: &str, source: &str, now: u64) {
    let id = CellId::from(id);
    session.on_edit(&id, Surface::Primary, source).unwrap();
    let token = session.before_execute(&id).unwrap();
    session.after_execute(token, vec![Output::stdout(source)], Some(now), now);
}

/// In-memory backend keyed by path hash.
#[derive(Default)]
struct FakeBackend {
    configs: BTreeMap<String, Vec<Value>>,
    versions: BTreeMap<VersionId, CellContent>,
    history: BTreeMap<String, Vec<Version>>,
    version_requests: Mutex<Vec<Vec<VersionId>>>,
}

#[async_trait]
impl JanusBackend for FakeBackend {
    async fn post(&self, _: &str, _: &PostBody) -> Result<PostResponse> {
        Ok(PostResponse::default())
    }

    async fn configs(&self, _: &str, path: &PathHash, _: u64, _: u64) -> Result<Vec<Value>> {
        Ok(self.configs.get(path.as_str()).cloned().unwrap_or_default())
    }

    async fn versions(
        &self,
        _: &str,
        ids: &[VersionId],
    ) -> Result<BTreeMap<VersionId, CellContent>> {
        self.version_requests.lock().unwrap().push(ids.to_vec());
        Ok(ids
            .iter()
            .filter_map(|id| self.versions.get(id).map(|c| (id.clone(), c.clone())))
            .collect())
    }

    async fn cell_history(
        &self,
        _: &str,
        _: &CellId,
        path: &PathHash,
        _: u64,
        _: u64,
    ) -> Result<Vec<Version>> {
        self.history
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| JanusError::Backend(format!("no history for {path}")))
    }

    async fn comments(&self, _: &str) -> Result<Vec<Comment>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Tier 0: visibility
// ============================================================================

#[test]
fn test_invariant_holds_after_every_transition() {
    let toggles = [Toggle::Cell, Toggle::Source, Toggle::Output];
    for first in toggles {
        for second in toggles {
            for third in toggles {
                let mut session = NotebookSession::open(sample(), 0);
                select(&mut session, &["compute", "notes", "show"]);
                for t in [first, second, third] {
                    session.toggle(t, 1).unwrap();
                    for cell in &session.notebook().cells {
                        assert!(
                            cell.visibility.holds_invariant(),
                            "{t:?} broke flags of {}",
                            cell.id
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_toggle_cell_is_involution() {
    let mut session = NotebookSession::open(sample(), 0);
    let before = session.notebook().clone();
    select(&mut session, &["compute", "show"]);
    session.toggle_cell(1).unwrap();
    session.toggle_cell(2).unwrap();
    assert_eq!(session.notebook().cells, before.cells);
}

#[test]
fn test_hide_reveal_round_trip_through_mirror() {
    let mut session = NotebookSession::open(sample(), 0);
    let before = session.notebook().cells[1].content.clone();
    select(&mut session, &["compute"]);
    session.toggle_cell(1).unwrap();
    session.open_group(0).unwrap();
    assert!(session.panel().has_mirror(&"compute".into()));
    session.toggle_cell(2).unwrap();
    assert_eq!(session.notebook().cells[1].content, before);
    assert!(!session.panel().is_open());
}

#[test]
fn test_display_index_reports_hidden_markers() {
    let mut session = NotebookSession::open(sample(), 0);
    select(&mut session, &["show"]);
    let changed = session.toggle_output(1).unwrap();
    assert!(changed.contains(&"show".into()));
    let display = session.display().cell(&"show".into()).unwrap();
    assert!(display.show_source);
    assert!(!display.show_output);
    assert!(display.hidden_output_marker);
}

#[test]
fn test_toggle_all_sections() {
    let mut session = NotebookSession::open(sample(), 0);
    select(&mut session, &["imports"]);
    session.toggle_cell(1).unwrap();
    select(&mut session, &["notes"]);
    session.toggle_cell(2).unwrap();
    assert_eq!(session.display().groups().len(), 2);

    session.toggle_all_sections();
    assert_eq!(
        session.panel().shown_ids(),
        vec![CellId::from("imports"), CellId::from("notes")]
    );
    session.toggle_all_sections();
    assert!(!session.panel().is_open());
}

// ============================================================================
// Tier 1: versions
// ============================================================================

#[test]
fn test_execute_twice_then_previous() {
    let mut session = NotebookSession::open(sample(), 0);
    let id = CellId::from("imports");

    execute(&mut session, "imports", "x=1", 10);
    let cell = session.notebook().cell(&id).unwrap();
    assert_eq!(cell.ledger.len(), 1);
    assert_eq!(cell.ledger.current_index(), 0);

    execute(&mut session, "imports", "x=2", 20);
    let cell = session.notebook().cell(&id).unwrap();
    assert_eq!(cell.ledger.len(), 2);
    assert_eq!(cell.ledger.current_index(), 1);

    session.previous_version(&id, Surface::Primary).unwrap();
    assert_eq!(session.notebook().cell(&id).unwrap().source(), "x=1");
}

#[test]
fn test_previous_n_minus_one_times_reaches_first() {
    let mut session = NotebookSession::open(sample(), 0);
    let id = CellId::from("show");
    let n = 5;
    for i in 0..n {
        execute(&mut session, "show", &format!("print({i})"), i as u64 + 1);
    }
    for _ in 0..n - 1 {
        session.previous_version(&id, Surface::Primary).unwrap();
    }
    let cell = session.notebook().cell(&id).unwrap();
    assert_eq!(cell.ledger.current_index(), 0);
    assert_eq!(cell.source(), "print(0)");
}

#[test]
fn test_delete_last_version_rejected() {
    let mut session = NotebookSession::open(sample(), 0);
    let id = CellId::from("show");
    execute(&mut session, "show", "print(1)", 1);
    assert!(matches!(
        session.delete_version(&id, Surface::Primary),
        Err(JanusError::LastVersion)
    ));

    execute(&mut session, "show", "print(2)", 2);
    let removed = session.delete_version(&id, Surface::Primary).unwrap();
    assert_eq!(removed.content.source, "print(2)");
    let cell = session.notebook().cell(&id).unwrap();
    assert_eq!(cell.ledger.current_index(), 0);
    assert_eq!(cell.source(), "print(1)");
}

#[test]
fn test_named_version_survives_dedup() {
    let mut session = NotebookSession::open(sample(), 0);
    let id = CellId::from("show");
    execute(&mut session, "show", "print(1)", 1);
    session.name_version(&id, Surface::Primary, 0, "baseline").unwrap();
    execute(&mut session, "show", "print(1)", 2);

    let ledger = &session.notebook().cell(&id).unwrap().ledger;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.current().unwrap().name, "baseline");
    assert!(ledger.named().iter().any(|v| v.name == "baseline"));
}

#[test]
fn test_version_match_ignores_names() {
    let a = Version::draft("c".into(), CellContent::code("x = 1"), 1).with_name("one");
    let b = Version::draft("c".into(), CellContent::code("x = 1"), 2).with_name("two");
    assert!(a.content.matches(&b.content));
}

#[test]
fn test_deferred_run_report_carries_executed_state() {
    let mut session = NotebookSession::open(sample(), 0);
    select(&mut session, &["show"]);
    session.drain_outbox();

    let ActionPlan::AwaitExecution { token: action } = session.begin_action("jupyter-notebook:run-cell", 5)
    else {
        panic!("running a code cell defers its report");
    };
    let exec = session.before_execute(&"show".into()).unwrap();
    session.after_execute(exec, vec![Output::stdout("done\n")], Some(7), 6);
    assert!(session.drain_outbox().is_empty());

    session.action_executed(action);
    let posts = session.drain_outbox();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].time, 5);
    let model = posts[0].model.as_ref().unwrap();
    assert_eq!(model["cells"][3]["outputs"][0]["text"], json!("done\n"));
}

#[test]
fn test_immediate_action_after_host_mutation() {
    let mut session = NotebookSession::open(sample(), 0);
    select(&mut session, &["notes"]);
    session.drain_outbox();
    let ActionPlan::Immediate(pending) = session.begin_action("delete-cell", 3) else {
        panic!("delete reports immediately");
    };
    session
        .on_structural_change(janus_core::StructuralChange::Delete(vec!["notes".into()]))
        .unwrap();
    session.finish_action(pending);
    let posts = session.drain_outbox();
    let model = posts[0].model.as_ref().unwrap();
    assert_eq!(model["cells"].as_array().unwrap().len(), 3);
    assert_eq!(posts[0].index, Some(CellId::from("notes")));
}

// ============================================================================
// Tier 2: history and paths
// ============================================================================

fn history_backend() -> FakeBackend {
    let mut backend = FakeBackend::default();
    backend.configs.insert(
        "old".into(),
        vec![json!([100, "old", "['imports', 'compute']", "['A', 'B']", "nn"])],
    );
    backend.configs.insert(
        "new".into(),
        vec![json!([200, "new", ["imports", "compute", "show"], ["A", "B", "C"], ["n", "n", "c"]])],
    );
    for id in ["A", "B", "C"] {
        backend
            .versions
            .insert(id.into(), CellContent::code(format!("# {id}")));
    }
    backend
}

#[tokio::test]
async fn test_history_across_rename() {
    let backend = history_backend();
    let mut session = NotebookSession::open(sample(), 0);
    assert!(session.record_path("old".into(), 50));
    assert!(session.record_path("new".into(), 150));
    let paths = &session.notebook().meta.filepaths;
    assert_eq!(paths.len(), 2);
    assert_ne!(paths[0].hash, paths[1].hash);

    let history = session.load_history(&backend).await;
    assert_eq!(history.revision_count(), 2);
    assert_eq!(history.caption(1), "2 of 2");

    let first = history.go_to(0, &backend, "analysis.ipynb").await.unwrap().unwrap();
    assert_eq!(first.version_ids().len(), 2);
    let second = history.go_to(1, &backend, "analysis.ipynb").await.unwrap().unwrap();
    let changed: Vec<bool> = second.views.iter().map(|v| v.changed).collect();
    assert_eq!(changed, vec![false, false, true]);
    assert_eq!(second.scroll, ScrollTarget::Group(0));

    // Only C was fetched for the second revision.
    let requests = backend.version_requests.lock().unwrap().clone();
    assert_eq!(requests.last().unwrap(), &vec![VersionId::from("C")]);
}

#[tokio::test]
async fn test_go_to_twice_is_idempotent() {
    let backend = history_backend();
    let mut session = NotebookSession::open(sample(), 0);
    session.record_path("old".into(), 50);
    session.record_path("new".into(), 150);
    let history = session.load_history(&backend).await;
    let once = history.go_to(1, &backend, "nb").await.unwrap().unwrap();
    let twice = history.go_to(1, &backend, "nb").await.unwrap().unwrap();
    assert_eq!(once.version_ids(), twice.version_ids());
    let hides = |r: &janus_core::RenderedRevision| r.views.iter().map(|v| v.hide).collect::<Vec<_>>();
    assert_eq!(hides(&once), hides(&twice));
}

#[tokio::test]
async fn test_history_viewer_is_read_only() {
    let backend = history_backend();
    let mut session = NotebookSession::open(sample(), 0);
    session.record_path("new".into(), 150);
    session.load_history(&backend).await;
    select(&mut session, &["imports"]);
    assert!(matches!(
        session.toggle_cell(1),
        Err(JanusError::HistoryReadOnly)
    ));
    assert!(session.panel().is_read_only());
    session.close_history();
    assert!(!session.panel().is_read_only());
}

#[tokio::test]
async fn test_cell_history_unions_both_paths() {
    let mut backend = FakeBackend::default();
    // The live cell printed this output; only the newest version matches it.
    let version = |id: &str, src: &str, t: u64| {
        let content = CellContent::code(src).with_outputs(vec![Output::stdout("[0 1 2]\n")]);
        Version::draft("show".into(), content, t).with_id(id.into())
    };
    backend
        .history
        .insert("old".into(), vec![version("v1", "print(1)", 10)]);
    backend.history.insert(
        "new".into(),
        vec![version("v2", "print(2)", 20), version("v3", "print(x)", 30)],
    );

    let mut session = NotebookSession::open(sample(), 0);
    session.record_path("old".into(), 5);
    session.record_path("new".into(), 15);
    session
        .load_cell_history(&"show".into(), &backend)
        .await
        .unwrap();

    let cell = session.notebook().cell(&"show".into()).unwrap();
    let sources: Vec<&str> = cell
        .ledger
        .versions()
        .iter()
        .map(|v| v.content.source.as_str())
        .collect();
    assert_eq!(sources, vec!["print(1)", "print(2)", "print(x)"]);
    assert_eq!(cell.ledger.current_index(), 2);
}
