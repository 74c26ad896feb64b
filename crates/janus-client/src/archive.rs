//! In-memory persistence archive.
//!
//! Implements [`JanusBackend`] without a server, diffing each posted
//! notebook snapshot the way the persistence server does:
//!
//! ```text
//! snapshot cells ──▶ for each cell:
//!                      same type+source as its version in the last config?  reuse id
//!                      else same type+source as any older version?          reuse id
//!                      else                                                 new 8-hex id
//!                ──▶ record a configuration if the version order or the
//!                    hide states differ from the last one for this path
//! ```
//!
//! Paths are identified by the first 8 hex characters of the BLAKE3 hash of
//! the notebook path. Outputs do not participate in version matching.
//!
//! The whole archive serializes to JSON so the CLI can keep one on disk.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use janus_core::{JanusBackend, JanusError, Notebook};
use janus_types::{
    CellContent, CellId, Comment, HideState, PathHash, PostBody, PostKind, PostResponse, Version,
    VersionId,
};

use crate::constants::{PATH_HASH_LEN, VERSION_ID_LEN};

/// Hash a notebook path the way the archive reports it.
pub fn path_hash(notebook_path: &str) -> PathHash {
    let digest = blake3::hash(notebook_path.as_bytes());
    let mut encoded = hex::encode(digest.as_bytes());
    encoded.truncate(PATH_HASH_LEN);
    PathHash::from(encoded)
}

fn new_version_id() -> VersionId {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(VERSION_ID_LEN);
    VersionId::from(id)
}

// ── Stored rows ─────────────────────────────────────────────────────────────

/// A tracked host action or a janus log event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRow {
    pub time: u64,
    pub kind: PostKind,
    pub name: String,
    pub path: PathHash,
    #[serde(default)]
    pub selected: Option<CellId>,
    #[serde(default)]
    pub selected_cells: Vec<CellId>,
}

/// One stored cell version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellRow {
    pub time: u64,
    pub cell_id: CellId,
    pub version_id: VersionId,
    pub content: CellContent,
}

/// One stored notebook configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigRow {
    pub time: u64,
    pub path: PathHash,
    pub cell_order: Vec<CellId>,
    pub version_order: Vec<VersionId>,
    pub hide_states: Vec<HideState>,
}

impl ConfigRow {
    /// Positional form served by `q=config`.
    pub fn to_row(&self) -> Value {
        json!([
            self.time,
            self.path,
            self.cell_order,
            self.version_order,
            self.hide_states,
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct CommentRow {
    path: PathHash,
    comment: Comment,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct ArchiveState {
    actions: Vec<ActionRow>,
    cells: Vec<CellRow>,
    configs: Vec<ConfigRow>,
    comments: Vec<CommentRow>,
}

/// A snapshot cell the diff works on.
struct SnapshotCell {
    id: CellId,
    content: CellContent,
    hide: HideState,
}

impl ArchiveState {
    fn last_config(&self, path: &PathHash) -> Option<&ConfigRow> {
        self.configs.iter().rev().find(|c| &c.path == path)
    }

    fn latest_cell(&self, version_id: &VersionId) -> Option<&CellRow> {
        self.cells.iter().rev().find(|c| &c.version_id == version_id)
    }

    /// Match on cell type and source only.
    fn reusable_version(&self, last: Option<&ConfigRow>, cell: &SnapshotCell) -> Option<VersionId> {
        let same = |row: &CellRow| {
            row.cell_id == cell.id
                && row.content.cell_type == cell.content.cell_type
                && row.content.source == cell.content.source
        };
        let in_last = last.and_then(|config| {
            config
                .version_order
                .iter()
                .filter_map(|v| self.latest_cell(v))
                .find(|row| row.cell_id == cell.id)
                .filter(|row| same(row))
        });
        in_last
            .or_else(|| self.cells.iter().rev().find(|row| same(row)))
            .map(|row| row.version_id.clone())
    }

    /// Diff a snapshot against the path's last configuration.
    ///
    /// Returns true when a new configuration was recorded.
    fn check_for_diff(&mut self, time: u64, path: &PathHash, cells: Vec<SnapshotCell>) -> bool {
        let last = self.last_config(path).cloned();
        let mut cell_order = Vec::with_capacity(cells.len());
        let mut version_order = Vec::with_capacity(cells.len());
        let mut hide_states = Vec::with_capacity(cells.len());

        for cell in cells {
            let version_id = match self.reusable_version(last.as_ref(), &cell) {
                Some(id) => id,
                None => {
                    let id = new_version_id();
                    tracing::debug!(cell = %cell.id, version = %id, "new cell version");
                    self.cells.push(CellRow {
                        time,
                        cell_id: cell.id.clone(),
                        version_id: id.clone(),
                        content: cell.content,
                    });
                    id
                }
            };
            cell_order.push(cell.id);
            version_order.push(version_id);
            hide_states.push(cell.hide);
        }

        let changed = last.is_none_or(|l| {
            l.version_order != version_order || l.hide_states != hide_states
        });
        if changed {
            self.configs.push(ConfigRow {
                time,
                path: path.clone(),
                cell_order,
                version_order,
                hide_states,
            });
        }
        changed
    }
}

fn snapshot_cells(notebook_path: &str, model: &Value) -> janus_core::Result<Vec<SnapshotCell>> {
    let notebook = Notebook::from_json(notebook_path, model)?;
    let mut cells = Vec::with_capacity(notebook.len());
    for cell in notebook.cells {
        if cell.id.is_empty() {
            tracing::warn!(path = %notebook_path, "snapshot cell without janus id, skipped");
            continue;
        }
        cells.push(SnapshotCell {
            hide: HideState::from(cell.visibility),
            id: cell.id,
            content: cell.content,
        });
    }
    Ok(cells)
}

// ── MemoryArchive ───────────────────────────────────────────────────────────

/// A complete persistence backend held in memory.
#[derive(Default)]
pub struct MemoryArchive {
    state: Mutex<ArchiveState>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an archive saved with [`save`](Self::save). A missing file is empty.
    pub fn open(path: &Path) -> janus_core::Result<Self> {
        let state = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ArchiveState::default(),
            Err(e) => return Err(JanusError::Backend(e.to_string())),
        };
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn save(&self, path: &Path) -> janus_core::Result<()> {
        let bytes = serde_json::to_vec_pretty(&*self.state.lock())?;
        std::fs::write(path, bytes).map_err(|e| JanusError::Backend(e.to_string()))
    }

    pub fn actions(&self) -> Vec<ActionRow> {
        self.state.lock().actions.clone()
    }

    pub fn configurations(&self) -> Vec<ConfigRow> {
        self.state.lock().configs.clone()
    }

    pub fn version_count(&self) -> usize {
        self.state.lock().cells.len()
    }
}

#[async_trait]
impl JanusBackend for MemoryArchive {
    async fn post(&self, notebook_path: &str, body: &PostBody) -> janus_core::Result<PostResponse> {
        let path = path_hash(notebook_path);
        let mut state = self.state.lock();
        match body.kind {
            PostKind::Comment => {
                let text = body.comment.clone().unwrap_or_default();
                state.comments.push(CommentRow {
                    path: path.clone(),
                    comment: Comment {
                        time: body.time,
                        text,
                    },
                });
            }
            PostKind::Action | PostKind::Log => {
                let (selected, selected_cells) = match body.kind {
                    PostKind::Log => (body.id.clone(), body.ids.clone()),
                    _ => (body.index.clone(), body.indices.clone()),
                };
                state.actions.push(ActionRow {
                    time: body.time,
                    kind: body.kind,
                    name: body.name.clone().unwrap_or_default(),
                    path: path.clone(),
                    selected,
                    selected_cells: selected_cells.unwrap_or_default(),
                });
                if let Some(model) = &body.model {
                    let cells = snapshot_cells(notebook_path, model)?;
                    if state.check_for_diff(body.time, &path, cells) {
                        tracing::debug!(path = %path, time = body.time, "configuration recorded");
                    }
                }
            }
        }
        Ok(PostResponse {
            hashed_nb_path: Some(path),
        })
    }

    async fn configs(
        &self,
        _notebook_path: &str,
        path: &PathHash,
        start: u64,
        end: u64,
    ) -> janus_core::Result<Vec<Value>> {
        let state = self.state.lock();
        Ok(state
            .configs
            .iter()
            .filter(|c| &c.path == path && (start..=end).contains(&c.time))
            .map(ConfigRow::to_row)
            .collect())
    }

    async fn versions(
        &self,
        _notebook_path: &str,
        ids: &[VersionId],
    ) -> janus_core::Result<BTreeMap<VersionId, CellContent>> {
        let state = self.state.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.latest_cell(id).map(|row| (id.clone(), row.content.clone())))
            .collect())
    }

    /// Versions of `cell_id` active in this path's configurations in the window.
    async fn cell_history(
        &self,
        _notebook_path: &str,
        cell_id: &CellId,
        path: &PathHash,
        start: u64,
        end: u64,
    ) -> janus_core::Result<Vec<Version>> {
        let state = self.state.lock();
        let mut seen: Vec<VersionId> = Vec::new();
        for config in state
            .configs
            .iter()
            .filter(|c| &c.path == path && (start..=end).contains(&c.time))
        {
            for (cell, version) in config.cell_order.iter().zip(&config.version_order) {
                if cell == cell_id && !seen.contains(version) {
                    seen.push(version.clone());
                }
            }
        }
        Ok(seen
            .iter()
            .filter_map(|id| state.latest_cell(id))
            .map(|row| {
                Version::draft(row.cell_id.clone(), row.content.clone(), row.time)
                    .with_id(row.version_id.clone())
            })
            .collect())
    }

    async fn comments(&self, notebook_path: &str) -> janus_core::Result<Vec<Comment>> {
        let path = path_hash(notebook_path);
        let state = self.state.lock();
        Ok(state
            .comments
            .iter()
            .filter(|c| c.path == path)
            .map(|c| c.comment.clone())
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use janus_core::Cell;
    use janus_types::Visibility;

    fn snapshot(cells: Vec<Cell>) -> Value {
        Notebook::new("a.ipynb").with_cells(cells).to_json()
    }

    fn action(time: u64, cells: Vec<Cell>) -> PostBody {
        PostBody::action(time, "save-notebook", None, vec![], snapshot(cells))
    }

    #[test]
    fn test_path_hash_is_short_hex() {
        let h = path_hash("work/a.ipynb");
        assert_eq!(h.as_str().len(), PATH_HASH_LEN);
        assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, path_hash("work/a.ipynb"));
        assert_ne!(h, path_hash("work/b.ipynb"));
    }

    #[tokio::test]
    async fn test_first_snapshot_records_everything() {
        let archive = MemoryArchive::new();
        let resp = archive
            .post("a.ipynb", &action(1, vec![Cell::code("x = 1").with_id("a"), Cell::markdown("# t").with_id("b")]))
            .await
            .unwrap();
        assert_eq!(resp.hashed_nb_path, Some(path_hash("a.ipynb")));
        assert_eq!(archive.version_count(), 2);
        let configs = archive.configurations();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].cell_order, vec![CellId::from("a"), CellId::from("b")]);
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_adds_nothing() {
        let archive = MemoryArchive::new();
        let cells = || vec![Cell::code("x = 1").with_id("a")];
        archive.post("a.ipynb", &action(1, cells())).await.unwrap();
        archive.post("a.ipynb", &action(2, cells())).await.unwrap();
        assert_eq!(archive.configurations().len(), 1);
        assert_eq!(archive.version_count(), 1);
        assert_eq!(archive.actions().len(), 2);
    }

    #[tokio::test]
    async fn test_outputs_do_not_make_a_new_version() {
        let archive = MemoryArchive::new();
        archive.post("a.ipynb", &action(1, vec![Cell::code("x").with_id("a")])).await.unwrap();
        let ran = Cell::code("x")
            .with_id("a")
            .with_outputs(vec![janus_types::Output::stdout("1\n")]);
        archive.post("a.ipynb", &action(2, vec![ran])).await.unwrap();
        assert_eq!(archive.version_count(), 1);
    }

    #[tokio::test]
    async fn test_reverting_reuses_older_version() {
        let archive = MemoryArchive::new();
        for (t, src) in [(1, "v = 1"), (2, "v = 2"), (3, "v = 1")] {
            archive.post("a.ipynb", &action(t, vec![Cell::code(src).with_id("a")])).await.unwrap();
        }
        let configs = archive.configurations();
        assert_eq!(configs.len(), 3);
        assert_eq!(archive.version_count(), 2);
        assert_eq!(configs[0].version_order, configs[2].version_order);
    }

    #[tokio::test]
    async fn test_hide_change_records_configuration() {
        let archive = MemoryArchive::new();
        archive.post("a.ipynb", &action(1, vec![Cell::code("x").with_id("a")])).await.unwrap();
        let hidden = Cell::code("x").with_id("a").with_visibility(Visibility::HIDDEN);
        archive.post("a.ipynb", &action(2, vec![hidden])).await.unwrap();

        let configs = archive.configurations();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].hide_states, vec![HideState::Cell]);
        assert_eq!(configs[0].version_order, configs[1].version_order);
    }

    #[tokio::test]
    async fn test_config_window_and_rows() {
        let archive = MemoryArchive::new();
        for (t, src) in [(10, "a"), (20, "b"), (30, "c")] {
            archive.post("a.ipynb", &action(t, vec![Cell::code(src).with_id("a")])).await.unwrap();
        }
        let rows = archive
            .configs("a.ipynb", &path_hash("a.ipynb"), 15, 30)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let parsed = janus_types::NotebookConfiguration::from_row(&rows[0]).unwrap();
        assert_eq!(parsed.timestamp, 20);
        assert_eq!(parsed.hide_state(0), HideState::None);
    }

    #[tokio::test]
    async fn test_comments_scoped_to_path() {
        let archive = MemoryArchive::new();
        archive.post("a.ipynb", &PostBody::comment(1, "tidy this")).await.unwrap();
        archive.post("b.ipynb", &PostBody::comment(2, "other")).await.unwrap();
        let got = archive.comments("a.ipynb").await.unwrap();
        assert_eq!(got, vec![Comment { time: 1, text: "tidy this".into() }]);
    }

    #[tokio::test]
    async fn test_save_and_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("archive.json");
        let archive = MemoryArchive::new();
        archive.post("a.ipynb", &action(1, vec![Cell::code("x").with_id("a")])).await.unwrap();
        archive.save(&file).unwrap();

        let reopened = MemoryArchive::open(&file).unwrap();
        assert_eq!(reopened.configurations(), archive.configurations());
        assert!(MemoryArchive::open(&dir.path().join("missing.json")).unwrap().actions().is_empty());
    }
}
