//! The per-document context object.
//!
//! A [`NotebookSession`] is created when a notebook opens and dropped (via
//! [`NotebookSession::close`]) when it closes. It owns every piece of Janus
//! state for that document and is the only thing the host integration layer
//! talks to:
//!
//! ```text
//!            host integration layer
//!   ┌───────────────┬──────────────┬───────────────────────────┐
//!   │ lifecycle     │ user ops     │ action dispatch           │
//!   │ before/after_ │ toggles,     │ begin_action /            │
//!   │ execute,      │ versions,    │ finish_action /           │
//!   │ on_select,    │ groups       │ action_executed           │
//!   │ on_structural_│              │                           │
//!   │ change        │              │                           │
//!   └──────┬────────┴──────┬───────┴─────────────┬─────────────┘
//!          ▼               ▼                     ▼
//!   Notebook + IdentityRegistry + MirrorPanel   ActionInterceptor
//!          │                                     │
//!          ▼                                     ▼
//!   DisplayIndex (rebuilt, diffed)           outbox: Vec<PostBody>
//! ```
//!
//! Every mutating operation updates the model first, then rebuilds the
//! display index and returns the ids whose display changed. Reports are
//! queued in the outbox after the mutation, so they always carry the
//! post-mutation snapshot. While a history viewer is open the live document
//! is read-only.

use std::collections::{HashMap, HashSet};

use janus_types::{
    CellContent, CellId, CellKind, MarkerLabel, NotebookConfiguration, Output, PathEntry, PathHash, PostBody,
    PostResponse, Version, Visibility,
};
use serde_json::Value;

use crate::backend::{self, JanusBackend};
use crate::display::{DisplayIndex, document_groups};
use crate::error::{JanusError, Result};
use crate::groups::normalize_label;
use crate::history::HistoryReconstructor;
use crate::interceptor::{ActionInterceptor, ActionPlan, ExecToken, PendingAction, TokenIssuer};
use crate::ledger::VersionLedger;
use crate::mirror::{MirrorPanel, PanelChange, Surface};
use crate::notebook::{Cell, Notebook, Selection};
use crate::registry::IdentityRegistry;
use crate::visibility::Toggle;

/// A structural edit the host performed, replayed onto the model.
#[derive(Clone, Debug, PartialEq)]
pub enum StructuralChange {
    /// A new empty cell at `index`.
    Insert { index: usize, kind: CellKind },
    Delete(Vec<CellId>),
    Move { id: CellId, to: usize },
    /// Split the cell's source at byte offset `at`.
    Split { id: CellId, at: usize },
    /// Merge the listed cells into the first of them (in document order).
    Merge(Vec<CellId>),
    Paste { index: usize, cells: Vec<Cell> },
    ChangeType { id: CellId, kind: CellKind },
}

/// Outcome of a structural change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Applied {
    /// Ids of cells the change created (or re-identified).
    pub created: Vec<CellId>,
    /// Ids whose display changed.
    pub changed: Vec<CellId>,
}

/// A cell execution in flight: the cell and the source it was started with.
#[derive(Clone, Debug, PartialEq)]
struct Running {
    cell: CellId,
    source: String,
}

/// Borrowed version state of one surface.
struct VersionState<'a> {
    ledger: &'a mut VersionLedger,
    live: &'a CellContent,
    show_versions: &'a mut bool,
    all_showing: &'a mut bool,
}

/// All Janus state of one open notebook.
#[derive(Debug)]
pub struct NotebookSession {
    notebook: Notebook,
    selection: Selection,
    registry: IdentityRegistry,
    panel: MirrorPanel,
    display: DisplayIndex,
    interceptor: ActionInterceptor,
    tokens: TokenIssuer,
    executing: HashMap<ExecToken, Running>,
    /// Cells edited since their last execution.
    unexecuted: HashSet<CellId>,
    outbox: Vec<PostBody>,
    history: Option<HistoryReconstructor>,
}

impl NotebookSession {
    /// Take ownership of a freshly loaded notebook.
    ///
    /// Missing or duplicate ids are repaired and `notebook-opened` is queued.
    pub fn open(mut notebook: Notebook, now: u64) -> Self {
        let mut registry = IdentityRegistry::new();
        let generated = registry.ensure_all(&mut notebook);
        if !generated.is_empty() {
            tracing::debug!(count = generated.len(), "assigned cell ids");
        }
        let selection = Selection::default();
        let panel = MirrorPanel::new();
        let display = DisplayIndex::build(&notebook, &selection, &panel);
        let mut session = Self {
            interceptor: ActionInterceptor::new(notebook.meta.track_history),
            notebook,
            selection,
            registry,
            panel,
            display,
            tokens: TokenIssuer::default(),
            executing: HashMap::new(),
            unexecuted: HashSet::new(),
            outbox: Vec::new(),
            history: None,
        };
        tracing::info!(
            path = %session.notebook.path,
            cells = session.notebook.len(),
            "notebook session opened"
        );
        session.emit_event("notebook-opened", now);
        session
    }

    /// Tear down, returning every report not yet drained.
    pub fn close(mut self, now: u64) -> Vec<PostBody> {
        self.emit_event("notebook-closed", now);
        tracing::info!(path = %self.notebook.path, "notebook session closed");
        self.outbox
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn panel(&self) -> &MirrorPanel {
        &self.panel
    }

    pub fn display(&self) -> &DisplayIndex {
        &self.display
    }

    pub fn history(&self) -> Option<&HistoryReconstructor> {
        self.history.as_ref()
    }

    pub fn history_mut(&mut self) -> Option<&mut HistoryReconstructor> {
        self.history.as_mut()
    }

    pub fn is_history_open(&self) -> bool {
        self.history.is_some()
    }

    pub fn tracks_history(&self) -> bool {
        self.notebook.meta.track_history
    }

    pub fn pending_posts(&self) -> &[PostBody] {
        &self.outbox
    }

    /// Take the queued reports for delivery.
    pub fn drain_outbox(&mut self) -> Vec<PostBody> {
        std::mem::take(&mut self.outbox)
    }

    /// Serialized document, `metadata.janus` included.
    pub fn to_json(&self) -> Value {
        self.notebook.to_json()
    }

    // ── Visibility ───────────────────────────────────────────────────────

    pub fn toggle_cell(&mut self, now: u64) -> Result<Vec<CellId>> {
        self.toggle(Toggle::Cell, now)
    }

    pub fn toggle_source(&mut self, now: u64) -> Result<Vec<CellId>> {
        self.toggle(Toggle::Source, now)
    }

    pub fn toggle_output(&mut self, now: u64) -> Result<Vec<CellId>> {
        self.toggle(Toggle::Output, now)
    }

    /// Apply a visibility toggle to the whole selection.
    ///
    /// The primary decides the direction. Mirror text is taken into each
    /// primary before its flags change; a cell that ends up fully visible
    /// loses its mirror.
    pub fn toggle(&mut self, toggle: Toggle, now: u64) -> Result<Vec<CellId>> {
        self.ensure_writable()?;
        let Some(primary) = self.selection.primary.clone() else {
            return Ok(Vec::new());
        };
        let direction = toggle.direction(self.notebook.cell(&primary)?.visibility);

        let mut affected = Vec::with_capacity(self.selection.ids.len());
        for id in &self.selection.ids {
            let Ok(cell) = self.notebook.cell_mut(id) else {
                tracing::warn!(cell = %id, "selected cell missing, skipping");
                continue;
            };
            self.panel.pull_before_execute(cell);
            let next = toggle.apply(direction, cell.visibility, cell.output_count());
            if next == cell.visibility {
                continue;
            }
            cell.visibility = next;
            if next.any_hidden() {
                self.panel.push_from_primary(cell);
            } else {
                self.panel.detach(id);
            }
            affected.push(id.clone());
        }

        if !affected.is_empty() {
            self.log(toggle.log_name(direction), affected, now);
        }
        self.update_panel();
        Ok(self.refresh())
    }

    /// Open every group in the panel, or close the panel if it is open.
    pub fn toggle_all_sections(&mut self) -> Vec<CellId> {
        if self.panel.is_open() {
            self.panel.close();
        } else {
            let ids: Vec<CellId> = self
                .display
                .groups()
                .iter()
                .flat_map(|g| g.cell_ids.iter().cloned())
                .collect();
            self.show_in_panel(&ids);
        }
        self.refresh()
    }

    // ── Mirror panel ─────────────────────────────────────────────────────

    /// Placeholder click: toggle the group's members in the panel.
    pub fn open_group(&mut self, index: usize) -> Result<PanelChange> {
        let groups = self.display.groups();
        let ids = groups
            .get(index)
            .map(|g| g.cell_ids.clone())
            .ok_or(JanusError::GroupOutOfRange {
                index,
                len: groups.len(),
            })?;
        self.open_cells(&ids)
    }

    /// Marker click on a partially hidden cell.
    pub fn open_mirror(&mut self, id: &CellId) -> Result<PanelChange> {
        self.open_cells(std::slice::from_ref(id))
    }

    fn open_cells(&mut self, ids: &[CellId]) -> Result<PanelChange> {
        let cells = ids
            .iter()
            .map(|id| self.notebook.cell(id))
            .collect::<Result<Vec<&Cell>>>()?;
        let change = self.panel.toggle(&cells);
        tracing::debug!(?change, cells = ids.len(), "mirror panel toggled");
        self.refresh();
        Ok(change)
    }

    /// Give editor focus to one surface of a cell.
    pub fn focus(&mut self, id: &CellId, surface: Surface) -> Vec<CellId> {
        self.panel.focus(id, surface);
        self.refresh()
    }

    /// Label the group at `index`; an empty label restores the default.
    pub fn set_group_label(&mut self, index: usize, label: &str) -> Result<Vec<CellId>> {
        self.ensure_writable()?;
        let groups = self.display.groups();
        let group = groups
            .get(index)
            .cloned()
            .ok_or(JanusError::GroupOutOfRange {
                index,
                len: groups.len(),
            })?;
        let markers = &mut self.notebook.meta.janus_markers;
        markers.retain(|m| !m.ids.iter().any(|id| group.contains(id)));
        markers.push(MarkerLabel {
            ids: group.cell_ids.clone(),
            marker_name: normalize_label(label),
        });
        self.display.relabel(&self.notebook.meta);
        Ok(group.cell_ids)
    }

    // ── Lifecycle hooks ──────────────────────────────────────────────────

    /// An edit from one surface. Only the focused surface is accepted.
    pub fn on_edit(&mut self, id: &CellId, surface: Surface, text: &str) -> Result<Vec<CellId>> {
        self.ensure_writable()?;
        let cell = self.notebook.cell_mut(id)?;
        self.panel.sync_on_edit(cell, surface, text)?;
        self.unexecuted.insert(id.clone());
        Ok(self.refresh())
    }

    /// The host selection changed.
    ///
    /// Cells left with unexecuted edits are reported as `unselect-cell`.
    pub fn on_select(&mut self, selection: Selection, now: u64) -> Vec<CellId> {
        let left: Vec<CellId> = self
            .selection
            .ids
            .iter()
            .filter(|id| !selection.contains(id))
            .cloned()
            .collect();
        for id in left {
            if self.unexecuted.remove(&id) {
                let record = self.interceptor.record_event(
                    "unselect-cell",
                    &Selection::single(id),
                    &self.notebook,
                    now,
                );
                if let Some(record) = record {
                    self.outbox.push(record.into());
                }
            }
        }
        self.selection = selection;
        self.refresh()
    }

    /// About to execute `id`. Returns the token to report completion with.
    pub fn before_execute(&mut self, id: &CellId) -> Result<ExecToken> {
        self.ensure_writable()?;
        let cell = self.notebook.cell_mut(id)?;
        if cell.visibility.source_hidden && self.panel.pull_before_execute(cell) {
            tracing::debug!(cell = %id, "took mirror source before execution");
        }
        let source = cell.content.source.clone();
        let token = self.tokens.issue();
        self.executing.insert(
            token,
            Running {
                cell: id.clone(),
                source,
            },
        );
        Ok(token)
    }

    /// Execution identified by `token` finished with `outputs`.
    ///
    /// Records the source the run started with plus `outputs` as a version,
    /// prunes superseded versions, and pushes the result to the mirror. An
    /// edit made while the cell ran stays live and unexecuted. Unknown or
    /// repeated tokens, and cells deleted meanwhile, are ignored.
    pub fn after_execute(
        &mut self,
        token: ExecToken,
        outputs: Vec<Output>,
        execution_count: Option<u64>,
        now: u64,
    ) -> Vec<CellId> {
        let Some(Running { cell: id, source }) = self.executing.remove(&token) else {
            tracing::debug!(%token, "completion for unknown execution ignored");
            return Vec::new();
        };
        let Ok(cell) = self.notebook.cell_mut(&id) else {
            tracing::warn!(cell = %id, "executed cell no longer exists");
            return Vec::new();
        };
        let edited_meanwhile = cell.content.source != source;
        cell.content.outputs = outputs;
        cell.execution_count = execution_count;
        let executed = CellContent {
            source,
            ..cell.content.clone()
        };
        let index = cell.ledger.record(id.clone(), executed, now);
        let pruned = cell.ledger.prune_duplicates();
        tracing::debug!(cell = %id, version = index, pruned, "version recorded");
        self.panel.push_from_primary(cell);
        if edited_meanwhile {
            self.unexecuted.insert(id);
        } else {
            self.unexecuted.remove(&id);
        }
        self.refresh()
    }

    /// Replay a structural edit onto the model.
    pub fn on_structural_change(&mut self, change: StructuralChange) -> Result<Applied> {
        self.ensure_writable()?;
        let created = match change {
            StructuralChange::Insert { index, kind } => vec![self.insert(index, kind)],
            StructuralChange::Delete(ids) => {
                self.delete(&ids);
                Vec::new()
            }
            StructuralChange::Move { id, to } => {
                let from = self
                    .notebook
                    .position(&id)
                    .ok_or_else(|| JanusError::CellNotFound(id.clone()))?;
                let cell = self.notebook.cells.remove(from);
                let to = to.min(self.notebook.len());
                self.notebook.cells.insert(to, cell);
                Vec::new()
            }
            StructuralChange::Split { id, at } => vec![self.split(&id, at)?],
            StructuralChange::Merge(ids) => {
                self.merge(&ids);
                Vec::new()
            }
            StructuralChange::Paste { index, cells } => self.paste(index, cells),
            StructuralChange::ChangeType { id, kind } => self.change_type(&id, kind)?,
        };
        self.panel.prune_dangling(&self.notebook);
        self.update_panel();
        let changed = self.refresh();
        Ok(Applied { created, changed })
    }

    fn insert(&mut self, index: usize, kind: CellKind) -> CellId {
        let index = index.min(self.notebook.len());
        let mut cell = Cell::new(kind, "");
        let id = self.registry.ensure_id(&mut cell);
        // A cell inserted after a hidden cell joins its group.
        let after_hidden = index > 0 && self.notebook.cells[index - 1].visibility.cell_hidden;
        if after_hidden {
            cell.visibility = Visibility::HIDDEN;
        }
        self.notebook.cells.insert(index, cell);
        id
    }

    fn delete(&mut self, ids: &[CellId]) {
        self.notebook.cells.retain(|c| !ids.contains(&c.id));
        for id in ids {
            self.registry.release(id);
            self.panel.detach(id);
            self.unexecuted.remove(id);
        }
        self.selection.ids.retain(|id| !ids.contains(id));
        if self.selection.primary.as_ref().is_some_and(|p| ids.contains(p)) {
            self.selection.primary = self.selection.ids.first().cloned();
        }
    }

    fn split(&mut self, id: &CellId, at: usize) -> Result<CellId> {
        let pos = self
            .notebook
            .position(id)
            .ok_or_else(|| JanusError::CellNotFound(id.clone()))?;
        let cell = &mut self.notebook.cells[pos];
        self.panel.pull_before_execute(cell);

        let source = &cell.content.source;
        let mut at = at.min(source.len());
        while !source.is_char_boundary(at) {
            at -= 1;
        }
        let tail = source[at..].to_string();
        cell.content.source.truncate(at);
        cell.content.outputs.clear();
        let mut second = Cell::new(cell.kind(), tail).with_visibility(cell.visibility);
        self.panel.push_from_primary(cell);

        let new_id = self.registry.ensure_id(&mut second);
        self.notebook.cells.insert(pos + 1, second);
        Ok(new_id)
    }

    fn merge(&mut self, ids: &[CellId]) {
        let mut positions: Vec<usize> = ids.iter().filter_map(|id| self.notebook.position(id)).collect();
        positions.sort_unstable();
        positions.dedup();
        let Some((&first, rest)) = positions.split_first() else {
            return;
        };
        if rest.is_empty() {
            return;
        }
        let absorbed: Vec<CellId> = rest.iter().map(|&p| self.notebook.cells[p].id.clone()).collect();
        let mut source = self.notebook.cells[first].content.source.clone();
        for &p in rest {
            source.push('\n');
            source.push_str(&self.notebook.cells[p].content.source);
        }
        let target = &mut self.notebook.cells[first];
        target.content.source = source;
        target.content.outputs.clear();
        self.panel.push_from_primary(target);
        self.delete(&absorbed);
    }

    fn paste(&mut self, index: usize, cells: Vec<Cell>) -> Vec<CellId> {
        let mut index = index.min(self.notebook.len());
        let mut created = Vec::with_capacity(cells.len());
        for mut cell in cells {
            created.push(self.registry.reidentify(&mut cell));
            self.notebook.cells.insert(index, cell);
            index += 1;
        }
        created
    }

    fn change_type(&mut self, id: &CellId, kind: CellKind) -> Result<Vec<CellId>> {
        let cell = self.notebook.cell_mut(id)?;
        if cell.kind() == kind {
            return Ok(Vec::new());
        }
        cell.content.cell_type = kind;
        if kind != CellKind::Code {
            cell.content.outputs.clear();
            cell.execution_count = None;
        }
        self.registry.release(id);
        let new_id = self.registry.reidentify(cell);
        self.panel.detach(id);
        self.unexecuted.remove(id);
        for selected in &mut self.selection.ids {
            if selected == id {
                *selected = new_id.clone();
            }
        }
        if self.selection.primary.as_ref() == Some(id) {
            self.selection.primary = Some(new_id.clone());
        }
        Ok(vec![new_id])
    }

    // ── Action tracking ──────────────────────────────────────────────────

    /// Host action dispatch is about to run `name`.
    pub fn begin_action(&mut self, name: &str, now: u64) -> ActionPlan {
        let kind = self
            .selection
            .primary
            .as_ref()
            .and_then(|id| self.notebook.cell(id).ok())
            .map(Cell::kind);
        self.interceptor
            .begin(name, &self.selection, kind, &mut self.tokens, now)
    }

    /// The host performed an immediate action.
    pub fn finish_action(&mut self, pending: PendingAction) {
        if let Some(record) = self.interceptor.complete(pending, &self.notebook) {
            self.outbox.push(record.into());
        }
    }

    /// Execution triggered by a deferred action completed.
    pub fn action_executed(&mut self, token: ExecToken) {
        if let Some(record) = self.interceptor.on_execution_complete(token, &self.notebook) {
            self.outbox.push(record.into());
        }
    }

    /// Forget deferred actions older than `max_age_ms`.
    pub fn expire_actions(&mut self, now: u64, max_age_ms: u64) -> usize {
        self.interceptor.expire(now, max_age_ms)
    }

    // ── Versions ─────────────────────────────────────────────────────────

    // Navigation first stashes unexecuted live content as a draft so that
    // stepping back to it restores it.

    pub fn previous_version(&mut self, id: &CellId, surface: Surface) -> Result<Vec<CellId>> {
        self.with_versions(id, surface, true, |s| {
            s.ledger.stash_live(id, s.live);
            Ok(s.ledger.previous())
        })?;
        Ok(self.refresh())
    }

    pub fn next_version(&mut self, id: &CellId, surface: Surface) -> Result<Vec<CellId>> {
        self.with_versions(id, surface, true, |s| {
            s.ledger.stash_live(id, s.live);
            Ok(s.ledger.next())
        })?;
        Ok(self.refresh())
    }

    pub fn go_to_version(&mut self, id: &CellId, surface: Surface, index: usize) -> Result<Vec<CellId>> {
        self.with_versions(id, surface, true, |s| {
            s.ledger.stash_live(id, s.live);
            s.ledger.go_to(index).map(|_| ())
        })?;
        Ok(self.refresh())
    }

    /// Delete the displayed version. The last remaining one cannot go.
    pub fn delete_version(&mut self, id: &CellId, surface: Surface) -> Result<Version> {
        let removed = self.with_versions(id, surface, true, |s| s.ledger.delete_current())?;
        self.refresh();
        Ok(removed)
    }

    pub fn name_version(
        &mut self,
        id: &CellId,
        surface: Surface,
        index: usize,
        label: &str,
    ) -> Result<Vec<CellId>> {
        self.with_versions(id, surface, false, |s| s.ledger.name(index, label))?;
        Ok(self.refresh())
    }

    /// Show or hide the cell's version markers.
    pub fn toggle_versions(&mut self, id: &CellId, surface: Surface) -> Result<Vec<CellId>> {
        self.with_versions(id, surface, false, |s| {
            *s.show_versions = !*s.show_versions;
            Ok(())
        })?;
        Ok(self.refresh())
    }

    /// Expand or condense the marker list.
    pub fn toggle_all_versions(&mut self, id: &CellId, surface: Surface) -> Result<Vec<CellId>> {
        self.with_versions(id, surface, false, |s| {
            *s.all_showing = !*s.all_showing;
            Ok(())
        })?;
        Ok(self.refresh())
    }

    /// Run a version mutation on one surface and replay it onto the other.
    fn with_versions<T>(
        &mut self,
        id: &CellId,
        surface: Surface,
        redisplay: bool,
        op: impl FnOnce(VersionState<'_>) -> Result<T>,
    ) -> Result<T> {
        self.ensure_writable()?;
        let cell = self.notebook.cell_mut(id)?;
        match surface {
            Surface::Primary => {
                let out = op(VersionState {
                    ledger: &mut cell.ledger,
                    live: &cell.content,
                    show_versions: &mut cell.show_versions,
                    all_showing: &mut cell.all_versions_showing,
                })?;
                if redisplay {
                    cell.display_current_version();
                }
                self.panel.push_from_primary(cell);
                Ok(out)
            }
            Surface::Mirror => {
                let mirror = self
                    .panel
                    .get_mut(id)
                    .ok_or_else(|| JanusError::CellNotFound(id.clone()))?;
                let out = op(VersionState {
                    ledger: &mut mirror.ledger,
                    live: &mirror.content,
                    show_versions: &mut mirror.show_versions,
                    all_showing: &mut mirror.all_versions_showing,
                })?;
                if redisplay {
                    mirror.display_current_version();
                }
                self.panel.replay_onto_primary(cell);
                Ok(out)
            }
        }
    }

    /// Replace a cell's ledger with history fetched from the server.
    pub fn apply_cell_history(&mut self, id: &CellId, fetched: Vec<Version>) -> Result<Vec<CellId>> {
        let cell = self.notebook.cell_mut(id)?;
        let live = cell.content.clone();
        cell.ledger.rebuild_from_history(id, fetched, &live);
        self.panel.push_from_primary(cell);
        Ok(self.refresh())
    }

    /// Fetch a cell's history across all historical paths and apply it.
    pub async fn load_cell_history(
        &mut self,
        id: &CellId,
        backend: &dyn JanusBackend,
    ) -> Result<Vec<CellId>> {
        self.notebook.cell(id)?;
        let fetched = backend::load_cell_history(
            backend,
            &self.notebook.path,
            id,
            &self.notebook.meta.filepaths,
        )
        .await;
        self.apply_cell_history(id, fetched)
    }

    // ── History viewer ───────────────────────────────────────────────────

    /// Open the history viewer over an already merged timeline.
    pub fn open_history(&mut self, timeline: Vec<NotebookConfiguration>) -> &mut HistoryReconstructor {
        self.panel.set_read_only(true);
        tracing::info!(revisions = timeline.len(), "history viewer opened");
        self.history.insert(HistoryReconstructor::new(timeline))
    }

    /// Load the timeline across all historical paths and open the viewer.
    pub async fn load_history(&mut self, backend: &dyn JanusBackend) -> &mut HistoryReconstructor {
        let timeline =
            backend::load_timeline(backend, &self.notebook.path, &self.notebook.meta.filepaths).await;
        self.open_history(timeline)
    }

    pub fn close_history(&mut self) {
        if self.history.take().is_some() {
            tracing::info!("history viewer closed");
        }
        self.panel.set_read_only(false);
    }

    // ── Recording ────────────────────────────────────────────────────────

    /// Note the server's hash of the current path.
    ///
    /// Returns true when the hash differs from the last entry (first save or
    /// rename), in which case a new `[hash, now, now]` entry is appended.
    pub fn record_path(&mut self, hash: PathHash, now: u64) -> bool {
        let paths = &mut self.notebook.meta.filepaths;
        match paths.last_mut() {
            Some(last) if last.hash == hash => {
                last.last_seen = now;
                false
            }
            _ => {
                tracing::info!(path = %hash, entries = paths.len() + 1, "recording new notebook path");
                paths.push(PathEntry {
                    hash,
                    first_seen: now,
                    last_seen: now,
                });
                true
            }
        }
    }

    /// The host renamed or moved the notebook file.
    ///
    /// The new path's hash is learned from the next post response.
    pub fn rename(&mut self, path: impl Into<String>) {
        let path = path.into();
        tracing::info!(from = %self.notebook.path, to = %path, "notebook renamed");
        self.notebook.path = path;
    }

    pub fn on_post_response(&mut self, response: PostResponse, now: u64) -> bool {
        match response.hashed_nb_path {
            Some(hash) => self.record_path(hash, now),
            None => false,
        }
    }

    /// Flip `track_history`. Returns the new value.
    pub fn toggle_history_recording(&mut self) -> bool {
        let enabled = !self.notebook.meta.track_history;
        self.notebook.meta.track_history = enabled;
        self.interceptor.set_enabled(enabled);
        tracing::info!(enabled, "history recording toggled");
        enabled
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn ensure_writable(&self) -> Result<()> {
        if self.history.is_some() {
            Err(JanusError::HistoryReadOnly)
        } else {
            Ok(())
        }
    }

    fn emit_event(&mut self, name: &str, now: u64) {
        if let Some(record) = self
            .interceptor
            .record_event(name, &self.selection, &self.notebook, now)
        {
            self.outbox.push(record.into());
        }
    }

    fn log(&mut self, name: &str, ids: Vec<CellId>, now: u64) {
        if self.notebook.meta.track_history {
            self.outbox
                .push(PostBody::log(now, name, self.selection.primary.clone(), ids));
        }
    }

    /// Keep the panel consistent after hidden flags changed.
    ///
    /// If no mirrored cell is still hidden the panel closes; otherwise it
    /// shows the group (or the single partially hidden cell) of the first
    /// one that is.
    fn update_panel(&mut self) {
        if !self.panel.is_open() {
            return;
        }
        let anchor = self.panel.shown_ids().into_iter().find(|id| {
            self.notebook
                .cell(id)
                .map(|c| c.visibility.any_hidden())
                .unwrap_or(false)
        });
        let Some(anchor) = anchor else {
            self.panel.close();
            return;
        };
        let members = document_groups(&self.notebook)
            .into_iter()
            .find(|g| g.contains(&anchor))
            .map(|g| g.cell_ids)
            .unwrap_or_else(|| vec![anchor]);
        self.show_in_panel(&members);
    }

    /// Show exactly `ids` in the panel, refreshing mirrors already there.
    fn show_in_panel(&mut self, ids: &[CellId]) {
        let replaced = self.panel.shown_ids() != ids;
        if replaced {
            self.panel.close();
        }
        for id in ids {
            if let Ok(cell) = self.notebook.cell(id) {
                self.panel.attach(cell);
            }
        }
        if let (true, Some(first)) = (replaced, ids.first()) {
            self.panel.focus(first, Surface::Mirror);
        }
    }

    /// Rebuild the display index and return what changed.
    fn refresh(&mut self) -> Vec<CellId> {
        self.panel.prune_dangling(&self.notebook);
        self.panel.mirror_selection(&self.notebook, &self.selection.ids);
        let next = DisplayIndex::build(&self.notebook, &self.selection, &self.panel);
        let changed = next.changed_since(&self.display);
        self.display = next;
        changed
    }
}

// ============================================================================
// Tests
// ============================================================================
