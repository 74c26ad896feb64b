//! Mirror views of hidden cells.
//!
//! A hidden primary cell can be viewed and edited out-of-line through a
//! mirror shown in the side panel. The panel holds at most one mirror per
//! primary; the pair is linked by the primary's id, so a mirror whose
//! primary disappears is simply dropped (treated as "no mirror").
//!
//! ```text
//!   primary (in document)            mirror (in panel)
//!  ┌─────────────────────┐  edit   ┌─────────────────────┐
//!  │ source / outputs    │◀───────▶│ source / outputs    │
//!  │ ledger              │  replay │ ledger              │
//!  └─────────────────────┘         └─────────────────────┘
//!            ▲                                 ▲
//!            └──────── exactly one surface has focus ──┘
//! ```
//!
//! Only the focused surface accepts edits; the other side receives every
//! change. While the panel is read-only (history playback) neither side of
//! a mirrored pair accepts edits.

use indexmap::IndexMap;

use janus_types::{CellContent, CellId, CellKind};

use crate::error::{JanusError, Result};
use crate::ledger::VersionLedger;
use crate::notebook::{Cell, Notebook};

/// Which representation of a cell an edit or focus event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Surface {
    Primary,
    Mirror,
}

/// A duplicate view of a primary cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Mirror {
    pub primary: CellId,
    pub content: CellContent,
    pub ledger: VersionLedger,
    pub show_versions: bool,
    pub all_versions_showing: bool,
    pub selected: bool,
    pub focused: bool,
}

impl Mirror {
    fn of(primary: &Cell) -> Self {
        Self {
            primary: primary.id.clone(),
            content: primary.content.clone(),
            ledger: primary.ledger.clone(),
            show_versions: primary.show_versions,
            all_versions_showing: primary.all_versions_showing,
            selected: false,
            focused: false,
        }
    }

    pub fn kind(&self) -> CellKind {
        self.content.cell_type
    }

    /// Copy content and version state from the primary.
    fn refresh(&mut self, primary: &Cell) {
        self.content = primary.content.clone();
        self.replay_ledger_from(primary);
    }

    /// Show the ledger's current version as the mirror's content.
    pub(crate) fn display_current_version(&mut self) {
        if let Some(v) = self.ledger.current() {
            self.content.source = v.content.source.clone();
            self.content.outputs = v.content.outputs.clone();
        }
    }

    fn replay_ledger_from(&mut self, primary: &Cell) {
        self.ledger = primary.ledger.clone();
        self.show_versions = primary.show_versions;
        self.all_versions_showing = primary.all_versions_showing;
    }
}

/// What an open request did to the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelChange {
    Opened,
    Replaced,
    Closed,
}

/// The side panel: the set of live mirrors, in display order.
#[derive(Debug, Default)]
pub struct MirrorPanel {
    mirrors: IndexMap<CellId, Mirror>,
    read_only: bool,
}

impl MirrorPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        !self.mirrors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn get(&self, primary: &CellId) -> Option<&Mirror> {
        self.mirrors.get(primary)
    }

    pub fn has_mirror(&self, primary: &CellId) -> bool {
        self.mirrors.contains_key(primary)
    }

    pub fn mirrors(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.values()
    }

    pub fn shown_ids(&self) -> Vec<CellId> {
        self.mirrors.keys().cloned().collect()
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Show `cells` in the panel, toggling it like the placeholder does.
    ///
    /// A closed panel opens; an open panel showing other cells switches to
    /// these; an open panel already showing exactly these closes.
    pub fn toggle(&mut self, cells: &[&Cell]) -> PanelChange {
        let requested: Vec<&CellId> = cells.iter().map(|c| &c.id).collect();
        let shown: Vec<&CellId> = self.mirrors.keys().collect();
        if !self.mirrors.is_empty() && shown == requested {
            self.close();
            return PanelChange::Closed;
        }
        let change = if self.mirrors.is_empty() {
            PanelChange::Opened
        } else {
            PanelChange::Replaced
        };
        self.mirrors.clear();
        for cell in cells {
            self.attach(cell);
        }
        if let Some(first) = self.mirrors.values_mut().next() {
            first.focused = true;
        }
        change
    }

    /// Attach (or refresh) the mirror for `primary` and return it.
    pub fn attach(&mut self, primary: &Cell) -> &Mirror {
        let entry = self
            .mirrors
            .entry(primary.id.clone())
            .and_modify(|m| m.refresh(primary))
            .or_insert_with(|| Mirror::of(primary));
        tracing::debug!(cell = %primary.id, "mirror attached");
        entry
    }

    /// Destroy the mirror for `primary`, if any. Returns it.
    pub fn detach(&mut self, primary: &CellId) -> Option<Mirror> {
        let removed = self.mirrors.shift_remove(primary);
        if removed.is_some() {
            tracing::debug!(cell = %primary, "mirror detached");
        }
        removed
    }

    pub fn close(&mut self) {
        self.mirrors.clear();
    }

    /// Drop mirrors whose primary no longer exists.
    pub fn prune_dangling(&mut self, notebook: &Notebook) -> Vec<CellId> {
        let dangling: Vec<CellId> = self
            .mirrors
            .keys()
            .filter(|id| notebook.position(id).is_none())
            .cloned()
            .collect();
        for id in &dangling {
            tracing::warn!(cell = %id, "mirror without primary, dropping");
            self.mirrors.shift_remove(id);
        }
        dangling
    }

    // ── Focus & edits ────────────────────────────────────────────────────

    /// Give editor focus to one surface of a mirrored pair.
    pub fn focus(&mut self, primary: &CellId, surface: Surface) {
        for (id, m) in self.mirrors.iter_mut() {
            m.focused = id == primary && surface == Surface::Mirror;
        }
    }

    /// Which surface of `primary` accepts edits.
    pub fn editable_surface(&self, primary: &CellId) -> Option<Surface> {
        match self.mirrors.get(primary) {
            None => Some(Surface::Primary),
            Some(_) if self.read_only => None,
            Some(m) if m.focused => Some(Surface::Mirror),
            Some(_) => Some(Surface::Primary),
        }
    }

    pub fn check_editable(&self, primary: &CellId, surface: Surface) -> Result<()> {
        if self.editable_surface(primary) == Some(surface) {
            Ok(())
        } else {
            Err(JanusError::SurfaceNotEditable {
                cell: primary.clone(),
                surface,
            })
        }
    }

    /// Push an edit from the focused surface to the other one.
    pub fn sync_on_edit(&mut self, primary: &mut Cell, surface: Surface, text: &str) -> Result<()> {
        self.check_editable(&primary.id, surface)?;
        primary.content.source = text.to_string();
        if let Some(m) = self.mirrors.get_mut(&primary.id) {
            m.content.source = text.to_string();
        }
        Ok(())
    }

    /// Before executing a primary: take the mirror's text as authoritative.
    pub fn pull_before_execute(&self, primary: &mut Cell) -> bool {
        match self.mirrors.get(&primary.id) {
            Some(m) if m.content.source != primary.content.source => {
                primary.content.source = m.content.source.clone();
                true
            }
            _ => false,
        }
    }

    /// After execution or any version change: push primary state to the mirror.
    pub fn push_from_primary(&mut self, primary: &Cell) {
        if let Some(m) = self.mirrors.get_mut(&primary.id) {
            m.refresh(primary);
        }
    }

    /// Replay a version mutation performed on the mirror onto its primary.
    pub fn replay_onto_primary(&self, primary: &mut Cell) {
        if let Some(m) = self.mirrors.get(&primary.id) {
            primary.ledger = m.ledger.clone();
            primary.show_versions = m.show_versions;
            primary.all_versions_showing = m.all_versions_showing;
            primary.content.source = m.content.source.clone();
            primary.content.outputs = m.content.outputs.clone();
        }
    }

    pub(crate) fn get_mut(&mut self, primary: &CellId) -> Option<&mut Mirror> {
        self.mirrors.get_mut(primary)
    }

    // ── Selection ────────────────────────────────────────────────────────

    /// Selecting a hidden primary selects its mirror.
    pub fn mirror_selection(&mut self, notebook: &Notebook, selected: &[CellId]) {
        for (id, m) in self.mirrors.iter_mut() {
            let hidden = notebook
                .cell(id)
                .map(|c| c.visibility.any_hidden())
                .unwrap_or(false);
            m.selected = hidden && selected.contains(id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
