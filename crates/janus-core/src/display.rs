//! Derived display state.
//!
//! The display index maps every cell id (and every mirror) to what the host
//! should draw: which segments are visible, which markers appear, and which
//! placeholder group the cell folds into. It is a pure function of the
//! notebook, the selection, and the mirror panel; hosts never read state back
//! out of rendered elements.

use indexmap::IndexMap;

use janus_types::{CellId, NotebookMeta, VisibilityState};

use crate::groups::{Group, GroupMember, compute_groups};
use crate::ledger::MarkerPlan;
use crate::mirror::MirrorPanel;
use crate::notebook::{Notebook, Selection};

/// How one primary cell is drawn in the document flow.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellDisplay {
    pub state: VisibilityState,
    pub show_source: bool,
    pub show_output: bool,
    /// Marker standing in for a hidden source of a partially visible cell.
    pub hidden_source_marker: bool,
    /// Marker standing in for hidden output.
    pub hidden_output_marker: bool,
    /// Version markers, when the cell shows versions.
    pub versions: Option<MarkerPlan>,
    pub selected: bool,
    /// Index into [`DisplayIndex::groups`] for folded cells.
    pub group: Option<usize>,
}

/// How one mirror is drawn in the side panel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MirrorDisplay {
    /// A mirror shows the parts hidden in the document.
    pub show_source: bool,
    pub show_output: bool,
    pub versions: Option<MarkerPlan>,
    pub selected: bool,
    pub editable: bool,
}

/// The whole derived view of a document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayIndex {
    cells: IndexMap<CellId, CellDisplay>,
    mirrors: IndexMap<CellId, MirrorDisplay>,
    groups: Vec<Group>,
}

impl DisplayIndex {
    /// Compute the display of every cell, mirror, and group.
    pub fn build(notebook: &Notebook, selection: &Selection, panel: &MirrorPanel) -> Self {
        let groups = document_groups(notebook);

        let mut cells = IndexMap::with_capacity(notebook.len());
        for cell in &notebook.cells {
            let v = cell.visibility;
            let selected = selection.contains(&cell.id);
            let group = groups.iter().position(|g| g.contains(&cell.id));
            cells.insert(
                cell.id.clone(),
                CellDisplay {
                    state: v.state(),
                    show_source: !v.source_hidden,
                    show_output: !v.output_hidden,
                    hidden_source_marker: v.source_hidden && !v.cell_hidden,
                    hidden_output_marker: v.output_hidden && !v.cell_hidden,
                    versions: cell.show_versions.then(|| {
                        cell.ledger
                            .marker_plan(&cell.content, selected, cell.all_versions_showing)
                    }),
                    selected,
                    group,
                },
            );
        }

        let mut mirrors = IndexMap::with_capacity(panel.len());
        for m in panel.mirrors() {
            let Ok(primary) = notebook.cell(&m.primary) else {
                continue;
            };
            let v = primary.visibility;
            mirrors.insert(
                m.primary.clone(),
                MirrorDisplay {
                    show_source: v.source_hidden,
                    show_output: v.output_hidden,
                    versions: m.show_versions.then(|| {
                        m.ledger
                            .marker_plan(&m.content, m.selected, m.all_versions_showing)
                    }),
                    selected: m.selected,
                    editable: panel.editable_surface(&m.primary)
                        == Some(crate::mirror::Surface::Mirror),
                },
            );
        }

        Self {
            cells,
            mirrors,
            groups,
        }
    }

    pub fn cell(&self, id: &CellId) -> Option<&CellDisplay> {
        self.cells.get(id)
    }

    pub fn mirror(&self, id: &CellId) -> Option<&MirrorDisplay> {
        self.mirrors.get(id)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellId, &CellDisplay)> {
        self.cells.iter()
    }

    /// Ids whose cell or mirror display differs between `self` and `other`.
    pub fn changed_since(&self, other: &DisplayIndex) -> Vec<CellId> {
        let mut changed = Vec::new();
        for (id, d) in &self.cells {
            let differs = other.cells.get(id) != Some(d) || other.mirrors.get(id) != self.mirrors.get(id);
            if differs {
                changed.push(id.clone());
            }
        }
        for id in other.cells.keys() {
            if !self.cells.contains_key(id) {
                changed.push(id.clone());
            }
        }
        changed
    }

    /// Re-label from fresh metadata without recomputing cells.
    pub fn relabel(&mut self, meta: &NotebookMeta) {
        for g in &mut self.groups {
            g.label = crate::groups::normalize_label(meta.label_for(&g.cell_ids).unwrap_or(""));
        }
    }
}

/// Groups of the live document, labelled from its metadata.
pub fn document_groups(notebook: &Notebook) -> Vec<Group> {
    compute_groups(
        notebook.cells.iter().map(|c| GroupMember {
            id: &c.id,
            kind: c.kind(),
            source: c.source(),
            hidden: c.visibility.cell_hidden,
            changed: false,
        }),
        &notebook.meta,
    )
}
