//! Stable cell identity.
//!
//! Every live cell carries a unique [`CellId`] stored in its metadata. Ids
//! are position-independent, survive save/reload, and are never copied: a
//! duplicated, split, or pasted cell always receives a fresh id.
//!
//! A duplicate id among live cells is corruption. The later cell is treated
//! as newly created and re-identified.

use std::collections::HashSet;

use janus_types::CellId;

use crate::notebook::{Cell, Notebook};

/// Tracks which ids are live in one notebook.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    live: HashSet<CellId>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign ids to every cell missing one and repair duplicates.
    ///
    /// Returns the ids that were generated (including repaired duplicates).
    pub fn ensure_all(&mut self, notebook: &mut Notebook) -> Vec<CellId> {
        self.live.clear();
        let mut seen = HashSet::with_capacity(notebook.len());
        let mut generated = Vec::new();
        for cell in &mut notebook.cells {
            if !cell.id.is_empty() && seen.contains(&cell.id) {
                tracing::warn!(cell = %cell.id, "duplicate cell id, assigning a fresh one");
                cell.id = self.fresh_id();
                generated.push(cell.id.clone());
            } else if cell.id.is_empty() {
                generated.push(self.ensure_id(cell));
            } else {
                self.ensure_id(cell);
            }
            seen.insert(cell.id.clone());
        }
        generated
    }

    /// Return the cell's id, generating one only if it has none.
    ///
    /// Repeated calls on the same cell return the same id. Copies must go
    /// through [`IdentityRegistry::reidentify`] instead.
    pub fn ensure_id(&mut self, cell: &mut Cell) -> CellId {
        if cell.id.is_empty() {
            cell.id = self.fresh_id();
        } else {
            self.live.insert(cell.id.clone());
        }
        cell.id.clone()
    }

    /// Generate an id that is not live, and mark it live.
    pub fn fresh_id(&mut self) -> CellId {
        loop {
            let id = CellId::generate();
            if self.live.insert(id.clone()) {
                return id;
            }
        }
    }

    /// Give a copied cell (duplicate/split/paste) its own identity.
    pub fn reidentify(&mut self, cell: &mut Cell) -> CellId {
        cell.id = self.fresh_id();
        cell.id.clone()
    }

    pub fn release(&mut self, id: &CellId) {
        self.live.remove(id);
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.live.contains(id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
