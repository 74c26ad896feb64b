//! Persisted `janus` metadata objects.
//!
//! Per cell, under `cell.metadata.janus`:
//!
//! | key               | meaning                                 |
//! |-------------------|-----------------------------------------|
//! | `id`              | stable cell id                          |
//! | `cell_hidden`     | whole cell hidden                       |
//! | `source_hidden`   | source hidden                           |
//! | `output_hidden`   | output hidden                           |
//! | `show_versions`   | version markers shown                   |
//! | `versions_showing`| all version markers expanded            |
//! | `versions`        | version ledger                          |
//! | `current_version` | ledger cursor                           |
//! | `named_versions`  | permanent named versions                |
//!
//! Per notebook, under `notebook.metadata.janus`: `track_history`,
//! `filepaths` (`[[hash, firstSeen, lastSeen], ...]`), and `janus_markers`
//! (`[{ids, markerName}, ...]`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CellId, PathHash};
use crate::version::Version;
use crate::visibility::Visibility;

/// Default label of a folded group placeholder.
pub const DEFAULT_GROUP_LABEL: &str = "Folded Cells";

/// The per-cell `janus` object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CellId>,
    #[serde(flatten)]
    pub visibility: Visibility,
    #[serde(default)]
    pub show_versions: bool,
    #[serde(default)]
    pub versions_showing: bool,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub current_version: usize,
    #[serde(default)]
    pub named_versions: Vec<Version>,
}

/// One entry of the path registry: a notebook path hash and the time range
/// during which the notebook lived at that path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(PathHash, u64, u64)", into = "(PathHash, u64, u64)")]
pub struct PathEntry {
    pub hash: PathHash,
    pub first_seen: u64,
    pub last_seen: u64,
}

impl From<(PathHash, u64, u64)> for PathEntry {
    fn from((hash, first_seen, last_seen): (PathHash, u64, u64)) -> Self {
        Self {
            hash,
            first_seen,
            last_seen,
        }
    }
}

impl From<PathEntry> for (PathHash, u64, u64) {
    fn from(e: PathEntry) -> Self {
        (e.hash, e.first_seen, e.last_seen)
    }
}

/// A persisted group label, keyed by the member ids at labelling time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerLabel {
    pub ids: Vec<CellId>,
    #[serde(rename = "markerName")]
    pub marker_name: String,
}

/// The notebook-level `janus` object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotebookMeta {
    #[serde(default = "default_true")]
    pub track_history: bool,
    #[serde(default)]
    pub filepaths: Vec<PathEntry>,
    #[serde(default)]
    pub janus_markers: Vec<MarkerLabel>,
}

fn default_true() -> bool {
    true
}

impl Default for NotebookMeta {
    fn default() -> Self {
        Self {
            track_history: true,
            filepaths: Vec::new(),
            janus_markers: Vec::new(),
        }
    }
}

impl NotebookMeta {
    /// Read from a notebook's `metadata` object.
    ///
    /// Files written by older versions keep `track_history`, `filepaths`, and
    /// `janus_markers` at the top level of `metadata`; those are migrated
    /// into the result when the `janus` object lacks them.
    pub fn from_notebook_metadata(metadata: &Value) -> Result<Self, serde_json::Error> {
        let mut merged = serde_json::Map::new();
        for key in ["track_history", "filepaths", "janus_markers"] {
            if let Some(v) = metadata.get(key) {
                merged.insert(key.to_string(), v.clone());
            }
        }
        if let Some(Value::Object(janus)) = metadata.get("janus") {
            for (k, v) in janus {
                merged.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(Value::Object(merged))
    }

    /// Whether a notebook's `metadata` sets `track_history` itself, in the
    /// `janus` object or at the legacy top level.
    pub fn declares_track_history(metadata: &Value) -> bool {
        metadata.get("track_history").is_some()
            || metadata
                .get("janus")
                .and_then(|j| j.get("track_history"))
                .is_some()
    }

    /// Label stored for a group, matched by any id overlap.
    pub fn label_for(&self, ids: &[CellId]) -> Option<&str> {
        self.janus_markers
            .iter()
            .find(|m| m.ids.iter().any(|id| ids.contains(id)))
            .map(|m| m.marker_name.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
