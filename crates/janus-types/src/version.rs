//! Version snapshots of a single cell.

use serde::{Deserialize, Serialize};

use crate::cell::CellContent;
use crate::ids::{CellId, VersionId};

/// An immutable snapshot of a cell's content at a point in time.
///
/// Versions with a non-empty `name` are "named" and are never pruned by
/// deduplication. An empty `version_id` marks a draft that the persistence
/// server has not seen yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub version_id: VersionId,
    pub cell_id: CellId,
    #[serde(default)]
    pub name: String,
    pub content: CellContent,
    /// Unix millis.
    #[serde(default)]
    pub timestamp: u64,
    /// Ledger-local ordinal of a draft. Zero when unknown.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seq: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Version {
    pub fn draft(cell_id: CellId, content: CellContent, timestamp: u64) -> Self {
        Self {
            version_id: VersionId::draft(),
            cell_id,
            name: String::new(),
            content,
            timestamp,
            seq: 0,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn with_id(mut self, version_id: VersionId) -> Self {
        self.version_id = version_id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Whether two records denote the same snapshot.
    ///
    /// Saved versions compare by id. Drafts have no id yet, so they compare by
    /// ordinal, timestamp and content.
    pub fn same_snapshot(&self, other: &Version) -> bool {
        if !self.version_id.is_draft() || !other.version_id.is_draft() {
            return self.version_id == other.version_id;
        }
        self.seq == other.seq
            && self.timestamp == other.timestamp
            && self.content.matches(&other.content)
    }
}
